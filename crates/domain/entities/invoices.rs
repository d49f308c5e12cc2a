use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::value_objects::enums::invoice_statuses::InvoiceStatus;
use crate::infra::db::postgres::schema::invoices;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable, Insertable)]
#[diesel(table_name = invoices)]
#[diesel(primary_key(merchant_ref))]
pub struct InvoiceEntity {
    pub merchant_ref: String,
    pub requester_id: i64,
    pub amount: i64,
    pub method: String,
    pub gateway_reference: Option<String>,
    pub status: String,
    pub pay_url: Option<String>,
    pub qr_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl InvoiceEntity {
    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_gateway(&self.status)
    }
}

/// Row-level changeset for the mutable invoice columns. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = invoices)]
pub struct InvoiceStatusChangeset {
    pub status: Option<String>,
    pub paid_at: Option<Option<DateTime<Utc>>>,
}
