use chrono::{DateTime, Utc};

use crate::domain::{
    entities::invoices::{InvoiceEntity, InvoiceStatusChangeset},
    value_objects::enums::invoice_statuses::InvoiceStatus,
};

/// Partial update of an invoice. Only `status` and `paid_at` are mutable after creation.
///
/// `paid_at: Some(None)` clears the column, `None` leaves it as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoicePatch {
    pub status: Option<InvoiceStatus>,
    pub paid_at: Option<Option<DateTime<Utc>>>,
}

impl InvoicePatch {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.paid_at.is_none()
    }

    pub fn to_changeset(&self) -> InvoiceStatusChangeset {
        InvoiceStatusChangeset {
            status: self.status.as_ref().map(|status| status.to_string()),
            paid_at: self.paid_at,
        }
    }

    pub fn apply_to(&self, invoice: &mut InvoiceEntity) {
        if let Some(status) = &self.status {
            invoice.status = status.to_string();
        }
        if let Some(paid_at) = self.paid_at {
            invoice.paid_at = paid_at;
        }
    }
}
