use anyhow::anyhow;
use async_trait::async_trait;
use diesel::{
    OptionalExtension, PgConnection, RunQueryDsl, insert_into,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    update,
};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::invoices},
};
use domain::{
    entities::invoices::InvoiceEntity,
    repositories::invoices::{InvoiceRepository, InvoiceStoreError, StoreResult},
    value_objects::invoices::InvoicePatch,
};

pub struct InvoicePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl InvoicePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    /// Runs a diesel call on the blocking pool with a pooled connection.
    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
    {
        let db_pool = Arc::clone(&self.db_pool);
        tokio::task::spawn_blocking(move || {
            let mut conn = db_pool
                .get()
                .map_err(|err| InvoiceStoreError::Internal(anyhow!(err)))?;
            f(&mut conn)
        })
        .await
        .map_err(|err| InvoiceStoreError::Internal(anyhow!(err)))?
    }
}

fn internal(err: DieselError) -> InvoiceStoreError {
    InvoiceStoreError::Internal(anyhow!(err))
}

#[async_trait]
impl InvoiceRepository for InvoicePostgres {
    async fn put(&self, invoice: InvoiceEntity) -> StoreResult<InvoiceEntity> {
        self.with_conn(move |conn| {
            insert_into(invoices::table)
                .values(&invoice)
                .returning(InvoiceEntity::as_returning())
                .get_result::<InvoiceEntity>(conn)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        InvoiceStoreError::DuplicateKey(invoice.merchant_ref.clone())
                    }
                    other => internal(other),
                })
        })
        .await
    }

    async fn update(
        &self,
        merchant_ref: String,
        patch: InvoicePatch,
    ) -> StoreResult<InvoiceEntity> {
        if patch.is_empty() {
            return Err(InvoiceStoreError::EmptyPatch);
        }

        self.with_conn(move |conn| {
            let changeset = patch.to_changeset();

            // Single UPDATE ... RETURNING; Postgres row locking keeps it atomic.
            update(invoices::table.find(merchant_ref.as_str()))
                .set(&changeset)
                .returning(InvoiceEntity::as_returning())
                .get_result::<InvoiceEntity>(conn)
                .optional()
                .map_err(internal)?
                .ok_or_else(|| InvoiceStoreError::NotFound(merchant_ref.clone()))
        })
        .await
    }

    async fn get_by_merchant_ref(&self, merchant_ref: String) -> StoreResult<InvoiceEntity> {
        self.with_conn(move |conn| {
            invoices::table
                .find(merchant_ref.as_str())
                .select(InvoiceEntity::as_select())
                .first::<InvoiceEntity>(conn)
                .optional()
                .map_err(internal)?
                .ok_or_else(|| InvoiceStoreError::NotFound(merchant_ref.clone()))
        })
        .await
    }

    async fn get_by_gateway_ref(&self, gateway_reference: String) -> StoreResult<InvoiceEntity> {
        self.with_conn(move |conn| {
            invoices::table
                .filter(invoices::gateway_reference.eq(gateway_reference.as_str()))
                .select(InvoiceEntity::as_select())
                .first::<InvoiceEntity>(conn)
                .optional()
                .map_err(internal)?
                .ok_or_else(|| InvoiceStoreError::NotFound(gateway_reference.clone()))
        })
        .await
    }
}
