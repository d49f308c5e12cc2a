use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

use crate::domain::{entities::invoices::InvoiceEntity, value_objects::invoices::InvoicePatch};

#[derive(Debug, Error)]
pub enum InvoiceStoreError {
    #[error("invoice already exists: {0}")]
    DuplicateKey(String),
    #[error("invoice not found: {0}")]
    NotFound(String),
    #[error("invoice patch has no fields to update")]
    EmptyPatch,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type StoreResult<T> = std::result::Result<T, InvoiceStoreError>;

/// Keyed invoice storage. Each write is a single-record atomic commit.
#[automock]
#[async_trait]
pub trait InvoiceRepository {
    async fn put(&self, invoice: InvoiceEntity) -> StoreResult<InvoiceEntity>;
    async fn update(&self, merchant_ref: String, patch: InvoicePatch)
    -> StoreResult<InvoiceEntity>;
    async fn get_by_merchant_ref(&self, merchant_ref: String) -> StoreResult<InvoiceEntity>;
    async fn get_by_gateway_ref(&self, gateway_reference: String) -> StoreResult<InvoiceEntity>;
}
