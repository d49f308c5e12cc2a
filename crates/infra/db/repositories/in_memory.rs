use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::{
    entities::invoices::InvoiceEntity,
    repositories::invoices::{InvoiceRepository, InvoiceStoreError, StoreResult},
    value_objects::invoices::InvoicePatch,
};

/// A thread-safe in-memory invoice store keyed by merchant reference.
///
/// Updates happen under the write lock, so a read-modify-write of one
/// invoice never interleaves with another.
#[derive(Default, Clone)]
pub struct InvoiceInMemory {
    invoices: Arc<RwLock<HashMap<String, InvoiceEntity>>>,
}

impl InvoiceInMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.invoices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.invoices.read().await.is_empty()
    }
}

#[async_trait]
impl InvoiceRepository for InvoiceInMemory {
    async fn put(&self, invoice: InvoiceEntity) -> StoreResult<InvoiceEntity> {
        let mut invoices = self.invoices.write().await;
        if invoices.contains_key(&invoice.merchant_ref) {
            return Err(InvoiceStoreError::DuplicateKey(invoice.merchant_ref));
        }
        invoices.insert(invoice.merchant_ref.clone(), invoice.clone());
        Ok(invoice)
    }

    async fn update(
        &self,
        merchant_ref: String,
        patch: InvoicePatch,
    ) -> StoreResult<InvoiceEntity> {
        if patch.is_empty() {
            return Err(InvoiceStoreError::EmptyPatch);
        }

        let mut invoices = self.invoices.write().await;
        let invoice = invoices
            .get_mut(&merchant_ref)
            .ok_or(InvoiceStoreError::NotFound(merchant_ref))?;
        patch.apply_to(invoice);
        Ok(invoice.clone())
    }

    async fn get_by_merchant_ref(&self, merchant_ref: String) -> StoreResult<InvoiceEntity> {
        let invoices = self.invoices.read().await;
        invoices
            .get(&merchant_ref)
            .cloned()
            .ok_or(InvoiceStoreError::NotFound(merchant_ref))
    }

    async fn get_by_gateway_ref(&self, gateway_reference: String) -> StoreResult<InvoiceEntity> {
        let invoices = self.invoices.read().await;
        invoices
            .values()
            .find(|invoice| invoice.gateway_reference.as_deref() == Some(gateway_reference.as_str()))
            .cloned()
            .ok_or(InvoiceStoreError::NotFound(gateway_reference))
    }
}
