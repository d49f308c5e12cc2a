use std::{sync::Arc, time::Duration};

use anyhow::{Result as AnyResult, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use crates::{
    domain::{
        entities::invoices::InvoiceEntity,
        repositories::invoices::{InvoiceRepository, InvoiceStoreError},
        value_objects::{
            enums::invoice_statuses::InvoiceStatus,
            invoices::InvoicePatch,
            tripay_callback::{PAYMENT_STATUS_EVENT, TripayCallbackPayload},
        },
    },
    notifications::telegram::TelegramClient,
    payments::{
        signature,
        tripay_client::{
            CreateTransactionRequest, OrderItem, PaymentChannel, TransactionResult, TripayClient,
            TripayError,
        },
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    axum_http::routers::tripay_callback::TRIPAY_CALLBACK_PATH, config::config_model::DotEnvyConfig,
    telegram_bot::messages,
};

const ORDER_ITEM_NAME: &str = "Topup / Digital Item";
const FALLBACK_CUSTOMER_NAME: &str = "Telegram User";
const PLACEHOLDER_PHONE: &str = "0000000000";
const MAX_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<PaymentChannel>, TripayError>;

    async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> Result<TransactionResult, TripayError>;
}

#[async_trait]
impl PaymentGateway for TripayClient {
    async fn list_channels(&self) -> Result<Vec<PaymentChannel>, TripayError> {
        self.list_channels().await
    }

    async fn create_transaction(
        &self,
        request: CreateTransactionRequest,
    ) -> Result<TransactionResult, TripayError> {
        self.create_transaction(&request).await
    }
}

/// Outbound channel for "invoice paid" messages to the requester.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn notify_paid(&self, invoice: InvoiceEntity) -> AnyResult<()>;
}

#[async_trait]
impl ChatNotifier for TelegramClient {
    async fn notify_paid(&self, invoice: InvoiceEntity) -> AnyResult<()> {
        let text = messages::payment_received(&invoice);
        self.send_message(invoice.requester_id, &text, None).await?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("amount {amount} is below the minimum of {minimum}")]
    InvalidAmount { amount: i64, minimum: i64 },
    #[error("invoice already exists: {0}")]
    DuplicateKey(String),
    #[error("invoice not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Gateway(#[from] TripayError),
    #[error("Missing headers")]
    MissingHeaders,
    #[error("Unrecognized event: {0}")]
    UnrecognizedEvent(String),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Missing reference")]
    MissingReference,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl InvoiceError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            InvoiceError::InvalidAmount { .. }
            | InvoiceError::MissingHeaders
            | InvoiceError::UnrecognizedEvent(_)
            | InvoiceError::MissingReference => StatusCode::BAD_REQUEST,
            InvoiceError::InvalidSignature => StatusCode::UNAUTHORIZED,
            InvoiceError::NotFound(_) => StatusCode::NOT_FOUND,
            InvoiceError::DuplicateKey(_) => StatusCode::CONFLICT,
            InvoiceError::Gateway(_) => StatusCode::BAD_GATEWAY,
            InvoiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<InvoiceStoreError> for InvoiceError {
    fn from(value: InvoiceStoreError) -> Self {
        match value {
            InvoiceStoreError::DuplicateKey(merchant_ref) => InvoiceError::DuplicateKey(merchant_ref),
            InvoiceStoreError::NotFound(key) => InvoiceError::NotFound(key),
            InvoiceStoreError::EmptyPatch => InvoiceError::Internal(anyhow!("empty invoice patch")),
            InvoiceStoreError::Internal(err) => InvoiceError::Internal(err),
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, InvoiceError>;

/// What a verified callback did to local state.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Updated { invoice: InvoiceEntity, notified: bool },
    UnknownInvoice,
}

#[derive(Clone)]
pub struct InvoiceSettings {
    pub merchant_code: String,
    pub private_key: String,
    pub callback_url: String,
    pub min_amount: i64,
    pub merchant_ref_prefix: String,
    pub expiry_seconds: i64,
    /// Budget for the paid notification inside a callback request.
    pub notify_timeout: Duration,
}

impl InvoiceSettings {
    pub fn from_config(config: &DotEnvyConfig) -> Self {
        Self {
            merchant_code: config.tripay.merchant_code.clone(),
            private_key: config.tripay.private_key.clone(),
            callback_url: format!("{}{}", config.server.public_base_url, TRIPAY_CALLBACK_PATH),
            min_amount: config.invoice.min_amount,
            merchant_ref_prefix: config.invoice.merchant_ref_prefix.clone(),
            expiry_seconds: config.invoice.expiry_seconds,
            // must finish well inside the request timeout so the ack still goes out
            notify_timeout: MAX_NOTIFY_TIMEOUT
                .min(Duration::from_secs(config.server.timeout) / 3),
        }
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct InvoiceUseCase {
    repository: Arc<dyn InvoiceRepository + Send + Sync>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn ChatNotifier>,
    settings: InvoiceSettings,
    clock: Clock,
}

impl InvoiceUseCase {
    pub fn new(
        repository: Arc<dyn InvoiceRepository + Send + Sync>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn ChatNotifier>,
        settings: InvoiceSettings,
    ) -> Self {
        Self {
            repository,
            gateway,
            notifier,
            settings,
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn min_amount(&self) -> i64 {
        self.settings.min_amount
    }

    /// Unique under the assumption that one requester never buys twice within a second.
    pub fn merchant_ref_for(&self, requester_id: i64, now: DateTime<Utc>) -> String {
        format!(
            "{}{}{}",
            self.settings.merchant_ref_prefix,
            requester_id,
            now.timestamp()
        )
    }

    /// Active gateway channels, in the order the gateway lists them.
    pub async fn list_active_channels(&self) -> UseCaseResult<Vec<PaymentChannel>> {
        let channels = self.gateway.list_channels().await.map_err(|err| {
            error!(error = %err, "invoices: failed to list payment channels");
            InvoiceError::Gateway(err)
        })?;

        let active = channels
            .into_iter()
            .filter(|channel| channel.active)
            .collect::<Vec<_>>();
        info!(active_count = active.len(), "invoices: active payment channels loaded");
        Ok(active)
    }

    pub async fn create_invoice(
        &self,
        requester_id: i64,
        amount: i64,
        method: &str,
        display_name: Option<&str>,
    ) -> UseCaseResult<InvoiceEntity> {
        info!(
            requester_id,
            amount,
            method,
            "invoices: create invoice requested"
        );

        if amount < self.settings.min_amount {
            let err = InvoiceError::InvalidAmount {
                amount,
                minimum: self.settings.min_amount,
            };
            warn!(
                requester_id,
                amount,
                status = err.status_code().as_u16(),
                "invoices: amount below minimum"
            );
            return Err(err);
        }

        let now = (self.clock)();
        let merchant_ref = self.merchant_ref_for(requester_id, now);
        let signature = signature::sign_outbound(
            &self.settings.merchant_code,
            &merchant_ref,
            amount,
            &self.settings.private_key,
        );

        let customer_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_CUSTOMER_NAME)
            .to_string();

        let request = CreateTransactionRequest {
            method: method.to_string(),
            merchant_ref: merchant_ref.clone(),
            amount,
            customer_name,
            customer_email: format!("{requester_id}@telegram.local"),
            customer_phone: PLACEHOLDER_PHONE.to_string(),
            order_items: vec![OrderItem {
                name: ORDER_ITEM_NAME.to_string(),
                price: amount,
                quantity: 1,
            }],
            callback_url: self.settings.callback_url.clone(),
            expired_time: (now + TimeDelta::seconds(self.settings.expiry_seconds)).timestamp(),
            signature,
        };

        let transaction = self
            .gateway
            .create_transaction(request)
            .await
            .map_err(|err| {
                error!(
                    requester_id,
                    %merchant_ref,
                    error = %err,
                    "invoices: gateway transaction creation failed"
                );
                InvoiceError::Gateway(err)
            })?;

        let invoice = InvoiceEntity {
            merchant_ref: merchant_ref.clone(),
            requester_id,
            amount,
            method: method.to_string(),
            gateway_reference: Some(transaction.gateway_reference),
            status: InvoiceStatus::Unpaid.to_string(),
            pay_url: transaction.pay_url,
            qr_url: transaction.qr_url,
            created_at: now,
            paid_at: None,
        };

        let stored = self.repository.put(invoice).await.map_err(|err| {
            error!(
                requester_id,
                %merchant_ref,
                db_error = ?err,
                "invoices: failed to persist invoice"
            );
            InvoiceError::from(err)
        })?;

        info!(
            requester_id,
            merchant_ref = %stored.merchant_ref,
            gateway_reference = ?stored.gateway_reference,
            "invoices: invoice created"
        );
        Ok(stored)
    }

    pub async fn process_callback(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
        event_header: Option<&str>,
        payload: Option<TripayCallbackPayload>,
    ) -> UseCaseResult<CallbackOutcome> {
        let (Some(provided_signature), Some(event)) = (
            signature_header.filter(|v| !v.is_empty()),
            event_header.filter(|v| !v.is_empty()),
        ) else {
            warn!("invoices: callback without signature or event header");
            return Err(InvoiceError::MissingHeaders);
        };

        if event != PAYMENT_STATUS_EVENT {
            warn!(event, "invoices: callback with unrecognized event");
            return Err(InvoiceError::UnrecognizedEvent(event.to_string()));
        }

        if !signature::verify_inbound(raw_body, provided_signature, &self.settings.private_key) {
            warn!(
                body_len = raw_body.len(),
                "invoices: callback signature verification failed"
            );
            return Err(InvoiceError::InvalidSignature);
        }

        let payload = payload.ok_or(InvoiceError::MissingReference)?;
        let reference = payload
            .reference
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or(InvoiceError::MissingReference)?;
        let merchant_ref = payload.merchant_ref.clone().filter(|r| !r.is_empty());
        let status = InvoiceStatus::from_gateway(payload.status.as_deref().unwrap_or_default());
        let paid_at = payload.paid_at_utc();

        info!(
            %reference,
            merchant_ref = ?merchant_ref,
            %status,
            "invoices: verified payment status callback"
        );

        let Some(invoice) = self.resolve_invoice(merchant_ref.as_deref(), &reference).await? else {
            info!(
                %reference,
                merchant_ref = ?merchant_ref,
                "invoices: callback for untracked invoice acknowledged"
            );
            return Ok(CallbackOutcome::UnknownInvoice);
        };

        let patch = InvoicePatch {
            status: Some(status.clone()),
            paid_at: Some(paid_at),
        };
        let updated = self
            .repository
            .update(invoice.merchant_ref.clone(), patch)
            .await
            .map_err(|err| {
                error!(
                    merchant_ref = %invoice.merchant_ref,
                    db_error = ?err,
                    "invoices: failed to update invoice status"
                );
                InvoiceError::from(err)
            })?;

        info!(
            merchant_ref = %updated.merchant_ref,
            previous_status = %invoice.status,
            %status,
            "invoices: invoice status updated"
        );

        let mut notified = false;
        if status.is_paid() {
            let sent = tokio::time::timeout(
                self.settings.notify_timeout,
                self.notifier.notify_paid(updated.clone()),
            )
            .await;
            match sent {
                Ok(Ok(())) => {
                    notified = true;
                    info!(
                        merchant_ref = %updated.merchant_ref,
                        requester_id = updated.requester_id,
                        "invoices: paid notification sent"
                    );
                }
                Ok(Err(err)) => {
                    warn!(
                        merchant_ref = %updated.merchant_ref,
                        requester_id = updated.requester_id,
                        error = %err,
                        "invoices: paid notification failed"
                    );
                }
                Err(_) => {
                    warn!(
                        merchant_ref = %updated.merchant_ref,
                        requester_id = updated.requester_id,
                        timeout_ms = self.settings.notify_timeout.as_millis() as u64,
                        "invoices: paid notification timed out"
                    );
                }
            }
        }

        Ok(CallbackOutcome::Updated {
            invoice: updated,
            notified,
        })
    }

    /// Merchant reference first, then the gateway reference.
    async fn resolve_invoice(
        &self,
        merchant_ref: Option<&str>,
        reference: &str,
    ) -> UseCaseResult<Option<InvoiceEntity>> {
        if let Some(merchant_ref) = merchant_ref {
            match self.repository.get_by_merchant_ref(merchant_ref.to_string()).await {
                Ok(invoice) => return Ok(Some(invoice)),
                Err(InvoiceStoreError::NotFound(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }

        match self.repository.get_by_gateway_ref(reference.to_string()).await {
            Ok(invoice) => Ok(Some(invoice)),
            Err(InvoiceStoreError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crates::{
        domain::repositories::invoices::MockInvoiceRepository,
        infra::db::repositories::in_memory::InvoiceInMemory,
    };
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &str = "private-key-123";
    const NOW: i64 = 1_700_000_000;

    fn settings() -> InvoiceSettings {
        InvoiceSettings {
            merchant_code: "T0001".to_string(),
            private_key: SECRET.to_string(),
            callback_url: "https://bridge.example/tripay/callback".to_string(),
            min_amount: 1000,
            merchant_ref_prefix: "TG".to_string(),
            expiry_seconds: 3600,
            notify_timeout: Duration::from_secs(5),
        }
    }

    fn fixed_clock() -> Clock {
        Arc::new(|| Utc.timestamp_opt(NOW, 0).unwrap())
    }

    fn usecase(
        repository: Arc<dyn InvoiceRepository + Send + Sync>,
        gateway: MockPaymentGateway,
        notifier: MockChatNotifier,
    ) -> InvoiceUseCase {
        InvoiceUseCase::new(repository, Arc::new(gateway), Arc::new(notifier), settings())
            .with_clock(fixed_clock())
    }

    fn gateway_returning(reference: &'static str) -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_transaction().returning(move |_| {
            Ok(TransactionResult {
                gateway_reference: reference.to_string(),
                pay_url: Some(format!("http://pay/{reference}")),
                qr_url: None,
            })
        });
        gateway
    }

    fn unpaid_invoice(merchant_ref: &str, gateway_reference: &str, requester_id: i64) -> InvoiceEntity {
        InvoiceEntity {
            merchant_ref: merchant_ref.to_string(),
            requester_id,
            amount: 10_000,
            method: "QRIS".to_string(),
            gateway_reference: Some(gateway_reference.to_string()),
            status: InvoiceStatus::Unpaid.to_string(),
            pay_url: None,
            qr_url: None,
            created_at: Utc.timestamp_opt(NOW, 0).unwrap(),
            paid_at: None,
        }
    }

    struct SignedCallback {
        body: Vec<u8>,
        signature: String,
        payload: Option<TripayCallbackPayload>,
    }

    fn signed_callback(value: serde_json::Value) -> SignedCallback {
        let body = serde_json::to_vec(&value).unwrap();
        let signature = signature::sign_inbound(&body, SECRET);
        let payload = serde_json::from_slice(&body).ok();
        SignedCallback {
            body,
            signature,
            payload,
        }
    }

    async fn deliver(usecase: &InvoiceUseCase, callback: &SignedCallback) -> UseCaseResult<CallbackOutcome> {
        usecase
            .process_callback(
                &callback.body,
                Some(&callback.signature),
                Some(PAYMENT_STATUS_EVENT),
                callback.payload.clone(),
            )
            .await
    }

    #[tokio::test]
    async fn create_invoice_sends_signed_request_and_persists_unpaid() {
        let store = Arc::new(InvoiceInMemory::new());
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_transaction()
            .withf(|request| {
                request.merchant_ref == "TG421700000000"
                    && request.amount == 10_000
                    && request.method == "QRIS"
                    && request.customer_name == "Alice"
                    && request.customer_email == "42@telegram.local"
                    && request.order_items
                        == vec![OrderItem {
                            name: ORDER_ITEM_NAME.to_string(),
                            price: 10_000,
                            quantity: 1,
                        }]
                    && request.callback_url == "https://bridge.example/tripay/callback"
                    && request.expired_time == NOW + 3600
                    && request.signature
                        == signature::sign_outbound("T0001", "TG421700000000", 10_000, SECRET)
            })
            .times(1)
            .returning(|_| {
                Ok(TransactionResult {
                    gateway_reference: "T1".to_string(),
                    pay_url: Some("http://pay/T1".to_string()),
                    qr_url: None,
                })
            });

        let usecase = usecase(store.clone(), gateway, MockChatNotifier::new());
        let invoice = usecase
            .create_invoice(42, 10_000, "QRIS", Some("Alice"))
            .await
            .unwrap();

        assert_eq!(invoice.status(), InvoiceStatus::Unpaid);
        assert_eq!(invoice.amount, 10_000);
        assert_eq!(invoice.gateway_reference.as_deref(), Some("T1"));
        assert_eq!(invoice.pay_url.as_deref(), Some("http://pay/T1"));
        assert!(invoice.paid_at.is_none());

        let stored = store
            .get_by_merchant_ref("TG421700000000".to_string())
            .await
            .unwrap();
        assert_eq!(stored, invoice);
    }

    #[tokio::test]
    async fn blank_display_name_falls_back() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_transaction()
            .withf(|request| request.customer_name == FALLBACK_CUSTOMER_NAME)
            .times(1)
            .returning(|_| {
                Ok(TransactionResult {
                    gateway_reference: "T1".to_string(),
                    pay_url: None,
                    qr_url: None,
                })
            });

        let usecase = usecase(Arc::new(InvoiceInMemory::new()), gateway, MockChatNotifier::new());
        usecase.create_invoice(42, 5000, "BRIVA", Some("  ")).await.unwrap();
    }

    #[tokio::test]
    async fn amount_below_minimum_never_reaches_gateway() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_transaction().never();
        let mut repository = MockInvoiceRepository::new();
        repository.expect_put().never();

        let usecase = usecase(Arc::new(repository), gateway, MockChatNotifier::new());
        let err = usecase
            .create_invoice(42, 500, "QRIS", Some("Alice"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            InvoiceError::InvalidAmount {
                amount: 500,
                minimum: 1000
            }
        ));
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn gateway_failure_persists_nothing() {
        let store = Arc::new(InvoiceInMemory::new());
        store.put(unpaid_invoice("TG1", "T0", 1)).await.unwrap();

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_transaction().times(1).returning(|_| {
            Err(TripayError::Upstream {
                context: "create transaction",
                status: Some(400),
                message: "Invalid signature".to_string(),
            })
        });

        let usecase = usecase(store.clone(), gateway, MockChatNotifier::new());
        let err = usecase
            .create_invoice(42, 10_000, "QRIS", None)
            .await
            .unwrap_err();

        assert!(matches!(err, InvoiceError::Gateway(_)));
        assert!(err.to_string().contains("Invalid signature"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn gateway_timeout_is_gateway_error_without_put() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_transaction().times(1).returning(|_| {
            Err(TripayError::Timeout {
                context: "create transaction",
            })
        });
        let mut repository = MockInvoiceRepository::new();
        repository.expect_put().never();

        let usecase = usecase(Arc::new(repository), gateway, MockChatNotifier::new());
        let err = usecase
            .create_invoice(42, 10_000, "QRIS", None)
            .await
            .unwrap_err();

        assert!(matches!(err, InvoiceError::Gateway(TripayError::Timeout { .. })));
    }

    #[tokio::test]
    async fn duplicate_merchant_ref_surfaces_duplicate_key() {
        let store = Arc::new(InvoiceInMemory::new());
        let usecase = usecase(store.clone(), gateway_returning("T1"), MockChatNotifier::new());

        usecase.create_invoice(42, 10_000, "QRIS", None).await.unwrap();
        // same requester, same second
        let err = usecase
            .create_invoice(42, 20_000, "QRIS", None)
            .await
            .unwrap_err();

        assert!(matches!(err, InvoiceError::DuplicateKey(ref r) if r == "TG421700000000"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn create_then_paid_callback_notifies_requester_once() {
        let store = Arc::new(InvoiceInMemory::new());
        let mut notifier = MockChatNotifier::new();
        notifier
            .expect_notify_paid()
            .withf(|invoice| invoice.requester_id == 42 && invoice.status == "PAID")
            .times(1)
            .returning(|_| Ok(()));

        let usecase = usecase(store.clone(), gateway_returning("T1"), notifier);
        let invoice = usecase
            .create_invoice(42, 10_000, "QRIS", Some("Alice"))
            .await
            .unwrap();

        let callback = signed_callback(json!({
            "reference": "T1",
            "merchant_ref": invoice.merchant_ref,
            "status": "PAID",
            "paid_at": NOW + 120,
        }));
        let outcome = deliver(&usecase, &callback).await.unwrap();

        match outcome {
            CallbackOutcome::Updated { invoice, notified } => {
                assert!(notified);
                assert_eq!(invoice.status(), InvoiceStatus::Paid);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let stored = store
            .get_by_merchant_ref(invoice.merchant_ref.clone())
            .await
            .unwrap();
        assert_eq!(stored.status, "PAID");
        assert_eq!(stored.paid_at.map(|t| t.timestamp()), Some(NOW + 120));
        assert_eq!(stored.created_at, invoice.created_at);
    }

    #[tokio::test]
    async fn missing_headers_touch_nothing() {
        // any repository call would panic on the bare mock
        let usecase = usecase(
            Arc::new(MockInvoiceRepository::new()),
            MockPaymentGateway::new(),
            MockChatNotifier::new(),
        );
        let callback = signed_callback(json!({"reference": "T1", "status": "PAID"}));

        let no_signature = usecase
            .process_callback(&callback.body, None, Some(PAYMENT_STATUS_EVENT), callback.payload.clone())
            .await
            .unwrap_err();
        let no_event = usecase
            .process_callback(&callback.body, Some(&callback.signature), None, callback.payload.clone())
            .await
            .unwrap_err();
        let empty_event = usecase
            .process_callback(&callback.body, Some(&callback.signature), Some(""), callback.payload.clone())
            .await
            .unwrap_err();

        for err in [no_signature, no_event, empty_event] {
            assert!(matches!(err, InvoiceError::MissingHeaders));
            assert_eq!(err.status_code().as_u16(), 400);
        }
    }

    #[tokio::test]
    async fn unrecognized_event_is_rejected() {
        let usecase = usecase(
            Arc::new(MockInvoiceRepository::new()),
            MockPaymentGateway::new(),
            MockChatNotifier::new(),
        );
        let callback = signed_callback(json!({"reference": "T1", "status": "PAID"}));

        let err = usecase
            .process_callback(
                &callback.body,
                Some(&callback.signature),
                Some("payout_status"),
                callback.payload.clone(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, InvoiceError::UnrecognizedEvent(ref e) if e == "payout_status"));
        assert_eq!(err.status_code().as_u16(), 400);
    }

    #[tokio::test]
    async fn bad_signature_short_circuits_before_store() {
        let store = Arc::new(InvoiceInMemory::new());
        store.put(unpaid_invoice("TG1", "T1", 42)).await.unwrap();
        let mut notifier = MockChatNotifier::new();
        notifier.expect_notify_paid().never();

        let usecase = usecase(store.clone(), MockPaymentGateway::new(), notifier);
        let callback = signed_callback(json!({"reference": "T1", "merchant_ref": "TG1", "status": "PAID"}));
        let forged = signature::sign_inbound(&callback.body, "someone-else");

        let err = usecase
            .process_callback(
                &callback.body,
                Some(&forged),
                Some(PAYMENT_STATUS_EVENT),
                callback.payload.clone(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, InvoiceError::InvalidSignature));
        assert_eq!(err.status_code().as_u16(), 401);
        let stored = store.get_by_merchant_ref("TG1".to_string()).await.unwrap();
        assert_eq!(stored.status(), InvoiceStatus::Unpaid);
    }

    #[tokio::test]
    async fn verified_callback_without_reference_is_rejected() {
        let usecase = usecase(
            Arc::new(MockInvoiceRepository::new()),
            MockPaymentGateway::new(),
            MockChatNotifier::new(),
        );

        let callback = signed_callback(json!({"merchant_ref": "TG1", "status": "PAID"}));
        let err = deliver(&usecase, &callback).await.unwrap_err();
        assert!(matches!(err, InvoiceError::MissingReference));

        // signed but not JSON
        let body = b"not json".to_vec();
        let signature = signature::sign_inbound(&body, SECRET);
        let err = usecase
            .process_callback(&body, Some(&signature), Some(PAYMENT_STATUS_EVENT), None)
            .await
            .unwrap_err();
        assert!(matches!(err, InvoiceError::MissingReference));
    }

    #[tokio::test]
    async fn unknown_invoice_is_acknowledged_without_mutation() {
        let mut repository = MockInvoiceRepository::new();
        repository
            .expect_get_by_merchant_ref()
            .times(1)
            .returning(|r| Err(InvoiceStoreError::NotFound(r)));
        repository
            .expect_get_by_gateway_ref()
            .times(1)
            .returning(|r| Err(InvoiceStoreError::NotFound(r)));
        repository.expect_update().never();
        let mut notifier = MockChatNotifier::new();
        notifier.expect_notify_paid().never();

        let usecase = usecase(Arc::new(repository), MockPaymentGateway::new(), notifier);
        let callback = signed_callback(json!({"reference": "T404", "merchant_ref": "TG404", "status": "PAID"}));

        assert_eq!(
            deliver(&usecase, &callback).await.unwrap(),
            CallbackOutcome::UnknownInvoice
        );
    }

    #[tokio::test]
    async fn merchant_ref_wins_over_gateway_reference() {
        let store = Arc::new(InvoiceInMemory::new());
        store.put(unpaid_invoice("TG-A", "T-A", 1)).await.unwrap();
        store.put(unpaid_invoice("TG-B", "T-B", 2)).await.unwrap();

        let mut notifier = MockChatNotifier::new();
        notifier
            .expect_notify_paid()
            .withf(|invoice| invoice.merchant_ref == "TG-A" && invoice.requester_id == 1)
            .times(1)
            .returning(|_| Ok(()));

        let usecase = usecase(store.clone(), MockPaymentGateway::new(), notifier);
        // merchant_ref points at A, reference points at B
        let callback = signed_callback(json!({"reference": "T-B", "merchant_ref": "TG-A", "status": "PAID"}));
        deliver(&usecase, &callback).await.unwrap();

        let a = store.get_by_merchant_ref("TG-A".to_string()).await.unwrap();
        let b = store.get_by_merchant_ref("TG-B".to_string()).await.unwrap();
        assert_eq!(a.status(), InvoiceStatus::Paid);
        assert_eq!(b.status(), InvoiceStatus::Unpaid);
    }

    #[tokio::test]
    async fn falls_back_to_gateway_reference() {
        let store = Arc::new(InvoiceInMemory::new());
        store.put(unpaid_invoice("TG-A", "T-A", 1)).await.unwrap();

        let mut notifier = MockChatNotifier::new();
        notifier.expect_notify_paid().never();
        let usecase = usecase(store.clone(), MockPaymentGateway::new(), notifier);

        let without_merchant_ref = signed_callback(json!({"reference": "T-A", "status": "EXPIRED"}));
        deliver(&usecase, &without_merchant_ref).await.unwrap();
        assert_eq!(
            store.get_by_merchant_ref("TG-A".to_string()).await.unwrap().status,
            "EXPIRED"
        );

        let stale_merchant_ref =
            signed_callback(json!({"reference": "T-A", "merchant_ref": "TG-gone", "status": "failed"}));
        deliver(&usecase, &stale_merchant_ref).await.unwrap();
        assert_eq!(
            store.get_by_merchant_ref("TG-A".to_string()).await.unwrap().status,
            "FAILED"
        );
    }

    #[tokio::test]
    async fn every_paid_replay_notifies() {
        let store = Arc::new(InvoiceInMemory::new());
        store.put(unpaid_invoice("TG1", "T1", 42)).await.unwrap();

        let sent = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&sent);
        let mut notifier = MockChatNotifier::new();
        notifier.expect_notify_paid().returning(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let usecase = usecase(store.clone(), MockPaymentGateway::new(), notifier);
        let callback = signed_callback(json!({
            "reference": "T1",
            "merchant_ref": "TG1",
            "status": "PAID",
            "paid_at": NOW + 60,
        }));

        let first = deliver(&usecase, &callback).await.unwrap();
        let second = deliver(&usecase, &callback).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(sent.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn notification_failure_is_swallowed() {
        let store = Arc::new(InvoiceInMemory::new());
        store.put(unpaid_invoice("TG1", "T1", 42)).await.unwrap();

        let mut notifier = MockChatNotifier::new();
        notifier
            .expect_notify_paid()
            .times(1)
            .returning(|_| Err(anyhow!("bot was blocked by the user")));

        let usecase = usecase(store.clone(), MockPaymentGateway::new(), notifier);
        let callback = signed_callback(json!({"reference": "T1", "merchant_ref": "TG1", "status": "PAID"}));

        match deliver(&usecase, &callback).await.unwrap() {
            CallbackOutcome::Updated { invoice, notified } => {
                assert!(!notified);
                assert_eq!(invoice.status(), InvoiceStatus::Paid);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_regression_is_applied_as_reported() {
        let store = Arc::new(InvoiceInMemory::new());
        let mut paid = unpaid_invoice("TG1", "T1", 42);
        paid.status = InvoiceStatus::Paid.to_string();
        paid.paid_at = Some(Utc.timestamp_opt(NOW + 60, 0).unwrap());
        store.put(paid).await.unwrap();

        let mut notifier = MockChatNotifier::new();
        notifier.expect_notify_paid().never();

        let usecase = usecase(store.clone(), MockPaymentGateway::new(), notifier);
        let callback = signed_callback(json!({
            "reference": "T1",
            "merchant_ref": "TG1",
            "status": "UNPAID",
            "paid_at": null,
        }));
        deliver(&usecase, &callback).await.unwrap();

        let stored = store.get_by_merchant_ref("TG1".to_string()).await.unwrap();
        assert_eq!(stored.status(), InvoiceStatus::Unpaid);
        assert!(stored.paid_at.is_none());
    }

    #[tokio::test]
    async fn store_failure_on_update_is_internal() {
        let mut repository = MockInvoiceRepository::new();
        repository
            .expect_get_by_merchant_ref()
            .returning(|r| Ok(unpaid_invoice(&r, "T1", 42)));
        repository
            .expect_update()
            .times(1)
            .returning(|_, _| Err(InvoiceStoreError::Internal(anyhow!("connection reset"))));

        let usecase = usecase(Arc::new(repository), MockPaymentGateway::new(), MockChatNotifier::new());
        let callback = signed_callback(json!({"reference": "T1", "merchant_ref": "TG1", "status": "PAID"}));

        let err = deliver(&usecase, &callback).await.unwrap_err();
        assert!(matches!(err, InvoiceError::Internal(_)));
        assert_eq!(err.status_code().as_u16(), 500);
    }

    #[tokio::test]
    async fn lists_only_active_channels_in_order() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_list_channels().times(1).returning(|| {
            Ok(vec![
                PaymentChannel {
                    code: "BRIVA".to_string(),
                    name: "BRI Virtual Account".to_string(),
                    group: "Virtual Account".to_string(),
                    active: true,
                },
                PaymentChannel {
                    code: "OVO".to_string(),
                    name: "OVO".to_string(),
                    group: "E-Wallet".to_string(),
                    active: false,
                },
                PaymentChannel {
                    code: "QRIS".to_string(),
                    name: "QRIS".to_string(),
                    group: "E-Wallet".to_string(),
                    active: true,
                },
            ])
        });

        let usecase = usecase(Arc::new(InvoiceInMemory::new()), gateway, MockChatNotifier::new());
        let codes = usecase
            .list_active_channels()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.code)
            .collect::<Vec<_>>();

        assert_eq!(codes, vec!["BRIVA", "QRIS"]);
    }

    #[test]
    fn merchant_ref_embeds_requester_and_unix_seconds() {
        let usecase = usecase(
            Arc::new(InvoiceInMemory::new()),
            MockPaymentGateway::new(),
            MockChatNotifier::new(),
        );
        let now = Utc.timestamp_opt(NOW, 0).unwrap();
        assert_eq!(usecase.merchant_ref_for(42, now), "TG421700000000");
    }
}
