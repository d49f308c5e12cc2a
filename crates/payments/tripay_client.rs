use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{error, info};

/// Per-call network timeout for every gateway request.
pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

const PRODUCTION_BASE_URL: &str = "https://tripay.co.id/api";
const SANDBOX_BASE_URL: &str = "https://tripay.co.id/api-sandbox";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TripayMode {
    #[default]
    Production,
    Sandbox,
}

impl TripayMode {
    /// Anything other than `sandbox` selects production.
    pub fn from_env_value(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("sandbox") {
            TripayMode::Sandbox
        } else {
            TripayMode::Production
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            TripayMode::Production => PRODUCTION_BASE_URL,
            TripayMode::Sandbox => SANDBOX_BASE_URL,
        }
    }
}

#[derive(Debug, Error)]
pub enum TripayError {
    #[error("tripay {context} failed: {message}")]
    Upstream {
        context: &'static str,
        status: Option<u16>,
        message: String,
    },
    #[error("tripay {context} timed out")]
    Timeout { context: &'static str },
    #[error("tripay {context} request failed: {message}")]
    Transport {
        context: &'static str,
        message: String,
    },
    #[error("tripay {context} returned an unreadable response: {message}")]
    Decode {
        context: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItem {
    pub name: String,
    pub price: i64,
    pub quantity: i64,
}

/// Closed-payment transaction request, sent form-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransactionRequest {
    pub method: String,
    pub merchant_ref: String,
    pub amount: i64,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub order_items: Vec<OrderItem>,
    pub callback_url: String,
    pub expired_time: i64,
    pub signature: String,
}

impl CreateTransactionRequest {
    pub fn to_form(&self) -> Vec<(String, String)> {
        let mut body: Vec<(String, String)> = vec![
            ("method".to_string(), self.method.clone()),
            ("merchant_ref".to_string(), self.merchant_ref.clone()),
            ("amount".to_string(), self.amount.to_string()),
            ("customer_name".to_string(), self.customer_name.clone()),
            ("customer_email".to_string(), self.customer_email.clone()),
            ("customer_phone".to_string(), self.customer_phone.clone()),
        ];

        for (idx, item) in self.order_items.iter().enumerate() {
            body.push((format!("order_items[{idx}][name]"), item.name.clone()));
            body.push((format!("order_items[{idx}][price]"), item.price.to_string()));
            body.push((format!("order_items[{idx}][quantity]"), item.quantity.to_string()));
        }

        body.push(("callback_url".to_string(), self.callback_url.clone()));
        body.push(("expired_time".to_string(), self.expired_time.to_string()));
        body.push(("signature".to_string(), self.signature.clone()));
        body
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
    pub gateway_reference: String,
    pub pay_url: Option<String>,
    pub qr_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    reference: Option<String>,
    pay_url: Option<String>,
    checkout_url: Option<String>,
    qr_url: Option<String>,
}

impl TransactionData {
    fn into_result(self) -> Option<TransactionResult> {
        let gateway_reference = self.reference.filter(|r| !r.is_empty())?;
        Some(TransactionResult {
            gateway_reference,
            // Some channels only hand back a hosted checkout page.
            pay_url: self.pay_url.or(self.checkout_url),
            qr_url: self.qr_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    data: Option<T>,
}

/// Unwraps the `{success, message, data}` envelope every endpoint returns.
fn unwrap_envelope<T: DeserializeOwned>(
    body: &str,
    context: &'static str,
) -> Result<T, TripayError> {
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|err| TripayError::Decode {
        context,
        message: err.to_string(),
    })?;

    if !envelope.success {
        return Err(TripayError::Upstream {
            context,
            status: None,
            message: envelope
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("{context} was not successful")),
        });
    }

    envelope.data.ok_or(TripayError::Decode {
        context,
        message: "missing data".to_string(),
    })
}

fn transport_error(err: reqwest::Error, context: &'static str) -> TripayError {
    if err.is_timeout() {
        return TripayError::Timeout { context };
    }
    TripayError::Transport {
        context,
        message: err.to_string(),
    }
}

/// Minimal Tripay client built on reqwest.
pub struct TripayClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl TripayClient {
    pub fn new(mode: TripayMode, api_key: String) -> Result<Self, TripayError> {
        Self::with_base_url(mode.base_url().to_string(), api_key)
    }

    pub fn with_base_url(base_url: String, api_key: String) -> Result<Self, TripayError> {
        let http = reqwest::Client::builder()
            .timeout(GATEWAY_TIMEOUT)
            .build()
            .map_err(|err| transport_error(err, "client setup"))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn read_envelope<T: DeserializeOwned>(
        resp: reqwest::Response,
        context: &'static str,
    ) -> Result<T, TripayError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| transport_error(err, context))?;

        if status.is_success() {
            return unwrap_envelope(&body, context);
        }

        // Error responses usually still carry the envelope's message.
        let upstream_message = serde_json::from_str::<Envelope<serde_json::Value>>(&body)
            .ok()
            .and_then(|envelope| envelope.message)
            .filter(|m| !m.is_empty());

        error!(
            status = %status,
            tripay_message = ?upstream_message,
            response_body = %body,
            context = %context,
            "tripay api request failed"
        );

        Err(TripayError::Upstream {
            context,
            status: Some(status.as_u16()),
            message: upstream_message.unwrap_or_else(|| format!("http status {status}")),
        })
    }

    /// `GET /merchant/payment-channel`
    pub async fn list_channels(&self) -> Result<Vec<PaymentChannel>, TripayError> {
        let context = "list payment channels";
        let resp = self
            .http
            .get(format!("{}/merchant/payment-channel", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|err| transport_error(err, context))?;

        let channels: Vec<PaymentChannel> = Self::read_envelope(resp, context).await?;
        info!(channel_count = channels.len(), "tripay: payment channels loaded");
        Ok(channels)
    }

    /// `POST /transaction/create`
    pub async fn create_transaction(
        &self,
        request: &CreateTransactionRequest,
    ) -> Result<TransactionResult, TripayError> {
        let context = "create transaction";
        let resp = self
            .http
            .post(format!("{}/transaction/create", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .form(&request.to_form())
            .send()
            .await
            .map_err(|err| transport_error(err, context))?;

        let data: TransactionData = Self::read_envelope(resp, context).await?;
        let result = data.into_result().ok_or(TripayError::Decode {
            context,
            message: "missing transaction reference".to_string(),
        })?;

        info!(
            merchant_ref = %request.merchant_ref,
            gateway_reference = %result.gateway_reference,
            "tripay: transaction created"
        );
        Ok(result)
    }
}
