use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::usecases::invoices::InvoiceError;

/// Body returned to the payment gateway on every callback.
#[derive(Debug, Serialize, PartialEq)]
pub struct CallbackResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CallbackResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

impl IntoResponse for InvoiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            // Don't leak store or transport detail to the caller
            InvoiceError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(CallbackResponse::failed(message))).into_response()
    }
}

pub fn callback_ok() -> Response {
    (StatusCode::OK, Json(CallbackResponse::ok())).into_response()
}
