use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Invoice status as reported by the gateway.
///
/// Only `UNPAID` and `PAID` carry meaning locally; anything else the gateway
/// sends (`EXPIRED`, `FAILED`, `REFUND`, ...) is kept verbatim.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum InvoiceStatus {
    #[default]
    Unpaid,
    Paid,
    Other(String),
}

impl InvoiceStatus {
    /// Normalizes a gateway status string (trimmed, upper-cased).
    pub fn from_gateway(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "UNPAID" => InvoiceStatus::Unpaid,
            "PAID" => InvoiceStatus::Paid,
            other => InvoiceStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InvoiceStatus::Unpaid => "UNPAID",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Other(value) => value.as_str(),
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, InvoiceStatus::Paid)
    }
}

impl Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for InvoiceStatus {
    fn from(value: String) -> Self {
        InvoiceStatus::from_gateway(&value)
    }
}

impl From<InvoiceStatus> for String {
    fn from(value: InvoiceStatus) -> Self {
        value.as_str().to_string()
    }
}
