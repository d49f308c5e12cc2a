use crates::payments::tripay_client::TripayMode;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub server: Server,
    pub database: Database,
    pub tripay: Tripay,
    pub telegram: Telegram,
    pub invoice: InvoiceRules,
}

#[derive(Debug, Clone)]
pub struct Server {
    pub port: u16,
    /// MiB
    pub body_limit: u64,
    /// seconds
    pub timeout: u64,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStoreKind {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub store: InvoiceStoreKind,
    pub url: Option<String>,
}

#[derive(Clone)]
pub struct Tripay {
    pub mode: TripayMode,
    pub api_key: String,
    pub private_key: String,
    pub merchant_code: String,
    pub default_method: String,
}

// Keys stay out of Debug output so the config can be logged.
impl std::fmt::Debug for Tripay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tripay")
            .field("mode", &self.mode)
            .field("merchant_code", &self.merchant_code)
            .field("default_method", &self.default_method)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct Telegram {
    pub bot_token: String,
}

impl std::fmt::Debug for Telegram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telegram").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct InvoiceRules {
    pub min_amount: i64,
    pub merchant_ref_prefix: String,
    pub expiry_seconds: i64,
}
