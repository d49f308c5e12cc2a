use anyhow::{Context, Result, bail};
use crates::payments::tripay_client::TripayMode;
use url::Url;

use super::config_model::{
    Database, DotEnvyConfig, InvoiceRules, InvoiceStoreKind, Server, Telegram, Tripay,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup; `load` passes the process environment.
pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let required = |key: &str| optional(key).with_context(|| format!("{key} is invalid"));

    let public_base_url = required("PUBLIC_BASE_URL")?;
    Url::parse(&public_base_url).context("PUBLIC_BASE_URL is invalid")?;

    let server = Server {
        port: optional("SERVER_PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse()
            .context("SERVER_PORT is invalid")?,
        body_limit: optional("SERVER_BODY_LIMIT")
            .unwrap_or_else(|| "1".to_string())
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: optional("SERVER_TIMEOUT")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
        public_base_url: public_base_url.trim_end_matches('/').to_string(),
    };

    let store = match optional("INVOICE_STORE")
        .unwrap_or_else(|| "postgres".to_string())
        .to_ascii_lowercase()
        .as_str()
    {
        "postgres" => InvoiceStoreKind::Postgres,
        "memory" => InvoiceStoreKind::Memory,
        other => bail!("INVOICE_STORE is invalid (value: {other}); expected postgres or memory"),
    };

    let database = Database {
        store,
        url: match store {
            InvoiceStoreKind::Postgres => Some(required("DATABASE_URL")?),
            InvoiceStoreKind::Memory => optional("DATABASE_URL"),
        },
    };

    let tripay = Tripay {
        mode: TripayMode::from_env_value(&optional("TRIPAY_MODE").unwrap_or_default()),
        api_key: required("TRIPAY_API_KEY")?,
        private_key: required("TRIPAY_PRIVATE_KEY")?,
        merchant_code: required("TRIPAY_MERCHANT_CODE")?,
        default_method: optional("TRIPAY_DEFAULT_METHOD")
            .unwrap_or_else(|| "QRIS".to_string())
            .to_ascii_uppercase(),
    };

    let telegram = Telegram {
        bot_token: required("TELEGRAM_BOT_TOKEN")?,
    };

    let invoice = InvoiceRules {
        min_amount: optional("INVOICE_MIN_AMOUNT")
            .unwrap_or_else(|| "1000".to_string())
            .parse()
            .context("INVOICE_MIN_AMOUNT is invalid")?,
        merchant_ref_prefix: optional("MERCHANT_REF_PREFIX").unwrap_or_else(|| "TG".to_string()),
        expiry_seconds: optional("INVOICE_EXPIRY_SECONDS")
            .unwrap_or_else(|| "3600".to_string())
            .parse()
            .context("INVOICE_EXPIRY_SECONDS is invalid")?,
    };

    Ok(DotEnvyConfig {
        server,
        database,
        tripay,
        telegram,
        invoice,
    })
}
