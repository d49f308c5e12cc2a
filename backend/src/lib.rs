pub mod axum_http;
pub mod config;
pub mod telegram_bot;
pub mod usecases;

use std::sync::Arc;

use anyhow::{Context, Result};
use config::config_model::{DotEnvyConfig, InvoiceStoreKind};
use crates::{
    domain::repositories::invoices::InvoiceRepository,
    infra::db::{
        postgres::postgres_connection,
        repositories::{in_memory::InvoiceInMemory, invoices::InvoicePostgres},
    },
    notifications::telegram::TelegramClient,
    payments::tripay_client::TripayClient,
};
use telegram_bot::worker::BotWorker;
use tracing::{info, warn};
use usecases::invoices::{ChatNotifier, InvoiceSettings, InvoiceUseCase};

pub async fn run() -> Result<()> {
    // load() pulls in .env, which the log setup reads too
    let config = config::config_loader::load();
    crates::observability::init_observability("tripay-bridge")?;

    let config = config?;
    info!(
        port = config.server.port,
        store = ?config.database.store,
        tripay_mode = ?config.tripay.mode,
        "ENV has been loaded"
    );

    let repository = invoice_store(&config)?;

    let tripay = TripayClient::new(config.tripay.mode, config.tripay.api_key.clone())
        .context("failed to build tripay client")?;
    let telegram = Arc::new(
        TelegramClient::new(config.telegram.bot_token.clone())
            .context("failed to build telegram client")?,
    );

    let usecase = Arc::new(InvoiceUseCase::new(
        repository,
        Arc::new(tripay),
        Arc::clone(&telegram) as Arc<dyn ChatNotifier>,
        InvoiceSettings::from_config(&config),
    ));

    let worker = BotWorker::new(
        telegram,
        Arc::clone(&usecase),
        config.tripay.default_method.clone(),
    );

    let config = Arc::new(config);
    tokio::select! {
        result = axum_http::http_serve::start(Arc::clone(&config), usecase) => result?,
        result = worker.run() => result?,
    }

    info!("tripay-bridge stopped");
    Ok(())
}

fn invoice_store(config: &DotEnvyConfig) -> Result<Arc<dyn InvoiceRepository + Send + Sync>> {
    match config.database.store {
        InvoiceStoreKind::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .context("DATABASE_URL is invalid")?;
            let pool = postgres_connection::establish_connection(url)?;
            postgres_connection::ensure_schema(&pool)?;
            info!("Postgres connection has been established");
            Ok(Arc::new(InvoicePostgres::new(Arc::new(pool))))
        }
        InvoiceStoreKind::Memory => {
            warn!("invoices are kept in memory and are lost on restart");
            Ok(Arc::new(InvoiceInMemory::new()))
        }
    }
}
