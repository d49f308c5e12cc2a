use anyhow::{Context, Result};
use diesel::{
    PgConnection, RunQueryDsl,
    r2d2::{ConnectionManager, Pool},
    sql_query,
};
use tracing::info;

pub type PgPoolSquad = Pool<ConnectionManager<PgConnection>>;

const CREATE_INVOICES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS invoices (
    merchant_ref TEXT PRIMARY KEY,
    requester_id BIGINT NOT NULL,
    amount BIGINT NOT NULL,
    method TEXT NOT NULL,
    gateway_reference TEXT,
    status TEXT NOT NULL,
    pay_url TEXT,
    qr_url TEXT,
    created_at TIMESTAMPTZ NOT NULL,
    paid_at TIMESTAMPTZ
)
"#;

const CREATE_GATEWAY_REFERENCE_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS invoices_gateway_reference_idx ON invoices (gateway_reference)
"#;

pub fn establish_connection(database_url: &str) -> Result<PgPoolSquad> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder().build(manager)?;
    Ok(pool)
}

/// Creates the invoices table and its lookup index when they are missing.
pub fn ensure_schema(pool: &PgPoolSquad) -> Result<()> {
    let mut conn = pool.get().context("failed to acquire connection for schema setup")?;

    sql_query(CREATE_INVOICES_TABLE)
        .execute(&mut conn)
        .context("failed to create invoices table")?;
    sql_query(CREATE_GATEWAY_REFERENCE_INDEX)
        .execute(&mut conn)
        .context("failed to create invoices gateway_reference index")?;

    info!("postgres: invoices schema is ready");
    Ok(())
}
