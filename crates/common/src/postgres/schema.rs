use crate::postgres::PostgresClient;
use anyhow::{Context, Result};
use tracing::info;

const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS organizations (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    host TEXT,
    installation_id TEXT,
    total_donated BIGINT NOT NULL DEFAULT 0,
    remaining_donation BIGINT NOT NULL DEFAULT 0,
    manually_billed BOOLEAN NOT NULL DEFAULT FALSE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS organization_usage_snapshots (
    id BIGSERIAL PRIMARY KEY,
    organization_id TEXT NOT NULL REFERENCES organizations (id),
    total_dependencies BIGINT NOT NULL,
    top_level_dependencies BIGINT NOT NULL,
    taken_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS organization_usage_snapshots_org_idx
    ON organization_usage_snapshots (organization_id, taken_at);

CREATE TABLE IF NOT EXISTS packages (
    id BIGSERIAL PRIMARY KEY,
    registry TEXT NOT NULL,
    language TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (registry, language, name)
);

CREATE TABLE IF NOT EXISTS package_donation_revenue (
    id TEXT PRIMARY KEY,
    package_id BIGINT NOT NULL REFERENCES packages (id),
    organization_id TEXT NOT NULL,
    description TEXT NOT NULL,
    amount BIGINT NOT NULL,
    donated_at TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS package_donation_revenue_package_idx
    ON package_donation_revenue (package_id);
"#;

/// Create the ledger tables if they do not exist yet
pub async fn ensure_ledger_schema(client: &PostgresClient) -> Result<()> {
    let conn = client.get_connection().await?;
    conn.batch_execute(LEDGER_SCHEMA)
        .await
        .context("failed to create ledger schema")?;

    info!("Ledger schema ready");
    Ok(())
}
