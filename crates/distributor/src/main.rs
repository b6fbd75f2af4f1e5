mod config;

use anyhow::Context;
use common::nats::NatsClient;
use common::postgres::{
    ensure_ledger_schema, PostgresClient, PostgresOrganizationRepository,
    PostgresPackageDonationRepository,
};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryProviders};
use config::ServiceConfig;
use donation_worker::DonationWorker;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> =
        match init_telemetry(&config.telemetry_config()) {
            Ok(providers) => providers,
            Err(e) => {
                eprintln!("Failed to initialize telemetry: {}", e);
                std::process::exit(1);
            }
        };

    info!(
        otel_enabled = config.otel_enabled,
        otel_endpoint = %config.otel_endpoint,
        stream = %config.nats_work_item_stream,
        bucket = %config.nats_object_store_bucket,
        "Starting donation distributor"
    );

    let postgres_client = match PostgresClient::new(&config.postgres_config()) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create PostgreSQL pool: {:#}", e);
            shutdown_telemetry(telemetry_providers);
            std::process::exit(1);
        }
    };

    let exit_code = match run(&config, postgres_client.clone()).await {
        Ok(()) => 0,
        Err(e) => {
            error!("Donation distributor failed: {:#}", e);
            1
        }
    };

    // The pool is released on every exit path, including startup failures
    postgres_client.close();
    shutdown_telemetry(telemetry_providers);

    info!(exit_code, "Donation distributor stopped");
    std::process::exit(exit_code);
}

async fn run(config: &ServiceConfig, postgres_client: PostgresClient) -> anyhow::Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);

    info!("Initializing PostgreSQL...");
    tokio::time::timeout(startup_timeout, postgres_client.ping())
        .await
        .context("Timed out connecting to PostgreSQL")??;
    ensure_ledger_schema(&postgres_client).await?;

    info!("Initializing NATS...");
    let nats_client = Arc::new(NatsClient::connect(&config.nats_url, startup_timeout).await?);
    nats_client
        .ensure_stream(&config.nats_work_item_stream, &config.nats_work_item_subject)
        .await?;

    let worker = DonationWorker::new(
        Arc::new(PostgresOrganizationRepository::new(postgres_client.clone())),
        Arc::new(PostgresPackageDonationRepository::new(postgres_client)),
        Arc::clone(&nats_client),
        config.worker_config(),
    )
    .await?;

    let shutdown_token = CancellationToken::new();
    spawn_signal_handlers(shutdown_token.clone());

    let result = worker.run(shutdown_token).await;

    if let Ok(client) = Arc::try_unwrap(nats_client) {
        client.close().await;
    }

    result
}

/// Cancel the token on SIGINT, or SIGTERM on Unix
fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => error!("Error setting up signal handler: {}", err),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM signal");
                token.cancel();
            }
            Err(err) => error!("Error setting up SIGTERM handler: {}", err),
        }
    });
}
