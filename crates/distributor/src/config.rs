use common::postgres::PostgresConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment};
use donation_worker::DonationWorkerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// JetStream stream work items are published to
    #[serde(default = "default_nats_work_item_stream")]
    pub nats_work_item_stream: String,

    /// Subject filter for the work item consumer
    #[serde(default = "default_nats_work_item_subject")]
    pub nats_work_item_subject: String,

    /// Durable consumer name
    #[serde(default = "default_nats_consumer_name")]
    pub nats_consumer_name: String,

    /// Object store bucket holding initial state and weight maps
    #[serde(default = "default_nats_object_store_bucket")]
    pub nats_object_store_bucket: String,

    /// Batch size for consumer
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    /// Maximum pooled ledger connections
    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    // OpenTelemetry configuration
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    /// OTLP gRPC endpoint
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default)]
    pub otel_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_work_item_stream() -> String {
    "org_donations".to_string()
}

fn default_nats_work_item_subject() -> String {
    "org_donations.>".to_string()
}

fn default_nats_consumer_name() -> String {
    "org-donation-distributor".to_string()
}

fn default_nats_object_store_bucket() -> String {
    "org-donation-state".to_string()
}

fn default_nats_batch_size() -> usize {
    10
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_postgres_host() -> String {
    PostgresConfig::default().host
}

fn default_postgres_port() -> u16 {
    PostgresConfig::default().port
}

fn default_postgres_database() -> String {
    PostgresConfig::default().database
}

fn default_postgres_username() -> String {
    PostgresConfig::default().username
}

fn default_postgres_password() -> String {
    PostgresConfig::default().password
}

fn default_postgres_max_pool_size() -> usize {
    PostgresConfig::default().max_pool_size
}

fn default_otel_service_name() -> String {
    TelemetryConfig::default().service_name
}

fn default_otel_endpoint() -> String {
    TelemetryConfig::default().otel_endpoint
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("DISTRIBUTOR"))
            .build()?
            .try_deserialize()
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
        }
    }

    pub fn worker_config(&self) -> DonationWorkerConfig {
        DonationWorkerConfig {
            work_item_stream: self.nats_work_item_stream.clone(),
            work_item_subject: self.nats_work_item_subject.clone(),
            consumer_name: self.nats_consumer_name.clone(),
            object_store_bucket: self.nats_object_store_bucket.clone(),
            nats_batch_size: self.nats_batch_size,
            nats_batch_wait_secs: self.nats_batch_wait_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "DISTRIBUTOR_LOG_LEVEL",
        "DISTRIBUTOR_NATS_BATCH_SIZE",
        "DISTRIBUTOR_NATS_OBJECT_STORE_BUCKET",
        "DISTRIBUTOR_OTEL_ENABLED",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: Test runs with mutex lock to prevent concurrent env access
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let config = ServiceConfig::from_env().unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.nats_work_item_stream, "org_donations");
        assert_eq!(config.nats_object_store_bucket, "org-donation-state");
        assert_eq!(config.postgres_port, 5432);
        assert!(!config.otel_enabled);
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("DISTRIBUTOR_LOG_LEVEL", "debug");
            std::env::set_var("DISTRIBUTOR_NATS_BATCH_SIZE", "25");
            std::env::set_var("DISTRIBUTOR_NATS_OBJECT_STORE_BUCKET", "staging-state");
            std::env::set_var("DISTRIBUTOR_OTEL_ENABLED", "true");
        }

        let config = ServiceConfig::from_env().unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.nats_batch_size, 25);
        assert_eq!(config.nats_object_store_bucket, "staging-state");
        assert!(config.otel_enabled);

        let worker = config.worker_config();
        assert_eq!(worker.nats_batch_size, 25);
        assert_eq!(worker.object_store_bucket, "staging-state");
        assert!(config.telemetry_config().otel_enabled);

        clear_env();
    }
}
