use serde::{Deserialize, Serialize};

/// PostgreSQL connection settings for the donation ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "flossbank".to_string(),
            username: "flossbank".to_string(),
            password: "flossbank".to_string(),
            max_pool_size: 5,
        }
    }
}
