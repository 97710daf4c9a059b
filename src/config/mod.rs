//! Configuration module for the SkillSwap backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Which repository implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    /// SQLite-backed durable store.
    Sqlite,
    /// In-memory store; data lives as long as the process.
    Memory,
}

impl PersistenceMode {
    fn from_env_value(s: &str) -> Self {
        match s {
            "memory" => PersistenceMode::Memory,
            _ => PersistenceMode::Sqlite,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Repository implementation selector
    pub persistence: PersistenceMode,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_psk = env::var("SKILLSWAP_API_PSK").ok();

        let db_path = env::var("SKILLSWAP_DB_PATH")
            .unwrap_or_else(|_| "./data/skillswap.sqlite".to_string())
            .into();

        let persistence = PersistenceMode::from_env_value(
            &env::var("SKILLSWAP_PERSISTENCE").unwrap_or_else(|_| "sqlite".to_string()),
        );

        let bind_addr = env::var("SKILLSWAP_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid SKILLSWAP_BIND_ADDR format");

        let log_level = env::var("SKILLSWAP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            api_psk,
            db_path,
            persistence,
            bind_addr,
            log_level,
        }
    }
}
