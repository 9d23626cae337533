use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{RankerError, Result};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_SESSION_SECRET: &str = "ranker_master_secret_2024";
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;
pub const DEFAULT_MAX_MESSAGES_PER_DAY: i64 = 50;
pub const DEFAULT_SQLITE_PATH: &str = "./data/ranker.db";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_origin: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SessionConfig {
    pub secret: Option<String>,
    pub ttl_days: Option<i64>,
    pub secure_cookies: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct QuotaConfig {
    pub max_messages_per_day: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerationConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub session: Option<SessionConfig>,
    pub quota: Option<QuotaConfig>,
    pub generation: Option<GenerationConfig>,
    pub database: Option<DatabaseConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| RankerError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| RankerError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn host(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.host.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
    }

    pub fn port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_PORT)
    }

    pub fn cors_origin(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.cors_origin.clone())
            .unwrap_or_else(|| DEFAULT_CORS_ORIGIN.to_string())
    }

    pub fn session_secret(&self) -> String {
        self.session
            .as_ref()
            .and_then(|s| s.secret.clone())
            .unwrap_or_else(|| DEFAULT_SESSION_SECRET.to_string())
    }

    pub fn session_ttl_days(&self) -> i64 {
        self.session
            .as_ref()
            .and_then(|s| s.ttl_days)
            .unwrap_or(DEFAULT_SESSION_TTL_DAYS)
    }

    pub fn secure_cookies(&self) -> bool {
        self.session
            .as_ref()
            .and_then(|s| s.secure_cookies)
            .unwrap_or(false)
    }

    pub fn max_messages_per_day(&self) -> i64 {
        self.quota
            .as_ref()
            .and_then(|q| q.max_messages_per_day)
            .unwrap_or(DEFAULT_MAX_MESSAGES_PER_DAY)
    }

    pub fn sqlite_path(&self) -> String {
        self.database
            .as_ref()
            .and_then(|d| d.sqlite_path.clone())
            .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string())
    }
}
