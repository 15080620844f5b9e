use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::middleware::AppError;

/// Kind of attached data store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "postgresql")]
    Postgres,
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "mongodb")]
    Mongo,
}

impl BackendKind {
    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s.to_lowercase().as_str() {
            "postgresql" | "postgres" => Ok(BackendKind::Postgres),
            "mysql" => Ok(BackendKind::MySql),
            "mongodb" | "mongo" => Ok(BackendKind::Mongo),
            _ => Err(AppError::UnsupportedBackend(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgresql",
            BackendKind::MySql => "mysql",
            BackendKind::Mongo => "mongodb",
        }
    }

    /// Relational backends require credentials; document backends do not
    pub fn is_relational(&self) -> bool {
        matches!(self, BackendKind::Postgres | BackendKind::MySql)
    }
}

/// Tunables for the pooled connection built at connect time
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectOptions {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default = "default_max_overflow")]
    pub max_overflow: usize,
    #[serde(default = "default_pool_timeout_secs")]
    pub pool_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// MongoDB server selection timeout, in milliseconds
    #[serde(default = "default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,
}

fn default_pool_size() -> usize {
    5
}

fn default_max_overflow() -> usize {
    10
}

fn default_pool_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_server_selection_timeout_ms() -> u64 {
    5000
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            max_overflow: default_max_overflow(),
            pool_timeout_secs: default_pool_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            server_selection_timeout_ms: default_server_selection_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_backend_kind")]
    pub backend_kind: String,
    pub options: Option<ConnectOptions>,
}

fn default_backend_kind() -> String {
    "postgresql".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectStatus {
    Connected,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub backend_kind: BackendKind,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    pub status: ConnectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_info: Option<DatabaseInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectResponse {
    pub fn connected(connection_id: String, database_info: DatabaseInfo) -> Self {
        Self {
            connection_id: Some(connection_id),
            status: ConnectStatus::Connected,
            database_info: Some(database_info),
            error: None,
        }
    }

    pub fn failed(error: String) -> Self {
        Self {
            connection_id: None,
            status: ConnectStatus::Failed,
            database_info: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub connection_id: String,
    pub is_valid: bool,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectStatus {
    Disconnected,
    NotFound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisconnectResponse {
    pub connection_id: String,
    pub status: DisconnectStatus,
}

/// Read-only view of a registered connection, exposed by the list endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub connection_id: String,
    pub backend_kind: BackendKind,
    pub target_database: String,
    pub created_at: DateTime<Utc>,
    pub last_checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_from_str() {
        assert_eq!(BackendKind::from_str("postgresql").unwrap(), BackendKind::Postgres);
        assert_eq!(BackendKind::from_str("postgres").unwrap(), BackendKind::Postgres);
        assert_eq!(BackendKind::from_str("MySQL").unwrap(), BackendKind::MySql);
        assert_eq!(BackendKind::from_str("mongodb").unwrap(), BackendKind::Mongo);
        assert!(BackendKind::from_str("oracle").is_err());
    }

    #[test]
    fn test_backend_kind_family() {
        assert!(BackendKind::Postgres.is_relational());
        assert!(BackendKind::MySql.is_relational());
        assert!(!BackendKind::Mongo.is_relational());
    }

    #[test]
    fn test_connect_options_defaults() {
        let options = ConnectOptions::default();
        assert_eq!(options.pool_size, 5);
        assert_eq!(options.max_overflow, 10);
        assert_eq!(options.pool_timeout_secs, 30);
        assert_eq!(options.connect_timeout_secs, 10);
        assert_eq!(options.server_selection_timeout_ms, 5000);
    }

    #[test]
    fn test_connect_options_partial_deserialize() {
        let options: ConnectOptions = serde_json::from_str(r#"{"pool_size": 2}"#).unwrap();
        assert_eq!(options.pool_size, 2);
        assert_eq!(options.max_overflow, 10);
    }

    #[test]
    fn test_connect_request_default_backend() {
        let request: ConnectRequest = serde_json::from_str(
            r#"{"host": "localhost", "port": 5432, "database": "db", "username": "u", "password": "p"}"#,
        )
        .unwrap();
        assert_eq!(request.backend_kind, "postgresql");
    }
}
