use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::middleware::AppError;

/// Supported database engines
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Postgres,
    Mysql,
    Mssql,
}

impl EngineKind {
    pub const ALL: [EngineKind; 3] = [EngineKind::Postgres, EngineKind::Mysql, EngineKind::Mssql];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Postgres => "postgres",
            EngineKind::Mysql => "mysql",
            EngineKind::Mssql => "mssql",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            EngineKind::Postgres => 5432,
            EngineKind::Mysql => 3306,
            EngineKind::Mssql => 1433,
        }
    }
}

impl FromStr for EngineKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(EngineKind::Postgres),
            "mysql" | "mariadb" => Ok(EngineKind::Mysql),
            "mssql" | "sqlserver" => Ok(EngineKind::Mssql),
            _ => Err(AppError::UnsupportedEngine(s.to_string())),
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated connection credentials. Never stored by the service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub engine: EngineKind,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("engine", &self.engine)
            .finish()
    }
}

/// Port as sent by clients: either a JSON number or a numeric string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u16),
    Text(String),
}

/// Credentials as they arrive on the wire, before validation
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialsInput {
    pub host: Option<String>,
    pub port: Option<PortValue>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(alias = "dbType")]
    pub engine_kind: Option<String>,
}

impl fmt::Debug for CredentialsInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsInput")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("engine_kind", &self.engine_kind)
            .finish()
    }
}

impl CredentialsInput {
    /// Check required fields and resolve the engine. No I/O happens here.
    pub fn validate(self) -> Result<Credentials, AppError> {
        let engine_kind = required(self.engine_kind, "engineKind")?;
        let engine: EngineKind = engine_kind.parse()?;

        let host = required(self.host, "host")?;
        let user = required(self.user, "user")?;
        let database = required(self.database, "database")?;

        let port = match self.port {
            None => engine.default_port(),
            Some(PortValue::Number(port)) => port,
            Some(PortValue::Text(text)) if text.trim().is_empty() => engine.default_port(),
            Some(PortValue::Text(text)) => text.trim().parse::<u16>().map_err(|_| {
                AppError::Validation(format!("Invalid port: {}", text))
            })?,
        };

        Ok(Credentials {
            host,
            port,
            user,
            password: self.password.unwrap_or_default(),
            database,
            engine,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(AppError::Validation(format!("{} is required", field))),
    }
}

/// Body of the connect endpoint: the credentials themselves
pub type ConnectRequest = CredentialsInput;

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// What the connection manager reports about its slot
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_kind: Option<EngineKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

impl ConnectionState {
    pub fn disconnected() -> Self {
        Self {
            status: ConnectionStatus::Disconnected,
            engine_kind: None,
            connection_id: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CredentialsInput {
        serde_json::from_value(serde_json::json!({
            "host": "db.internal",
            "port": "5433",
            "user": "app",
            "password": "s3cret",
            "database": "shop",
            "dbType": "postgres"
        }))
        .unwrap()
    }

    #[test]
    fn test_validate_accepts_string_port_and_db_type_alias() {
        let credentials = input().validate().unwrap();
        assert_eq!(credentials.port, 5433);
        assert_eq!(credentials.engine, EngineKind::Postgres);
        assert_eq!(credentials.database, "shop");
    }

    #[test]
    fn test_validate_defaults_port_per_engine() {
        let mut raw = input();
        raw.port = None;
        raw.engine_kind = Some("mssql".to_string());
        assert_eq!(raw.validate().unwrap().port, 1433);
    }

    #[test]
    fn test_validate_rejects_missing_host() {
        let mut raw = input();
        raw.host = Some("   ".to_string());
        assert!(matches!(raw.validate(), Err(AppError::Validation(msg)) if msg.contains("host")));
    }

    #[test]
    fn test_validate_rejects_unknown_engine() {
        let mut raw = input();
        raw.engine_kind = Some("oracle".to_string());
        assert!(matches!(raw.validate(), Err(AppError::UnsupportedEngine(e)) if e == "oracle"));
    }

    #[test]
    fn test_validate_rejects_bad_port() {
        let mut raw = input();
        raw.port = Some(PortValue::Text("not-a-port".to_string()));
        assert!(matches!(raw.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_debug_masks_password() {
        let credentials = input().validate().unwrap();
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("s3cret"));
    }

    #[test]
    fn test_engine_kind_aliases() {
        assert_eq!("PostgreSQL".parse::<EngineKind>().unwrap(), EngineKind::Postgres);
        assert_eq!("sqlserver".parse::<EngineKind>().unwrap(), EngineKind::Mssql);
        assert_eq!(EngineKind::Mysql.to_string(), "mysql");
    }
}
