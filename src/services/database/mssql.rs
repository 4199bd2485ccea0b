// SQL Server adapter over a single TDS client per handle
use crate::api::middleware::{AppError, ErrorDetail};
use crate::models::{Credentials, EngineKind, Row, SchemaDescription};
use crate::services::database::adapter::{ConnectionHandle, EngineAdapter, EngineSession};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tiberius::numeric::Numeric;
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type MssqlClient = Client<Compat<TcpStream>>;

const LIVENESS_SQL: &str = "SELECT GETDATE()";

// INFORMATION_SCHEMA is scoped to the database the session connected to
const SCHEMA_SQL: &str = r#"
    SELECT
        TABLE_NAME AS table_name,
        COLUMN_NAME AS column_name,
        DATA_TYPE AS data_type
    FROM INFORMATION_SCHEMA.COLUMNS
    ORDER BY TABLE_NAME, ORDINAL_POSITION
"#;

pub struct SqlServerAdapter;

impl SqlServerAdapter {
    fn build_config(credentials: &Credentials) -> Config {
        let mut config = Config::new();
        config.host(&credentials.host);
        config.port(credentials.port);
        config.authentication(AuthMethod::sql_server(&credentials.user, &credentials.password));
        config.database(&credentials.database);
        config.encryption(EncryptionLevel::Required);
        config.trust_cert();
        config
    }

    async fn connect(config: Config) -> Result<MssqlClient, tiberius::error::Error> {
        let redirect = config.clone();

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;

        match Client::connect(config, tcp.compat_write()).await {
            Ok(client) => Ok(client),
            // Azure SQL may hand us off to another node; follow once
            Err(tiberius::error::Error::Routing { host, port }) => {
                let mut redirect = redirect;
                redirect.host(&host);
                redirect.port(port);
                tracing::debug!("SQL Server routed connection to {}:{}", host, port);

                let tcp = TcpStream::connect(redirect.get_addr()).await?;
                tcp.set_nodelay(true)?;
                Client::connect(redirect, tcp.compat_write()).await
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait::async_trait]
impl EngineAdapter for SqlServerAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Mssql
    }

    async fn open(&self, credentials: &Credentials) -> Result<ConnectionHandle, AppError> {
        let config = Self::build_config(credentials);
        let client = Self::connect(config)
            .await
            .map_err(|e| AppError::Connection(mssql_error_detail(&e)))?;

        let mut session = MssqlSession { client };
        if let Err(e) = session.run(LIVENESS_SQL).await {
            if let Err(close_err) = session.client.close().await {
                tracing::warn!("Failed to close SQL Server connection after failed liveness check: {}", close_err);
            }
            return Err(AppError::Connection(mssql_error_detail(&e)));
        }

        tracing::debug!(
            "SQL Server connection ready for {}:{}/{}",
            credentials.host,
            credentials.port,
            credentials.database
        );

        Ok(ConnectionHandle::new(EngineKind::Mssql, session))
    }
}

struct MssqlSession {
    client: MssqlClient,
}

impl MssqlSession {
    async fn run(&mut self, sql: &str) -> Result<(), tiberius::error::Error> {
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    async fn first_result(&mut self, sql: &str) -> Result<Vec<tiberius::Row>, tiberius::error::Error> {
        self.client.simple_query(sql).await?.into_first_result().await
    }
}

#[async_trait::async_trait]
impl EngineSession for MssqlSession {
    async fn introspect_schema(&mut self) -> Result<SchemaDescription, AppError> {
        let rows = self
            .first_result(SCHEMA_SQL)
            .await
            .map_err(|e| AppError::Schema(mssql_error_detail(&e)))?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let text = |idx: usize| -> Result<String, AppError> {
                row.try_get::<&str, _>(idx)
                    .map(|v| v.unwrap_or_default().to_string())
                    .map_err(|e| AppError::Schema(mssql_error_detail(&e)))
            };
            columns.push((text(0)?, text(1)?, text(2)?));
        }

        Ok(SchemaDescription::from_rows(columns))
    }

    async fn query_rows(&mut self, sql: &str) -> Result<Vec<Row>, AppError> {
        let rows = self
            .first_result(sql)
            .await
            .map_err(|e| AppError::Query(mssql_error_detail(&e)))?;

        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute_statement(&mut self, sql: &str) -> Result<(), AppError> {
        self.run(sql)
            .await
            .map_err(|e| AppError::Query(mssql_error_detail(&e)))
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        self.client
            .close()
            .await
            .map_err(|e| AppError::Connection(mssql_error_detail(&e)))
    }
}

fn mssql_error_detail(e: &tiberius::error::Error) -> ErrorDetail {
    match e {
        tiberius::error::Error::Server(token) => ErrorDetail::new(token.message())
            .with_errno(i64::from(token.code()))
            .with_detail(format!(
                "state {}, class {}, line {}",
                token.state(),
                token.class(),
                token.line()
            )),
        other => ErrorDetail::new(other.to_string()),
    }
}

fn row_to_json(row: &tiberius::Row) -> Row {
    let mut row_obj = Row::new();
    for (idx, (column, data)) in row.cells().enumerate() {
        row_obj.insert(column.name().to_string(), cell_to_json(row, idx, data));
    }
    row_obj
}

fn cell_to_json(row: &tiberius::Row, idx: usize, data: &ColumnData<'static>) -> Value {
    match data {
        ColumnData::Bit(Some(b)) => json!(b),
        ColumnData::U8(Some(v)) => json!(v),
        ColumnData::I16(Some(v)) => json!(v),
        ColumnData::I32(Some(v)) => json!(v),
        ColumnData::I64(Some(v)) => json!(v),
        ColumnData::F32(Some(v)) => json!(*v as f64),
        ColumnData::F64(Some(v)) => json!(v),
        ColumnData::Numeric(Some(n)) => numeric_json(*n),
        ColumnData::String(Some(s)) => json!(s.to_string()),
        ColumnData::Guid(Some(g)) => json!(g.to_string()),
        ColumnData::Xml(Some(xml)) => json!(xml.to_string()),
        ColumnData::Binary(Some(bytes)) => binary_json(bytes),
        ColumnData::DateTime(Some(_)) | ColumnData::SmallDateTime(Some(_)) | ColumnData::DateTime2(Some(_)) => {
            chrono_text::<chrono::NaiveDateTime, _>(row, idx, |v| v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        }
        ColumnData::DateTimeOffset(Some(_)) => {
            chrono_text::<chrono::DateTime<chrono::Utc>, _>(row, idx, |v| v.to_rfc3339())
        }
        ColumnData::Date(Some(_)) => {
            chrono_text::<chrono::NaiveDate, _>(row, idx, |v| v.format("%Y-%m-%d").to_string())
        }
        ColumnData::Time(Some(_)) => {
            chrono_text::<chrono::NaiveTime, _>(row, idx, |v| v.format("%H:%M:%S%.f").to_string())
        }
        _ => Value::Null,
    }
}

fn chrono_text<'a, T, F>(row: &'a tiberius::Row, idx: usize, format: F) -> Value
where
    T: tiberius::FromSql<'a>,
    F: FnOnce(T) -> String,
{
    match row.try_get::<T, _>(idx) {
        Ok(Some(v)) => Value::String(format(v)),
        Ok(None) => Value::Null,
        Err(e) => {
            tracing::debug!("Failed to decode column {}: {}", idx, e);
            Value::Null
        }
    }
}

/// Exact decimal text. Values beyond `Decimal`'s 28-digit range keep the
/// driver's own rendering.
fn numeric_json(n: Numeric) -> Value {
    match Decimal::try_from_i128_with_scale(n.value(), u32::from(n.scale())) {
        Ok(d) => Value::String(d.to_string()),
        Err(_) => Value::String(n.to_string()),
    }
}

/// UTF-8 payloads stay text, anything else is base64
fn binary_json(bytes: &[u8]) -> Value {
    match std::str::from_utf8(bytes) {
        Ok(s) => json!(s),
        Err(_) => json!(BASE64.encode(bytes)),
    }
}
