// PostgreSQL adapter using a small per-handle connection pool
use crate::api::middleware::{AppError, ErrorDetail};
use crate::models::{Credentials, EngineKind, Row, SchemaDescription};
use crate::services::database::adapter::{ConnectionHandle, EngineAdapter, EngineSession};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use deadpool_postgres::{
    Config as PgConfig, ManagerConfig, Object, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio_postgres::error::ErrorPosition;
use tokio_postgres::types::{FromSql, Type};
use tokio_postgres::{NoTls, SimpleQueryMessage, SimpleQueryRow};

const MAX_POOL_SIZE: usize = 4;

const LIVENESS_SQL: &str = "SELECT NOW()";

// information_schema columns are domain types, cast so they decode as text
const SCHEMA_SQL: &str = r#"
    SELECT
        table_name::text,
        column_name::text,
        data_type::text
    FROM information_schema.columns
    WHERE table_schema = 'public'
    ORDER BY table_name, ordinal_position
"#;

pub struct PostgreSQLAdapter;

#[async_trait::async_trait]
impl EngineAdapter for PostgreSQLAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Postgres
    }

    async fn open(&self, credentials: &Credentials) -> Result<ConnectionHandle, AppError> {
        let mut cfg = PgConfig::new();
        cfg.host = Some(credentials.host.clone());
        cfg.port = Some(credentials.port);
        cfg.user = Some(credentials.user.clone());
        cfg.password = Some(credentials.password.clone());
        cfg.dbname = Some(credentials.database.clone());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig::new(MAX_POOL_SIZE));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| {
                AppError::Connection(ErrorDetail::new(format!("Failed to create connection pool: {}", e)))
            })?;

        let session = PostgresSession { pool };
        if let Err(e) = session.check_liveness().await {
            session.pool.close();
            return Err(e);
        }

        tracing::debug!(
            "PostgreSQL pool ready for {}:{}/{}",
            credentials.host,
            credentials.port,
            credentials.database
        );

        Ok(ConnectionHandle::new(EngineKind::Postgres, session))
    }
}

struct PostgresSession {
    pool: Pool,
}

impl PostgresSession {
    async fn client(&self) -> Result<Object, PoolError> {
        self.pool.get().await
    }

    async fn check_liveness(&self) -> Result<(), AppError> {
        let client = self
            .client()
            .await
            .map_err(|e| AppError::Connection(pool_error_detail(e)))?;

        client
            .query_one(LIVENESS_SQL, &[])
            .await
            .map_err(|e| AppError::Connection(pg_error_detail(&e)))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl EngineSession for PostgresSession {
    async fn introspect_schema(&mut self) -> Result<SchemaDescription, AppError> {
        let client = self
            .client()
            .await
            .map_err(|e| AppError::Schema(pool_error_detail(e)))?;

        let rows = client
            .query(SCHEMA_SQL, &[])
            .await
            .map_err(|e| AppError::Schema(pg_error_detail(&e)))?;

        let columns = rows
            .iter()
            .map(|row| -> Result<(String, String, String), tokio_postgres::Error> {
                Ok((row.try_get(0)?, row.try_get(1)?, row.try_get(2)?))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Schema(pg_error_detail(&e)))?;

        Ok(SchemaDescription::from_rows(columns))
    }

    /// Typed binary read when every column has a decoder, otherwise the
    /// server's text rendering of each value
    async fn query_rows(&mut self, sql: &str) -> Result<Vec<Row>, AppError> {
        let client = self
            .client()
            .await
            .map_err(|e| AppError::Query(pool_error_detail(e)))?;

        let statement = client
            .prepare(sql)
            .await
            .map_err(|e| AppError::Query(pg_error_detail(&e)))?;
        let types: Vec<Type> = statement.columns().iter().map(|c| c.type_().clone()).collect();

        if types.iter().all(decodes_binary) {
            let rows = client
                .query(&statement, &[])
                .await
                .map_err(|e| AppError::Query(pg_error_detail(&e)))?;

            match rows.iter().map(row_to_json).collect::<Result<Vec<_>, _>>() {
                Ok(rows) => return Ok(rows),
                // e.g. NaN or a numeric wider than 28 digits
                Err(e) => tracing::debug!("Re-reading result as text after decode failure: {}", e),
            }
        }

        let messages = client
            .simple_query(sql)
            .await
            .map_err(|e| AppError::Query(pg_error_detail(&e)))?;

        Ok(messages
            .iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => Some(text_row_to_json(row, &types)),
                _ => None,
            })
            .collect())
    }

    async fn execute_statement(&mut self, sql: &str) -> Result<(), AppError> {
        let client = self
            .client()
            .await
            .map_err(|e| AppError::Query(pool_error_detail(e)))?;

        client
            .batch_execute(sql)
            .await
            .map_err(|e| AppError::Query(pg_error_detail(&e)))
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        self.pool.close();
        Ok(())
    }
}

/// Extract what the server reported; driver-level failures only have a message
fn pg_error_detail(e: &tokio_postgres::Error) -> ErrorDetail {
    let Some(db_error) = e.as_db_error() else {
        return ErrorDetail::new(e.to_string());
    };

    let mut detail = ErrorDetail::new(db_error.message()).with_code(db_error.code().code());
    if let Some(d) = db_error.detail() {
        detail = detail.with_detail(d);
    }
    if let Some(hint) = db_error.hint() {
        detail = detail.with_hint(hint);
    }
    match db_error.position() {
        Some(ErrorPosition::Original(position)) => detail = detail.with_position(*position),
        Some(ErrorPosition::Internal { position, .. }) => detail = detail.with_position(*position),
        None => {}
    }
    detail
}

fn pool_error_detail(e: PoolError) -> ErrorDetail {
    match e {
        PoolError::Backend(e) => pg_error_detail(&e),
        other => ErrorDetail::new(format!("Failed to get connection from pool: {}", other)),
    }
}

/// Types `column_value` knows how to decode from the binary protocol
fn decodes_binary(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::BOOL
            | Type::BOOL_ARRAY
            | Type::INT2
            | Type::INT2_ARRAY
            | Type::INT4
            | Type::INT4_ARRAY
            | Type::INT8
            | Type::INT8_ARRAY
            | Type::OID
            | Type::OID_ARRAY
            | Type::FLOAT4
            | Type::FLOAT4_ARRAY
            | Type::FLOAT8
            | Type::FLOAT8_ARRAY
            | Type::NUMERIC
            | Type::NUMERIC_ARRAY
            | Type::TEXT
            | Type::TEXT_ARRAY
            | Type::VARCHAR
            | Type::VARCHAR_ARRAY
            | Type::BPCHAR
            | Type::BPCHAR_ARRAY
            | Type::NAME
            | Type::NAME_ARRAY
            | Type::JSON
            | Type::JSON_ARRAY
            | Type::JSONB
            | Type::JSONB_ARRAY
            | Type::UUID
            | Type::UUID_ARRAY
            | Type::BYTEA
            | Type::TIMESTAMP
            | Type::TIMESTAMPTZ
            | Type::DATE
            | Type::TIME
            | Type::VOID
    )
}

fn row_to_json(row: &tokio_postgres::Row) -> Result<Row, tokio_postgres::Error> {
    let mut row_obj = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        row_obj.insert(column.name().to_string(), column_value(row, idx, column.type_())?);
    }
    Ok(row_obj)
}

fn column_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Result<Value, tokio_postgres::Error> {
    let value = match *ty {
        Type::BOOL => single(row, idx, |v: bool| json!(v))?,
        Type::BOOL_ARRAY => array(row, idx, |v: bool| json!(v))?,
        Type::INT2 => single(row, idx, |v: i16| json!(v))?,
        Type::INT2_ARRAY => array(row, idx, |v: i16| json!(v))?,
        Type::INT4 => single(row, idx, |v: i32| json!(v))?,
        Type::INT4_ARRAY => array(row, idx, |v: i32| json!(v))?,
        Type::INT8 => single(row, idx, |v: i64| json!(v))?,
        Type::INT8_ARRAY => array(row, idx, |v: i64| json!(v))?,
        Type::OID => single(row, idx, |v: u32| json!(v))?,
        Type::OID_ARRAY => array(row, idx, |v: u32| json!(v))?,
        Type::FLOAT4 => single(row, idx, |v: f32| json!(v as f64))?,
        Type::FLOAT4_ARRAY => array(row, idx, |v: f32| json!(v as f64))?,
        Type::FLOAT8 => single(row, idx, |v: f64| json!(v))?,
        Type::FLOAT8_ARRAY => array(row, idx, |v: f64| json!(v))?,
        Type::NUMERIC => single(row, idx, numeric_json)?,
        Type::NUMERIC_ARRAY => array(row, idx, numeric_json)?,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => single(row, idx, |v: String| json!(v))?,
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY | Type::NAME_ARRAY => {
            array(row, idx, |v: String| json!(v))?
        }
        Type::JSON | Type::JSONB => single(row, idx, |v: Value| v)?,
        Type::JSON_ARRAY | Type::JSONB_ARRAY => array(row, idx, |v: Value| v)?,
        Type::UUID => single(row, idx, |v: uuid::Uuid| json!(v.to_string()))?,
        Type::UUID_ARRAY => array(row, idx, |v: uuid::Uuid| json!(v.to_string()))?,
        Type::BYTEA => single(row, idx, |v: Vec<u8>| json!(BASE64.encode(v)))?,
        Type::TIMESTAMP => single(row, idx, |v: chrono::NaiveDateTime| {
            json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        })?,
        Type::TIMESTAMPTZ => single(row, idx, |v: chrono::DateTime<chrono::Utc>| json!(v.to_rfc3339()))?,
        Type::DATE => single(row, idx, |v: chrono::NaiveDate| json!(v.format("%Y-%m-%d").to_string()))?,
        Type::TIME => single(row, idx, |v: chrono::NaiveTime| json!(v.format("%H:%M:%S%.f").to_string()))?,
        // pg_sleep() and friends
        _ => Value::Null,
    };
    Ok(value)
}

fn single<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    idx: usize,
    convert: impl Fn(T) -> Value,
) -> Result<Value, tokio_postgres::Error> {
    Ok(row
        .try_get::<_, Option<T>>(idx)?
        .map(convert)
        .unwrap_or(Value::Null))
}

/// One-dimensional arrays; NULL elements stay null
fn array<'a, T: FromSql<'a>>(
    row: &'a tokio_postgres::Row,
    idx: usize,
    convert: impl Fn(T) -> Value,
) -> Result<Value, tokio_postgres::Error> {
    let value = match row.try_get::<_, Option<Vec<Option<T>>>>(idx)? {
        Some(items) => Value::Array(
            items
                .into_iter()
                .map(|item| item.map(&convert).unwrap_or(Value::Null))
                .collect(),
        ),
        None => Value::Null,
    };
    Ok(value)
}

/// Exact decimal text, keeping the column's scale
fn numeric_json(value: Decimal) -> Value {
    Value::String(value.to_string())
}

fn text_row_to_json(row: &SimpleQueryRow, types: &[Type]) -> Row {
    let mut row_obj = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = match row.get(idx) {
            Some(text) => text_value(types.get(idx), text),
            None => Value::Null,
        };
        row_obj.insert(column.name().to_string(), value);
    }
    row_obj
}

/// Text-protocol value. Scalars that JSON can hold natively are converted;
/// everything else (intervals, ranges, network types, money, ...) keeps the
/// server's rendering.
fn text_value(ty: Option<&Type>, text: &str) -> Value {
    let Some(ty) = ty else {
        return json!(text);
    };

    match *ty {
        Type::BOOL => match text {
            "t" => json!(true),
            "f" => json!(false),
            _ => json!(text),
        },
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            text.parse::<i64>().map(|v| json!(v)).unwrap_or_else(|_| json!(text))
        }
        Type::FLOAT4 | Type::FLOAT8 => match text.parse::<f64>() {
            Ok(v) if v.is_finite() => json!(v),
            _ => json!(text),
        },
        Type::JSON | Type::JSONB => serde_json::from_str(text).unwrap_or_else(|_| json!(text)),
        _ => json!(text),
    }
}
