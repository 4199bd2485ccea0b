// MySQL adapter holding a single connection per handle
use crate::api::middleware::{AppError, ErrorDetail};
use crate::models::{Credentials, EngineKind, Row, SchemaDescription};
use crate::services::database::adapter::{ConnectionHandle, EngineAdapter, EngineSession};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use mysql_async::consts::ColumnType;
use mysql_async::{prelude::*, Conn, OptsBuilder, Row as MySqlRow, Value as MySqlValue};
use serde_json::{json, Value};

const LIVENESS_SQL: &str = "SELECT 1";

const SCHEMA_SQL: &str = r#"
    SELECT
        TABLE_NAME AS table_name,
        COLUMN_NAME AS column_name,
        DATA_TYPE AS data_type
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ?
    ORDER BY TABLE_NAME, ORDINAL_POSITION
"#;

pub struct MySQLAdapter;

#[async_trait::async_trait]
impl EngineAdapter for MySQLAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Mysql
    }

    async fn open(&self, credentials: &Credentials) -> Result<ConnectionHandle, AppError> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(credentials.host.clone())
            .tcp_port(credentials.port)
            .user(Some(credentials.user.clone()))
            .pass(Some(credentials.password.clone()))
            .db_name(Some(credentials.database.clone()));

        let mut conn = Conn::new(opts)
            .await
            .map_err(|e| AppError::Connection(mysql_error_detail(&e)))?;

        if let Err(e) = conn.query_drop(LIVENESS_SQL).await {
            if let Err(close_err) = conn.disconnect().await {
                tracing::warn!("Failed to close MySQL connection after failed liveness check: {}", close_err);
            }
            return Err(AppError::Connection(mysql_error_detail(&e)));
        }

        tracing::debug!(
            "MySQL connection ready for {}:{}/{}",
            credentials.host,
            credentials.port,
            credentials.database
        );

        Ok(ConnectionHandle::new(
            EngineKind::Mysql,
            MySqlSession {
                conn,
                database: credentials.database.clone(),
            },
        ))
    }
}

struct MySqlSession {
    conn: Conn,
    database: String,
}

#[async_trait::async_trait]
impl EngineSession for MySqlSession {
    async fn introspect_schema(&mut self) -> Result<SchemaDescription, AppError> {
        let rows: Vec<(String, String, String)> = self
            .conn
            .exec(SCHEMA_SQL, (self.database.as_str(),))
            .await
            .map_err(|e| AppError::Schema(mysql_error_detail(&e)))?;

        Ok(SchemaDescription::from_rows(rows))
    }

    async fn query_rows(&mut self, sql: &str) -> Result<Vec<Row>, AppError> {
        // Binary protocol so numbers and dates keep their types
        let rows: Vec<MySqlRow> = self
            .conn
            .exec(sql, ())
            .await
            .map_err(|e| AppError::Query(mysql_error_detail(&e)))?;

        Ok(rows.iter().map(row_to_json).collect())
    }

    async fn execute_statement(&mut self, sql: &str) -> Result<(), AppError> {
        self.conn
            .query_drop(sql)
            .await
            .map_err(|e| AppError::Query(mysql_error_detail(&e)))
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        self.conn
            .disconnect()
            .await
            .map_err(|e| AppError::Connection(mysql_error_detail(&e)))
    }
}

fn mysql_error_detail(e: &mysql_async::Error) -> ErrorDetail {
    match e {
        mysql_async::Error::Server(server) => ErrorDetail::new(server.message.clone())
            .with_errno(i64::from(server.code))
            .with_sql_state(server.state.clone()),
        other => ErrorDetail::new(other.to_string()),
    }
}

fn row_to_json(row: &MySqlRow) -> Row {
    let mut row_obj = Row::new();
    for (idx, column) in row.columns_ref().iter().enumerate() {
        let value = match row.get_opt::<MySqlValue, usize>(idx) {
            Some(Ok(mysql_val)) => mysql_value_to_json(mysql_val, column.column_type()),
            Some(Err(_)) | None => Value::Null,
        };
        row_obj.insert(column.name_str().to_string(), value);
    }
    row_obj
}

/// Convert a MySQL wire value to JSON. DECIMAL arrives as text and stays a
/// string so no precision is lost. Bytes that are not UTF-8 are base64.
fn mysql_value_to_json(mysql_val: MySqlValue, column_type: ColumnType) -> Value {
    match mysql_val {
        MySqlValue::NULL => Value::Null,
        MySqlValue::Bytes(bytes) if column_type == ColumnType::MYSQL_TYPE_BIT && bytes.len() <= 8 => {
            json!(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
        }
        MySqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) if column_type == ColumnType::MYSQL_TYPE_JSON => {
                serde_json::from_str(&s).unwrap_or(Value::String(s))
            }
            Ok(s) => json!(s),
            Err(e) => json!(BASE64.encode(e.into_bytes())),
        },
        MySqlValue::Int(i) => json!(i),
        MySqlValue::UInt(u) => json!(u),
        MySqlValue::Float(f) => json!(f as f64),
        MySqlValue::Double(d) => json!(d),
        MySqlValue::Date(y, m, d, _, _, _, _) if column_type == ColumnType::MYSQL_TYPE_DATE => {
            json!(format!("{:04}-{:02}-{:02}", y, m, d))
        }
        MySqlValue::Date(y, m, d, h, min, s, 0) => {
            json!(format!("{:04}-{:02}-{:02} {:02}:{:02}:{:02}", y, m, d, h, min, s))
        }
        MySqlValue::Date(y, m, d, h, min, s, micros) => json!(format!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
            y, m, d, h, min, s, micros
        )),
        MySqlValue::Time(is_neg, d, h, m, s, micros) => {
            let sign = if is_neg { "-" } else { "" };
            let total_hours = d * 24 + h as u32;
            if micros == 0 {
                json!(format!("{}{}:{:02}:{:02}", sign, total_hours, m, s))
            } else {
                json!(format!("{}{}:{:02}:{:02}.{:06}", sign, total_hours, m, s, micros))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalars() {
        assert_eq!(mysql_value_to_json(MySqlValue::NULL, ColumnType::MYSQL_TYPE_LONG), Value::Null);
        assert_eq!(mysql_value_to_json(MySqlValue::Int(-7), ColumnType::MYSQL_TYPE_LONG), json!(-7));
        assert_eq!(
            mysql_value_to_json(MySqlValue::UInt(u64::MAX), ColumnType::MYSQL_TYPE_LONGLONG),
            json!(u64::MAX)
        );
        assert_eq!(mysql_value_to_json(MySqlValue::Double(2.5), ColumnType::MYSQL_TYPE_DOUBLE), json!(2.5));
    }

    #[test]
    fn test_decimal_stays_text() {
        let value = mysql_value_to_json(
            MySqlValue::Bytes(b"12345.6700".to_vec()),
            ColumnType::MYSQL_TYPE_NEWDECIMAL,
        );
        assert_eq!(value, json!("12345.6700"));
    }

    #[test]
    fn test_json_column_is_embedded() {
        let value = mysql_value_to_json(
            MySqlValue::Bytes(br#"{"tags":["a","b"]}"#.to_vec()),
            ColumnType::MYSQL_TYPE_JSON,
        );
        assert_eq!(value, json!({"tags": ["a", "b"]}));
    }

    #[test]
    fn test_binary_bytes_are_base64() {
        let value = mysql_value_to_json(MySqlValue::Bytes(vec![0xff, 0xfe, 0x00]), ColumnType::MYSQL_TYPE_BLOB);
        assert_eq!(value, json!("//4A"));
    }

    #[test]
    fn test_bit_column_is_integer() {
        assert_eq!(
            mysql_value_to_json(MySqlValue::Bytes(vec![0x01]), ColumnType::MYSQL_TYPE_BIT),
            json!(1)
        );
        assert_eq!(
            mysql_value_to_json(MySqlValue::Bytes(vec![0x01, 0x02]), ColumnType::MYSQL_TYPE_BIT),
            json!(258)
        );
    }

    #[test]
    fn test_dates_and_times() {
        assert_eq!(
            mysql_value_to_json(MySqlValue::Date(2024, 2, 29, 0, 0, 0, 0), ColumnType::MYSQL_TYPE_DATE),
            json!("2024-02-29")
        );
        assert_eq!(
            mysql_value_to_json(MySqlValue::Date(2024, 2, 29, 13, 5, 9, 0), ColumnType::MYSQL_TYPE_DATETIME),
            json!("2024-02-29 13:05:09")
        );
        assert_eq!(
            mysql_value_to_json(MySqlValue::Date(2024, 2, 29, 13, 5, 9, 250), ColumnType::MYSQL_TYPE_TIMESTAMP),
            json!("2024-02-29 13:05:09.000250")
        );
        assert_eq!(
            mysql_value_to_json(MySqlValue::Time(true, 1, 2, 3, 4, 0), ColumnType::MYSQL_TYPE_TIME),
            json!("-26:03:04")
        );
        assert_eq!(
            mysql_value_to_json(MySqlValue::Time(false, 0, 10, 30, 0, 1500), ColumnType::MYSQL_TYPE_TIME),
            json!("10:30:00.001500")
        );
    }
}
