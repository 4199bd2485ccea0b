use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::connection::CredentialsInput;

/// One result row: column name to scalar, in result-set column order
pub type Row = Map<String, Value>;

/// Statement kind derived from the leading keyword
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Truncate,
    Other,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Select => "SELECT",
            QueryKind::Insert => "INSERT",
            QueryKind::Update => "UPDATE",
            QueryKind::Delete => "DELETE",
            QueryKind::Create => "CREATE",
            QueryKind::Drop => "DROP",
            QueryKind::Alter => "ALTER",
            QueryKind::Truncate => "TRUNCATE",
            QueryKind::Other => "OTHER",
        }
    }

    /// Only reads hand rows back to the caller
    pub fn returns_rows(&self) -> bool {
        matches!(self, QueryKind::Select)
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw statement text plus its classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    pub text: String,
    pub kind: QueryKind,
}

impl SqlStatement {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = crate::validation::QueryClassifier::classify(&text);
        Self { text, kind }
    }
}

/// Normalized outcome of running a statement
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Rows(Vec<Row>),
    Status(String),
}

impl ExecutionResult {
    pub fn status_for(kind: QueryKind) -> Self {
        ExecutionResult::Status(format!("Query of type {} executed successfully.", kind))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(alias = "dbCredentials")]
    pub credentials: Option<CredentialsInput>,
    #[serde(alias = "sqlQuery")]
    pub statement_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        match result {
            ExecutionResult::Rows(rows) => Self {
                success: true,
                data: Some(rows),
                message: None,
            },
            ExecutionResult::Status(message) => Self {
                success: true,
                data: None,
                message: Some(message),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    #[serde(alias = "userInput")]
    pub user_intent: Option<String>,
    #[serde(alias = "dbCredentials")]
    pub credentials: Option<CredentialsInput>,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub result: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_message_names_kind() {
        assert_eq!(
            ExecutionResult::status_for(QueryKind::Insert),
            ExecutionResult::Status("Query of type INSERT executed successfully.".to_string())
        );
    }

    #[test]
    fn test_execute_response_shapes() {
        let mut row = Row::new();
        row.insert("id".to_string(), json!(1));
        let rows = serde_json::to_value(ExecuteResponse::from(ExecutionResult::Rows(vec![row]))).unwrap();
        assert_eq!(rows, json!({"success": true, "data": [{"id": 1}]}));

        let status = serde_json::to_value(ExecuteResponse::from(ExecutionResult::status_for(QueryKind::Drop))).unwrap();
        assert_eq!(
            status,
            json!({"success": true, "message": "Query of type DROP executed successfully."})
        );
    }

    #[test]
    fn test_execute_request_accepts_client_aliases() {
        let request: ExecuteRequest = serde_json::from_value(json!({
            "dbCredentials": {"host": "localhost", "dbType": "mysql"},
            "sqlQuery": "SELECT 1"
        }))
        .unwrap();

        assert_eq!(request.statement_text.as_deref(), Some("SELECT 1"));
        assert_eq!(request.credentials.unwrap().engine_kind.as_deref(), Some("mysql"));
    }
}
