// Engine adapter contract shared by every supported database engine
use crate::api::middleware::AppError;
use crate::models::{Credentials, EngineKind, ExecutionResult, Row, SchemaDescription, SqlStatement};
use std::fmt;
use uuid::Uuid;

/// Database adapter trait - one implementation per engine.
/// The adapter only knows how to open connections; everything done on an open
/// connection goes through the returned [`ConnectionHandle`].
#[async_trait::async_trait]
pub trait EngineAdapter: Send + Sync {
    fn engine(&self) -> EngineKind;

    /// Open a connection (or pool) and run the liveness check.
    /// Fails with `AppError::Connection` if either step fails.
    async fn open(&self, credentials: &Credentials) -> Result<ConnectionHandle, AppError>;
}

/// Engine-specific state behind a [`ConnectionHandle`]
#[async_trait::async_trait]
pub trait EngineSession: Send {
    /// Table/column metadata for the active database scope
    async fn introspect_schema(&mut self) -> Result<SchemaDescription, AppError>;

    /// Run a statement verbatim and return its rows
    async fn query_rows(&mut self, sql: &str) -> Result<Vec<Row>, AppError>;

    /// Run a statement verbatim, discarding any result set
    async fn execute_statement(&mut self, sql: &str) -> Result<(), AppError>;

    async fn close(self: Box<Self>) -> Result<(), AppError>;
}

/// One live connection or pool, tagged with its engine. Owned by exactly one
/// caller at a time: the connection manager or a single in-flight request.
pub struct ConnectionHandle {
    id: Uuid,
    engine: EngineKind,
    session: Box<dyn EngineSession>,
}

impl ConnectionHandle {
    pub fn new<S>(engine: EngineKind, session: S) -> Self
    where
        S: EngineSession + 'static,
    {
        Self {
            id: Uuid::new_v4(),
            engine,
            session: Box::new(session),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub async fn introspect_schema(&mut self) -> Result<SchemaDescription, AppError> {
        self.session.introspect_schema().await
    }

    /// Execute a classified statement. Reads come back as rows, everything
    /// else as a status message naming the statement kind.
    pub async fn execute(&mut self, statement: &SqlStatement) -> Result<ExecutionResult, AppError> {
        if statement.kind.returns_rows() {
            let rows = self.session.query_rows(&statement.text).await?;
            Ok(ExecutionResult::Rows(rows))
        } else {
            self.session.execute_statement(&statement.text).await?;
            Ok(ExecutionResult::status_for(statement.kind))
        }
    }

    pub async fn close(self) -> Result<(), AppError> {
        tracing::debug!("Closing {} connection {}", self.engine, self.id);
        self.session.close().await
    }

    /// Close and log a failure instead of returning it. Used on teardown
    /// paths where a close error must not replace the primary outcome.
    pub async fn close_quietly(self) {
        let (engine, id) = (self.engine, self.id);
        if let Err(e) = self.close().await {
            tracing::warn!("Ignoring error while closing {} connection {}: {}", engine, id, e);
        }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}
