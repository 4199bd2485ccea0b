// In-memory adapter for service and handler tests
use crate::api::middleware::{AppError, ErrorDetail};
use crate::models::{Credentials, EngineKind, Row, SchemaDescription};
use crate::services::database::adapter::{ConnectionHandle, EngineAdapter, EngineSession};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) fn credentials(engine: EngineKind) -> Credentials {
    Credentials {
        host: "localhost".to_string(),
        port: engine.default_port(),
        user: "app".to_string(),
        password: "secret".to_string(),
        database: "shop".to_string(),
        engine,
    }
}

/// Event log that several adapters append to, in call order
pub(crate) type SharedLog = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct FakeState {
    label: String,
    events: Mutex<Vec<String>>,
    shared_log: Option<SharedLog>,
    live: AtomicUsize,
    max_live: AtomicUsize,
    rows: Vec<Row>,
    schema: SchemaDescription,
    fail_open: bool,
    fail_introspect: bool,
    fail_query: Option<ErrorDetail>,
    fail_close: bool,
}

impl FakeState {
    fn record(&self, event: String) {
        if let Some(log) = &self.shared_log {
            log.lock().unwrap().push(format!("{}:{}", self.label, event));
        }
        self.events.lock().unwrap().push(event);
    }
}

/// Records every call in an event log shared between clones
#[derive(Clone)]
pub(crate) struct FakeAdapter {
    engine: EngineKind,
    state: Arc<FakeState>,
}

impl FakeAdapter {
    pub fn new(engine: EngineKind) -> Self {
        Self {
            engine,
            state: Arc::new(FakeState {
                label: engine.to_string(),
                ..FakeState::default()
            }),
        }
    }

    /// Also append `engine:event` entries to `log`
    pub fn sharing_log(self, log: &SharedLog) -> Self {
        let log = log.clone();
        self.configure(|s| s.shared_log = Some(log))
    }

    fn configure(mut self, f: impl FnOnce(&mut FakeState)) -> Self {
        let state = Arc::get_mut(&mut self.state).expect("configure before cloning");
        f(state);
        self
    }

    pub fn with_rows(self, rows: Vec<Row>) -> Self {
        self.configure(|s| s.rows = rows)
    }

    pub fn with_schema(self, schema: SchemaDescription) -> Self {
        self.configure(|s| s.schema = schema)
    }

    pub fn failing_open(self) -> Self {
        self.configure(|s| s.fail_open = true)
    }

    pub fn failing_introspect(self) -> Self {
        self.configure(|s| s.fail_introspect = true)
    }

    pub fn failing_query(self, detail: ErrorDetail) -> Self {
        self.configure(|s| s.fail_query = Some(detail))
    }

    pub fn failing_close(self) -> Self {
        self.configure(|s| s.fail_close = true)
    }

    pub fn events(&self) -> Vec<String> {
        self.state.events.lock().unwrap().clone()
    }

    /// Handles opened and not yet closed
    pub fn live(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.state.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EngineAdapter for FakeAdapter {
    fn engine(&self) -> EngineKind {
        self.engine
    }

    async fn open(&self, credentials: &Credentials) -> Result<ConnectionHandle, AppError> {
        // Give concurrent callers a chance to interleave
        tokio::task::yield_now().await;
        self.state.record(format!("open:{}", credentials.database));

        if self.state.fail_open {
            return Err(AppError::Connection(
                ErrorDetail::new("connection refused").with_code("ECONNREFUSED"),
            ));
        }

        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(ConnectionHandle::new(
            self.engine,
            FakeSession {
                state: self.state.clone(),
            },
        ))
    }
}

struct FakeSession {
    state: Arc<FakeState>,
}

#[async_trait::async_trait]
impl EngineSession for FakeSession {
    async fn introspect_schema(&mut self) -> Result<SchemaDescription, AppError> {
        self.state.record("introspect".to_string());
        if self.state.fail_introspect {
            return Err(AppError::Schema(ErrorDetail::new("permission denied for schema public")));
        }
        Ok(self.state.schema.clone())
    }

    async fn query_rows(&mut self, sql: &str) -> Result<Vec<Row>, AppError> {
        self.state.record(format!("query:{}", sql));
        match &self.state.fail_query {
            Some(detail) => Err(AppError::Query(detail.clone())),
            None => Ok(self.state.rows.clone()),
        }
    }

    async fn execute_statement(&mut self, sql: &str) -> Result<(), AppError> {
        self.state.record(format!("execute:{}", sql));
        match &self.state.fail_query {
            Some(detail) => Err(AppError::Query(detail.clone())),
            None => Ok(()),
        }
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        self.state.record("close".to_string());
        self.state.live.fetch_sub(1, Ordering::SeqCst);
        if self.state.fail_close {
            return Err(AppError::Connection(ErrorDetail::new("socket already closed")));
        }
        Ok(())
    }
}
