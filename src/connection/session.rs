//! Connection façade.
//!
//! A [`Connection`] owns one backend and the event loop its results are
//! delivered through. Every `exec` call returns a cursor, never an error:
//! failures detected before the query reaches the backend are recorded on
//! the cursor like any backend failure.

use crate::connection::params::ConnectionOptions;
use crate::connection::registry::DriverRegistry;
use crate::error::{ConnectionError, ErrorRecord, QueryError};
use crate::query::controller::CompletionController;
use crate::query::{
    ClosingListener, CursorKind, EventLoop, ExecMode, Query, QueryOptions, ResultCursor,
    StatementType,
};
use crate::transport::{Backend, Feature};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Connection to one store through a named driver.
///
/// Results are delivered on the connection's [`EventLoop`]; cursors drain
/// it while waiting. Some backends require a synchronous cursor to be fully
/// read before the next query is issued.
///
/// # Example
///
/// ```no_run
/// use sparql_client::connection::{Connection, ConnectionOptions, DriverRegistry};
///
/// # fn example(registry: &DriverRegistry) {
/// let options = ConnectionOptions::builder().host("localhost").port(8890).build().unwrap();
/// let conn = Connection::open(registry, "endpoint", options);
///
/// let mut cursor = conn.exec("select ?u { ?u a nco:PersonContact }");
/// cursor.wait_for_finished();
/// while cursor.next() {
///     println!("{}", cursor.current());
/// }
/// # }
/// ```
pub struct Connection {
    driver: String,
    options: ConnectionOptions,
    backend: Option<Arc<dyn Backend>>,
    open_error: Option<ErrorRecord>,
    listeners: Mutex<Vec<Weak<dyn ClosingListener>>>,
    events: EventLoop,
    query_count: AtomicU64,
}

impl Connection {
    /// Open a connection with the driver registered under `driver`.
    ///
    /// Never fails: if the driver is unknown or cannot open its backend the
    /// connection is closed and every cursor it returns carries a
    /// connection error.
    pub fn open(registry: &DriverRegistry, driver: &str, options: ConnectionOptions) -> Self {
        match registry.open(driver, &options) {
            Ok(backend) => {
                debug!(driver, "Connection opened");
                Self::new(driver, options, Some(backend), None)
            }
            Err(e) => {
                warn!(driver, error = %e, "Could not open connection");
                Self::new(driver, options, None, Some(e.into()))
            }
        }
    }

    /// Wrap an already opened backend.
    pub fn with_backend(backend: Arc<dyn Backend>, options: ConnectionOptions) -> Self {
        let driver = backend.name().to_string();
        Self::new(&driver, options, Some(backend), None)
    }

    fn new(
        driver: &str,
        options: ConnectionOptions,
        backend: Option<Arc<dyn Backend>>,
        open_error: Option<ErrorRecord>,
    ) -> Self {
        Self {
            driver: driver.to_string(),
            options,
            backend,
            open_error,
            listeners: Mutex::new(Vec::new()),
            events: EventLoop::new(),
            query_count: AtomicU64::new(0),
        }
    }

    /// Execute `query` asynchronously with default options.
    pub fn exec(&self, query: impl Into<Query>) -> ResultCursor {
        self.exec_with_options(query, &QueryOptions::default())
    }

    /// Execute `query` with `options`.
    pub fn exec_with_options(&self, query: impl Into<Query>, options: &QueryOptions) -> ResultCursor {
        match options.exec_mode() {
            ExecMode::Sync => self.sync_exec(query),
            ExecMode::Async => {
                let mut cursor = self.prepare(query, options);
                cursor.exec();
                cursor
            }
        }
    }

    /// Create an asynchronous cursor for `query` without starting it.
    ///
    /// The query runs when [`ResultCursor::exec`] is called.
    pub fn prepare(&self, query: impl Into<Query>, options: &QueryOptions) -> ResultCursor {
        let query = query.into();
        let kind = match query.statement_type() {
            StatementType::Ask => CursorKind::BooleanOnly,
            t if t.is_update() => CursorKind::ForwardOnlyStreaming,
            _ if options.forward_only() => CursorKind::ForwardOnlyStreaming,
            _ => CursorKind::RandomAccessBuffered,
        };
        self.query_count.fetch_add(1, Ordering::Relaxed);

        let mut cursor = ResultCursor::new(query.clone(), kind, self.events.clone());
        let controller = Arc::new(CompletionController::new(
            cursor.state_ref(),
            self.backend.clone(),
            self.events.sender(),
            query.text(),
            self.options.data_ready_interval(),
        ));
        if let Some(error) = self.precondition_error(&query, ExecMode::Async) {
            controller.reject(error);
        }
        self.register_listener(&controller);
        cursor.attach(controller);
        cursor
    }

    /// Execute `query` synchronously.
    ///
    /// Rows are pulled from the backend on the calling thread as
    /// [`ResultCursor::next`] is called. The returned cursor is forward
    /// only and reports no size.
    pub fn sync_exec(&self, query: impl Into<Query>) -> ResultCursor {
        let query = query.into();
        self.query_count.fetch_add(1, Ordering::Relaxed);

        if let Some(error) = self.precondition_error(&query, ExecMode::Sync) {
            return ResultCursor::failed(query, error, self.events.clone());
        }
        let Some(backend) = &self.backend else {
            return ResultCursor::failed(
                query,
                ConnectionError::ConnectionClosed.into(),
                self.events.clone(),
            );
        };
        let prepared = match query.prepared_text() {
            Ok(text) => Query::with_type(text, query.statement_type()),
            Err(e) => return ResultCursor::failed(query, e.into(), self.events.clone()),
        };

        debug!(
            backend = backend.name(),
            query = prepared.text(),
            "Starting synchronous query"
        );
        match backend.exec_sync(&prepared) {
            Ok(source) => ResultCursor::synchronous(query, source, self.events.clone()),
            Err(error) => {
                warn!(query = query.text(), error = %error, "Query failed");
                ResultCursor::failed(query, error, self.events.clone())
            }
        }
    }

    fn precondition_error(&self, query: &Query, mode: ExecMode) -> Option<ErrorRecord> {
        let backend = match &self.backend {
            Some(backend) if backend.is_open() => backend,
            _ => {
                return Some(
                    self.open_error
                        .clone()
                        .unwrap_or_else(|| ConnectionError::ConnectionClosed.into()),
                )
            }
        };

        let required = match mode {
            ExecMode::Async => Feature::AsyncExec,
            ExecMode::Sync => Feature::SyncExec,
        };
        if !backend.has_feature(required) {
            return Some(QueryError::UnsupportedExecMode(mode.to_string()).into());
        }

        let statement = query.statement_type();
        let supported = match statement {
            StatementType::Select => true,
            StatementType::Ask => backend.has_feature(Feature::AskQueries),
            StatementType::Construct => backend.has_feature(Feature::ConstructQueries),
            StatementType::Insert | StatementType::Delete | StatementType::Update => {
                backend.has_feature(Feature::UpdateQueries)
            }
        };
        (!supported).then(|| QueryError::UnsupportedStatement(statement.to_string()).into())
    }

    fn register_listener(&self, controller: &Arc<CompletionController>) {
        let weak: Weak<CompletionController> = Arc::downgrade(controller);
        let listener: Weak<dyn ClosingListener> = weak;
        let mut listeners = self.listeners.lock();
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(listener);
    }

    /// Check whether the backend is open.
    pub fn is_open(&self) -> bool {
        self.backend.as_ref().map_or(false, |b| b.is_open())
    }

    /// Check whether the backend supports `feature`.
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.backend
            .as_ref()
            .map_or(false, |b| b.has_feature(feature))
    }

    /// Close the connection.
    ///
    /// Every operation still executing is told first and finishes with a
    /// connection error; then the backend is torn down. Cursors returned
    /// afterwards carry a connection error.
    pub fn close(&mut self) {
        let listeners = std::mem::take(&mut *self.listeners.lock());
        for listener in listeners.iter().filter_map(Weak::upgrade) {
            listener.connection_closing();
        }
        if let Some(backend) = self.backend.take() {
            debug!(driver = %self.driver, "Closing connection");
            backend.close();
        }
    }

    /// The event loop results of this connection are delivered on.
    pub fn event_loop(&self) -> &EventLoop {
        &self.events
    }

    /// Process pending result events without blocking.
    pub fn process_events(&self) -> usize {
        self.events.process_events()
    }

    pub fn driver_name(&self) -> &str {
        &self.driver
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Number of queries issued on this connection.
    pub fn query_count(&self) -> u64 {
        self.query_count.load(Ordering::Relaxed)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("driver", &self.driver)
            .field("open", &self.is_open())
            .field("options", &self.options)
            .field("query_count", &self.query_count())
            .finish()
    }
}
