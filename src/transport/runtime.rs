//! Async transports on a tokio runtime.
//!
//! A [`QueryTransport`] speaks to a store asynchronously (HTTP, IPC, ...).
//! [`TokioBackend`] adapts one to the [`Backend`] contract: each query runs
//! as a task on a tokio runtime, every batch of rows the transport streams
//! is delivered as a partial result, and the task's outcome completes the
//! operation from a worker thread.

use crate::connection::ConnectionOptions;
use crate::error::{ConnectionError, ErrorKind, ErrorRecord, TransportError};
use crate::query::{Completion, Query};
use crate::transport::messages::SparqlResults;
use crate::transport::protocol::{Backend, Feature, RowSource};
use crate::types::ResultRow;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Stream of row batches produced by a transport.
pub type RowBatches = BoxStream<'static, Result<Vec<ResultRow>, TransportError>>;

/// What a transport returns for one query.
pub enum QueryReply {
    /// Rows of a SELECT or CONSTRUCT query, possibly arriving in batches
    Rows {
        /// Total row count, if known up front
        size: Option<usize>,
        batches: RowBatches,
    },
    /// Answer to an ASK query
    Boolean(bool),
    /// An update was applied
    Updated,
}

impl QueryReply {
    /// A reply carrying all `rows` in a single batch.
    pub fn rows(rows: Vec<ResultRow>) -> Self {
        QueryReply::Rows {
            size: Some(rows.len()),
            batches: stream::iter(vec![Ok(rows)]).boxed(),
        }
    }

    /// Build a reply from a SPARQL JSON results document.
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if a term cannot be converted.
    pub fn from_document(document: SparqlResults) -> Result<Self, TransportError> {
        match document.boolean {
            Some(value) => Ok(QueryReply::Boolean(value)),
            None => Ok(QueryReply::rows(document.into_rows()?)),
        }
    }
}

impl fmt::Debug for QueryReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryReply::Rows { size, .. } => f.debug_struct("Rows").field("size", size).finish(),
            QueryReply::Boolean(value) => f.debug_tuple("Boolean").field(value).finish(),
            QueryReply::Updated => f.write_str("Updated"),
        }
    }
}

/// Asynchronous connection to a store.
#[async_trait]
pub trait QueryTransport: Send + Sync + 'static {
    /// Execute a query.
    ///
    /// # Arguments
    ///
    /// * `query` - Query with placeholders already substituted
    ///
    /// # Errors
    ///
    /// Returns `TransportError` if the store is unreachable or rejects the query.
    async fn execute(&self, query: &Query) -> Result<QueryReply, TransportError>;

    /// Check whether the transport supports `feature`.
    fn has_feature(&self, feature: Feature) -> bool {
        matches!(
            feature,
            Feature::AskQueries
                | Feature::ConstructQueries
                | Feature::UpdateQueries
                | Feature::AsyncExec
                | Feature::SyncExec
        )
    }

    /// Release transport resources.
    fn close(&self) {}
}

/// [`Backend`] running a [`QueryTransport`] on a tokio runtime.
pub struct TokioBackend<T: QueryTransport> {
    name: String,
    transport: Arc<T>,
    runtime: Mutex<Option<Runtime>>,
    handle: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    open: AtomicBool,
}

impl<T: QueryTransport> TokioBackend<T> {
    /// Create a backend with its own multi-threaded runtime, sized by
    /// `max_threads` and `thread_expiry` from `options`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::OpenFailed` if the runtime cannot be built.
    pub fn new(
        name: impl Into<String>,
        transport: T,
        options: &ConnectionOptions,
    ) -> Result<Self, ConnectionError> {
        let name = name.into();
        let runtime = Builder::new_multi_thread()
            .worker_threads(options.max_threads())
            .thread_keep_alive(options.thread_expiry())
            .thread_name(format!("{}-worker", name))
            .enable_all()
            .build()
            .map_err(|e| ConnectionError::OpenFailed {
                driver: name.clone(),
                message: e.to_string(),
            })?;
        let handle = runtime.handle().clone();
        debug!(
            backend = %name,
            threads = options.max_threads(),
            "Started backend runtime"
        );
        Ok(Self {
            name,
            transport: Arc::new(transport),
            runtime: Mutex::new(Some(runtime)),
            handle,
            tasks: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
        })
    }

    /// Create a backend that spawns onto an existing runtime.
    pub fn with_handle(name: impl Into<String>, transport: T, handle: Handle) -> Self {
        Self {
            name: name.into(),
            transport: Arc::new(transport),
            runtime: Mutex::new(None),
            handle,
            tasks: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

async fn drive<T: QueryTransport>(
    transport: &T,
    query: &Query,
    completion: &Completion,
) -> Result<(), TransportError> {
    match transport.execute(query).await? {
        QueryReply::Rows { size, mut batches } => {
            if let Some(size) = size {
                completion.set_size(size);
            }
            while let Some(batch) = batches.next().await {
                if completion.is_cancelled() {
                    trace!(query = query.text(), "Result dropped, stopping transfer");
                    break;
                }
                completion.add_rows(batch?);
            }
        }
        QueryReply::Boolean(value) => completion.set_boolean(value),
        QueryReply::Updated => {}
    }
    Ok(())
}

impl<T: QueryTransport> Backend for TokioBackend<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_feature(&self, feature: Feature) -> bool {
        self.transport.has_feature(feature)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn start_async(&self, query: &Query, completion: Completion) {
        // Checked under the task lock so `close()` cannot miss this task.
        let mut tasks = self.tasks.lock();
        if !self.is_open() {
            drop(tasks);
            completion.finish(Err(ConnectionError::ConnectionClosed.into()));
            return;
        }
        let transport = Arc::clone(&self.transport);
        let query = query.clone();
        let task = self.handle.spawn(async move {
            let result = drive(transport.as_ref(), &query, &completion).await;
            completion.finish(result.map_err(ErrorRecord::from));
        });

        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    fn exec_sync(&self, query: &Query) -> Result<Box<dyn RowSource>, ErrorRecord> {
        if !self.is_open() {
            return Err(ConnectionError::ConnectionClosed.into());
        }
        if Handle::try_current().is_ok() {
            return Err(ErrorRecord::new(
                "Synchronous execution cannot run inside an async runtime",
                ErrorKind::Unsupported,
            ));
        }
        let reply = self
            .handle
            .block_on(self.transport.execute(query))
            .map_err(ErrorRecord::from)?;
        Ok(Box::new(StreamSource::new(self.handle.clone(), reply)))
    }

    fn close(&self) {
        if !self.open.swap(false, Ordering::SeqCst) {
            return;
        }
        debug!(backend = %self.name, "Closing backend");
        self.transport.close();

        // Aborted tasks drop their completion, which ends the operation.
        let tasks = std::mem::take(&mut *self.tasks.lock());
        if !tasks.is_empty() {
            debug!(backend = %self.name, outstanding = tasks.len(), "Aborting queries");
        }
        for task in tasks {
            task.abort();
        }
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }
    }
}

impl<T: QueryTransport> Drop for TokioBackend<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Pulls batches from a reply on the caller's thread.
struct StreamSource {
    handle: Handle,
    batches: Option<RowBatches>,
    buffered: VecDeque<ResultRow>,
    boolean: Option<bool>,
}

impl StreamSource {
    fn new(handle: Handle, reply: QueryReply) -> Self {
        let (batches, boolean) = match reply {
            QueryReply::Rows { batches, .. } => (Some(batches), None),
            QueryReply::Boolean(value) => (None, Some(value)),
            QueryReply::Updated => (None, None),
        };
        Self {
            handle,
            batches,
            buffered: VecDeque::new(),
            boolean,
        }
    }
}

impl RowSource for StreamSource {
    fn fetch_next(&mut self) -> Option<Result<ResultRow, ErrorRecord>> {
        loop {
            if let Some(row) = self.buffered.pop_front() {
                return Some(Ok(row));
            }
            let batches = self.batches.as_mut()?;
            match self.handle.block_on(batches.next()) {
                Some(Ok(batch)) => self.buffered.extend(batch),
                Some(Err(e)) => {
                    self.batches = None;
                    return Some(Err(e.into()));
                }
                None => {
                    self.batches = None;
                    return None;
                }
            }
        }
    }

    fn boolean(&self) -> Option<bool> {
        self.boolean
    }
}
