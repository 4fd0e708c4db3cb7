//! Backend contract.
//!
//! This module defines the `Backend` trait every driver implements, the
//! connection `Feature`s a backend can advertise, and `RowSource`, the
//! pull-based row producer used by synchronous execution.

use crate::error::{ErrorRecord, QueryError};
use crate::query::{Completion, ExecMode, Query};
use crate::types::ResultRow;
use std::fmt;

/// Optional capabilities of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// The backend reports the number of result rows up front
    QuerySize,
    /// ASK queries are supported
    AskQueries,
    /// CONSTRUCT queries are supported
    ConstructQueries,
    /// INSERT, DELETE and other updates are supported
    UpdateQueries,
    /// Synchronous, pull-based execution is supported
    SyncExec,
    /// Asynchronous execution is supported
    AsyncExec,
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Feature::QuerySize => "QuerySize",
            Feature::AskQueries => "AskQueries",
            Feature::ConstructQueries => "ConstructQueries",
            Feature::UpdateQueries => "UpdateQueries",
            Feature::SyncExec => "SyncExec",
            Feature::AsyncExec => "AsyncExec",
        };
        f.write_str(name)
    }
}

/// A driver's connection to one store.
///
/// Implementations must be safe to share across threads: completions are
/// typically reported from worker threads the backend owns.
pub trait Backend: Send + Sync {
    /// Driver name, for logging.
    fn name(&self) -> &str;

    /// Check whether the backend supports `feature`.
    fn has_feature(&self, feature: Feature) -> bool;

    /// Check whether the backend can still run queries.
    fn is_open(&self) -> bool;

    /// Start running `query` without blocking.
    ///
    /// # Arguments
    ///
    /// * `query` - Query with placeholders already substituted
    /// * `completion` - Handle to report rows and the final outcome through
    ///
    /// The completion may be reported from any thread, at any later time,
    /// and must be finished at most once. Dropping it counts as a failure.
    fn start_async(&self, query: &Query, completion: Completion);

    /// Run `query` on the caller's thread, returning a source that yields
    /// rows as they are pulled.
    ///
    /// # Errors
    ///
    /// Returns an `ErrorRecord` if the query cannot be started. The default
    /// implementation reports synchronous execution as unsupported.
    fn exec_sync(&self, query: &Query) -> Result<Box<dyn RowSource>, ErrorRecord> {
        let _ = query;
        Err(QueryError::UnsupportedExecMode(ExecMode::Sync.to_string()).into())
    }

    /// Tear the backend down. Outstanding completions may be dropped.
    fn close(&self);
}

/// Pull-based producer of result rows.
pub trait RowSource: Send {
    /// Fetch the next row, or `None` once exhausted.
    fn fetch_next(&mut self) -> Option<Result<ResultRow, ErrorRecord>>;

    /// Answer of an ASK query, if this source carries one.
    fn boolean(&self) -> Option<bool> {
        None
    }
}

impl<I> RowSource for I
where
    I: Iterator<Item = Result<ResultRow, ErrorRecord>> + Send,
{
    fn fetch_next(&mut self) -> Option<Result<ResultRow, ErrorRecord>> {
        self.next()
    }
}
