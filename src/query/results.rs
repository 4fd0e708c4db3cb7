//! Result cursors over executing or completed queries.
//!
//! A [`ResultCursor`] is returned by every `Connection::exec` call, possibly
//! before any data exists. Its behavior depends on its [`CursorKind`]:
//!
//! - `RandomAccessBuffered` keeps every delivered row and supports
//!   `previous`, `first`, `last` and `set_pos`. It never blocks: `next()` only
//!   sees rows already delivered through the event loop.
//! - `ForwardOnlyStreaming` discards rows once passed. `next()` drains the
//!   event loop until a row or the terminal notification arrives.
//! - `BooleanOnly` carries the answer to an ASK query and no rows.
//! - `SynchronousBlocking` pulls rows from the backend on the caller's thread.
//!
//! Positioning calls a cursor cannot honor record an `Unsupported` error and
//! return `false`; they never panic.

use crate::error::{ErrorRecord, QueryError};
use crate::query::controller::CompletionController;
use crate::query::events::EventLoop;
use crate::query::statement::Query;
use crate::transport::protocol::RowSource;
use crate::types::{Binding, ResultRow, Value};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::debug;

type FinishedHandler = Box<dyn FnMut() + Send>;
type DataReadyHandler = Box<dyn FnMut(usize) + Send>;

/// Cursor position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    BeforeFirst,
    /// Zero-based index of the current row
    Row(usize),
    AfterLast,
}

/// Lifecycle of the operation behind a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationPhase {
    #[default]
    Idle,
    Executing,
    Finished,
}

/// Access capabilities of a cursor, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorKind {
    ForwardOnlyStreaming,
    RandomAccessBuffered,
    BooleanOnly,
    SynchronousBlocking,
}

impl CursorKind {
    fn is_random_access(&self) -> bool {
        matches!(self, CursorKind::RandomAccessBuffered)
    }
}

/// Capabilities a cursor can report through [`ResultCursor::has_feature`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultFeature {
    /// The number of rows is known
    QuerySize,
    /// Rows cannot be revisited
    ForwardOnly,
    /// Rows are fetched on the caller's thread
    Sync,
}

/// State shared between a cursor and its controller.
///
/// Only touched on the consumer's thread: directly by the cursor, or by
/// events the controller posts to the event loop.
#[derive(Default)]
pub(crate) struct CursorState {
    pub(crate) rows: VecDeque<ResultRow>,
    pub(crate) phase: OperationPhase,
    pub(crate) last_error: Option<ErrorRecord>,
    pub(crate) boolean: Option<bool>,
    pub(crate) reported_size: Option<usize>,
    pub(crate) delivered: usize,
    pub(crate) notified: usize,
    pub(crate) finished_handlers: Vec<FinishedHandler>,
    pub(crate) data_ready_handlers: Vec<DataReadyHandler>,
}

/// Live handle over a query's results.
///
/// # Example
///
/// ```no_run
/// # use sparql_client::connection::Connection;
/// # fn run(conn: &Connection) {
/// let mut cursor = conn.exec("select ?u { ?u a nco:PersonContact }");
/// cursor.wait_for_finished();
/// while cursor.next() {
///     println!("{}", cursor.current());
/// }
/// if let Some(err) = cursor.last_error() {
///     eprintln!("query failed: {}", err);
/// }
/// # }
/// ```
pub struct ResultCursor {
    query: Query,
    kind: CursorKind,
    state: Arc<Mutex<CursorState>>,
    events: EventLoop,
    position: Position,
    current: ResultRow,
    consumed: usize,
    pending: Option<Arc<CompletionController>>,
    source: Option<Box<dyn RowSource>>,
}

impl ResultCursor {
    pub(crate) fn new(query: Query, kind: CursorKind, events: EventLoop) -> Self {
        let state = CursorState {
            reported_size: query.statement_type().is_update().then_some(0),
            ..CursorState::default()
        };
        Self {
            query,
            kind,
            state: Arc::new(Mutex::new(state)),
            events,
            position: Position::BeforeFirst,
            current: ResultRow::new(),
            consumed: 0,
            pending: None,
            source: None,
        }
    }

    /// A cursor pulling rows from `source` on demand.
    pub(crate) fn synchronous(query: Query, source: Box<dyn RowSource>, events: EventLoop) -> Self {
        let mut cursor = Self::new(query, CursorKind::SynchronousBlocking, events);
        {
            let mut st = cursor.state.lock();
            st.phase = OperationPhase::Executing;
            st.boolean = source.boolean();
        }
        cursor.source = Some(source);
        cursor
    }

    /// A synchronous cursor that finished before producing anything.
    pub(crate) fn failed(query: Query, error: ErrorRecord, events: EventLoop) -> Self {
        let cursor = Self::new(query, CursorKind::SynchronousBlocking, events);
        {
            let mut st = cursor.state.lock();
            st.phase = OperationPhase::Finished;
            st.last_error = Some(error);
        }
        cursor
    }

    pub(crate) fn state_ref(&self) -> Weak<Mutex<CursorState>> {
        Arc::downgrade(&self.state)
    }

    /// Attach the controller that [`exec`](Self::exec) will start.
    pub(crate) fn attach(&mut self, controller: Arc<CompletionController>) {
        self.pending = Some(controller);
    }

    /// Start the query. Calling it again, or on a cursor that is already
    /// executing or finished, does nothing.
    pub fn exec(&mut self) {
        if let Some(controller) = self.pending.take() {
            controller.start(&self.query);
        }
    }

    /// Advance to the next row.
    ///
    /// Returns `false` once the rows are exhausted; this is not an error.
    pub fn next(&mut self) -> bool {
        match self.kind {
            CursorKind::RandomAccessBuffered => self.next_buffered(),
            CursorKind::ForwardOnlyStreaming | CursorKind::BooleanOnly => self.next_streaming(),
            CursorKind::SynchronousBlocking => self.next_synchronous(),
        }
    }

    fn next_buffered(&mut self) -> bool {
        self.events.process_events();
        let target = match self.position {
            Position::BeforeFirst => 0,
            Position::Row(i) => i + 1,
            Position::AfterLast => return false,
        };
        let (row, finished) = {
            let st = self.state.lock();
            (
                st.rows.get(target).cloned(),
                st.phase == OperationPhase::Finished,
            )
        };
        match row {
            Some(row) => {
                self.current = row;
                self.position = Position::Row(target);
                true
            }
            None if finished => {
                self.move_after_last();
                false
            }
            None => false,
        }
    }

    fn next_streaming(&mut self) -> bool {
        if self.position == Position::AfterLast {
            return false;
        }
        loop {
            {
                let mut st = self.state.lock();
                if let Some(row) = st.rows.pop_front() {
                    drop(st);
                    self.take_row(row);
                    return true;
                }
                match st.phase {
                    OperationPhase::Idle => return false,
                    OperationPhase::Finished => break,
                    OperationPhase::Executing => {}
                }
            }
            let state = Arc::clone(&self.state);
            self.events.run_until(|| {
                let st = state.lock();
                !st.rows.is_empty() || st.phase != OperationPhase::Executing
            });
        }
        self.move_after_last();
        false
    }

    fn next_synchronous(&mut self) -> bool {
        if self.position == Position::AfterLast {
            return false;
        }
        let fetched = match self.source.as_mut() {
            Some(source) => source.fetch_next(),
            None => None,
        };
        match fetched {
            Some(Ok(row)) => {
                self.take_row(row);
                true
            }
            Some(Err(error)) => {
                self.state.lock().last_error = Some(error);
                self.finish_synchronous();
                false
            }
            None => {
                self.finish_synchronous();
                false
            }
        }
    }

    fn take_row(&mut self, row: ResultRow) {
        self.current = row;
        self.position = Position::Row(self.consumed);
        self.consumed += 1;
    }

    fn finish_synchronous(&mut self) {
        self.source = None;
        self.state.lock().phase = OperationPhase::Finished;
        self.move_after_last();
    }

    fn move_after_last(&mut self) {
        self.position = Position::AfterLast;
        self.current.clear();
    }

    fn unsupported(&self, operation: &'static str) -> bool {
        self.state.lock().last_error = Some(QueryError::UnsupportedOperation(operation).into());
        false
    }

    /// Step back one row. Random-access cursors only.
    pub fn previous(&mut self) -> bool {
        if !self.kind.is_random_access() {
            return self.unsupported("previous");
        }
        self.events.process_events();
        let target = match self.position {
            Position::BeforeFirst => return false,
            Position::Row(0) => {
                self.position = Position::BeforeFirst;
                self.current.clear();
                return false;
            }
            Position::Row(i) => i - 1,
            Position::AfterLast => {
                let len = self.state.lock().rows.len();
                if len == 0 {
                    self.position = Position::BeforeFirst;
                    return false;
                }
                len - 1
            }
        };
        self.seek(target)
    }

    /// Move to the first row. Random-access cursors only.
    pub fn first(&mut self) -> bool {
        if !self.kind.is_random_access() {
            return self.unsupported("first");
        }
        self.set_pos(0)
    }

    /// Move to the last delivered row. Random-access cursors only.
    pub fn last(&mut self) -> bool {
        if !self.kind.is_random_access() {
            return self.unsupported("last");
        }
        self.events.process_events();
        let len = self.state.lock().rows.len();
        match len.checked_sub(1) {
            Some(index) => self.seek(index),
            None => false,
        }
    }

    /// Move to row `index`. Random-access cursors only.
    ///
    /// Returns `false` and leaves the position unchanged if the row has not
    /// been delivered.
    pub fn set_pos(&mut self, index: usize) -> bool {
        if !self.kind.is_random_access() {
            return self.unsupported("set_pos");
        }
        self.events.process_events();
        self.seek(index)
    }

    fn seek(&mut self, index: usize) -> bool {
        let row = self.state.lock().rows.get(index).cloned();
        match row {
            Some(row) => {
                self.current = row;
                self.position = Position::Row(index);
                true
            }
            None => false,
        }
    }

    /// Row at the current position; empty before the first and after the
    /// last row.
    pub fn current(&self) -> &ResultRow {
        &self.current
    }

    pub fn binding(&self, index: usize) -> Option<&Binding> {
        self.current.binding(index)
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.current.value(index)
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Block until the operation is finished, processing events meanwhile.
    ///
    /// Returns immediately for synchronous cursors and for cursors that are
    /// not executing. Calling this from a finished/data-ready handler while
    /// waiting on the same cursor never returns.
    pub fn wait_for_finished(&self) {
        if self.kind == CursorKind::SynchronousBlocking {
            return;
        }
        let state = Arc::clone(&self.state);
        self.events
            .run_until(|| state.lock().phase != OperationPhase::Executing);
    }

    /// Like [`wait_for_finished`](Self::wait_for_finished), giving up after
    /// `timeout`. Returns whether the cursor is finished.
    pub fn wait_for_finished_timeout(&self, timeout: Duration) -> bool {
        if self.kind != CursorKind::SynchronousBlocking {
            let state = Arc::clone(&self.state);
            self.events.run_until_timeout(
                || state.lock().phase != OperationPhase::Executing,
                timeout,
            );
        }
        self.is_finished()
    }

    pub fn phase(&self) -> OperationPhase {
        self.state.lock().phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == OperationPhase::Finished
    }

    pub fn has_error(&self) -> bool {
        self.state.lock().last_error.is_some()
    }

    /// The most recent error, if any.
    pub fn last_error(&self) -> Option<ErrorRecord> {
        self.state.lock().last_error.clone()
    }

    /// Number of rows, when known.
    ///
    /// `None` means unknown, not empty: a backend-reported count is returned
    /// as soon as it arrives, and a buffered cursor reports its row count
    /// once finished.
    pub fn size(&self) -> Option<usize> {
        let st = self.state.lock();
        st.reported_size.or_else(|| {
            (self.kind.is_random_access() && st.phase == OperationPhase::Finished)
                .then_some(st.rows.len())
        })
    }

    /// True once an ASK answer has arrived.
    pub fn is_bool(&self) -> bool {
        self.state.lock().boolean.is_some()
    }

    /// The ASK answer; `false` when none is known.
    pub fn bool_value(&self) -> bool {
        self.state.lock().boolean.unwrap_or(false)
    }

    pub fn has_feature(&self, feature: ResultFeature) -> bool {
        match feature {
            ResultFeature::QuerySize => {
                self.kind.is_random_access() || self.state.lock().reported_size.is_some()
            }
            ResultFeature::ForwardOnly => !self.kind.is_random_access(),
            ResultFeature::Sync => self.kind == CursorKind::SynchronousBlocking,
        }
    }

    /// Register a handler for the terminal notification.
    ///
    /// Fires once, on the event loop. Handlers registered after the cursor
    /// finished are never called.
    pub fn on_finished(&self, handler: impl FnMut() + Send + 'static) {
        self.state.lock().finished_handlers.push(Box::new(handler));
    }

    /// Register a handler for partial result notifications.
    ///
    /// Receives the number of rows delivered so far.
    pub fn on_data_ready(&self, handler: impl FnMut(usize) + Send + 'static) {
        self.state.lock().data_ready_handlers.push(Box::new(handler));
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn kind(&self) -> CursorKind {
        self.kind
    }
}

impl Drop for ResultCursor {
    fn drop(&mut self) {
        if self.kind != CursorKind::SynchronousBlocking
            && self.state.lock().phase == OperationPhase::Executing
        {
            debug!(query = self.query.text(), "Result dropped while executing");
        }
    }
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state.lock();
        f.debug_struct("ResultCursor")
            .field("query", &self.query.text())
            .field("kind", &self.kind)
            .field("phase", &st.phase)
            .field("position", &self.position)
            .field("buffered", &st.rows.len())
            .field("error", &st.last_error.as_ref().map(ErrorRecord::kind))
            .finish()
    }
}
