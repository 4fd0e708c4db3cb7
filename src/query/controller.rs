//! Asynchronous completion controller.
//!
//! A [`CompletionController`] bridges one backend operation to the cursor that
//! requested it. The backend holds a strong handle (inside [`Completion`]);
//! the controller only holds a weak link back to the cursor state. Whatever
//! the backend reports is posted to the consumer's [`EventLoop`] and applied
//! there, so the backend's call stack has unwound before any consumer-visible
//! state changes.
//!
//! [`EventLoop`]: crate::query::EventLoop

use crate::error::{ConnectionError, ErrorKind, ErrorRecord};
use crate::query::events::EventSender;
use crate::query::results::{CursorState, OperationPhase};
use crate::query::statement::Query;
use crate::transport::protocol::Backend;
use crate::types::ResultRow;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace, warn};

/// Receives the "connection closing" notification.
///
/// Delivered to every registered listener before the backend is torn down.
pub trait ClosingListener: Send + Sync {
    fn connection_closing(&self);
}

/// Per-operation state machine driving a cursor from `Executing` to `Finished`.
pub(crate) struct CompletionController {
    cursor: Weak<Mutex<CursorState>>,
    backend: Mutex<Option<Arc<dyn Backend>>>,
    rejection: Mutex<Option<ErrorRecord>>,
    events: EventSender,
    query: String,
    data_ready_interval: usize,
    started: AtomicBool,
    completed: AtomicBool,
    closed_while_executing: AtomicBool,
}

impl CompletionController {
    pub(crate) fn new(
        cursor: Weak<Mutex<CursorState>>,
        backend: Option<Arc<dyn Backend>>,
        events: EventSender,
        query: impl Into<String>,
        data_ready_interval: usize,
    ) -> Self {
        Self {
            cursor,
            backend: Mutex::new(backend),
            rejection: Mutex::new(None),
            events,
            query: query.into(),
            data_ready_interval: data_ready_interval.max(1),
            started: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            closed_while_executing: AtomicBool::new(false),
        }
    }

    /// Fail the operation with `error` as soon as it starts, without
    /// reaching the backend.
    pub(crate) fn reject(&self, error: ErrorRecord) {
        *self.rejection.lock() = Some(error);
    }

    /// Move the cursor to `Executing` and hand the operation to the backend.
    ///
    /// Must be called on the consumer's thread.
    pub(crate) fn start(self: Arc<Self>, query: &Query) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(state) = self.cursor.upgrade() {
            state.lock().phase = OperationPhase::Executing;
        }

        let rejection = self.rejection.lock().take();
        if let Some(error) = rejection {
            self.fail_locally(error);
            return;
        }
        let backend = self.backend.lock().clone();
        let Some(backend) = backend.filter(|b| b.is_open()) else {
            self.fail_locally(ConnectionError::ConnectionClosed.into());
            return;
        };
        let prepared = match query.prepared_text() {
            Ok(text) => Query::with_type(text, query.statement_type()),
            Err(e) => {
                self.fail_locally(e.into());
                return;
            }
        };

        debug!(
            backend = backend.name(),
            statement = %prepared.statement_type(),
            query = prepared.text(),
            "Starting query"
        );
        backend.start_async(&prepared, Completion::new(self));
    }

    /// Record a locally detected error right away and finish through the
    /// event loop like any backend failure.
    fn fail_locally(self: Arc<Self>, error: ErrorRecord) {
        if let Some(state) = self.cursor.upgrade() {
            state.lock().last_error = Some(error.clone());
        }
        Completion::new(self).finish(Err(error));
    }

    fn post_rows(self: &Arc<Self>, rows: Vec<ResultRow>) {
        let controller = Arc::clone(self);
        self.events.post(move || controller.deliver_rows(rows));
    }

    fn post_update(self: &Arc<Self>, update: impl FnOnce(&mut CursorState) + Send + 'static) {
        let controller = Arc::clone(self);
        self.events.post(move || {
            if let Some(state) = controller.cursor.upgrade() {
                update(&mut *state.lock());
            }
        });
    }

    fn complete(self: Arc<Self>, result: Result<(), ErrorRecord>) {
        self.completed.store(true, Ordering::SeqCst);

        if self.cursor.strong_count() == 0 {
            debug!(query = %self.query, "Result dropped before completion, discarding");
            return;
        }

        let result = if self.closed_while_executing.load(Ordering::SeqCst) {
            Err(ConnectionError::ClosedWhileExecuting.into())
        } else {
            result
        };

        let controller = Arc::clone(&self);
        if !self.events.post(move || controller.finish_on_consumer(result)) {
            debug!(query = %self.query, "Event loop gone, dropping completion");
        }
    }

    fn deliver_rows(&self, rows: Vec<ResultRow>) {
        let Some(state) = self.cursor.upgrade() else {
            return;
        };
        let counts = {
            let mut st = state.lock();
            if st.phase == OperationPhase::Finished {
                return;
            }
            st.delivered += rows.len();
            st.rows.extend(rows);
            let mut counts = Vec::new();
            while st.delivered - st.notified >= self.data_ready_interval {
                st.notified += self.data_ready_interval;
                counts.push(st.notified);
            }
            trace!(delivered = st.delivered, "Partial result delivered");
            counts
        };
        fire_data_ready(&state, &counts);
    }

    /// Terminal notification; runs on the consumer's thread.
    fn finish_on_consumer(&self, result: Result<(), ErrorRecord>) {
        let Some(state) = self.cursor.upgrade() else {
            return;
        };
        let (flush, mut handlers) = {
            let mut st = state.lock();
            if st.phase == OperationPhase::Finished {
                return;
            }
            if let Err(error) = result {
                warn!(query = %self.query, error = %error, "Query failed");
                st.last_error = Some(error);
            }
            let flush = if st.delivered > st.notified {
                st.notified = st.delivered;
                Some(st.delivered)
            } else {
                None
            };
            st.phase = OperationPhase::Finished;
            (flush, std::mem::take(&mut st.finished_handlers))
        };
        self.backend.lock().take();

        if let Some(count) = flush {
            fire_data_ready(&state, &[count]);
        }
        for handler in handlers.iter_mut() {
            handler();
        }
    }
}

impl ClosingListener for CompletionController {
    fn connection_closing(&self) {
        if self.backend.lock().take().is_none() {
            return;
        }
        if self.started.load(Ordering::SeqCst) && !self.completed.load(Ordering::SeqCst) {
            self.closed_while_executing.store(true, Ordering::SeqCst);
            warn!(query = %self.query, "Connection closing while query is executing");
        }
    }
}

fn fire_data_ready(state: &Mutex<CursorState>, counts: &[usize]) {
    if counts.is_empty() {
        return;
    }
    let mut handlers = std::mem::take(&mut state.lock().data_ready_handlers);
    for &count in counts {
        for handler in handlers.iter_mut() {
            handler(count);
        }
    }
    let mut st = state.lock();
    handlers.append(&mut st.data_ready_handlers);
    st.data_ready_handlers = handlers;
}

/// Backend-facing handle for one outstanding operation.
///
/// A backend receives exactly one `Completion` per started query. It may be
/// moved to any thread. Partial results are reported with [`add_rows`], the
/// operation ends with [`finish`], which consumes the handle so completion
/// happens at most once. Dropping an unfinished handle completes the
/// operation with a backend error.
///
/// [`add_rows`]: Completion::add_rows
/// [`finish`]: Completion::finish
pub struct Completion {
    controller: Option<Arc<CompletionController>>,
}

impl Completion {
    pub(crate) fn new(controller: Arc<CompletionController>) -> Self {
        Self {
            controller: Some(controller),
        }
    }

    /// Deliver a batch of rows to the cursor.
    pub fn add_rows(&self, rows: Vec<ResultRow>) {
        if rows.is_empty() || self.is_cancelled() {
            return;
        }
        if let Some(controller) = &self.controller {
            controller.post_rows(rows);
        }
    }

    /// Set the truth value of an ASK query.
    pub fn set_boolean(&self, value: bool) {
        if self.is_cancelled() {
            return;
        }
        if let Some(controller) = &self.controller {
            controller.post_update(move |st| st.boolean = Some(value));
        }
    }

    /// Report the total number of rows up front.
    pub fn set_size(&self, size: usize) {
        if self.is_cancelled() {
            return;
        }
        if let Some(controller) = &self.controller {
            controller.post_update(move |st| st.reported_size = Some(size));
        }
    }

    /// True once the consumer has dropped the cursor.
    ///
    /// Backends may use this to stop producing rows early; completing a
    /// cancelled operation is still allowed and is a no-op.
    pub fn is_cancelled(&self) -> bool {
        self.controller
            .as_ref()
            .map_or(true, |c| c.cursor.strong_count() == 0)
    }

    /// Complete the operation.
    pub fn finish(mut self, result: Result<(), ErrorRecord>) {
        if let Some(controller) = self.controller.take() {
            controller.complete(result);
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if let Some(controller) = self.controller.take() {
            controller.complete(Err(ErrorRecord::new(
                "Backend dropped the operation without completing it",
                ErrorKind::Backend,
            )));
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("query", &self.controller.as_ref().map(|c| c.query.as_str()))
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
