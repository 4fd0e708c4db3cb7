//! Common test utilities for sparql-client-rs integration tests.
//!
//! # Scripted backend
//!
//! [`ScriptedBackend`] never completes anything on its own. Each started
//! query parks its `Completion`; the test takes it with
//! [`ScriptedBackend::take`] and decides when, from which thread, and with
//! what outcome the operation completes. This makes in-flight destruction
//! and connection-closing races deterministic.
//!
//! # Logging
//!
//! Call [`init_tracing`] at the start of a test and run with `RUST_LOG`, e.g.
//!
//! ```bash
//! RUST_LOG=sparql_client=debug cargo test --test integration_tests -- --nocapture
//! ```

#![allow(dead_code)]

use parking_lot::Mutex;
use sparql_client::error::{ErrorKind, ErrorRecord};
use sparql_client::query::{Completion, Query};
use sparql_client::transport::{Backend, Feature, RowSource};
use sparql_client::types::{Binding, Iri, ResultRow};
use sparql_client::{Connection, ConnectionOptions};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// Logging
// ============================================================================

/// Install a test-friendly subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Scripted Backend
// ============================================================================

/// Backend whose completions are driven by the test.
pub struct ScriptedBackend {
    features: Vec<Feature>,
    pending: Mutex<Vec<(Query, Completion)>>,
    sync_rows: Mutex<Vec<ResultRow>>,
    started: AtomicUsize,
    open: AtomicBool,
}

impl ScriptedBackend {
    /// A backend supporting every feature.
    pub fn new() -> Arc<Self> {
        Self::with_features(vec![
            Feature::QuerySize,
            Feature::AskQueries,
            Feature::ConstructQueries,
            Feature::UpdateQueries,
            Feature::SyncExec,
            Feature::AsyncExec,
        ])
    }

    pub fn with_features(features: Vec<Feature>) -> Arc<Self> {
        Arc::new(Self {
            features,
            pending: Mutex::new(Vec::new()),
            sync_rows: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            open: AtomicBool::new(true),
        })
    }

    /// Rows served by the next synchronous execution.
    pub fn script_sync_rows(&self, rows: Vec<ResultRow>) {
        *self.sync_rows.lock() = rows;
    }

    /// Number of operations started so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of operations waiting for the test to complete them.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Take the oldest outstanding operation.
    ///
    /// # Panics
    ///
    /// Panics if nothing is outstanding.
    pub fn take(&self) -> (Query, Completion) {
        let mut pending = self.pending.lock();
        assert!(!pending.is_empty(), "no outstanding operation");
        pending.remove(0)
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn start_async(&self, query: &Query, completion: Completion) {
        self.started.fetch_add(1, Ordering::SeqCst);
        self.pending.lock().push((query.clone(), completion));
    }

    fn exec_sync(&self, _query: &Query) -> Result<Box<dyn RowSource>, ErrorRecord> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let rows = std::mem::take(&mut *self.sync_rows.lock());
        Ok(Box::new(rows.into_iter().map(Ok)))
    }

    /// Outstanding completions are dropped, as a real backend tearing down
    /// its workers would.
    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
        let outstanding = std::mem::take(&mut *self.pending.lock());
        drop(outstanding);
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// A connection over `backend` with default options.
pub fn connect(backend: &Arc<ScriptedBackend>) -> Connection {
    let backend: Arc<dyn Backend> = backend.clone();
    Connection::with_backend(backend, ConnectionOptions::default())
}

/// A connection over `backend` firing "data ready" every `interval` rows.
pub fn connect_with_interval(backend: &Arc<ScriptedBackend>, interval: usize) -> Connection {
    let options = ConnectionOptions::builder()
        .data_ready_interval(interval)
        .build()
        .unwrap();
    let backend: Arc<dyn Backend> = backend.clone();
    Connection::with_backend(backend, options)
}

/// Rows `(u, p)` as a contacts store would return them.
pub fn contact_rows(count: usize) -> Vec<ResultRow> {
    (1..=count)
        .map(|i| {
            ResultRow::from_bindings(vec![
                Binding::with_value("u", Iri::new(format!("uri{:03}", i))),
                Binding::with_value("p", format!("name{:03}", i)),
            ])
        })
        .collect()
}

/// The error a store reports for a query it cannot parse.
pub fn syntax_error() -> ErrorRecord {
    ErrorRecord::new("Parse error near 'selec'", ErrorKind::Statement).with_number(37000)
}
