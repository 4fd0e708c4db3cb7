//! Integration tests for the query execution core.
//!
//! # Overview
//!
//! These tests drive complete connection → cursor → controller → backend
//! round trips. The backend is scripted (see `common`), so every completion
//! happens exactly when and where a test decides: on the test thread, on a
//! worker thread, before or after the cursor is dropped, or after the
//! connection is closed.
//!
//! The last section runs a tokio-backed transport end to end over a SPARQL
//! JSON results document.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test --test integration_tests
//! ```

mod common;

use async_trait::async_trait;
use common::*;
use parking_lot::Mutex;
use sparql_client::error::{ErrorKind, TransportError};
use sparql_client::query::{OperationPhase, Position, Query, QueryOptions, StatementType};
use sparql_client::transport::{QueryReply, QueryTransport, SparqlResults, TokioBackend};
use sparql_client::types::{NodeType, Value};
use sparql_client::{Connection, ConnectionOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

// ============================================================================
// Result Scenarios
// ============================================================================

#[test]
fn test_select_returns_three_rows() {
    init_tracing();
    let backend = ScriptedBackend::new();
    let conn = connect(&backend);

    let mut cursor = conn.exec("select ?u ?p { ?u nco:fullname ?p }");
    let (query, completion) = backend.take();
    assert_eq!(query.statement_type(), StatementType::Select);
    completion.add_rows(contact_rows(3));
    completion.finish(Ok(()));
    cursor.wait_for_finished();

    for _ in 0..3 {
        assert!(cursor.next());
        assert_eq!(cursor.current().count(), 2);
    }
    assert!(!cursor.next());
    assert!(cursor.current().is_empty());
    assert_eq!(cursor.position(), Position::AfterLast);
    assert!(!cursor.has_error());
}

#[test]
fn test_ask_returns_boolean_without_rows() {
    let backend = ScriptedBackend::new();
    let conn = connect(&backend);

    let mut cursor = conn.exec(Query::with_type(
        "ask { <uri001> a nco:PersonContact }",
        StatementType::Ask,
    ));
    let (_, completion) = backend.take();
    completion.set_boolean(true);
    completion.finish(Ok(()));
    cursor.wait_for_finished();

    assert!(cursor.is_bool());
    assert!(cursor.bool_value());
    assert!(!cursor.next());
    assert!(cursor.current().is_empty());
}

#[test]
fn test_malformed_query_reports_statement_error() {
    let backend = ScriptedBackend::new();
    let conn = connect(&backend);

    let mut cursor = conn.exec("selec ?u { ?u a }");
    let (_, completion) = backend.take();
    thread::spawn(move || completion.finish(Err(syntax_error())));
    cursor.wait_for_finished();

    assert!(cursor.has_error());
    let err = cursor.last_error().unwrap();
    assert_eq!(err.kind(), ErrorKind::Statement);
    assert_eq!(err.number(), Some(37000));
    assert!(!cursor.next());
    assert_eq!(cursor.size(), Some(0));
}

#[test]
fn test_update_has_no_rows() {
    let backend = ScriptedBackend::new();
    let conn = connect(&backend);

    let mut cursor = conn.exec(Query::with_type(
        "insert { <uri004> a nco:PersonContact }",
        StatementType::Insert,
    ));
    backend.take().1.finish(Ok(()));
    cursor.wait_for_finished();

    assert_eq!(cursor.size(), Some(0));
    assert!(!cursor.next());
    assert!(!cursor.has_error());
}

// ============================================================================
// Cursor Behavior
// ============================================================================

#[test]
fn test_forward_only_position_is_monotonic() {
    let backend = ScriptedBackend::new();
    let conn = connect(&backend);

    let mut cursor = conn.exec_with_options(
        "select ?u ?p { ?u nco:fullname ?p }",
        &QueryOptions::default().with_forward_only(true),
    );
    let (_, completion) = backend.take();
    let producer = thread::spawn(move || {
        for row in contact_rows(4) {
            thread::sleep(Duration::from_millis(2));
            completion.add_rows(vec![row]);
        }
        completion.finish(Ok(()));
    });

    let mut last = None;
    let mut rows = 0;
    while cursor.next() {
        let Position::Row(index) = cursor.position() else {
            panic!("unexpected position {:?}", cursor.position());
        };
        assert!(last.map_or(true, |prev| index > prev));
        last = Some(index);
        rows += 1;
    }
    producer.join().unwrap();

    assert_eq!(rows, 4);
    assert_eq!(cursor.position(), Position::AfterLast);
    assert!(cursor.is_finished());
    assert!(!cursor.previous());
    assert_eq!(cursor.last_error().map(|e| e.kind()), Some(ErrorKind::Unsupported));
}

#[test]
fn test_data_ready_notifications() {
    let backend = ScriptedBackend::new();
    let conn = connect_with_interval(&backend, 2);

    let cursor = conn.exec("select ?u ?p { ?u nco:fullname ?p }");
    let counts = Arc::new(Mutex::new(Vec::new()));
    let finished = Arc::new(AtomicUsize::new(0));
    {
        let counts = Arc::clone(&counts);
        cursor.on_data_ready(move |n| counts.lock().push(n));
        let finished = Arc::clone(&finished);
        cursor.on_finished(move || {
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }

    let (_, completion) = backend.take();
    for row in contact_rows(5) {
        completion.add_rows(vec![row]);
    }
    completion.finish(Ok(()));
    cursor.wait_for_finished();

    assert_eq!(*counts.lock(), vec![2, 4, 5]);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(cursor.size(), Some(5));
}

#[test]
fn test_nested_waits_on_independent_queries() {
    let backend = ScriptedBackend::new();
    let conn = connect(&backend);

    let first = conn.exec("select ?a { ?a a nco:Contact }");
    let second = conn.exec("select ?b { ?b a nco:Contact }");
    let (_, first_done) = backend.take();
    let (_, second_done) = backend.take();

    let worker = thread::spawn(move || {
        second_done.finish(Ok(()));
        thread::sleep(Duration::from_millis(5));
        first_done.finish(Ok(()));
    });
    first.wait_for_finished();
    worker.join().unwrap();

    assert!(first.is_finished());
    assert!(second.is_finished());
}

#[test]
fn test_sync_exec_pulls_rows() {
    let backend = ScriptedBackend::new();
    backend.script_sync_rows(contact_rows(2));
    let conn = connect(&backend);

    let mut cursor = conn.sync_exec("select ?u ?p { ?u nco:fullname ?p }");
    assert_eq!(cursor.phase(), OperationPhase::Executing);
    assert!(cursor.next());
    assert_eq!(
        cursor.current().value_by_name("p").and_then(Value::as_str),
        Some("name001")
    );
    assert!(cursor.next());
    assert!(!cursor.next());
    assert!(cursor.is_finished());
    assert_eq!(backend.pending(), 0);
}

// ============================================================================
// Lifetime Safety
// ============================================================================

#[test]
fn test_idle_cursor_drop_is_silent() {
    let backend = ScriptedBackend::new();
    let conn = connect(&backend);

    let cursor = conn.prepare("select ?u { ?u a nco:Contact }", &QueryOptions::default());
    assert_eq!(cursor.phase(), OperationPhase::Idle);
    drop(cursor);

    assert_eq!(backend.started(), 0);
    assert_eq!(conn.process_events(), 0);
}

#[test]
fn test_finished_cursor_drop_is_silent() {
    let backend = ScriptedBackend::new();
    let conn = connect(&backend);

    let cursor = conn.exec("select ?u { ?u a nco:Contact }");
    backend.take().1.finish(Ok(()));
    cursor.wait_for_finished();
    drop(cursor);

    assert_eq!(backend.started(), 1);
    assert_eq!(conn.event_loop().pending(), 0);
}

#[test]
fn test_in_flight_drop_discards_late_completion() {
    init_tracing();
    let backend = ScriptedBackend::new();
    let conn = connect(&backend);

    let cursor = conn.exec("select ?u ?p { ?u nco:fullname ?p }");
    cursor.on_finished(|| panic!("notification after the cursor was dropped"));
    drop(cursor);

    let (_, completion) = backend.take();
    assert!(completion.is_cancelled());
    thread::spawn(move || {
        completion.add_rows(contact_rows(3));
        completion.finish(Ok(()));
    })
    .join()
    .unwrap();

    assert_eq!(conn.process_events(), 0);
}

#[test]
fn test_close_while_executing_reports_connection_error() {
    let backend = ScriptedBackend::new();
    let mut conn = connect(&backend);

    let cursor = conn.exec("select ?u { ?u a nco:Contact }");
    assert_eq!(backend.pending(), 1);
    conn.close();
    cursor.wait_for_finished();

    let err = cursor.last_error().unwrap();
    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(!conn.is_open());
}

#[test]
fn test_completion_after_close_is_connection_error() {
    let backend = ScriptedBackend::new();
    let mut conn = connect(&backend);

    let cursor = conn.exec("select ?u { ?u a nco:Contact }");
    let (_, completion) = backend.take();
    conn.close();
    completion.add_rows(contact_rows(1));
    completion.finish(Ok(()));
    cursor.wait_for_finished();

    assert_eq!(cursor.last_error().map(|e| e.kind()), Some(ErrorKind::Connection));
}

#[test]
fn test_exec_after_close() {
    let backend = ScriptedBackend::new();
    let mut conn = connect(&backend);
    conn.close();

    let cursor = conn.exec("select ?u { ?u a nco:Contact }");
    cursor.wait_for_finished();
    assert_eq!(cursor.last_error().map(|e| e.kind()), Some(ErrorKind::Connection));
    assert_eq!(backend.started(), 0);
}

// ============================================================================
// Runtime Backend
// ============================================================================

const CONTACTS_JSON: &str = r#"{
    "head": { "vars": ["u", "name", "born"] },
    "results": { "bindings": [
        { "u": { "type": "uri", "value": "http://example.org/contact/1" },
          "name": { "type": "literal", "value": "Alice" },
          "born": { "type": "literal", "value": "1980-05-17",
                    "datatype": "http://www.w3.org/2001/XMLSchema#date" } },
        { "u": { "type": "uri", "value": "http://example.org/contact/2" },
          "name": { "type": "literal", "value": "Bob" } }
    ] }
}"#;

struct JsonTransport;

#[async_trait]
impl QueryTransport for JsonTransport {
    async fn execute(&self, query: &Query) -> Result<QueryReply, TransportError> {
        if query.text().starts_with("selec ") {
            return Err(TransportError::Rejected {
                code: Some(400),
                message: "syntax error".to_string(),
            });
        }
        QueryReply::from_document(SparqlResults::from_json(CONTACTS_JSON)?)
    }
}

fn runtime_connection() -> Connection {
    let options = ConnectionOptions::builder().max_threads(2).build().unwrap();
    let backend = TokioBackend::new("json", JsonTransport, &options).unwrap();
    Connection::with_backend(Arc::new(backend), options)
}

#[test]
fn test_runtime_backend_end_to_end() {
    let conn = runtime_connection();
    let mut cursor = conn.exec("select ?u ?name ?born { ?u nco:fullname ?name }");
    assert!(cursor.wait_for_finished_timeout(Duration::from_secs(5)));

    assert_eq!(cursor.size(), Some(2));
    assert!(cursor.next());
    let row = cursor.current();
    assert_eq!(row.binding(0).map(|b| b.node_type()), Some(NodeType::Uri));
    assert_eq!(
        row.binding_by_name("born").map(ToString::to_string),
        Some("\"1980-05-17\"^^<http://www.w3.org/2001/XMLSchema#date>".to_string())
    );
    assert!(cursor.last());
    assert_eq!(cursor.current().binding(2).map(|b| b.is_valid()), Some(false));
}

#[test]
fn test_runtime_backend_rejection() {
    let conn = runtime_connection();
    let cursor = conn.exec("selec ?u");
    cursor.wait_for_finished();
    assert_eq!(cursor.last_error().map(|e| e.kind()), Some(ErrorKind::Statement));
}

#[tokio::test]
async fn test_json_transport_reply() {
    let reply = JsonTransport
        .execute(&Query::new("select ?u { ?u a nco:Contact }"))
        .await
        .unwrap();
    assert!(matches!(reply, QueryReply::Rows { size: Some(2), .. }));
}
