//! Basic usage example for sparql-client-rs.
//!
//! Registers an in-memory driver that answers queries with canned SPARQL
//! JSON documents, then runs a SELECT, an ASK and a forward-only query
//! against it.

use async_trait::async_trait;
use sparql_client::connection::{Connection, ConnectionOptions, DriverRegistry};
use sparql_client::error::{ConnectionError, TransportError};
use sparql_client::query::{QueryOptions, StatementType};
use sparql_client::transport::{Backend, QueryReply, QueryTransport, SparqlResults, TokioBackend};
use sparql_client::Query;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

const DRIVER: &str = "memory";

const CONTACTS: &str = r#"{
    "head": { "vars": ["u", "name", "birthday"] },
    "results": { "bindings": [
        { "u": { "type": "uri", "value": "http://example.org/contact/alice" },
          "name": { "type": "literal", "value": "Alice", "xml:lang": "en" },
          "birthday": { "type": "literal", "value": "1980-05-17",
                        "datatype": "http://www.w3.org/2001/XMLSchema#date" } },
        { "u": { "type": "uri", "value": "http://example.org/contact/bob" },
          "name": { "type": "literal", "value": "Bob" } },
        { "u": { "type": "bnode", "value": "b0" },
          "name": { "type": "literal", "value": "Charlie" } }
    ] }
}"#;

const KNOWN: &str = r#"{ "head": {}, "boolean": true }"#;

/// Serves canned documents: ASK queries get `KNOWN`, everything else `CONTACTS`.
struct MemoryStore;

#[async_trait]
impl QueryTransport for MemoryStore {
    async fn execute(&self, query: &Query) -> Result<QueryReply, TransportError> {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let document = match query.statement_type() {
            StatementType::Ask => KNOWN,
            _ => CONTACTS,
        };
        QueryReply::from_document(SparqlResults::from_json(document)?)
    }
}

/// Builds a registry holding the in-memory driver.
fn example_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    registry.register(
        DRIVER,
        |options: &ConnectionOptions| -> Result<Arc<dyn Backend>, ConnectionError> {
            Ok(Arc::new(TokioBackend::new(DRIVER, MemoryStore, options)?))
        },
    );
    registry
}

/// Runs a SELECT and prints each row.
fn example_select(conn: &Connection) -> Result<usize, Box<dyn Error>> {
    let mut cursor = conn.exec("select ?u ?name ?birthday { ?u nco:fullname ?name }");
    cursor.wait_for_finished();
    if let Some(err) = cursor.last_error() {
        return Err(err.into());
    }

    while cursor.next() {
        let row = cursor.current();
        let rendered: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("  {}", rendered.join(" "));
    }
    Ok(cursor.size().unwrap_or_default())
}

/// Runs an ASK query.
fn example_ask(conn: &Connection) -> Result<bool, Box<dyn Error>> {
    let cursor = conn.exec(Query::with_type(
        "ask { <http://example.org/contact/alice> a nco:PersonContact }",
        StatementType::Ask,
    ));
    cursor.wait_for_finished();
    match cursor.last_error() {
        Some(err) => Err(err.into()),
        None => Ok(cursor.bool_value()),
    }
}

/// Streams a forward-only result, reporting rows as they become available.
fn example_forward_only(conn: &Connection) -> Result<usize, Box<dyn Error>> {
    let mut cursor = conn.exec_with_options(
        "select ?u ?name ?birthday { ?u nco:fullname ?name }",
        &QueryOptions::new().with_forward_only(true),
    );
    cursor.on_data_ready(|total| println!("  {} row(s) available", total));

    let mut rows = 0;
    while cursor.next() {
        rows += 1;
    }
    match cursor.last_error() {
        Some(err) => Err(err.into()),
        None => Ok(rows),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let registry = example_registry();
    let options: ConnectionOptions = "sparql://localhost/contacts?maxThreads=2".parse()?;
    let mut conn = Connection::open(&registry, DRIVER, options);
    println!("Connected: driver {}", conn.driver_name());

    let rows = example_select(&conn)?;
    println!("Select: {} row(s)", rows);

    let known = example_ask(&conn)?;
    println!("Ask: {}", known);

    let rows = example_forward_only(&conn)?;
    println!("Forward-only: {} row(s)", rows);

    conn.close();
    println!("Done");

    Ok(())
}
