//! # sparql-client-rs
//!
//! Client-side SPARQL query execution over pluggable backends.
//!
//! A [`Connection`] hands queries to a driver's [`Backend`] and returns a
//! [`ResultCursor`] straight away. Results arrive asynchronously, are
//! delivered through the connection's cooperative event loop, and are read
//! through the cursor as typed [`Binding`]s. Dropping a cursor while its
//! query is still running is safe: the backend's late completion is
//! discarded.
//!
//! ## Example
//!
//! ```no_run
//! # use sparql_client::*;
//! # fn example(registry: &DriverRegistry) {
//! let options = ConnectionOptions::builder().host("localhost").port(8890).build().unwrap();
//! let conn = Connection::open(registry, "endpoint", options);
//!
//! let mut cursor = conn.exec("select ?u ?name { ?u nco:fullname ?name }");
//! cursor.wait_for_finished();
//!
//! while cursor.next() {
//!     let row = cursor.current();
//!     println!("{} is called {}", row.binding(0).unwrap(), row.binding(1).unwrap());
//! }
//!
//! if let Some(err) = cursor.last_error() {
//!     eprintln!("query failed: {}", err);
//! }
//! # }
//! ```

// Module declarations
pub mod connection;
pub mod error;
pub mod query;
pub mod transport;
pub mod types;

// Re-export public API
pub use connection::{Connection, ConnectionOptions, DriverRegistry};
pub use error::{
    ConnectionError, ConversionError, ErrorKind, ErrorRecord, QueryError, SparqlError,
    TransportError,
};
pub use query::{Query, QueryOptions, ResultCursor, StatementType};
pub use transport::{Backend, Feature};
pub use types::{Binding, Iri, ResultRow, Value};
