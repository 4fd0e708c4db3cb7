//! Query execution and result handling.
//!
//! # Overview
//!
//! The query module is organized into:
//! - `statement` - query text, statement types, placeholder binding and options
//! - `events` - the cooperative event loop results are delivered through
//! - `controller` - per-operation completion controller and the backend-facing `Completion`
//! - `results` - result cursors
//!
//! # Example
//!
//! ```no_run
//! use sparql_client::connection::Connection;
//! use sparql_client::query::{Query, QueryOptions, StatementType};
//!
//! # fn example(conn: &Connection) {
//! let query = Query::with_type("ask { ?s a nco:PersonContact }", StatementType::Ask);
//! let cursor = conn.exec_with_options(query, &QueryOptions::default());
//! cursor.wait_for_finished();
//! println!("any contacts: {}", cursor.bool_value());
//! # }
//! ```

pub mod controller;
pub mod events;
pub mod results;
pub mod statement;

// Re-export commonly used types
pub use controller::{ClosingListener, Completion};
pub use events::{EventLoop, EventSender};
pub use results::{CursorKind, OperationPhase, Position, ResultCursor, ResultFeature};
pub use statement::{ExecMode, Query, QueryOptions, StatementType};
