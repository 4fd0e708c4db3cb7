//! Transport layer between the query core and a store.
//!
//! # Architecture
//!
//! The transport layer is organized into:
//! - `protocol` - the `Backend` contract every driver implements
//! - `messages` - SPARQL JSON results documents
//! - `runtime` - async `QueryTransport`s run on a tokio runtime
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use sparql_client::connection::{Connection, ConnectionOptions};
//! use sparql_client::error::TransportError;
//! use sparql_client::query::Query;
//! use sparql_client::transport::{QueryReply, QueryTransport, SparqlResults, TokioBackend};
//! use std::sync::Arc;
//!
//! struct Canned(&'static str);
//!
//! #[async_trait]
//! impl QueryTransport for Canned {
//!     async fn execute(&self, _query: &Query) -> Result<QueryReply, TransportError> {
//!         QueryReply::from_document(SparqlResults::from_json(self.0)?)
//!     }
//! }
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ConnectionOptions::default();
//! let backend = TokioBackend::new("canned", Canned(r#"{"head":{},"boolean":true}"#), &options)?;
//! let conn = Connection::with_backend(Arc::new(backend), options);
//! # Ok(())
//! # }
//! ```

pub mod messages;
pub mod protocol;
pub mod runtime;

// Re-export commonly used types
pub use messages::{SparqlResults, Term, SPARQL_RESULTS_JSON};
pub use protocol::{Backend, Feature, RowSource};
pub use runtime::{QueryReply, QueryTransport, RowBatches, TokioBackend};
