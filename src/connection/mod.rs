//! Connection management.
//!
//! This module provides connection options, the driver registry and the
//! `Connection` façade queries are executed through.
//!
//! # Example
//!
//! ```no_run
//! # use sparql_client::connection::{Connection, ConnectionOptions, DriverRegistry};
//! # use std::str::FromStr;
//! # fn example(registry: &DriverRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! // Using the builder
//! let options = ConnectionOptions::builder()
//!     .host("localhost")
//!     .port(8890)
//!     .path("/sparql")
//!     .data_ready_interval(100)
//!     .build()?;
//!
//! // Or parse from a connection string
//! let options = ConnectionOptions::from_str("sparql://localhost:8890/sparql?dataReadyInterval=100")?;
//!
//! let conn = Connection::open(registry, "endpoint", options);
//! # Ok(())
//! # }
//! ```

pub mod params;
pub mod registry;
pub mod session;

pub use params::{ConnectionOptions, ConnectionOptionsBuilder};
pub use registry::{DriverFactory, DriverRegistry};
pub use session::Connection;
