//! Named driver registry.
//!
//! Drivers are looked up by name when a connection is opened. The registry
//! is an explicit value owned by the application, so which drivers exist and
//! when they go away is decided by the caller.

use crate::connection::params::ConnectionOptions;
use crate::error::ConnectionError;
use crate::transport::Backend;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Opens backends for one driver.
pub trait DriverFactory: Send + Sync {
    /// Open a backend with `options`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the backend cannot be opened.
    fn open(&self, options: &ConnectionOptions) -> Result<Arc<dyn Backend>, ConnectionError>;
}

impl<F> DriverFactory for F
where
    F: Fn(&ConnectionOptions) -> Result<Arc<dyn Backend>, ConnectionError> + Send + Sync,
{
    fn open(&self, options: &ConnectionOptions) -> Result<Arc<dyn Backend>, ConnectionError> {
        self(options)
    }
}

/// Set of drivers available to [`Connection::open`](crate::connection::Connection::open).
///
/// # Example
///
/// ```
/// use sparql_client::connection::{Connection, ConnectionOptions, DriverRegistry};
/// use sparql_client::error::ConnectionError;
/// use sparql_client::transport::Backend;
/// use std::sync::Arc;
///
/// let mut registry = DriverRegistry::new();
/// registry.register(
///     "broken",
///     |_: &ConnectionOptions| -> Result<Arc<dyn Backend>, ConnectionError> {
///         Err(ConnectionError::ConnectionClosed)
///     },
/// );
/// assert!(registry.is_registered("broken"));
///
/// let conn = Connection::open(&registry, "broken", ConnectionOptions::default());
/// assert!(!conn.is_open());
/// ```
#[derive(Default, Clone)]
pub struct DriverRegistry {
    drivers: BTreeMap<String, Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous driver.
    ///
    /// Returns `true` if a driver was replaced.
    pub fn register(&mut self, name: impl Into<String>, factory: impl DriverFactory + 'static) -> bool {
        self.drivers
            .insert(name.into(), Arc::new(factory))
            .is_some()
    }

    /// Remove the driver registered under `name`.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.drivers.remove(name).is_some()
    }

    /// Names of all registered drivers, sorted.
    pub fn drivers(&self) -> Vec<&str> {
        self.drivers.keys().map(String::as_str).collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.drivers.contains_key(name)
    }

    /// Open a backend with the driver registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::DriverNotFound` for an unknown name, or the
    /// factory's error.
    pub fn open(
        &self,
        name: &str,
        options: &ConnectionOptions,
    ) -> Result<Arc<dyn Backend>, ConnectionError> {
        let factory = self.drivers.get(name).ok_or_else(|| {
            warn!(driver = name, "Driver not loaded");
            ConnectionError::DriverNotFound(name.to_string())
        })?;
        factory.open(options)
    }
}

impl fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.drivers())
            .finish()
    }
}
