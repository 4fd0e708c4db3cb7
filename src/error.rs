//! Error types for sparql-client-rs.
//!
//! This module defines domain-specific error types organized by functional area,
//! plus the [`ErrorRecord`] that cursors carry once an error has crossed the
//! asynchronous boundary.

use std::fmt;
use thiserror::Error;

/// Top-level error type encompassing all possible errors.
#[derive(Error, Debug)]
pub enum SparqlError {
    /// Connection-related errors
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// Query execution errors
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Value conversion errors
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Transport errors reported by a backend
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors related to backend connections.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// No driver is registered under the requested name
    #[error("Driver not loaded: {0}")]
    DriverNotFound(String),

    /// The driver failed to open its backend
    #[error("Failed to open {driver} connection: {message}")]
    OpenFailed { driver: String, message: String },

    /// Invalid connection option
    #[error("Invalid connection option '{option}': {message}")]
    InvalidOption { option: String, message: String },

    /// Connection options could not be parsed
    #[error("Failed to parse connection options: {0}")]
    ParseError(String),

    /// Connection is closed
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Connection was closed while an operation was outstanding
    #[error("Connection closed before the query finished")]
    ClosedWhileExecuting,
}

/// Errors related to query execution.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The statement type is not supported by the backend
    #[error("Statement type {0} is not supported by this connection")]
    UnsupportedStatement(String),

    /// Execution mode not supported by the backend
    #[error("{0} execution is not supported by this connection")]
    UnsupportedExecMode(String),

    /// Positioning call not supported by the cursor
    #[error("Operation '{0}' is not supported by a forward-only result")]
    UnsupportedOperation(&'static str),

    /// Placeholder binding error
    #[error("No value bound for placeholder '?:{0}'")]
    UnboundPlaceholder(String),
}

/// Errors related to lexical value conversion.
#[derive(Error, Debug)]
pub enum ConversionError {
    /// Lexical form does not match its datatype
    #[error("Invalid lexical form '{lexical}' for datatype <{datatype}>")]
    InvalidLexical { lexical: String, datatype: String },

    /// Unknown RDF term type in a results document
    #[error("Unknown RDF term type: {0}")]
    UnknownTermType(String),

    /// Malformed results document
    #[error("Invalid results document: {0}")]
    InvalidDocument(String),
}

/// Errors reported by a backend transport.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The endpoint could not be reached
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// The backend rejected the query
    #[error("Query rejected by backend: {message}")]
    Rejected { code: Option<i32>, message: String },

    /// The backend failed while running the query
    #[error("Backend failure: {message}")]
    Failed { code: Option<i32>, message: String },

    /// Message deserialization error
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// The connection was closed underneath the transport
    #[error("Transport closed")]
    Closed,
}

/// Classification of a recorded error.
///
/// The absence of an error is expressed as `None` wherever an
/// `Option<&ErrorRecord>` is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Backend unreachable or closed
    Connection,
    /// Backend rejected the query text or semantics
    Statement,
    /// Backend failure that is neither connection nor statement related
    Backend,
    /// Random-access call on a cursor that cannot reposition
    Unsupported,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Connection => write!(f, "CONNECTION"),
            ErrorKind::Statement => write!(f, "STATEMENT"),
            ErrorKind::Backend => write!(f, "BACKEND"),
            ErrorKind::Unsupported => write!(f, "UNSUPPORTED"),
        }
    }
}

/// An error stored on a cursor.
///
/// Errors never unwind across the asynchronous boundary; they are captured as
/// an `ErrorRecord` and surfaced through `ResultCursor::last_error()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    message: String,
    kind: ErrorKind,
    number: Option<i32>,
}

impl ErrorRecord {
    /// Create a record with the given message and kind.
    pub fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            number: None,
        }
    }

    /// Attach a backend-specific error number.
    pub fn with_number(mut self, number: i32) -> Self {
        self.number = Some(number);
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn number(&self) -> Option<i32> {
        self.number
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number {
            Some(n) => write!(f, "[{}:{}] {}", self.kind, n, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ErrorRecord {}

impl SparqlError {
    /// Map to the recorded error kind.
    pub fn to_error_kind(&self) -> ErrorKind {
        match self {
            SparqlError::Connection(e) => e.to_error_kind(),
            SparqlError::Query(e) => e.to_error_kind(),
            SparqlError::Conversion(_) => ErrorKind::Backend,
            SparqlError::Transport(e) => e.to_error_kind(),
        }
    }
}

impl ConnectionError {
    /// Map to the recorded error kind.
    pub fn to_error_kind(&self) -> ErrorKind {
        ErrorKind::Connection
    }
}

impl QueryError {
    /// Map to the recorded error kind.
    pub fn to_error_kind(&self) -> ErrorKind {
        match self {
            QueryError::UnsupportedOperation(_)
            | QueryError::UnsupportedStatement(_)
            | QueryError::UnsupportedExecMode(_) => ErrorKind::Unsupported,
            QueryError::UnboundPlaceholder(_) => ErrorKind::Statement,
        }
    }
}

impl TransportError {
    /// Map to the recorded error kind.
    pub fn to_error_kind(&self) -> ErrorKind {
        match self {
            TransportError::Unreachable(_) | TransportError::Closed => ErrorKind::Connection,
            TransportError::Rejected { .. } => ErrorKind::Statement,
            TransportError::Failed { .. } | TransportError::DeserializationError(_) => {
                ErrorKind::Backend
            }
        }
    }

    fn code(&self) -> Option<i32> {
        match self {
            TransportError::Rejected { code, .. } | TransportError::Failed { code, .. } => *code,
            _ => None,
        }
    }
}

impl From<&SparqlError> for ErrorRecord {
    fn from(err: &SparqlError) -> Self {
        match err {
            SparqlError::Transport(e) => ErrorRecord::from(e),
            other => ErrorRecord::new(other.to_string(), other.to_error_kind()),
        }
    }
}

impl From<SparqlError> for ErrorRecord {
    fn from(err: SparqlError) -> Self {
        ErrorRecord::from(&err)
    }
}

impl From<&TransportError> for ErrorRecord {
    fn from(err: &TransportError) -> Self {
        let record = ErrorRecord::new(err.to_string(), err.to_error_kind());
        match err.code() {
            Some(code) => record.with_number(code),
            None => record,
        }
    }
}

impl From<TransportError> for ErrorRecord {
    fn from(err: TransportError) -> Self {
        ErrorRecord::from(&err)
    }
}

impl From<QueryError> for ErrorRecord {
    fn from(err: QueryError) -> Self {
        ErrorRecord::new(err.to_string(), err.to_error_kind())
    }
}

impl From<ConnectionError> for ErrorRecord {
    fn from(err: ConnectionError) -> Self {
        ErrorRecord::new(err.to_string(), err.to_error_kind())
    }
}

// Conversions from external error types
impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::DeserializationError(err.to_string())
    }
}

impl From<ConversionError> for TransportError {
    fn from(err: ConversionError) -> Self {
        TransportError::DeserializationError(err.to_string())
    }
}

impl From<serde_json::Error> for ConnectionError {
    fn from(err: serde_json::Error) -> Self {
        ConnectionError::ParseError(err.to_string())
    }
}
