//! Query text, statement type and execution options.
//!
//! Query text is opaque to this crate: it is handed to the backend unchanged,
//! except for `?:name` placeholders which are replaced by bound values.

use crate::error::QueryError;
use crate::types::Binding;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of SPARQL statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatementType {
    /// SELECT query
    #[default]
    Select,
    /// ASK query
    Ask,
    /// CONSTRUCT query
    Construct,
    /// INSERT update
    Insert,
    /// DELETE update
    Delete,
    /// Any other SPARQL update
    Update,
}

impl StatementType {
    /// Check if this statement type returns result rows.
    pub fn returns_rows(&self) -> bool {
        matches!(self, Self::Select | Self::Construct)
    }

    /// Check if this statement type returns a single boolean.
    pub fn returns_boolean(&self) -> bool {
        matches!(self, Self::Ask)
    }

    /// Check if this statement type modifies the store.
    pub fn is_update(&self) -> bool {
        matches!(self, Self::Insert | Self::Delete | Self::Update)
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatementType::Select => "SELECT",
            StatementType::Ask => "ASK",
            StatementType::Construct => "CONSTRUCT",
            StatementType::Insert => "INSERT",
            StatementType::Delete => "DELETE",
            StatementType::Update => "UPDATE",
        };
        f.write_str(name)
    }
}

/// A SPARQL query together with its statement type and bound placeholder values.
///
/// # Example
///
/// ```
/// use sparql_client::query::{Query, StatementType};
/// use sparql_client::types::Binding;
///
/// let mut q = Query::new("select ?u { ?u nco:nameGiven ?:name }");
/// q.bind_value("name", Binding::with_value("name", "Alice"));
/// assert_eq!(q.prepared_text().unwrap(), "select ?u { ?u nco:nameGiven \"Alice\" }");
/// assert_eq!(q.statement_type(), StatementType::Select);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    text: String,
    statement_type: StatementType,
    bindings: BTreeMap<String, Binding>,
}

impl Query {
    /// A SELECT query.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_type(text, StatementType::Select)
    }

    pub fn with_type(text: impl Into<String>, statement_type: StatementType) -> Self {
        Self {
            text: text.into(),
            statement_type,
            bindings: BTreeMap::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn statement_type(&self) -> StatementType {
        self.statement_type
    }

    pub fn set_statement_type(&mut self, statement_type: StatementType) {
        self.statement_type = statement_type;
    }

    /// Bind `value` to the `?:name` placeholder.
    pub fn bind_value(&mut self, name: impl Into<String>, value: Binding) {
        self.bindings.insert(name.into(), value);
    }

    pub fn bound_value(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn unbind_values(&mut self) {
        self.bindings.clear();
    }

    /// Query text with every `?:name` placeholder replaced by its bound value.
    ///
    /// Placeholder names consist of ASCII alphanumerics and `_`.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::UnboundPlaceholder` if a placeholder has no value.
    pub fn prepared_text(&self) -> Result<String, QueryError> {
        if self.bindings.is_empty() && !self.text.contains("?:") {
            return Ok(self.text.clone());
        }

        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(start) = rest.find("?:") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());

            if name_len == 0 {
                out.push_str("?:");
            } else {
                let name = &after[..name_len];
                let binding = self
                    .bindings
                    .get(name)
                    .ok_or_else(|| QueryError::UnboundPlaceholder(name.to_string()))?;
                out.push_str(&binding.to_string());
            }
            rest = &after[name_len..];
        }
        out.push_str(rest);
        Ok(out)
    }
}

impl From<&str> for Query {
    fn from(text: &str) -> Self {
        Query::new(text)
    }
}

impl From<String> for Query {
    fn from(text: String) -> Self {
        Query::new(text)
    }
}

/// How a query is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Return immediately; results arrive through the event loop.
    #[default]
    Async,
    /// Pull results on demand on the calling thread.
    Sync,
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecMode::Async => f.write_str("Asynchronous"),
            ExecMode::Sync => f.write_str("Synchronous"),
        }
    }
}

/// Per-query execution options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryOptions {
    exec_mode: ExecMode,
    forward_only: bool,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_exec_mode(mut self, exec_mode: ExecMode) -> Self {
        self.exec_mode = exec_mode;
        self
    }

    /// Request a streaming cursor that discards rows once passed.
    pub fn with_forward_only(mut self, forward_only: bool) -> Self {
        self.forward_only = forward_only;
        self
    }

    pub fn exec_mode(&self) -> ExecMode {
        self.exec_mode
    }

    pub fn forward_only(&self) -> bool {
        self.forward_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Iri;

    #[test]
    fn test_statement_type_classes() {
        assert!(StatementType::Select.returns_rows());
        assert!(StatementType::Construct.returns_rows());
        assert!(StatementType::Ask.returns_boolean());
        assert!(StatementType::Insert.is_update());
        assert!(StatementType::Delete.is_update());
        assert!(!StatementType::Ask.returns_rows());
        assert_eq!(StatementType::default(), StatementType::Select);
    }

    #[test]
    fn test_prepared_text_without_placeholders() {
        let q = Query::new("select * { ?s ?p ?o }");
        assert_eq!(q.prepared_text().unwrap(), "select * { ?s ?p ?o }");
    }

    #[test]
    fn test_prepared_text_replaces_each_occurrence() {
        let mut q = Query::with_type(
            "insert { ?:s a nco:Contact ; nco:age ?:age . ?:s nco:x 1 }",
            StatementType::Insert,
        );
        q.bind_value("s", Binding::with_value("s", Iri::new("contact:1")));
        q.bind_value("age", Binding::with_value("age", 42));
        assert_eq!(
            q.prepared_text().unwrap(),
            "insert { <contact:1> a nco:Contact ; nco:age 42 . <contact:1> nco:x 1 }"
        );
    }

    #[test]
    fn test_unbound_placeholder() {
        let q = Query::new("select ?u { ?u a ?:type }");
        let err = q.prepared_text().unwrap_err();
        assert!(matches!(err, QueryError::UnboundPlaceholder(ref n) if n == "type"));
    }

    #[test]
    fn test_bare_marker_is_kept() {
        let q = Query::new("select ?: { }");
        assert_eq!(q.prepared_text().unwrap(), "select ?: { }");
    }

    #[test]
    fn test_query_options() {
        let opts = QueryOptions::new()
            .with_exec_mode(ExecMode::Sync)
            .with_forward_only(true);
        assert_eq!(opts.exec_mode(), ExecMode::Sync);
        assert!(opts.forward_only());
        assert_eq!(QueryOptions::default().exec_mode(), ExecMode::Async);
    }
}
