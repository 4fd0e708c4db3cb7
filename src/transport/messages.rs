//! SPARQL 1.1 query results in JSON format.
//!
//! This module defines the `application/sparql-results+json` document
//! structure and its conversion into [`ResultRow`]s or an ASK answer.

use crate::error::{ConversionError, TransportError};
use crate::types::{Binding, Iri, ResultRow};
use serde::Deserialize;
use std::collections::HashMap;

/// Media type of a SPARQL JSON results document.
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// A complete results document.
#[derive(Debug, Clone, Deserialize)]
pub struct SparqlResults {
    /// Document header
    pub head: Head,
    /// Variable bindings for SELECT results
    #[serde(default)]
    pub results: Option<ResultsBody>,
    /// Answer for ASK results
    #[serde(default)]
    pub boolean: Option<bool>,
}

/// Results document header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Head {
    /// Projected variable names, in column order
    #[serde(default)]
    pub vars: Vec<String>,
}

/// Body of a SELECT result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultsBody {
    /// One map per solution, keyed by variable name; unbound variables are absent
    #[serde(default)]
    pub bindings: Vec<HashMap<String, Term>>,
}

/// One RDF term in a solution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Term {
    /// `uri`, `literal`, `typed-literal` or `bnode`
    #[serde(rename = "type")]
    pub kind: String,
    /// Lexical form, IRI or blank node label
    pub value: String,
    /// Datatype IRI of a typed literal
    #[serde(default)]
    pub datatype: Option<String>,
    /// Language tag of a plain literal
    #[serde(default, rename = "xml:lang")]
    pub lang: Option<String>,
}

impl Term {
    /// Convert into a binding named `name`.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::UnknownTermType` for an unrecognized `type`.
    pub fn to_binding(&self, name: &str) -> Result<Binding, ConversionError> {
        match self.kind.as_str() {
            "uri" => Ok(Binding::with_value(name, Iri::new(self.value.as_str()))),
            "bnode" => Ok(Binding::blank(name, self.value.as_str())),
            "literal" | "typed-literal" => {
                let mut binding = match &self.datatype {
                    Some(datatype) => {
                        let mut b = Binding::named(name);
                        b.set_value(&self.value, datatype);
                        b
                    }
                    None => Binding::with_value(name, self.value.as_str()),
                };
                if let Some(lang) = &self.lang {
                    binding.set_language_tag(lang.as_str());
                }
                Ok(binding)
            }
            other => Err(ConversionError::UnknownTermType(other.to_string())),
        }
    }
}

impl SparqlResults {
    /// Parse a results document.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::DeserializationError` if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, TransportError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check if this is an ASK result.
    pub fn is_boolean(&self) -> bool {
        self.boolean.is_some()
    }

    /// Number of solutions.
    pub fn len(&self) -> usize {
        self.results.as_ref().map_or(0, |r| r.bindings.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert every solution into a row with one binding per projected
    /// variable, in `head.vars` order. Unbound variables become invalid
    /// bindings so column indexes stay stable.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError` if a term has an unknown type, or
    /// `InvalidDocument` if the document carries neither rows nor a boolean.
    pub fn into_rows(self) -> Result<Vec<ResultRow>, ConversionError> {
        let Some(body) = self.results else {
            return if self.boolean.is_some() {
                Ok(Vec::new())
            } else {
                Err(ConversionError::InvalidDocument(
                    "neither 'results' nor 'boolean' present".to_string(),
                ))
            };
        };

        let vars = self.head.vars;
        body.bindings
            .iter()
            .map(|solution| {
                vars.iter()
                    .map(|var| match solution.get(var) {
                        Some(term) => term.to_binding(var),
                        None => Ok(Binding::named(var.as_str())),
                    })
                    .collect::<Result<ResultRow, _>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{xsd, NodeType, Value, ValueType};

    const SELECT_JSON: &str = r#"{
        "head": { "vars": ["u", "name", "age"] },
        "results": { "bindings": [
            {
                "u": { "type": "uri", "value": "uri001" },
                "name": { "type": "literal", "value": "Alice", "xml:lang": "en" },
                "age": { "type": "literal", "value": "42",
                         "datatype": "http://www.w3.org/2001/XMLSchema#integer" }
            },
            {
                "u": { "type": "bnode", "value": "b0" }
            }
        ] }
    }"#;

    #[test]
    fn test_select_document_to_rows() {
        let doc = SparqlResults::from_json(SELECT_JSON).unwrap();
        assert!(!doc.is_boolean());
        assert_eq!(doc.len(), 2);

        let rows = doc.into_rows().unwrap();
        assert_eq!(rows.len(), 2);

        let first = &rows[0];
        assert_eq!(first.count(), 3);
        assert_eq!(first.variable_name(1), Some("name"));
        assert_eq!(first.binding(0).unwrap().node_type(), NodeType::Uri);
        assert_eq!(first.binding(1).unwrap().to_string(), "\"Alice\"@en");
        assert_eq!(first.value_by_name("age"), Some(&Value::Integer(42)));
        assert_eq!(
            first.binding(2).unwrap().datatype_uri().map(|i| i.to_string()),
            Some(xsd::INTEGER.to_string())
        );

        let second = &rows[1];
        assert_eq!(second.count(), 3);
        assert!(second.binding(0).unwrap().is_blank());
        assert_eq!(second.binding(2).unwrap().value_type(), ValueType::Invalid);
    }

    #[test]
    fn test_ask_document() {
        let doc = SparqlResults::from_json(r#"{ "head": {}, "boolean": true }"#).unwrap();
        assert!(doc.is_boolean());
        assert_eq!(doc.boolean, Some(true));
        assert!(doc.into_rows().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_term_type() {
        let json = r#"{ "head": { "vars": ["x"] },
            "results": { "bindings": [ { "x": { "type": "triple", "value": "t" } } ] } }"#;
        let err = SparqlResults::from_json(json).unwrap().into_rows().unwrap_err();
        assert!(matches!(err, ConversionError::UnknownTermType(ref t) if t == "triple"));
    }

    #[test]
    fn test_malformed_document() {
        let err = SparqlResults::from_json("{ not json").unwrap_err();
        assert!(matches!(err, TransportError::DeserializationError(_)));
    }

    #[test]
    fn test_document_without_results() {
        let doc = SparqlResults::from_json(r#"{ "head": { "vars": [] } }"#).unwrap();
        assert!(matches!(
            doc.into_rows(),
            Err(ConversionError::InvalidDocument(_))
        ));
    }
}
