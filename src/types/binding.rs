//! A single named RDF term in a query result.

use crate::types::coercion::{xsd, ValueCoercion, XsdCoercion};
use crate::types::value::{Iri, Value, ValueType};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::fmt;

/// RDF node type of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeType {
    #[default]
    Invalid,
    Uri,
    Literal,
    Blank,
}

/// Binding between a query variable name and the value of an RDF node.
///
/// Node type and value are only ever replaced together, so a binding can
/// never end up as e.g. a literal without a value.
///
/// # Example
///
/// ```
/// use sparql_client::types::{Binding, xsd};
///
/// let mut b = Binding::named("age");
/// b.set_value("42", xsd::INTEGER);
/// assert_eq!(b.to_string(), "\"42\"^^<http://www.w3.org/2001/XMLSchema#integer>");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Binding {
    name: String,
    value_type: ValueType,
    node_type: NodeType,
    value: Value,
    datatype: Option<Iri>,
    language: Option<String>,
}

impl Binding {
    /// An empty binding with a declared value type.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            ..Default::default()
        }
    }

    /// An empty, invalid binding.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::Invalid)
    }

    /// A binding holding `value`; IRIs become URI nodes, everything else a literal.
    pub fn with_value(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        let mut binding = Self::new(name, value.value_type());
        binding.set_typed_value(value);
        binding
    }

    /// A blank node binding.
    pub fn blank(name: impl Into<String>, label: impl Into<String>) -> Self {
        let mut binding = Self::new(name, ValueType::String);
        binding.set_blank_node_label(label);
        binding
    }

    /// Set a literal from its lexical form using the default XSD coercion.
    pub fn set_value(&mut self, lexical: &str, datatype: &str) {
        self.set_value_with(lexical, datatype, &XsdCoercion);
    }

    /// Set a literal from its lexical form using a custom coercion service.
    ///
    /// A lexical form outside the datatype's lexical space is kept verbatim as
    /// a string value; the datatype is retained either way.
    pub fn set_value_with(&mut self, lexical: &str, datatype: &str, coercion: &dyn ValueCoercion) {
        let value = coercion.coerce(lexical, datatype).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Keeping lexical form as string");
            Value::String(lexical.to_string())
        });
        self.value_type = value.value_type();
        self.node_type = NodeType::Literal;
        self.value = value;
        self.datatype = if datatype.is_empty() {
            None
        } else {
            Some(Iri::new(datatype))
        };
    }

    /// Replace the value, deriving the node type from it.
    pub fn set_typed_value(&mut self, value: impl Into<Value>) {
        let value = value.into();
        self.node_type = match value {
            Value::Uri(_) => NodeType::Uri,
            Value::Absent => NodeType::Invalid,
            _ => NodeType::Literal,
        };
        if !value.is_absent() {
            self.value_type = value.value_type();
        }
        self.value = value;
    }

    /// Turn this binding into a blank node with the given label.
    pub fn set_blank_node_label(&mut self, label: impl Into<String>) {
        self.node_type = NodeType::Blank;
        self.value = Value::String(label.into());
        self.value_type = ValueType::String;
    }

    pub fn set_datatype_uri(&mut self, datatype: impl Into<Iri>) {
        let datatype = datatype.into();
        self.datatype = if datatype.is_empty() {
            None
        } else {
            Some(datatype)
        };
    }

    pub fn set_language_tag(&mut self, language: impl Into<String>) {
        let language = language.into();
        self.language = if language.is_empty() {
            None
        } else {
            Some(language)
        };
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Reset the binding to an invalid node without value, datatype or language.
    pub fn clear(&mut self) {
        self.value = Value::Absent;
        self.node_type = NodeType::Invalid;
        self.datatype = None;
        self.language = None;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn language_tag(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn is_uri(&self) -> bool {
        self.node_type == NodeType::Uri
    }

    pub fn is_literal(&self) -> bool {
        self.node_type == NodeType::Literal
    }

    pub fn is_blank(&self) -> bool {
        self.node_type == NodeType::Blank
    }

    /// True if the binding has a declared value type.
    pub fn is_valid(&self) -> bool {
        self.value_type != ValueType::Invalid
    }

    /// Datatype of a literal.
    ///
    /// Returns the explicit datatype if one was set, otherwise the XSD
    /// datatype implied by the value's runtime type. Non-literals have none.
    pub fn datatype_uri(&self) -> Option<Iri> {
        if self.node_type != NodeType::Literal {
            return None;
        }
        if let Some(datatype) = &self.datatype {
            return Some(datatype.clone());
        }
        let implied = match self.value {
            Value::Integer(_) => xsd::INTEGER,
            Value::Unsigned(_) => xsd::UNSIGNED_LONG,
            Value::Double(_) => xsd::DOUBLE,
            Value::Boolean(_) => xsd::BOOLEAN,
            Value::String(_) => xsd::STRING,
            Value::Date(_) => xsd::DATE,
            Value::Time(_) => xsd::TIME,
            Value::DateTime(_) => xsd::DATE_TIME,
            Value::Bytes(_) => xsd::BASE64_BINARY,
            Value::Absent | Value::Uri(_) => return None,
        };
        Some(Iri::new(implied))
    }

    /// Render a literal body, returning whether it is already quoted.
    fn literal_body(&self) -> (String, bool) {
        match &self.value {
            Value::Integer(i) => (i.to_string(), false),
            Value::Unsigned(u) => (u.to_string(), false),
            Value::Boolean(b) => (b.to_string(), false),
            Value::Double(d) => (format_double(*d), false),
            Value::String(s) => (quote_string(s), true),
            Value::Date(d) => (format!("\"{}\"", format_date(d)), true),
            Value::Time(t) => (format!("\"{}\"", t.format("%H:%M:%S")), true),
            Value::DateTime(dt) => (
                format!("\"{}T{}\"", format_date(&dt.date()), dt.format("%H:%M:%S")),
                true,
            ),
            Value::Bytes(b) => (format!("\"{}\"", BASE64.encode(b)), true),
            Value::Absent | Value::Uri(_) => (String::new(), false),
        }
    }
}

/// Query-syntax form of the binding.
///
/// URIs render as `<encoded-iri>`, blank nodes as `_:label`, literals with
/// their type-specific grammar followed by `@lang` and/or `^^<datatype>`.
/// Invalid bindings render as the empty string.
impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node_type {
            NodeType::Uri => {
                let encoded = self.value.as_iri().map(Iri::to_encoded).unwrap_or_default();
                write!(f, "<{}>", encoded)
            }
            NodeType::Blank => write!(f, "_:{}", self.value),
            NodeType::Literal => {
                let (mut literal, quoted) = self.literal_body();

                if let Some(lang) = &self.language {
                    literal.push('@');
                    literal.push_str(lang);
                }

                if let Some(datatype) = &self.datatype {
                    if !quoted {
                        literal = format!("\"{}\"", literal);
                    }
                    literal.push_str("^^<");
                    literal.push_str(&datatype.to_encoded());
                    literal.push('>');
                }
                f.write_str(&literal)
            }
            NodeType::Invalid => Ok(()),
        }
    }
}

/// Equal when type, datatype, language tag and value all match; the
/// variable name is not compared.
impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        self.value_type == other.value_type
            && self.node_type == other.node_type
            && self.datatype == other.datatype
            && self.language == other.language
            && self.value == other.value
    }
}

fn format_date(date: &chrono::NaiveDate) -> String {
    use chrono::Datelike;
    format!("{}-{:02}-{:02}", date.year(), date.month(), date.day())
}

/// Exponential notation with ten fractional digits and a signed, two digit exponent.
fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    let formatted = format!("{:.10e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => formatted,
    }
}

fn quote_string(s: &str) -> String {
    let mut literal = String::with_capacity(s.len() + 2);
    literal.push('"');
    for ch in s.chars() {
        match ch {
            '\t' => literal.push_str("\\t"),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\u{8}' => literal.push_str("\\b"),
            '\u{c}' => literal.push_str("\\f"),
            '"' => literal.push_str("\\\""),
            '\'' => literal.push_str("\\'"),
            '\\' => literal.push_str("\\\\"),
            other => literal.push(other),
        }
    }
    literal.push('"');
    literal
}
