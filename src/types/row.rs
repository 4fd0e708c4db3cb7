//! A single result tuple.

use crate::types::binding::Binding;
use crate::types::value::Value;
use std::fmt;

/// Ordered bindings of one result row.
///
/// Position in the row is the column index. Name lookups return the first
/// binding with a matching variable name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultRow {
    bindings: Vec<Binding>,
}

impl ResultRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bindings(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }

    pub fn append(&mut self, binding: Binding) {
        self.bindings.push(binding);
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    pub fn count(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Column index of the first binding named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.bindings.iter().position(|b| b.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn binding(&self, index: usize) -> Option<&Binding> {
        self.bindings.get(index)
    }

    pub fn binding_by_name(&self, name: &str) -> Option<&Binding> {
        self.index_of(name).and_then(|i| self.binding(i))
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.binding(index).map(Binding::value)
    }

    pub fn value_by_name(&self, name: &str) -> Option<&Value> {
        self.binding_by_name(name).map(Binding::value)
    }

    pub fn variable_name(&self, index: usize) -> Option<&str> {
        self.binding(index).map(Binding::name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.bindings.iter()
    }
}

impl FromIterator<Binding> for ResultRow {
    fn from_iter<I: IntoIterator<Item = Binding>>(iter: I) -> Self {
        Self {
            bindings: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ResultRow {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

impl fmt::Display for ResultRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, binding) in self.bindings.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", binding.name(), binding)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::value::Iri;

    fn contact_row() -> ResultRow {
        ResultRow::from_bindings(vec![
            Binding::with_value("u", Iri::new("uri001")),
            Binding::with_value("ng", "name001"),
        ])
    }

    #[test]
    fn test_lookup_by_index_and_name() {
        let row = contact_row();
        assert_eq!(row.count(), 2);
        assert_eq!(row.index_of("ng"), Some(1));
        assert_eq!(row.value(0).and_then(Value::as_str), Some("uri001"));
        assert_eq!(
            row.value_by_name("ng").map(ToString::to_string),
            Some("name001".to_string())
        );
        assert!(row.binding(2).is_none());
        assert!(!row.contains("missing"));
    }

    #[test]
    fn test_duplicate_names_first_wins() {
        let row: ResultRow = vec![Binding::with_value("x", 1), Binding::with_value("x", 2)]
            .into_iter()
            .collect();
        assert_eq!(row.value_by_name("x"), Some(&Value::Integer(1)));
    }

    #[test]
    fn test_empty_row() {
        let mut row = contact_row();
        assert!(!row.is_empty());
        row.clear();
        assert!(row.is_empty());
        assert_eq!(row.count(), 0);
        assert_eq!(ResultRow::new(), row);
    }

    #[test]
    fn test_display() {
        assert_eq!(contact_row().to_string(), "(u: <uri001>, ng: \"name001\")");
    }
}
