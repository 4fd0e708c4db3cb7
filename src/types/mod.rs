//! RDF result value model: bindings, rows and value coercion.

pub mod binding;
pub mod coercion;
pub mod row;
pub mod value;

pub use binding::{Binding, NodeType};
pub use coercion::{extract_timezone, xsd, ValueCoercion, XsdCoercion, XsdType};
pub use row::ResultRow;
pub use value::{Iri, Value, ValueType};
