//! Lexical-to-typed value coercion.
//!
//! Backends hand out literals as a lexical form plus a datatype IRI. The
//! [`ValueCoercion`] service turns that pair into a [`Value`]. The default
//! [`XsdCoercion`] dispatches on a closed set of XML Schema datatypes; any
//! other datatype passes the lexical form through unchanged as a string.

use crate::error::ConversionError;
use crate::types::value::Value;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// XML Schema datatype IRIs.
pub mod xsd {
    pub const INT: &str = "http://www.w3.org/2001/XMLSchema#int";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const NON_NEGATIVE_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#nonNegativeInteger";
    pub const DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const SHORT: &str = "http://www.w3.org/2001/XMLSchema#short";
    pub const LONG: &str = "http://www.w3.org/2001/XMLSchema#long";
    pub const UNSIGNED_INT: &str = "http://www.w3.org/2001/XMLSchema#unsignedInt";
    pub const UNSIGNED_LONG: &str = "http://www.w3.org/2001/XMLSchema#unsignedLong";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const DATE: &str = "http://www.w3.org/2001/XMLSchema#date";
    pub const TIME: &str = "http://www.w3.org/2001/XMLSchema#time";
    pub const DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
    pub const BASE64_BINARY: &str = "http://www.w3.org/2001/XMLSchema#base64Binary";
}

/// Converts a lexical form plus datatype IRI into a typed value.
pub trait ValueCoercion: Send + Sync {
    /// Coerce `lexical` according to `datatype`.
    ///
    /// # Errors
    ///
    /// Returns `ConversionError::InvalidLexical` if the lexical form does not
    /// belong to the datatype's lexical space.
    fn coerce(&self, lexical: &str, datatype: &str) -> Result<Value, ConversionError>;
}

/// Datatypes recognised by [`XsdCoercion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XsdType {
    Int,
    Integer,
    NonNegativeInteger,
    Decimal,
    Short,
    Long,
    Boolean,
    Double,
    Float,
    String,
    Date,
    Time,
    DateTime,
    Base64Binary,
}

impl XsdType {
    /// Look up a datatype by its exact IRI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        let ty = match uri {
            xsd::INT => XsdType::Int,
            xsd::INTEGER => XsdType::Integer,
            xsd::NON_NEGATIVE_INTEGER => XsdType::NonNegativeInteger,
            xsd::DECIMAL => XsdType::Decimal,
            xsd::SHORT => XsdType::Short,
            xsd::LONG => XsdType::Long,
            xsd::BOOLEAN => XsdType::Boolean,
            xsd::DOUBLE => XsdType::Double,
            xsd::FLOAT => XsdType::Float,
            xsd::STRING => XsdType::String,
            xsd::DATE => XsdType::Date,
            xsd::TIME => XsdType::Time,
            xsd::DATE_TIME => XsdType::DateTime,
            xsd::BASE64_BINARY => XsdType::Base64Binary,
            _ => return None,
        };
        Some(ty)
    }
}

/// Default coercion service for XML Schema datatypes.
#[derive(Debug, Clone, Copy, Default)]
pub struct XsdCoercion;

impl ValueCoercion for XsdCoercion {
    fn coerce(&self, lexical: &str, datatype: &str) -> Result<Value, ConversionError> {
        let invalid = || ConversionError::InvalidLexical {
            lexical: lexical.to_string(),
            datatype: datatype.to_string(),
        };
        let trimmed = lexical.trim();

        let Some(ty) = XsdType::from_uri(datatype) else {
            return Ok(Value::String(lexical.to_string()));
        };

        match ty {
            XsdType::Int | XsdType::Short => trimmed
                .parse::<i32>()
                .map(|v| Value::Integer(v as i64))
                .map_err(|_| invalid()),
            XsdType::Integer | XsdType::Long => trimmed
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| invalid()),
            XsdType::NonNegativeInteger => trimmed
                .parse::<u64>()
                .map(Value::Unsigned)
                .map_err(|_| invalid()),
            XsdType::Decimal | XsdType::Double | XsdType::Float => {
                parse_double(trimmed).map(Value::Double).ok_or_else(invalid)
            }
            XsdType::Boolean => Ok(Value::Boolean(parse_boolean(trimmed))),
            XsdType::String => Ok(Value::String(lexical.to_string())),
            XsdType::Date => NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| invalid()),
            XsdType::Time => {
                let mut lexical = trimmed.to_string();
                let adjustment = extract_timezone(&mut lexical);
                let time = parse_time(&lexical).ok_or_else(invalid)?;
                let (time, _) = time.overflowing_add_signed(Duration::seconds(adjustment));
                Ok(Value::Time(time))
            }
            XsdType::DateTime => {
                let mut lexical = trimmed.to_string();
                let adjustment = extract_timezone(&mut lexical);
                let datetime = parse_datetime(&lexical).ok_or_else(invalid)?;
                datetime
                    .checked_add_signed(Duration::seconds(adjustment))
                    .map(Value::DateTime)
                    .ok_or_else(invalid)
            }
            XsdType::Base64Binary => BASE64
                .decode(trimmed)
                .map(Value::Bytes)
                .map_err(|_| invalid()),
        }
    }
}

/// Strip a `[+-]HH:MM` zone suffix from `lexical`, returning its signed offset in seconds.
///
/// Returns 0 and leaves the string untouched when no zone is present.
pub fn extract_timezone(lexical: &mut String) -> i64 {
    let bytes = lexical.as_bytes();
    let found = (0..bytes.len().saturating_sub(5)).find(|&i| {
        matches!(bytes[i], b'+' | b'-')
            && bytes[i + 1].is_ascii_digit()
            && bytes[i + 2].is_ascii_digit()
            && bytes[i + 3] == b':'
            && bytes[i + 4].is_ascii_digit()
            && bytes[i + 5].is_ascii_digit()
    });

    let Some(ix) = found else {
        return 0;
    };

    let sign = if bytes[ix] == b'-' { -1 } else { 1 };
    let digit = |i: usize| (bytes[i] - b'0') as i64;
    let hours = digit(ix + 1) * 10 + digit(ix + 2);
    let minutes = digit(ix + 4) * 10 + digit(ix + 5);
    lexical.replace_range(ix..ix + 6, "");

    (hours * 3600 + minutes * 60) * sign
}

fn parse_boolean(lexical: &str) -> bool {
    let lower = lexical.to_ascii_lowercase();
    lower == "true" || lower == "yes" || lexical.parse::<i64>().map(|v| v != 0).unwrap_or(false)
}

fn parse_double(lexical: &str) -> Option<f64> {
    match lexical {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        other => other.parse::<f64>().ok(),
    }
}

fn parse_time(lexical: &str) -> Option<NaiveTime> {
    let lexical = lexical.strip_suffix('Z').unwrap_or(lexical);
    NaiveTime::parse_from_str(lexical, "%H:%M:%S%.f").ok()
}

fn parse_datetime(lexical: &str) -> Option<NaiveDateTime> {
    let lexical = lexical.strip_suffix('Z').unwrap_or(lexical);
    NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f").ok()
}
