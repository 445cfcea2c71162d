//! Result types for shardquery.
//!
//! Defines the canonical, driver-independent shape of a federated result:
//! columns with a reduced type set, and rows keyed by column name.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Wire format for datetime values.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Wire format for date values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Datetime layouts accepted when parsing, in order of preference.
const DATETIME_INPUT_FORMATS: &[&str] = &[DATETIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f"];

/// Wire names for floats JSON numbers cannot carry.
const NAN: &str = "NaN";
const INFINITY: &str = "Infinity";
const NEG_INFINITY: &str = "-Infinity";

fn non_finite_name(f: f64) -> Option<&'static str> {
    if f.is_nan() {
        Some(NAN)
    } else if f == f64::INFINITY {
        Some(INFINITY)
    } else if f == f64::NEG_INFINITY {
        Some(NEG_INFINITY)
    } else {
        None
    }
}

fn parse_non_finite(s: &str) -> Option<f64> {
    match s {
        NAN => Some(f64::NAN),
        INFINITY => Some(f64::INFINITY),
        NEG_INFINITY => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Driver-independent column type.
///
/// Serialized as a lowercase string; `Unknown` is serialized as `null`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CanonicalType {
    Integer,
    Float,
    String,
    Boolean,
    Date,
    Datetime,
    /// Native type with no canonical counterpart.
    #[default]
    Unknown,
}

impl CanonicalType {
    /// Returns the wire name, or `None` for `Unknown`.
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Self::Integer => Some("integer"),
            Self::Float => Some("float"),
            Self::String => Some("string"),
            Self::Boolean => Some("boolean"),
            Self::Date => Some("date"),
            Self::Datetime => Some("datetime"),
            Self::Unknown => None,
        }
    }

    /// Parses a wire name. Unrecognised names map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "integer" => Self::Integer,
            "float" => Self::Float,
            "string" => Self::String,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::Datetime,
            _ => Self::Unknown,
        }
    }
}

impl Serialize for CanonicalType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_str() {
            Some(name) => serializer.serialize_str(name),
            None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for CanonicalType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(name
            .as_deref()
            .map(CanonicalType::parse)
            .unwrap_or(CanonicalType::Unknown))
    }
}

/// A column in a federated result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name, unique within a result.
    pub name: String,

    /// Display name.
    pub friendly_name: String,

    /// Canonical column type.
    #[serde(rename = "type")]
    pub column_type: CanonicalType,
}

impl Column {
    /// Creates a column whose friendly name equals its name.
    pub fn new(name: impl Into<String>, column_type: CanonicalType) -> Self {
        let name = name.into();
        Self {
            friendly_name: name.clone(),
            name,
            column_type,
        }
    }
}

/// A row: column name to value. Rows only carry the keys their shard produced.
pub type Row = BTreeMap<String, Value>;

/// A single scalar value from a shard.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Text/string value.
    String(String),

    /// Calendar date.
    Date(NaiveDate),

    /// Date and time without zone.
    DateTime(NaiveDateTime),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::DateTime(dt) => dt.format(DATETIME_FORMAT).to_string(),
        }
    }

    /// Converts the value to the form a column of type `ty` carries on the
    /// wire, so that decoding the encoded value under `ty` yields it back.
    ///
    /// Ints widen to floats under `float`, and date strings parse under
    /// `date`/`datetime`. Dates outside those columns and non-finite floats
    /// outside `float` become strings. NULL is kept everywhere.
    pub fn conform(self, ty: CanonicalType) -> Value {
        match (ty, self) {
            (_, Value::Null) => Value::Null,
            (CanonicalType::Float, Value::Int(i)) => Value::Float(i as f64),
            (CanonicalType::Float, Value::Float(f)) => Value::Float(f),
            (CanonicalType::Float, Value::String(s)) => match parse_non_finite(&s) {
                Some(f) => Value::Float(f),
                None => Value::String(s),
            },
            (CanonicalType::Date, Value::Date(d)) => Value::Date(d),
            (CanonicalType::Date, Value::String(s)) => {
                match NaiveDate::parse_from_str(&s, DATE_FORMAT) {
                    Ok(d) => Value::Date(d),
                    Err(_) => Value::String(s),
                }
            }
            (CanonicalType::Datetime, Value::DateTime(dt)) => Value::DateTime(dt),
            (CanonicalType::Datetime, Value::Date(d)) => {
                Value::DateTime(d.and_time(NaiveTime::MIN))
            }
            (CanonicalType::Datetime, Value::String(s)) => match parse_datetime(&s) {
                Some(dt) => Value::DateTime(dt),
                None => Value::String(s),
            },
            (_, Value::Float(f)) => match non_finite_name(f) {
                Some(name) => Value::String(name.to_string()),
                None => Value::Float(f),
            },
            (_, value @ (Value::Date(_) | Value::DateTime(_))) => {
                Value::String(value.to_display_string())
            }
            (_, value) => value,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => match non_finite_name(*f) {
                Some(name) => serializer.serialize_str(name),
                None => serializer.serialize_f64(*f),
            },
            Value::String(s) => serializer.serialize_str(s),
            Value::Date(_) | Value::DateTime(_) => {
                serializer.serialize_str(&self.to_display_string())
            }
        }
    }
}

// Conversion implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// The merged result of one federated query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FederatedResult {
    /// Ordered column definitions.
    pub columns: Vec<Column>,

    /// Ordered rows.
    pub rows: Vec<Row>,
}

impl FederatedResult {
    /// Creates a new empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a result with the given columns and rows.
    pub fn with_data(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Returns true if the result has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
