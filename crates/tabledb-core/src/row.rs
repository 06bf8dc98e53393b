//! Typed row values.
//!
//! Rows are decoded once against their table's column types, so code further
//! down never inspects raw SQL values again.

use crate::catalog::ColumnType;
use crate::error::Error;
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// An attachment stored in an external blob store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobDescriptor {
    /// Folder inside the column's key directory.
    #[serde(default)]
    pub path: String,
    /// File name.
    pub name: String,
    /// Any other metadata the writer stored (size, type, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl BlobDescriptor {
    /// Create a descriptor without extra metadata.
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// `path/name`, without a leading separator when the path is empty.
    pub fn location(&self) -> String {
        self.location_with('/')
    }

    /// `path<sep>name`, without a leading separator when the path is empty.
    pub fn location_with(&self, separator: char) -> String {
        let path = self.path.trim_end_matches(['/', '\\']);
        if path.is_empty() {
            self.name.clone()
        } else {
            format!("{}{}{}", path, separator, self.name)
        }
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Real(f64),
    /// Text value.
    Text(String),
    /// Boolean value.
    Boolean(bool),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Blob descriptors of a files column.
    Files(Vec<BlobDescriptor>),
}

impl Value {
    /// Decode a stored value according to its column type.
    ///
    /// A files column whose text is not a descriptor list decodes as
    /// [`Value::Text`] so the row can still be deleted.
    pub fn decode(column_type: ColumnType, raw: SqlValue) -> Result<Self, Error> {
        let value = match (column_type, raw) {
            (_, SqlValue::Null) => Value::Null,
            (ColumnType::Boolean, SqlValue::Integer(i)) => Value::Boolean(i != 0),
            (ColumnType::Files, SqlValue::Text(text)) => {
                if text.trim().is_empty() {
                    Value::Files(Vec::new())
                } else {
                    match serde_json::from_str::<Vec<BlobDescriptor>>(&text) {
                        Ok(files) => Value::Files(files),
                        Err(_) => Value::Text(text),
                    }
                }
            }
            (ColumnType::Real, SqlValue::Integer(i)) => Value::Real(i as f64),
            (ColumnType::Integer, SqlValue::Real(f)) => {
                return Err(Error::InvalidData(format!(
                    "expected integer, found real {}",
                    f
                )))
            }
            (_, SqlValue::Integer(i)) => Value::Integer(i),
            (_, SqlValue::Real(f)) => Value::Real(f),
            (_, SqlValue::Text(s)) => Value::Text(s),
            (_, SqlValue::Blob(b)) => Value::Bytes(b),
        };
        Ok(value)
    }

    /// Check for NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer payload, if any.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Blob descriptors, if this is a files value.
    pub fn as_files(&self) -> Option<&[BlobDescriptor]> {
        match self {
            Value::Files(files) => Some(files),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<BlobDescriptor>> for Value {
    fn from(files: Vec<BlobDescriptor>) -> Self {
        Value::Files(files)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Files(files) => {
                let json = serde_json::to_string(files)
                    .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
                ToSqlOutput::Owned(SqlValue::Text(json))
            }
        })
    }
}

/// Named values in column order.
pub type Fields = Vec<(String, Value)>;

/// Look up a named value.
pub fn field<'a>(fields: &'a Fields, name: &str) -> Option<&'a Value> {
    fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

/// A fully decoded row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Table the row belongs to.
    pub table: String,
    /// Internal numeric key.
    pub id: i64,
    /// External identifier.
    pub reference_id: String,
    /// All column values, system columns included, in column order.
    pub values: Fields,
}

impl Row {
    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        field(&self.values, column)
    }
}
