use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};

use crate::core::{DaoError, Result};

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Integer(_) => "INTEGER",
            Self::Float(_) => "FLOAT",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::Date(_) => "DATE",
            Self::Bytes(_) => "BYTES",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Converts this value into the representation `target` expects.
    ///
    /// NULL passes through untouched. Conversions that would lose or invent
    /// information fail with a `Binding` error.
    pub fn coerce_to(&self, target: &DataType) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        if target.is_compatible(self) {
            return Ok(self.clone());
        }

        let coerced = match (self, target) {
            (Self::Integer(i), DataType::Float) => Some(Value::Float(*i as f64)),
            (Self::Float(f), DataType::Integer) if f.fract() == 0.0 && f.is_finite() => {
                Some(Value::Integer(*f as i64))
            }
            (Self::Integer(0), DataType::Boolean) => Some(Value::Boolean(false)),
            (Self::Integer(1), DataType::Boolean) => Some(Value::Boolean(true)),
            (Self::Boolean(b), DataType::Integer) => Some(Value::Integer(i64::from(*b))),
            (Self::Timestamp(t), DataType::Text) => Some(Value::Text(t.to_rfc3339())),
            (Self::Date(d), DataType::Text) => Some(Value::Text(d.to_string())),
            // Drivers commonly hand temporal and numeric columns back as text.
            (Self::Text(s), DataType::Timestamp) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| Value::Timestamp(t.with_timezone(&Utc))),
            (Self::Text(s), DataType::Date) => {
                s.parse::<NaiveDate>().ok().map(Value::Date)
            }
            (Self::Text(s), DataType::Integer) => s.trim().parse::<i64>().ok().map(Value::Integer),
            (Self::Text(s), DataType::Float) => s.trim().parse::<f64>().ok().map(Value::Float),
            (Self::Text(s), DataType::Boolean) => match s.trim() {
                "true" | "TRUE" | "1" => Some(Value::Boolean(true)),
                "false" | "FALSE" | "0" => Some(Value::Boolean(false)),
                _ => None,
            },
            _ => None,
        };

        coerced.ok_or_else(|| {
            DaoError::Binding(format!(
                "cannot coerce {} value to {}",
                self.type_name(),
                target
            ))
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            // Numeric columns come back as either variant depending on the driver.
            (Self::Integer(i), Self::Float(f)) | (Self::Float(f), Self::Integer(i)) => {
                *i as f64 == *f
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(fl) => write!(f, "{}", fl),
            Self::Text(s) => write!(f, "{}", s),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Date(d) => write!(f, "{}", d),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Semantic type tag carried by every attribute mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Date,
    Bytes,
}

impl DataType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Date, Value::Date(_)) => true,
            (Self::Bytes, Value::Bytes(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Timestamp => write!(f, "TIMESTAMP"),
            Self::Date => write!(f, "DATE"),
            Self::Bytes => write!(f, "BYTES"),
        }
    }
}
