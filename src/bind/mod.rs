//! Bean access and value binding.
//!
//! The engine never touches concrete struct fields; everything flows through
//! the [`Bean`] capability (get/set by attribute name over [`Value`]) plus
//! the type's static [`BeanSpec`]. `#[derive(Bean)]` generates the
//! implementation; writing one by hand works just as well.

use std::any::Any;

use chrono::{DateTime, NaiveDate, Utc};

use crate::connection::RowView;
use crate::core::{DaoError, DataType, Result, Value};
use crate::meta::{AttributeMapping, BeanSpec, TableMetadata};

/// Attribute-accessor capability every mapped bean type exposes.
pub trait Bean: Any + Send {
    /// Static declarative mapping for this type.
    fn spec(&self) -> &'static BeanSpec;

    /// Reads one attribute by name.
    fn get(&self, attribute: &str) -> Result<Value>;

    /// Writes one attribute by name, coercing `value` to the declared type.
    fn set(&mut self, attribute: &str, value: Value) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// Conversion between a native field type and the engine's [`Value`] model.
///
/// Implemented for the supported scalars and for `Option` of each; the derive
/// macro leans on it for field access and type tagging.
pub trait SqlValue: Sized {
    const DATA_TYPE: DataType;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;
    fn from_value(value: Value) -> Result<Self>;
}

fn reject_null<T>(target: &str) -> Result<T> {
    Err(DaoError::Binding(format!(
        "NULL cannot populate non-nullable {} attribute",
        target
    )))
}

impl SqlValue for i64 {
    const DATA_TYPE: DataType = DataType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.coerce_to(&DataType::Integer)? {
            Value::Integer(i) => Ok(i),
            _ => reject_null("INTEGER"),
        }
    }
}

impl SqlValue for i32 {
    const DATA_TYPE: DataType = DataType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        i32::try_from(wide)
            .map_err(|_| DaoError::Binding(format!("value {} overflows i32", wide)))
    }
}

impl SqlValue for i16 {
    const DATA_TYPE: DataType = DataType::Integer;

    fn to_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        let wide = i64::from_value(value)?;
        i16::try_from(wide)
            .map_err(|_| DaoError::Binding(format!("value {} overflows i16", wide)))
    }
}

impl SqlValue for f64 {
    const DATA_TYPE: DataType = DataType::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.coerce_to(&DataType::Float)? {
            Value::Float(f) => Ok(f),
            _ => reject_null("FLOAT"),
        }
    }
}

impl SqlValue for f32 {
    const DATA_TYPE: DataType = DataType::Float;

    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }

    fn from_value(value: Value) -> Result<Self> {
        Ok(f64::from_value(value)? as f32)
    }
}

impl SqlValue for bool {
    const DATA_TYPE: DataType = DataType::Boolean;

    fn to_value(&self) -> Value {
        Value::Boolean(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.coerce_to(&DataType::Boolean)? {
            Value::Boolean(b) => Ok(b),
            _ => reject_null("BOOLEAN"),
        }
    }
}

impl SqlValue for String {
    const DATA_TYPE: DataType = DataType::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.coerce_to(&DataType::Text)? {
            Value::Text(s) => Ok(s),
            _ => reject_null("TEXT"),
        }
    }
}

impl SqlValue for DateTime<Utc> {
    const DATA_TYPE: DataType = DataType::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.coerce_to(&DataType::Timestamp)? {
            Value::Timestamp(t) => Ok(t),
            _ => reject_null("TIMESTAMP"),
        }
    }
}

impl SqlValue for NaiveDate {
    const DATA_TYPE: DataType = DataType::Date;

    fn to_value(&self) -> Value {
        Value::Date(*self)
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.coerce_to(&DataType::Date)? {
            Value::Date(d) => Ok(d),
            _ => reject_null("DATE"),
        }
    }
}

impl SqlValue for Vec<u8> {
    const DATA_TYPE: DataType = DataType::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value.coerce_to(&DataType::Bytes)? {
            Value::Bytes(b) => Ok(b),
            _ => reject_null("BYTES"),
        }
    }
}

impl<T: SqlValue> SqlValue for Option<T> {
    const DATA_TYPE: DataType = T::DATA_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(None);
        }
        T::from_value(value).map(Some)
    }
}

/// Reads attribute values in the order a statement's placeholders expect,
/// coercing each to its declared type. `None` fields bind as SQL NULL.
pub fn bind_parameters(
    meta: &TableMetadata,
    bean: &dyn Bean,
    bind_order: &[&'static str],
) -> Result<Vec<Value>> {
    bind_order
        .iter()
        .map(|name| {
            let attr = meta.attribute(name).ok_or_else(|| {
                DaoError::Binding(format!("statement binds unknown attribute '{}'", name))
            })?;
            bean.get(name)?.coerce_to(&attr.data_type)
        })
        .collect()
}

/// Writes the key the database generated back onto the bean.
///
/// A NULL or non-positive integer report means the driver had nothing for us;
/// the attribute is left alone.
pub fn write_generated_key(
    bean: &mut dyn Bean,
    pk: &AttributeMapping,
    generated: Value,
) -> Result<()> {
    match generated {
        Value::Null => Ok(()),
        Value::Integer(i) if i <= 0 => Ok(()),
        value => bean.set(pk.attribute, value.coerce_to(&pk.data_type)?),
    }
}

/// Writes every mapped column present in `row` onto an existing bean.
///
/// Row columns with no mapping are ignored; mapped attributes missing from
/// the row keep their current value, as does a non-nullable attribute facing
/// a NULL column.
pub fn populate(meta: &TableMetadata, bean: &mut dyn Bean, row: &RowView<'_>) -> Result<()> {
    for (column, value) in row.entries() {
        let Some(attr) = meta.attribute_for_column(column) else {
            continue;
        };
        if value.is_null() && !attr.nullable {
            continue;
        }
        bean.set(attr.attribute, value.coerce_to(&attr.data_type)?)?;
    }
    Ok(())
}

/// Builds a brand-new bean from a result row.
pub fn materialize<B: Bean + Default>(meta: &TableMetadata, row: &RowView<'_>) -> Result<B> {
    let mut bean = B::default();
    populate(meta, &mut bean, row)?;
    Ok(bean)
}
