//! Table-mapping metadata: the declarative surface bean types expose, the
//! resolved per-type mapping, and the cache that makes resolution a
//! once-per-type cost.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::core::{DaoError, DataType, Result};

/// Declarative mapping surface a bean type exposes.
///
/// Usually emitted by `#[derive(Bean)]`; hand-written implementations supply
/// the same static data. Raw declarations only; normalization, validation
/// and primary-key selection happen in [`MetadataCache::resolve`].
#[derive(Debug)]
pub struct BeanSpec {
    /// Simple type name, used to derive a table name when no override is given.
    pub bean_name: &'static str,
    /// Declarative table-name override.
    pub table: Option<&'static str>,
    /// Persistable attributes in declaration order.
    pub attributes: &'static [AttributeSpec],
}

#[derive(Debug)]
pub struct AttributeSpec {
    pub name: &'static str,
    /// Declarative column-name override.
    pub column: Option<&'static str>,
    pub data_type: DataType,
    /// Attribute accepts NULL (an `Option` field).
    pub nullable: bool,
    /// Explicit primary-key marker.
    pub primary_key: bool,
}

/// Resolved mapping for one bean type. Immutable after construction and
/// shared read-only behind an `Arc`.
#[derive(Debug)]
pub struct TableMetadata {
    table_name: String,
    attributes: Vec<AttributeMapping>,
    primary_key: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AttributeMapping {
    pub attribute: &'static str,
    pub column: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl TableMetadata {
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn attributes(&self) -> &[AttributeMapping] {
        &self.attributes
    }

    pub fn primary_key(&self) -> Option<&AttributeMapping> {
        self.primary_key.map(|idx| &self.attributes[idx])
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeMapping> {
        self.attributes.iter().find(|a| a.attribute == name)
    }

    /// Column lookup is case-insensitive; drivers disagree about the case of
    /// result-set column labels.
    pub fn attribute_for_column(&self, column: &str) -> Option<&AttributeMapping> {
        self.attributes
            .iter()
            .find(|a| a.column.eq_ignore_ascii_case(column))
    }
}

fn resolve_spec(spec: &BeanSpec) -> Result<TableMetadata> {
    if spec.attributes.is_empty() {
        return Err(DaoError::Mapping(format!(
            "bean '{}' has no persistable attributes",
            spec.bean_name
        )));
    }

    let table_name = spec
        .table
        .map(str::to_string)
        .unwrap_or_else(|| to_snake_case(spec.bean_name));

    let mut attributes: Vec<AttributeMapping> = Vec::with_capacity(spec.attributes.len());
    let mut explicit_pk: Option<usize> = None;

    for (idx, attr) in spec.attributes.iter().enumerate() {
        let column = attr
            .column
            .map(str::to_string)
            .unwrap_or_else(|| attr.name.to_lowercase());

        if attributes
            .iter()
            .any(|a| a.column.eq_ignore_ascii_case(&column))
        {
            return Err(DaoError::Mapping(format!(
                "column '{}' is mapped by more than one attribute of bean '{}'",
                column, spec.bean_name
            )));
        }

        if attr.primary_key && explicit_pk.replace(idx).is_some() {
            return Err(DaoError::Mapping(format!(
                "bean '{}' marks more than one attribute as primary key",
                spec.bean_name
            )));
        }

        attributes.push(AttributeMapping {
            attribute: attr.name,
            column,
            data_type: attr.data_type,
            nullable: attr.nullable,
            primary_key: attr.primary_key,
        });
    }

    // Convention default: an attribute literally named "id".
    let primary_key = explicit_pk.or_else(|| {
        attributes
            .iter()
            .position(|a| a.attribute.eq_ignore_ascii_case("id"))
    });
    if let Some(idx) = primary_key {
        attributes[idx].primary_key = true;
    }

    Ok(TableMetadata {
        table_name,
        attributes,
        primary_key,
    })
}

fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Shared metadata cache keyed by bean type.
///
/// Cloning shares the underlying map, so a cache can be handed to several
/// sessions; each session also works fine with its own private instance.
/// Population on a miss is idempotent: resolution is deterministic, so a
/// race that resolves the same type twice keeps whichever entry landed first.
#[derive(Clone, Default)]
pub struct MetadataCache {
    inner: Arc<RwLock<HashMap<TypeId, Arc<TableMetadata>>>>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the resolved mapping for `type_id`, building it from `spec`
    /// on first use.
    pub fn resolve(&self, type_id: TypeId, spec: &BeanSpec) -> Result<Arc<TableMetadata>> {
        if let Some(found) = self.inner.read()?.get(&type_id) {
            log::trace!("#resolve - cache hit for {}", spec.bean_name);
            return Ok(Arc::clone(found));
        }

        let metadata = Arc::new(resolve_spec(spec)?);
        log::trace!(
            "#resolve - mapped bean '{}' to table '{}'",
            spec.bean_name,
            metadata.table_name()
        );

        let mut map = self.inner.write()?;
        Ok(Arc::clone(map.entry(type_id).or_insert(metadata)))
    }
}
