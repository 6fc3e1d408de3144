//! Statement-template generation. Every function here is a pure function of
//! resolved metadata: same mapping in, same text out. Placeholders are
//! positional (`?`); vendor-specific auto-increment syntax is never emitted,
//! since generated keys are the connectivity layer's job to report.

use crate::core::{DaoError, Result};
use crate::meta::{AttributeMapping, TableMetadata};

/// Statement text plus the attribute order its placeholders bind in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    pub bind_order: Vec<&'static str>,
}

/// INSERT over all non-primary-key attributes: the path where the database
/// generates the key.
pub fn insert(meta: &TableMetadata) -> Statement {
    build_insert(meta, meta.attributes().iter().filter(|a| !a.primary_key))
}

/// INSERT over every attribute, the primary key at its declaration position:
/// the caller-supplied-key path. Identical to [`insert`] when the mapping has
/// no primary key.
pub fn insert_with_key(meta: &TableMetadata) -> Statement {
    build_insert(meta, meta.attributes().iter())
}

fn build_insert<'a>(
    meta: &TableMetadata,
    columns: impl Iterator<Item = &'a AttributeMapping>,
) -> Statement {
    let columns: Vec<&AttributeMapping> = columns.collect();
    if columns.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {} DEFAULT VALUES", meta.table_name()),
            bind_order: Vec::new(),
        };
    }

    let names: Vec<&str> = columns.iter().map(|a| a.column.as_str()).collect();
    let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            meta.table_name(),
            names.join(", "),
            placeholders.join(", ")
        ),
        bind_order: columns.iter().map(|a| a.attribute).collect(),
    }
}

/// UPDATE of all non-key columns filtered by primary-key equality. The key
/// parameter binds last.
pub fn update(meta: &TableMetadata) -> Result<Statement> {
    let pk = require_key(meta, "UPDATE")?;
    let assignments: Vec<&AttributeMapping> =
        meta.attributes().iter().filter(|a| !a.primary_key).collect();
    if assignments.is_empty() {
        return Err(DaoError::Mapping(format!(
            "table '{}' maps only its primary key; nothing to update",
            meta.table_name()
        )));
    }

    let set_clause: Vec<String> = assignments
        .iter()
        .map(|a| format!("{} = ?", a.column))
        .collect();
    let mut bind_order: Vec<&'static str> = assignments.iter().map(|a| a.attribute).collect();
    bind_order.push(pk.attribute);

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {} = ?",
            meta.table_name(),
            set_clause.join(", "),
            pk.column
        ),
        bind_order,
    })
}

pub fn delete(meta: &TableMetadata) -> Result<Statement> {
    let pk = require_key(meta, "DELETE")?;
    Ok(Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} = ?",
            meta.table_name(),
            pk.column
        ),
        bind_order: vec![pk.attribute],
    })
}

pub fn select_by_key(meta: &TableMetadata) -> Result<Statement> {
    let pk = require_key(meta, "SELECT")?;
    let columns: Vec<&str> = meta
        .attributes()
        .iter()
        .map(|a| a.column.as_str())
        .collect();
    Ok(Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE {} = ?",
            columns.join(", "),
            meta.table_name(),
            pk.column
        ),
        bind_order: vec![pk.attribute],
    })
}

/// Existence-check fragment: selects only the key column.
pub fn exists(meta: &TableMetadata) -> Result<Statement> {
    let pk = require_key(meta, "SELECT")?;
    Ok(Statement {
        sql: format!(
            "SELECT {} FROM {} WHERE {} = ?",
            pk.column,
            meta.table_name(),
            pk.column
        ),
        bind_order: vec![pk.attribute],
    })
}

fn require_key<'m>(meta: &'m TableMetadata, operation: &str) -> Result<&'m AttributeMapping> {
    meta.primary_key().ok_or_else(|| {
        DaoError::Mapping(format!(
            "{} requires a primary key, table '{}' maps none",
            operation,
            meta.table_name()
        ))
    })
}
