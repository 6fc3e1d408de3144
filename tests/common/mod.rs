//! In-memory stand-in for the connectivity layer used by the integration
//! tests. Understands the statement shapes the engine generates plus the
//! plain CREATE/DROP/SELECT forms the tests issue directly; it is a test
//! double, not a SQL engine.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rowbean::{Connection, DaoError, Result, Rows, Value};

#[derive(Default)]
struct Table {
    columns: Vec<String>,
    pk: Option<usize>,
    next_key: i64,
    rows: Vec<Vec<Value>>,
}

impl Table {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn sorted_rows(&self) -> Vec<Vec<Value>> {
        let mut rows = self.rows.clone();
        if let Some(pk) = self.pk {
            rows.sort_by_key(|row| row[pk].as_i64().unwrap_or(i64::MAX));
        }
        rows
    }
}

#[derive(Default)]
struct Store {
    tables: HashMap<String, Table>,
}

/// Cloning shares the underlying storage, so a test can keep a handle for
/// inspection while a session owns (and later closes) its own clone.
#[derive(Clone, Default)]
pub struct MemoryConnection {
    store: Arc<Mutex<Store>>,
    closed: Arc<AtomicBool>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.store
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    fn check_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DaoError::Connectivity("connection is closed".into()));
        }
        Ok(())
    }

    fn run(&mut self, sql: &str, params: &[Value]) -> Result<Outcome> {
        self.check_open()?;
        let sql = sql.trim();
        let mut store = self.store.lock().unwrap();

        if let Some(rest) = strip_keyword(sql, "CREATE TABLE") {
            return create_table(&mut store, rest);
        }
        if let Some(rest) = strip_keyword(sql, "DROP TABLE") {
            return drop_table(&mut store, rest);
        }
        if let Some(rest) = strip_keyword(sql, "INSERT INTO") {
            return insert(&mut store, rest, params);
        }
        if let Some(rest) = strip_keyword(sql, "UPDATE") {
            return update(&mut store, rest, params);
        }
        if let Some(rest) = strip_keyword(sql, "DELETE FROM") {
            return delete(&mut store, rest, params);
        }
        if let Some(rest) = strip_keyword(sql, "SELECT") {
            return select(&store, rest, params);
        }
        Err(DaoError::Connectivity(format!(
            "unsupported statement: {}",
            sql
        )))
    }
}

enum Outcome {
    Affected(u64),
    Key(Value),
    Result(Rows),
}

impl Connection for MemoryConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        match self.run(sql, params)? {
            Outcome::Affected(n) => Ok(n),
            Outcome::Key(_) => Ok(1),
            Outcome::Result(rows) => Ok(rows.row_count() as u64),
        }
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<Rows> {
        match self.run(sql, params)? {
            Outcome::Result(rows) => Ok(rows),
            _ => Err(DaoError::Connectivity(format!(
                "statement returns no result set: {}",
                sql
            ))),
        }
    }

    fn insert_returning_key(&mut self, sql: &str, params: &[Value]) -> Result<Value> {
        match self.run(sql, params)? {
            Outcome::Key(key) => Ok(key),
            _ => Err(DaoError::Connectivity(format!(
                "statement is not an insert: {}",
                sql
            ))),
        }
    }

    fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

fn connectivity(msg: impl Into<String>) -> DaoError {
    DaoError::Connectivity(msg.into())
}

fn strip_keyword<'a>(sql: &'a str, keyword: &str) -> Option<&'a str> {
    if sql.len() >= keyword.len() && sql[..keyword.len()].eq_ignore_ascii_case(keyword) {
        Some(sql[keyword.len()..].trim_start())
    } else {
        None
    }
}

fn ident(token: &str) -> String {
    token
        .trim()
        .trim_matches(|c| c == '"' || c == '`')
        .to_lowercase()
}

/// Splits on `sep`, ignoring separators inside parentheses.
fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in s.chars() {
        match ch {
            '(' => {
                depth += 1;
                current.push(ch);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            c if c == sep && depth == 0 => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Returns the text between the first top-level '(' and its matching ')'.
fn parenthesized(s: &str) -> Result<(&str, &str)> {
    let open = s
        .find('(')
        .ok_or_else(|| connectivity(format!("expected '(' in: {}", s)))?;
    let mut depth = 0usize;
    for (idx, ch) in s.char_indices().skip(open) {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&s[open + 1..idx], &s[idx + 1..]));
                }
            }
            _ => {}
        }
    }
    Err(connectivity(format!("unbalanced parentheses in: {}", s)))
}

fn find_keyword(s: &str, keyword: &str) -> Option<usize> {
    let upper = s.to_uppercase();
    upper.find(keyword)
}

/// Parses a trailing `WHERE <col> = ?` clause, if present.
fn where_clause(s: &str) -> Result<Option<String>> {
    let Some(idx) = find_keyword(s, "WHERE") else {
        return Ok(None);
    };
    let clause = s[idx + "WHERE".len()..].trim();
    let Some((col, rhs)) = clause.split_once('=') else {
        return Err(connectivity(format!("unsupported WHERE clause: {}", clause)));
    };
    if rhs.trim() != "?" {
        return Err(connectivity(format!("unsupported WHERE clause: {}", clause)));
    }
    Ok(Some(ident(col)))
}

fn create_table(store: &mut Store, rest: &str) -> Result<Outcome> {
    let name = ident(rest.split(['(', ' ']).next().unwrap_or(""));
    if name.is_empty() {
        return Err(connectivity("CREATE TABLE without a table name"));
    }
    if store.tables.contains_key(&name) {
        return Err(connectivity(format!("table '{}' already exists", name)));
    }

    let (defs, _) = parenthesized(rest)?;
    let mut table = Table {
        next_key: 1000,
        ..Table::default()
    };
    for def in split_top_level(defs, ',') {
        let column = ident(def.split_whitespace().next().unwrap_or(""));
        if column.is_empty() {
            return Err(connectivity(format!("bad column definition: {}", def)));
        }
        if find_keyword(&def, "PRIMARY KEY").is_some() {
            table.pk = Some(table.columns.len());
        }
        table.columns.push(column);
    }
    store.tables.insert(name, table);
    Ok(Outcome::Affected(0))
}

fn drop_table(store: &mut Store, rest: &str) -> Result<Outcome> {
    let (rest, if_exists) = match strip_keyword(rest, "IF EXISTS") {
        Some(rest) => (rest, true),
        None => (rest, false),
    };
    let name = ident(rest);
    if store.tables.remove(&name).is_none() && !if_exists {
        return Err(connectivity(format!("table '{}' not found", name)));
    }
    Ok(Outcome::Affected(0))
}

fn insert(store: &mut Store, rest: &str, params: &[Value]) -> Result<Outcome> {
    let name = ident(rest.split(['(', ' ']).next().unwrap_or(""));
    let table = store
        .tables
        .get_mut(&name)
        .ok_or_else(|| connectivity(format!("table '{}' not found", name)))?;

    let insert_columns: Vec<String> = if find_keyword(rest, "DEFAULT VALUES").is_some() {
        Vec::new()
    } else {
        let (cols, _) = parenthesized(rest)?;
        split_top_level(cols, ',').iter().map(|c| ident(c)).collect()
    };
    if insert_columns.len() != params.len() {
        return Err(connectivity(format!(
            "expected {} parameters, got {}",
            insert_columns.len(),
            params.len()
        )));
    }

    let mut row = vec![Value::Null; table.columns.len()];
    for (column, value) in insert_columns.iter().zip(params) {
        let idx = table
            .column_index(column)
            .ok_or_else(|| connectivity(format!("column '{}' not found in '{}'", column, name)))?;
        row[idx] = value.clone();
    }

    let mut key = Value::Null;
    if let Some(pk) = table.pk {
        if row[pk].is_null() {
            table.next_key += 1;
            row[pk] = Value::Integer(table.next_key);
        } else if let Some(supplied) = row[pk].as_i64() {
            table.next_key = table.next_key.max(supplied);
        }
        if table.rows.iter().any(|existing| existing[pk] == row[pk]) {
            return Err(connectivity(format!(
                "duplicate key {} in table '{}'",
                row[pk], name
            )));
        }
        key = row[pk].clone();
    }

    table.rows.push(row);
    Ok(Outcome::Key(key))
}

fn update(store: &mut Store, rest: &str, params: &[Value]) -> Result<Outcome> {
    let name = ident(rest.split_whitespace().next().unwrap_or(""));
    let table = store
        .tables
        .get_mut(&name)
        .ok_or_else(|| connectivity(format!("table '{}' not found", name)))?;

    let set_at = find_keyword(rest, "SET")
        .ok_or_else(|| connectivity(format!("UPDATE without SET: {}", rest)))?;
    let after_set = &rest[set_at + "SET".len()..];
    let where_at = find_keyword(after_set, "WHERE").unwrap_or(after_set.len());
    let assignments: Vec<String> = split_top_level(&after_set[..where_at], ',')
        .iter()
        .map(|a| {
            a.split_once('=')
                .map(|(col, _)| ident(col))
                .ok_or_else(|| connectivity(format!("bad assignment: {}", a)))
        })
        .collect::<Result<_>>()?;

    let key_column = where_clause(after_set)?
        .ok_or_else(|| connectivity(format!("UPDATE without WHERE: {}", rest)))?;
    if params.len() != assignments.len() + 1 {
        return Err(connectivity(format!(
            "expected {} parameters, got {}",
            assignments.len() + 1,
            params.len()
        )));
    }
    let key = &params[assignments.len()];
    let key_idx = table
        .column_index(&key_column)
        .ok_or_else(|| connectivity(format!("column '{}' not found in '{}'", key_column, name)))?;

    let assignment_indexes: Vec<usize> = assignments
        .iter()
        .map(|column| {
            table.column_index(column).ok_or_else(|| {
                connectivity(format!("column '{}' not found in '{}'", column, name))
            })
        })
        .collect::<Result<_>>()?;

    let mut affected = 0u64;
    for row in &mut table.rows {
        if &row[key_idx] == key {
            for (idx, value) in assignment_indexes.iter().zip(params) {
                row[*idx] = value.clone();
            }
            affected += 1;
        }
    }
    Ok(Outcome::Affected(affected))
}

fn delete(store: &mut Store, rest: &str, params: &[Value]) -> Result<Outcome> {
    let name = ident(rest.split_whitespace().next().unwrap_or(""));
    let table = store
        .tables
        .get_mut(&name)
        .ok_or_else(|| connectivity(format!("table '{}' not found", name)))?;

    let key_column = where_clause(rest)?
        .ok_or_else(|| connectivity(format!("DELETE without WHERE: {}", rest)))?;
    let key = params
        .first()
        .ok_or_else(|| connectivity("DELETE expects one parameter"))?;
    let key_idx = table
        .column_index(&key_column)
        .ok_or_else(|| connectivity(format!("column '{}' not found in '{}'", key_column, name)))?;

    let before = table.rows.len();
    table.rows.retain(|row| &row[key_idx] != key);
    Ok(Outcome::Affected((before - table.rows.len()) as u64))
}

fn select(store: &Store, rest: &str, params: &[Value]) -> Result<Outcome> {
    let from_at = find_keyword(rest, "FROM")
        .ok_or_else(|| connectivity(format!("SELECT without FROM: {}", rest)))?;
    let column_list = rest[..from_at].trim();
    let after_from = rest[from_at + "FROM".len()..].trim_start();
    let name = ident(after_from.split_whitespace().next().unwrap_or(""));
    let table = store
        .tables
        .get(&name)
        .ok_or_else(|| connectivity(format!("table '{}' not found", name)))?;

    let projected: Vec<String> = if column_list == "*" {
        table.columns.clone()
    } else {
        split_top_level(column_list, ',')
            .iter()
            .map(|c| ident(c))
            .collect()
    };
    let indexes: Vec<usize> = projected
        .iter()
        .map(|column| {
            table.column_index(column).ok_or_else(|| {
                connectivity(format!("column '{}' not found in '{}'", column, name))
            })
        })
        .collect::<Result<_>>()?;

    let filter = match where_clause(after_from)? {
        Some(column) => {
            let key = params
                .first()
                .ok_or_else(|| connectivity("SELECT filter expects one parameter"))?;
            let idx = table.column_index(&column).ok_or_else(|| {
                connectivity(format!("column '{}' not found in '{}'", column, name))
            })?;
            Some((idx, key.clone()))
        }
        None => None,
    };

    let rows: Vec<Vec<Value>> = table
        .sorted_rows()
        .into_iter()
        .filter(|row| match &filter {
            Some((idx, key)) => &row[*idx] == key,
            None => true,
        })
        .map(|row| indexes.iter().map(|idx| row[*idx].clone()).collect())
        .collect();

    Ok(Outcome::Result(Rows::new(projected, rows)))
}
