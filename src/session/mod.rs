//! The DAO session: binds one bean at a time and sequences CRUD, upsert and
//! query operations against the connectivity layer.

use std::any::TypeId;
use std::sync::{Arc, Mutex};

use crate::bind::{self, Bean};
use crate::connection::Connection;
use crate::core::{DaoError, Result, Value};
use crate::meta::{MetadataCache, TableMetadata};
use crate::sql;

enum Handle {
    /// Connection owned by this session; closed when the session is dropped.
    Owned(Box<dyn Connection>),
    /// Externally supplied connection; never closed by the session.
    Shared(Arc<Mutex<dyn Connection>>),
}

impl Handle {
    fn with<R>(&mut self, op: impl FnOnce(&mut dyn Connection) -> Result<R>) -> Result<R> {
        match self {
            Handle::Owned(conn) => op(conn.as_mut()),
            Handle::Shared(conn) => {
                let mut guard = conn
                    .lock()
                    .map_err(|_| DaoError::Connectivity("shared connection poisoned".into()))?;
                op(&mut *guard)
            }
        }
    }
}

/// Session over one "current bean".
///
/// Single-threaded by design: one mutable bean slot, one connection handle.
/// Wrap the session itself if several threads must share it.
///
/// # Examples
///
/// ```ignore
/// use rowbean::{Bean, Session};
///
/// #[derive(Bean, Default)]
/// #[bean(table = "t_school")]
/// struct School {
///     id: Option<i32>,
///     principal: Option<String>,
///     name: String,
///     address: String,
/// }
///
/// let mut dao = Session::new(driver_connection());
/// let school = School { name: "USC".into(), ..Default::default() };
/// let id = dao.set_bean(school)?.insert()?;
/// let all: Vec<School> = dao.get_list("SELECT * FROM t_school", &[])?;
/// ```
pub struct Session {
    handle: Handle,
    cache: MetadataCache,
    bean: Option<Box<dyn Bean>>,
    metadata: Option<Arc<TableMetadata>>,
}

impl Session {
    /// Creates a session owning `conn`; the connection is closed when the
    /// session is dropped.
    pub fn new<C: Connection + 'static>(conn: C) -> Self {
        Self::with_cache(conn, MetadataCache::new())
    }

    pub fn with_cache<C: Connection + 'static>(conn: C, cache: MetadataCache) -> Self {
        Self {
            handle: Handle::Owned(Box::new(conn)),
            cache,
            bean: None,
            metadata: None,
        }
    }

    /// Creates a session borrowing an externally managed connection. The
    /// session never closes it.
    pub fn shared(conn: Arc<Mutex<dyn Connection>>) -> Self {
        Self::shared_with_cache(conn, MetadataCache::new())
    }

    pub fn shared_with_cache(conn: Arc<Mutex<dyn Connection>>, cache: MetadataCache) -> Self {
        Self {
            handle: Handle::Shared(conn),
            cache,
            bean: None,
            metadata: None,
        }
    }

    /// Binds `bean` as the current bean, resolving (and caching) its table
    /// mapping. Returns the session for chaining.
    pub fn set_bean<B: Bean>(&mut self, bean: B) -> Result<&mut Self> {
        let metadata = self.cache.resolve(TypeId::of::<B>(), bean.spec())?;
        self.metadata = Some(metadata);
        self.bean = Some(Box::new(bean));
        Ok(self)
    }

    pub fn is_bound(&self) -> bool {
        self.bean.is_some()
    }

    /// Typed view of the current bean.
    pub fn bean_ref<B: Bean>(&self) -> Option<&B> {
        self.bean.as_ref()?.as_any().downcast_ref()
    }

    pub fn bean_mut<B: Bean>(&mut self) -> Option<&mut B> {
        self.bean.as_mut()?.as_any_mut().downcast_mut()
    }

    /// Unbinds and returns the current bean, with any key write-backs applied.
    pub fn take_bean<B: Bean>(&mut self) -> Result<B> {
        let matches = self
            .bean
            .as_ref()
            .is_some_and(|bean| bean.as_any().is::<B>());
        if !matches {
            return Err(DaoError::State(
                "no bean of the requested type is bound".into(),
            ));
        }
        let bean = self.bean.take().ok_or_else(|| {
            DaoError::State("no bean of the requested type is bound".into())
        })?;
        self.metadata = None;
        bean.into_any()
            .downcast::<B>()
            .map(|bean| *bean)
            .map_err(|_| DaoError::State("no bean of the requested type is bound".into()))
    }

    /// Inserts the current bean as a new row.
    ///
    /// With an unset primary key the key column is omitted and the value the
    /// database generated is written back onto the bean; a caller-populated
    /// key is sent along instead. Returns the effective key value
    /// (`Value::Null` when the mapping has no primary key).
    pub fn insert(&mut self) -> Result<Value> {
        let meta = self.require_metadata()?;
        let key_state = match meta.primary_key() {
            Some(pk) => {
                let current = self.require_bean()?.get(pk.attribute)?;
                Some((pk, current))
            }
            None => None,
        };
        let caller_keyed = matches!(&key_state, Some((_, value)) if !is_unset_key(value));

        let stmt = if caller_keyed {
            sql::insert_with_key(&meta)
        } else {
            sql::insert(&meta)
        };
        let params = bind::bind_parameters(&meta, self.require_bean()?, &stmt.bind_order)?;
        log::debug!("#insert - {}", stmt.sql);

        match key_state {
            Some((pk, _)) if !caller_keyed => {
                let generated = self
                    .handle
                    .with(|conn| conn.insert_returning_key(&stmt.sql, &params))?;
                let bean = self.require_bean_mut()?;
                bind::write_generated_key(bean, pk, generated)?;
                bean.get(pk.attribute)
            }
            Some((_, supplied)) => {
                self.handle.with(|conn| conn.execute(&stmt.sql, &params))?;
                Ok(supplied)
            }
            None => {
                self.handle.with(|conn| conn.execute(&stmt.sql, &params))?;
                Ok(Value::Null)
            }
        }
    }

    /// Updates the row matching the current bean's primary key. Returns the
    /// affected-row count: 0 means no matching row, not an error.
    pub fn update(&mut self) -> Result<u64> {
        let meta = self.require_metadata()?;
        let stmt = sql::update(&meta)?;
        self.require_populated_key(&meta)?;
        let params = bind::bind_parameters(&meta, self.require_bean()?, &stmt.bind_order)?;
        log::debug!("#update - {}", stmt.sql);
        self.handle.with(|conn| conn.execute(&stmt.sql, &params))
    }

    /// Deletes the row matching the current bean's primary key. True iff
    /// exactly one row was removed.
    pub fn delete(&mut self) -> Result<bool> {
        let meta = self.require_metadata()?;
        let stmt = sql::delete(&meta)?;
        self.require_populated_key(&meta)?;
        let params = bind::bind_parameters(&meta, self.require_bean()?, &stmt.bind_order)?;
        log::debug!("#delete - {}", stmt.sql);
        let affected = self.handle.with(|conn| conn.execute(&stmt.sql, &params))?;
        Ok(affected == 1)
    }

    /// Loads the row matching the current bean's primary key and writes its
    /// columns onto the bean. False (bean untouched) when no row matches.
    pub fn select(&mut self) -> Result<bool> {
        let meta = self.require_metadata()?;
        let stmt = sql::select_by_key(&meta)?;
        self.require_populated_key(&meta)?;
        let params = bind::bind_parameters(&meta, self.require_bean()?, &stmt.bind_order)?;
        log::debug!("#select - {}", stmt.sql);
        let rows = self.handle.with(|conn| conn.query(&stmt.sql, &params))?;
        match rows.first() {
            Some(row) => {
                bind::populate(&meta, self.require_bean_mut()?, &row)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Insert-or-update decided by row existence.
    ///
    /// An unset key means a new row. A populated key alone does not prove the
    /// row exists (callers may assign keys to new rows), so it costs one
    /// existence check before choosing update or keyed insert.
    pub fn save(&mut self) -> Result<u64> {
        let meta = self.require_metadata()?;
        let current = match meta.primary_key() {
            Some(pk) => self.require_bean()?.get(pk.attribute)?,
            None => {
                self.insert()?;
                return Ok(1);
            }
        };
        if is_unset_key(&current) {
            log::debug!("#save - insert new record");
            self.insert()?;
            return Ok(1);
        }

        let stmt = sql::exists(&meta)?;
        let params = bind::bind_parameters(&meta, self.require_bean()?, &stmt.bind_order)?;
        let found = self.handle.with(|conn| conn.query(&stmt.sql, &params))?;
        if found.is_empty() {
            log::debug!("#save - insert with caller-supplied key");
            self.insert()?;
            Ok(1)
        } else {
            log::debug!("#save - update existing record");
            self.update()
        }
    }

    /// Runs an arbitrary SELECT and materializes each row into a `B`.
    /// Result order follows the cursor. The current bean is left untouched.
    pub fn get_list<B: Bean + Default>(
        &mut self,
        sql_text: &str,
        params: &[Value],
    ) -> Result<Vec<B>> {
        let probe = B::default();
        let meta = self.cache.resolve(TypeId::of::<B>(), probe.spec())?;
        log::debug!("#get_list - {}", sql_text);
        let rows = self.handle.with(|conn| conn.query(sql_text, params))?;
        let mut beans = Vec::with_capacity(rows.row_count());
        for row in rows.iter() {
            beans.push(bind::materialize::<B>(&meta, &row)?);
        }
        Ok(beans)
    }

    /// Raw SQL pass-through for DDL and ad-hoc DML. Returns the affected-row
    /// count (0 for DDL).
    pub fn execute_sql(&mut self, sql_text: &str, params: &[Value]) -> Result<u64> {
        log::debug!("#execute_sql - {}", sql_text);
        self.handle.with(|conn| conn.execute(sql_text, params))
    }

    fn require_metadata(&self) -> Result<Arc<TableMetadata>> {
        self.metadata
            .clone()
            .ok_or_else(|| DaoError::State("no bean bound; call set_bean first".into()))
    }

    fn require_bean(&self) -> Result<&dyn Bean> {
        self.bean
            .as_deref()
            .ok_or_else(|| DaoError::State("no bean bound; call set_bean first".into()))
    }

    fn require_bean_mut(&mut self) -> Result<&mut dyn Bean> {
        match self.bean.as_deref_mut() {
            Some(bean) => Ok(bean),
            None => Err(DaoError::State("no bean bound; call set_bean first".into())),
        }
    }

    fn require_populated_key(&self, meta: &TableMetadata) -> Result<Value> {
        let pk = meta.primary_key().ok_or_else(|| {
            DaoError::Mapping(format!(
                "table '{}' maps no primary key",
                meta.table_name()
            ))
        })?;
        let value = self.require_bean()?.get(pk.attribute)?;
        if is_unset_key(&value) {
            return Err(DaoError::State(format!(
                "primary key '{}' has no value on the bound bean",
                pk.attribute
            )));
        }
        Ok(value)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Handle::Owned(conn) = &mut self.handle {
            if let Err(err) = conn.close() {
                log::warn!("#drop - closing owned connection failed: {}", err);
            }
        }
    }
}

/// An unset key is NULL or integer zero; the original write-back convention
/// only ever assigns generated integer keys greater than zero.
fn is_unset_key(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Integer(0))
}
