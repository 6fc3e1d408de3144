//! Minimal object-relational mapper: binds plain Rust structs ("beans") to
//! rows of a single relational table and performs create/read/update/delete
//! through them, while raw SQL stays available for DDL and ad-hoc queries.
//!
//! The engine is four small pieces:
//! - [`meta`] resolves a bean type's table mapping once and caches it;
//! - [`sql`] turns a mapping into parameterized statement templates;
//! - [`bind`] moves values between beans and statements/result rows;
//! - [`session`] sequences the operations against a [`Connection`].
//!
//! The database itself is an external collaborator: implement [`Connection`]
//! over your driver of choice and hand it to a [`Session`].
//!
//! # Examples
//!
//! ```ignore
//! use rowbean::{Bean, Session, Value};
//!
//! #[derive(Bean, Default)]
//! #[bean(table = "t_school")]
//! struct School {
//!     id: Option<i32>,
//!     principal: Option<String>,
//!     name: String,
//!     address: String,
//! }
//!
//! let mut dao = Session::new(my_driver_connection());
//! dao.execute_sql(
//!     "CREATE TABLE t_school (id INTEGER PRIMARY KEY, principal TEXT, name TEXT, address TEXT)",
//!     &[],
//! )?;
//!
//! let school = School {
//!     name: "USC".into(),
//!     principal: Some("Mrs. Smith".into()),
//!     address: "Los Angeles, CA".into(),
//!     ..Default::default()
//! };
//!
//! // Insert writes the generated key back onto the bean.
//! let id = dao.set_bean(school)?.insert()?;
//! assert!(!id.is_null());
//!
//! let schools: Vec<School> = dao.get_list("SELECT * FROM t_school", &[])?;
//! assert_eq!(schools.len(), 1);
//! ```

pub mod bind;
pub mod connection;
pub mod core;
pub mod meta;
pub mod session;
pub mod sql;

// Re-export main types for convenience
pub use bind::{Bean, SqlValue};
pub use connection::{Connection, Rows, RowView};
pub use crate::core::{DaoError, DataType, Result, Row, Value};
pub use meta::{AttributeMapping, AttributeSpec, BeanSpec, MetadataCache, TableMetadata};
pub use session::Session;

// Derive macro; shares its name with the trait it implements.
pub use rowbean_derive::Bean;
