pub mod error;
pub mod types;
pub mod value;

pub use error::{DaoError, Result};
pub use types::Row;
pub use value::{DataType, Value};
