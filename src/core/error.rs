use thiserror::Error;

#[derive(Error, Debug)]
pub enum DaoError {
    #[error("Mapping error: {0}")]
    Mapping(String),

    #[error("Binding error: {0}")]
    Binding(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Connectivity error: {0}")]
    Connectivity(String),
}

pub type Result<T> = std::result::Result<T, DaoError>;

impl<T> From<std::sync::PoisonError<T>> for DaoError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::State(err.to_string())
    }
}
