use log::error;
use thiserror::Error;

/// Storage failure reported by the persistence layer.
#[derive(Debug, Error)]
#[error("{info}")]
pub struct QueryError {
    info: String,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self { info }
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        let info = match value {
            sqlx::Error::Database(e) => match e.code() {
                Some(code) => format!("{e} ({code})"),
                None => format!("{e}"),
            },
            sqlx::Error::RowNotFound => String::from("RowNotFound"),
            sqlx::Error::ColumnNotFound(e) => format!("Column not found: {e}"),
            sqlx::Error::ColumnDecode { index, source } => {
                format!("Column decode {index} ({source})")
            }
            sqlx::Error::PoolTimedOut => String::from("Pool timed out"),
            sqlx::Error::PoolClosed => String::from("Pool closed"),
            sqlx::Error::WorkerCrashed => String::from("Worker crashed"),
            sqlx::Error::Migrate(e) => format!("{e}"),
            e => format!("{e}"),
        };
        error!("Query failed: {info}");

        Self::new(info)
    }
}

/// Every failure an operation can report. The variants stay distinct all the
/// way to the HTTP boundary, which picks the status code.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("{0}")]
    NotFound(String),

    #[error("You don't have permission to perform this action")]
    Forbidden,

    #[error("You can't subscribe to yourself")]
    SelfReference,

    #[error("Invalid session; {0}")]
    Unauthorized(String),

    #[error("{0}")]
    Query(#[from] QueryError),
}

impl Error {
    pub fn validation(info: impl Into<String>) -> Self {
        Self::Validation(info.into())
    }

    pub fn not_found(info: impl Into<String>) -> Self {
        Self::NotFound(info.into())
    }
}
