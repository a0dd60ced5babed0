use std::sync::Arc;
use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

/// Copyable classification of an [`Error`], used by appenders and callers deciding what
/// to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Timeout,
    Cancellation,
    ConstraintViolation,
    ObjectNotFound,
    ColumnNotFound,
    SchemaMismatch,
    NoData,
    MultipleRows,
    NullConversion,
    Conversion,
    Unsupported,
    InvalidOperation,
    Configuration,
    Driver,
}

/// Every failure surfaced by the pipeline.
///
/// Errors raised by a provider are propagated unmodified. `Error` is `Clone` so a single
/// metadata discovery failure can be delivered to all the callers waiting on it.
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    /// The database is unreachable or refused the credentials.
    #[error("Connection failure: {message}")]
    Connection { message: String },
    /// The command did not complete within the configured timeout.
    #[error("Timeout: {message}")]
    Timeout { message: String },
    /// The caller cancelled the operation.
    #[error("The operation `{operation}` was cancelled")]
    Cancellation { operation: Arc<str> },
    /// Backend-reported constraint failure (unique, foreign key, check, not null).
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },
    /// Metadata discovery could not find the object.
    #[error("The database object `{object}` does not exist")]
    ObjectNotFound { object: String },
    /// The operation names a column the object does not have.
    #[error("Column `{column}` does not exist in `{object}`")]
    ColumnNotFound { object: String, column: String },
    /// Strict materialization found a column without a matching field.
    #[error("Column `{column}` has no matching field in `{target}`")]
    SchemaMismatch { column: String, target: &'static str },
    /// A shape requiring one row received none.
    #[error("The operation `{operation}` returned no rows")]
    NoData { operation: Arc<str> },
    /// A shape allowing at most one row received more.
    #[error("The operation `{operation}` returned {rows} rows where at most one was expected")]
    MultipleRows { operation: Arc<str>, rows: usize },
    /// A database NULL reached a target that cannot represent absence.
    #[error("Cannot convert NULL{} to {target}", column_suffix(.column))]
    NullConversion { column: String, target: &'static str },
    /// A value cannot be converted to the requested type.
    #[error("{message}{}", column_suffix(.column))]
    Conversion { column: String, message: String },
    /// The dialect lacks the capability required by the operation.
    #[error("{0}")]
    Unsupported(String),
    /// The operation descriptor cannot be compiled.
    #[error("{0}")]
    InvalidOperation(String),
    /// The data source configuration is malformed.
    #[error("{0}")]
    Configuration(String),
    /// Opaque provider failure.
    #[error("{0:#}")]
    Driver(Arc<anyhow::Error>),
}

fn column_suffix(column: &str) -> String {
    if column.is_empty() {
        String::new()
    } else {
        format!(" (column `{}`)", column)
    }
}

impl Error {
    pub fn driver(error: impl Into<anyhow::Error>) -> Self {
        Error::Driver(Arc::new(error.into()))
    }

    pub fn conversion(message: impl Into<String>) -> Self {
        Error::Conversion {
            column: String::new(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::Cancellation { .. } => ErrorKind::Cancellation,
            Error::ConstraintViolation { .. } => ErrorKind::ConstraintViolation,
            Error::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            Error::ColumnNotFound { .. } => ErrorKind::ColumnNotFound,
            Error::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
            Error::NoData { .. } => ErrorKind::NoData,
            Error::MultipleRows { .. } => ErrorKind::MultipleRows,
            Error::NullConversion { .. } => ErrorKind::NullConversion,
            Error::Conversion { .. } => ErrorKind::Conversion,
            Error::Unsupported(..) => ErrorKind::Unsupported,
            Error::InvalidOperation(..) => ErrorKind::InvalidOperation,
            Error::Configuration(..) => ErrorKind::Configuration,
            Error::Driver(..) => ErrorKind::Driver,
        }
    }

    /// Worth retrying: the same operation may succeed later.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connection | ErrorKind::Timeout)
    }

    /// Attach the column name to conversion errors raised while reading a row.
    pub fn with_column(self, name: &str) -> Self {
        match self {
            Error::NullConversion { column, target } if column.is_empty() => {
                Error::NullConversion {
                    column: name.to_owned(),
                    target,
                }
            }
            Error::Conversion { column, message } if column.is_empty() => Error::Conversion {
                column: name.to_owned(),
                message,
            },
            other => other,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(value: anyhow::Error) -> Self {
        Error::Driver(Arc::new(value))
    }
}
