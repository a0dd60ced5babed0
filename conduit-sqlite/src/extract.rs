use conduit_core::{
    DATE_FORMAT, Error, Result, TIME_FORMAT, TIMESTAMP_FORMAT, TIMESTAMPTZ_FORMAT, Value,
};
use rusqlite::{
    ErrorCode,
    types::{Value as SqliteValue, ValueRef},
};

fn format_error(error: impl std::fmt::Display) -> Error {
    Error::conversion(format!("Cannot format the value for SQLite: {}", error))
}

/// Converts a bound value to its SQLite storage class. Temporal values, decimals and UUIDs
/// are stored as text.
pub(crate) fn to_sqlite(value: &Value) -> Result<SqliteValue> {
    if value.is_null() {
        return Ok(SqliteValue::Null);
    }
    Ok(match value {
        Value::Boolean(Some(v)) => SqliteValue::Integer(*v as i64),
        Value::Int8(Some(v)) => SqliteValue::Integer(*v as i64),
        Value::Int16(Some(v)) => SqliteValue::Integer(*v as i64),
        Value::Int32(Some(v)) => SqliteValue::Integer(*v as i64),
        Value::Int64(Some(v)) => SqliteValue::Integer(*v),
        Value::UInt8(Some(v)) => SqliteValue::Integer(*v as i64),
        Value::UInt16(Some(v)) => SqliteValue::Integer(*v as i64),
        Value::UInt32(Some(v)) => SqliteValue::Integer(*v as i64),
        Value::UInt64(Some(v)) => SqliteValue::Integer(i64::try_from(*v).map_err(|_| {
            Error::conversion(format!("Value {} does not fit a SQLite integer", v))
        })?),
        Value::Float32(Some(v)) => SqliteValue::Real(*v as f64),
        Value::Float64(Some(v)) => SqliteValue::Real(*v),
        Value::Decimal(Some(v)) => SqliteValue::Text(v.to_string()),
        Value::Varchar(Some(v)) => SqliteValue::Text(v.clone()),
        Value::Blob(Some(v)) => SqliteValue::Blob(v.to_vec()),
        Value::Date(Some(v)) => SqliteValue::Text(v.format(DATE_FORMAT).map_err(format_error)?),
        Value::Time(Some(v)) => SqliteValue::Text(v.format(TIME_FORMAT).map_err(format_error)?),
        Value::Timestamp(Some(v)) => {
            SqliteValue::Text(v.format(TIMESTAMP_FORMAT).map_err(format_error)?)
        }
        Value::TimestampWithTimezone(Some(v)) => {
            SqliteValue::Text(v.format(TIMESTAMPTZ_FORMAT).map_err(format_error)?)
        }
        Value::Uuid(Some(v)) => SqliteValue::Text(v.to_string()),
        _ => SqliteValue::Null,
    })
}

pub(crate) fn from_sqlite(value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int64(Some(v)),
        ValueRef::Real(v) => Value::Float64(Some(v)),
        ValueRef::Text(v) => Value::Varchar(Some(
            std::str::from_utf8(v)
                .map_err(|e| Error::conversion(format!("SQLite returned invalid UTF-8: {}", e)))?
                .to_owned(),
        )),
        ValueRef::Blob(v) => Value::Blob(Some(v.into())),
    })
}

/// Maps SQLite failures onto the error taxonomy.
pub(crate) fn map_error(error: rusqlite::Error) -> Error {
    let message = error.to_string();
    match error.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => Error::ConstraintViolation { message },
        Some(ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::PermissionDenied) => {
            Error::Connection { message }
        }
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => Error::Timeout { message },
        Some(ErrorCode::OperationInterrupted) => Error::Cancellation {
            operation: "SQLite command".into(),
        },
        _ => Error::driver(error),
    }
}
