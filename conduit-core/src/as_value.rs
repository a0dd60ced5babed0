use crate::{Error, Result, Value, truncate_long};
use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use std::any;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime, Time, format_description::BorrowedFormatItem,
    macros::format_description,
};
use uuid::Uuid;

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
pub const TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[hour]:[minute]:[second][optional [.[subsecond]]]");
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
);
pub const TIMESTAMPTZ_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]][offset_hour sign:mandatory]:[offset_minute]"
);

/// Conversion between native Rust types and the dynamically typed [`Value`] used for
/// parameters and result rows.
///
/// # Conversion contract
/// - `try_from_value` accepts the canonical variant and, for numbers, any other numeric
///   variant whose value fits the target (range checked).
/// - Textual variants are parsed for temporal, decimal and UUID targets so backends that
///   store those as text (SQLite) round trip.
/// - A NULL reaching a type that cannot represent absence fails with
///   [`Error::NullConversion`]. `Option<T>` maps NULL to `None`.
pub trait AsValue {
    /// The typed NULL of this type.
    fn as_empty_value() -> Value;
    fn as_value(self) -> Value;
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

fn null_error<T>() -> Error {
    Error::NullConversion {
        column: String::new(),
        target: any::type_name::<T>(),
    }
}

fn mismatch_error<T>(value: &Value) -> Error {
    let text = value.to_string();
    Error::conversion(format!(
        "Cannot convert {} value {} to {}",
        value.type_name(),
        truncate_long!(text),
        any::type_name::<T>(),
    ))
}

fn out_of_range_error<T>(value: impl std::fmt::Display) -> Error {
    Error::conversion(format!(
        "Value {} is out of range for {}",
        value,
        any::type_name::<T>()
    ))
}

impl AsValue for Value {
    fn as_empty_value() -> Value {
        Value::Null
    }
    fn as_value(self) -> Value {
        self
    }
    fn try_from_value(value: Value) -> Result<Self> {
        Ok(value)
    }
}

macro_rules! impl_as_value_integer {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            #[allow(unreachable_patterns)]
            fn try_from_value(value: Value) -> Result<Self> {
                let converted = match value {
                    $destination(Some(v)) => return Ok(v),
                    Value::Int8(Some(v)) => <$source>::try_from(v).ok(),
                    Value::Int16(Some(v)) => <$source>::try_from(v).ok(),
                    Value::Int32(Some(v)) => <$source>::try_from(v).ok(),
                    Value::Int64(Some(v)) => <$source>::try_from(v).ok(),
                    Value::UInt8(Some(v)) => <$source>::try_from(v).ok(),
                    Value::UInt16(Some(v)) => <$source>::try_from(v).ok(),
                    Value::UInt32(Some(v)) => <$source>::try_from(v).ok(),
                    Value::UInt64(Some(v)) => <$source>::try_from(v).ok(),
                    Value::Decimal(Some(v)) if v.is_integer() => {
                        v.to_i128().and_then(|v| <$source>::try_from(v).ok())
                    }
                    ref v if v.is_null() => return Err(null_error::<Self>()),
                    ref v => return Err(mismatch_error::<Self>(v)),
                };
                converted.ok_or_else(|| out_of_range_error::<Self>(value))
            }
        }

        impl From<$source> for Value {
            fn from(value: $source) -> Self {
                value.as_value()
            }
        }
    };
}
impl_as_value_integer!(i8, Value::Int8);
impl_as_value_integer!(i16, Value::Int16);
impl_as_value_integer!(i32, Value::Int32);
impl_as_value_integer!(i64, Value::Int64);
impl_as_value_integer!(u8, Value::UInt8);
impl_as_value_integer!(u16, Value::UInt16);
impl_as_value_integer!(u32, Value::UInt32);
impl_as_value_integer!(u64, Value::UInt64);

macro_rules! impl_as_value {
    ($source:ty, $destination:path $(, $pat_rest:pat => $expr_rest:expr)* $(,)?) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self.into()))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v.into()),
                    $($pat_rest => $expr_rest,)*
                    ref v if v.is_null() => Err(null_error::<Self>()),
                    ref v => Err(mismatch_error::<Self>(v)),
                }
            }
        }

        impl From<$source> for Value {
            fn from(value: $source) -> Self {
                value.as_value()
            }
        }
    };
}

impl_as_value!(
    bool,
    Value::Boolean,
    Value::Int8(Some(v)) => Ok(v != 0),
    Value::Int16(Some(v)) => Ok(v != 0),
    Value::Int32(Some(v)) => Ok(v != 0),
    Value::Int64(Some(v)) => Ok(v != 0),
    Value::UInt8(Some(v)) => Ok(v != 0),
    Value::UInt16(Some(v)) => Ok(v != 0),
    Value::UInt32(Some(v)) => Ok(v != 0),
    Value::UInt64(Some(v)) => Ok(v != 0),
);
impl_as_value!(
    f32,
    Value::Float32,
    Value::Float64(Some(v)) => Ok(v as f32),
    Value::Int8(Some(v)) => Ok(v as f32),
    Value::Int16(Some(v)) => Ok(v as f32),
    Value::Int32(Some(v)) => Ok(v as f32),
    Value::UInt8(Some(v)) => Ok(v as f32),
    Value::UInt16(Some(v)) => Ok(v as f32),
    Value::Decimal(Some(v)) => v.to_f32().ok_or_else(|| out_of_range_error::<f32>(v)),
);
impl_as_value!(
    f64,
    Value::Float64,
    Value::Float32(Some(v)) => Ok(v as f64),
    Value::Int8(Some(v)) => Ok(v as f64),
    Value::Int16(Some(v)) => Ok(v as f64),
    Value::Int32(Some(v)) => Ok(v as f64),
    Value::Int64(Some(v)) => Ok(v as f64),
    Value::UInt8(Some(v)) => Ok(v as f64),
    Value::UInt16(Some(v)) => Ok(v as f64),
    Value::UInt32(Some(v)) => Ok(v as f64),
    Value::Decimal(Some(v)) => v.to_f64().ok_or_else(|| out_of_range_error::<f64>(v)),
);
impl_as_value!(
    Decimal,
    Value::Decimal,
    Value::Int8(Some(v)) => Ok(v.into()),
    Value::Int16(Some(v)) => Ok(v.into()),
    Value::Int32(Some(v)) => Ok(v.into()),
    Value::Int64(Some(v)) => Ok(v.into()),
    Value::UInt8(Some(v)) => Ok(v.into()),
    Value::UInt16(Some(v)) => Ok(v.into()),
    Value::UInt32(Some(v)) => Ok(v.into()),
    Value::UInt64(Some(v)) => Ok(v.into()),
    Value::Float32(Some(v)) => Decimal::from_f32(v).ok_or_else(|| out_of_range_error::<Decimal>(v)),
    Value::Float64(Some(v)) => Decimal::from_f64(v).ok_or_else(|| out_of_range_error::<Decimal>(v)),
    Value::Varchar(Some(ref v)) => v.trim().parse::<Decimal>().map_err(|e| {
        Error::conversion(format!("Cannot parse `{}` as a decimal: {}", truncate_long!(v), e))
    }),
);
impl_as_value!(String, Value::Varchar);
impl_as_value!(Box<[u8]>, Value::Blob);
impl_as_value!(Vec<u8>, Value::Blob);
impl_as_value!(
    Date,
    Value::Date,
    Value::Timestamp(Some(v)) => Ok(v.date()),
    Value::Varchar(Some(ref v)) => Date::parse(v, DATE_FORMAT).map_err(|e| parse_error::<Date>(v, e)),
);
impl_as_value!(
    Time,
    Value::Time,
    Value::Varchar(Some(ref v)) => Time::parse(v, TIME_FORMAT).map_err(|e| parse_error::<Time>(v, e)),
);
impl_as_value!(
    PrimitiveDateTime,
    Value::Timestamp,
    Value::Varchar(Some(ref v)) => PrimitiveDateTime::parse(&v.replacen('T', " ", 1), TIMESTAMP_FORMAT)
        .map_err(|e| parse_error::<PrimitiveDateTime>(v, e)),
);
impl_as_value!(
    OffsetDateTime,
    Value::TimestampWithTimezone,
    Value::Varchar(Some(ref v)) => OffsetDateTime::parse(&v.replacen('T', " ", 1), TIMESTAMPTZ_FORMAT)
        .map_err(|e| parse_error::<OffsetDateTime>(v, e)),
);
impl_as_value!(
    Uuid,
    Value::Uuid,
    Value::Varchar(Some(ref v)) => Uuid::parse_str(v).map_err(|e| parse_error::<Uuid>(v, e)),
    Value::Blob(Some(ref v)) => Uuid::from_slice(v).map_err(|e| parse_error::<Uuid>("<blob>", e)),
);

fn parse_error<T>(input: &str, error: impl std::fmt::Display) -> Error {
    Error::conversion(format!(
        "Cannot parse `{}` as {}: {}",
        truncate_long!(input),
        any::type_name::<T>(),
        error
    ))
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::try_from_value(value).map(Some)
        }
    }
}

impl<T: AsValue> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.as_value()
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Varchar(Some(value.to_owned()))
    }
}
