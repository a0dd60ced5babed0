use crate::{
    AsValue, Error, ExecutionMode, RawResult, Result, RowLabeled, RowSet, RowsAffected, Value,
};
use std::{any, marker::PhantomData, sync::Arc};

/// Cardinality and kind of result requested by the caller.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    /// Exactly one row, first column.
    Scalar,
    /// At most one row, first column.
    ScalarOrAbsent,
    /// Exactly one row.
    Object,
    /// At most one row.
    ObjectOrAbsent,
    /// Any number of rows, in source order.
    #[default]
    Collection,
    /// Number of rows the command affected.
    RowsAffected,
}

impl Shape {
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Shape::RowsAffected => ExecutionMode::NonQuery,
            _ => ExecutionMode::Reader,
        }
    }
}

/// Raw result after the shape rules were applied, before conversion to the caller's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Materialized {
    Absent,
    Scalar { column: String, value: Value },
    Row(RowLabeled),
    Rows(RowSet),
    Affected(RowsAffected),
}

/// Applies the shape rules to `raw`.
///
/// | Shape              | 0 rows   | 1 row  | N rows       |
/// |--------------------|----------|--------|--------------|
/// | `Scalar`           | `NoData` | value  | `MultipleRows` |
/// | `ScalarOrAbsent`   | absent   | value  | `MultipleRows` |
/// | `Object`           | `NoData` | row    | `MultipleRows` |
/// | `ObjectOrAbsent`   | absent   | row    | `MultipleRows` |
/// | `Collection`       | empty    | 1 row  | N rows       |
///
/// `RowsAffected` returns the affected count, or the number of rows when the command
/// produced rows.
pub fn materialize(operation: &str, raw: RawResult, shape: Shape) -> Result<Materialized> {
    let rows = match raw {
        RawResult::Affected(affected) => {
            return match shape {
                Shape::RowsAffected => Ok(Materialized::Affected(affected)),
                _ => Err(Error::InvalidOperation(format!(
                    "{} returned a rows affected count where rows were expected",
                    operation
                ))),
            };
        }
        RawResult::Rows(rows) => rows,
    };
    let single = |rows: RowSet, absent: bool| -> Result<Option<RowLabeled>> {
        match rows.len() {
            0 if absent => Ok(None),
            0 => Err(Error::NoData {
                operation: Arc::from(operation),
            }),
            1 => Ok(rows.into_labeled().next()),
            n => Err(Error::MultipleRows {
                operation: Arc::from(operation),
                rows: n,
            }),
        }
    };
    Ok(match shape {
        Shape::Scalar | Shape::ScalarOrAbsent => {
            match single(rows, shape == Shape::ScalarOrAbsent)? {
                Some(row) => {
                    let column = row.labels.first().cloned().unwrap_or_default();
                    let value = row.into_values().into_vec().into_iter().next();
                    match value {
                        Some(value) => Materialized::Scalar { column, value },
                        None => {
                            return Err(Error::InvalidOperation(format!(
                                "{} returned a row without columns",
                                operation
                            )));
                        }
                    }
                }
                None => Materialized::Absent,
            }
        }
        Shape::Object | Shape::ObjectOrAbsent => {
            match single(rows, shape == Shape::ObjectOrAbsent)? {
                Some(row) => Materialized::Row(row),
                None => Materialized::Absent,
            }
        }
        Shape::Collection => Materialized::Rows(rows),
        Shape::RowsAffected => Materialized::Affected(RowsAffected {
            rows_affected: rows.len() as u64,
            last_affected_id: None,
        }),
    })
}

/// Conversion options resolved from the operation and its data source.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterializeOptions {
    /// A column without a matching field fails with `SchemaMismatch` instead of being
    /// ignored.
    pub strict: bool,
}

/// Field by field reader handed to [`FromRow`].
///
/// Columns match fields by case insensitive name. A field without a column reads its
/// default, every column read is marked as used for the strict check.
pub struct RowReader<'r> {
    row: &'r RowLabeled,
    used: Vec<bool>,
}

impl<'r> RowReader<'r> {
    pub fn new(row: &'r RowLabeled) -> Self {
        Self {
            row,
            used: vec![false; row.len()],
        }
    }

    pub fn row(&self) -> &'r RowLabeled {
        self.row
    }

    /// Value of `field` converted to `T`, `None` when the row has no such column.
    pub fn get_optional<T: AsValue>(&mut self, field: &str) -> Result<Option<T>> {
        let Some(i) = self.row.position(field) else {
            return Ok(None);
        };
        self.used[i] = true;
        let value = self.row.values[i].clone();
        T::try_from_value(value)
            .map(Some)
            .map_err(|e| e.with_column(&self.row.labels[i]))
    }

    /// Value of `field` converted to `T`, `T::default()` when the row has no such column.
    pub fn get<T: AsValue + Default>(&mut self, field: &str) -> Result<T> {
        Ok(self.get_optional(field)?.unwrap_or_default())
    }

    pub fn mark_all_used(&mut self) {
        self.used.iter_mut().for_each(|v| *v = true);
    }

    /// In strict mode fails on the first column no field read.
    pub fn finish(&self, strict: bool, target: &'static str) -> Result<()> {
        if !strict {
            return Ok(());
        }
        match self.used.iter().position(|v| !v) {
            Some(i) => Err(Error::SchemaMismatch {
                column: self.row.labels[i].clone(),
                target,
            }),
            None => Ok(()),
        }
    }
}

/// Type built from one result row.
pub trait FromRow: Sized {
    fn from_row(reader: &mut RowReader<'_>) -> Result<Self>;
}

impl FromRow for RowLabeled {
    fn from_row(reader: &mut RowReader<'_>) -> Result<Self> {
        reader.mark_all_used();
        Ok(reader.row().clone())
    }
}

fn read_row<T: FromRow>(row: &RowLabeled, options: &MaterializeOptions) -> Result<T> {
    let mut reader = RowReader::new(row);
    let result = T::from_row(&mut reader)?;
    reader.finish(options.strict, any::type_name::<T>())?;
    Ok(result)
}

fn unexpected<T>(value: &Materialized) -> Error {
    Error::InvalidOperation(format!(
        "Cannot build {} from {:?}",
        any::type_name::<T>(),
        value
    ))
}

/// Terminal of an operation chain: chooses the shape and converts the materialized result
/// to the caller's type.
pub trait Materializer: Send + Sync + 'static {
    type Output;

    fn shape(&self) -> Shape;

    fn convert(&self, value: Materialized, options: &MaterializeOptions) -> Result<Self::Output>;
}

macro_rules! materializer {
    ($(#[$attr:meta])* $name:ident<$t:ident: $bound:path>) => {
        $(#[$attr])*
        pub struct $name<$t>(PhantomData<fn() -> $t>);

        impl<$t: $bound> $name<$t> {
            pub fn new() -> Self {
                Self(PhantomData)
            }
        }

        impl<$t: $bound> Default for $name<$t> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

materializer!(
    /// First column of exactly one row.
    ToScalar<T: AsValue>
);
materializer!(
    /// First column of at most one row. A NULL value is absent as well.
    ToScalarOrAbsent<T: AsValue>
);
materializer!(
    /// Exactly one row.
    ToObject<T: FromRow>
);
materializer!(
    /// At most one row.
    ToObjectOrAbsent<T: FromRow>
);
materializer!(
    /// Every row, in source order.
    ToCollection<T: FromRow>
);

impl<T: AsValue + 'static> Materializer for ToScalar<T> {
    type Output = T;

    fn shape(&self) -> Shape {
        Shape::Scalar
    }

    fn convert(&self, value: Materialized, _options: &MaterializeOptions) -> Result<T> {
        match value {
            Materialized::Scalar { column, value } => {
                T::try_from_value(value).map_err(|e| e.with_column(&column))
            }
            other => Err(unexpected::<T>(&other)),
        }
    }
}

impl<T: AsValue + 'static> Materializer for ToScalarOrAbsent<T> {
    type Output = Option<T>;

    fn shape(&self) -> Shape {
        Shape::ScalarOrAbsent
    }

    fn convert(&self, value: Materialized, _options: &MaterializeOptions) -> Result<Option<T>> {
        match value {
            Materialized::Absent => Ok(None),
            Materialized::Scalar { column, value } => {
                Option::<T>::try_from_value(value).map_err(|e| e.with_column(&column))
            }
            other => Err(unexpected::<T>(&other)),
        }
    }
}

impl<T: FromRow + 'static> Materializer for ToObject<T> {
    type Output = T;

    fn shape(&self) -> Shape {
        Shape::Object
    }

    fn convert(&self, value: Materialized, options: &MaterializeOptions) -> Result<T> {
        match value {
            Materialized::Row(row) => read_row(&row, options),
            other => Err(unexpected::<T>(&other)),
        }
    }
}

impl<T: FromRow + 'static> Materializer for ToObjectOrAbsent<T> {
    type Output = Option<T>;

    fn shape(&self) -> Shape {
        Shape::ObjectOrAbsent
    }

    fn convert(&self, value: Materialized, options: &MaterializeOptions) -> Result<Option<T>> {
        match value {
            Materialized::Absent => Ok(None),
            Materialized::Row(row) => read_row(&row, options).map(Some),
            other => Err(unexpected::<T>(&other)),
        }
    }
}

impl<T: FromRow + 'static> Materializer for ToCollection<T> {
    type Output = Vec<T>;

    fn shape(&self) -> Shape {
        Shape::Collection
    }

    fn convert(&self, value: Materialized, options: &MaterializeOptions) -> Result<Vec<T>> {
        match value {
            Materialized::Rows(rows) => rows
                .labeled()
                .map(|row| read_row(&row, options))
                .collect(),
            other => Err(unexpected::<T>(&other)),
        }
    }
}

/// Every row as a dataset: shared labels plus raw values.
#[derive(Default, Debug, Clone, Copy)]
pub struct ToRowSet;

impl Materializer for ToRowSet {
    type Output = RowSet;

    fn shape(&self) -> Shape {
        Shape::Collection
    }

    fn convert(&self, value: Materialized, _options: &MaterializeOptions) -> Result<RowSet> {
        match value {
            Materialized::Rows(rows) => Ok(rows),
            other => Err(unexpected::<RowSet>(&other)),
        }
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct ToRowsAffected;

impl Materializer for ToRowsAffected {
    type Output = RowsAffected;

    fn shape(&self) -> Shape {
        Shape::RowsAffected
    }

    fn convert(&self, value: Materialized, _options: &MaterializeOptions) -> Result<RowsAffected> {
        match value {
            Materialized::Affected(affected) => Ok(affected),
            other => Err(unexpected::<RowsAffected>(&other)),
        }
    }
}
