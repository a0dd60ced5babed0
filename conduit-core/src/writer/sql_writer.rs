use crate::{
    ColumnMetadata, CommandKind, CompiledCommand, Error, Fragment, Limit, NameComparison,
    ObjectKind, ObjectName, OperationDescriptor, OperationKind, OperationTarget, Parameter,
    Result, SortExpression, TableOrViewMetadata, Value, separated_by, writer::Context,
};
use std::fmt::Write;

/// Find `name` in `metadata`, failing with `ColumnNotFound` instead of dropping it.
pub fn resolve_column<'m>(
    metadata: &'m TableOrViewMetadata,
    name: &str,
    comparison: NameComparison,
) -> Result<&'m ColumnMetadata> {
    metadata
        .column(name, comparison)
        .ok_or_else(|| Error::ColumnNotFound {
            object: metadata.name().to_string(),
            column: name.to_owned(),
        })
}

/// Dialect printer turning an [`OperationDescriptor`] resolved against its metadata into
/// command text and parameters.
///
/// Every method has a default close to ANSI SQL, backends override the pieces that differ:
/// parameter markers, identifier quoting and row limiting.
pub trait SqlWriter: Send + Sync {
    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(
        &self,
        _context: &mut Context,
        out: &mut String,
        value: &str,
        search: char,
        replace: &str,
    ) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(context, out, value, '"', "\"\"");
        out.push('"');
    }

    fn write_object_name(&self, context: &mut Context, out: &mut String, value: &ObjectName) {
        if !value.schema().is_empty() {
            self.write_identifier_quoted(context, out, value.schema());
            out.push('.');
        }
        self.write_identifier_quoted(context, out, value.name());
    }

    /// Name the provider binds the parameter with, `index` starts from 1.
    fn parameter_name(&self, context: &mut Context, name: &str, index: usize) -> String {
        let mut result: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        if result.is_empty() || result.starts_with(|c: char| c.is_ascii_digit()) {
            result.insert(0, 'p');
        }
        if context.parameters.iter().any(|p| p.name == result) {
            let _ = write!(result, "_{}", index);
        }
        result
    }

    /// Positional `?` marker.
    fn write_parameter_marker(
        &self,
        _context: &mut Context,
        out: &mut String,
        _name: &str,
        _index: usize,
    ) {
        out.push('?');
    }

    /// Writes the marker for `value` and records the parameter in binding order.
    fn write_bound_value(&self, context: &mut Context, out: &mut String, name: &str, value: &Value) {
        let index = context.next_index();
        let name = self.parameter_name(context, name, index);
        let mut marker = String::new();
        self.write_parameter_marker(context, &mut marker, &name, index);
        out.push_str(&marker);
        context.parameters.push(Parameter {
            name,
            marker,
            value: value.clone(),
        });
    }

    /// `"column" = marker`, or `"column" IS NULL` without binding when the value is NULL.
    fn write_equality(
        &self,
        context: &mut Context,
        out: &mut String,
        column: &ColumnMetadata,
        value: &Value,
    ) {
        self.write_identifier_quoted(context, out, &column.name);
        if value.is_null() && context.fragment != Fragment::SqlUpdateSet {
            out.push_str(" IS NULL");
        } else {
            out.push_str(" = ");
            self.write_bound_value(context, out, &column.name, value);
        }
    }

    /// Clause written right after `SELECT`, none by default.
    fn write_select_top(&self, _context: &mut Context, _out: &mut String, _limit: Limit) {}

    /// Ordering expression used for random sampling.
    fn write_random_order(&self, _context: &mut Context, _out: &mut String) -> Result<()> {
        Err(Error::Unsupported(
            "Random sampling is not supported by this dialect".into(),
        ))
    }

    /// Ordering for an unsorted query, for dialects that cannot skip rows without one.
    fn write_implicit_order(&self, _context: &mut Context, _out: &mut String, _limit: Limit) {}

    fn write_select_order_by(
        &self,
        context: &mut Context,
        out: &mut String,
        sort: &[(&ColumnMetadata, bool)],
        limit: Limit,
    ) -> Result<()> {
        context.switch_fragment(Fragment::SqlSelectOrderBy);
        if let Limit::RandomSampleRows(..) = limit {
            if !sort.is_empty() {
                return Err(Error::InvalidOperation(
                    "Random sampling cannot be combined with sorting".into(),
                ));
            }
            out.push_str("\nORDER BY ");
            return self.write_random_order(context, out);
        }
        if sort.is_empty() {
            self.write_implicit_order(context, out, limit);
            return Ok(());
        }
        out.push_str("\nORDER BY ");
        separated_by(
            out,
            sort,
            |out, (column, descending)| {
                self.write_identifier_quoted(context, out, &column.name);
                out.push_str(if *descending { " DESC" } else { " ASC" });
            },
            ", ",
        );
        Ok(())
    }

    /// Trailing limit clause, `LIMIT n OFFSET s` by default.
    fn write_select_limit(&self, _context: &mut Context, out: &mut String, limit: Limit) {
        match limit {
            Limit::None => {}
            Limit::Rows { skip, take } => {
                let _ = write!(out, "\nLIMIT {}", take);
                if let Some(skip) = skip {
                    let _ = write!(out, "\nOFFSET {}", skip);
                }
            }
            Limit::RandomSampleRows(rows) => {
                let _ = write!(out, "\nLIMIT {}", rows);
            }
        }
    }

    /// Emit SELECT statement (projection, FROM, WHERE, ORDER, LIMIT).
    fn write_select(
        &self,
        context: &mut Context,
        out: &mut String,
        descriptor: &OperationDescriptor,
        metadata: &TableOrViewMetadata,
    ) -> Result<()> {
        let comparison = context.comparison;
        let columns = if descriptor.columns().is_empty() {
            metadata.columns().iter().collect::<Vec<_>>()
        } else {
            descriptor
                .columns()
                .iter()
                .map(|c| resolve_column(metadata, c, comparison))
                .collect::<Result<Vec<_>>>()?
        };
        let filters = descriptor
            .parameters()
            .iter()
            .map(|(k, v)| Ok((resolve_column(metadata, k, comparison)?, v)))
            .collect::<Result<Vec<_>>>()?;
        let sort = descriptor
            .sort()
            .iter()
            .map(|SortExpression { column, descending }| {
                Ok((resolve_column(metadata, column, comparison)?, *descending))
            })
            .collect::<Result<Vec<_>>>()?;
        out.reserve(128 + columns.len() * 32);
        out.push_str("SELECT ");
        context.switch_fragment(Fragment::SqlSelect);
        self.write_select_top(context, out, descriptor.limit());
        separated_by(
            out,
            columns,
            |out, column| self.write_identifier_quoted(context, out, &column.name),
            ", ",
        );
        out.push_str("\nFROM ");
        context.switch_fragment(Fragment::SqlSelectFrom);
        self.write_object_name(context, out, metadata.name());
        if !filters.is_empty() {
            out.push_str("\nWHERE ");
            context.switch_fragment(Fragment::SqlSelectWhere);
            separated_by(
                out,
                filters,
                |out, (column, value)| self.write_equality(context, out, column, value),
                " AND ",
            );
        }
        self.write_select_order_by(context, out, &sort, descriptor.limit())?;
        self.write_select_limit(context, out, descriptor.limit());
        out.push(';');
        Ok(())
    }

    /// Emit INSERT binding every supplied value, in metadata column order.
    fn write_insert(
        &self,
        context: &mut Context,
        out: &mut String,
        descriptor: &OperationDescriptor,
        metadata: &TableOrViewMetadata,
    ) -> Result<()> {
        let values = supplied_columns(descriptor, metadata, context.comparison)?;
        out.reserve(128 + values.len() * 48);
        out.push_str("INSERT INTO ");
        context.switch_fragment(Fragment::SqlInsertInto);
        self.write_object_name(context, out, metadata.name());
        if values.is_empty() {
            out.push_str(" DEFAULT VALUES;");
            return Ok(());
        }
        out.push_str(" (");
        separated_by(
            out,
            values.iter(),
            |out, (column, _)| self.write_identifier_quoted(context, out, &column.name),
            ", ",
        );
        out.push_str(")\nVALUES (");
        context.switch_fragment(Fragment::SqlInsertIntoValues);
        separated_by(
            out,
            values.iter(),
            |out, (column, value)| self.write_bound_value(context, out, &column.name, value),
            ", ",
        );
        out.push_str(");");
        Ok(())
    }

    /// Emit UPDATE: primary keys select the row, the other supplied values are SET.
    fn write_update(
        &self,
        context: &mut Context,
        out: &mut String,
        descriptor: &OperationDescriptor,
        metadata: &TableOrViewMetadata,
    ) -> Result<()> {
        let values = supplied_columns(descriptor, metadata, context.comparison)?;
        let keys = key_values(descriptor, metadata, &values)?;
        let set = values
            .iter()
            .filter(|(c, _)| !c.is_primary_key())
            .collect::<Vec<_>>();
        if set.is_empty() {
            return Err(Error::InvalidOperation(format!(
                "Update of `{}` has no values to set",
                metadata.name()
            )));
        }
        out.reserve(128 + values.len() * 48);
        out.push_str("UPDATE ");
        context.switch_fragment(Fragment::SqlUpdate);
        self.write_object_name(context, out, metadata.name());
        out.push_str("\nSET ");
        context.switch_fragment(Fragment::SqlUpdateSet);
        separated_by(
            out,
            set,
            |out, (column, value)| self.write_equality(context, out, column, value),
            ", ",
        );
        out.push_str("\nWHERE ");
        context.switch_fragment(Fragment::SqlUpdateWhere);
        separated_by(
            out,
            keys,
            |out, (column, value)| self.write_equality(context, out, column, value),
            " AND ",
        );
        out.push(';');
        Ok(())
    }

    /// Emit DELETE filtered on every primary key column.
    fn write_delete(
        &self,
        context: &mut Context,
        out: &mut String,
        descriptor: &OperationDescriptor,
        metadata: &TableOrViewMetadata,
    ) -> Result<()> {
        let values = supplied_columns(descriptor, metadata, context.comparison)?;
        if let Some((column, _)) = values.iter().find(|(c, _)| !c.is_primary_key()) {
            return Err(Error::InvalidOperation(format!(
                "Delete from `{}` accepts only primary key values, `{}` is not part of the key",
                metadata.name(),
                column.name
            )));
        }
        let keys = key_values(descriptor, metadata, &values)?;
        out.reserve(128);
        out.push_str("DELETE FROM ");
        context.switch_fragment(Fragment::SqlDeleteFrom);
        self.write_object_name(context, out, metadata.name());
        out.push_str("\nWHERE ");
        context.switch_fragment(Fragment::SqlDeleteFromWhere);
        separated_by(
            out,
            keys,
            |out, (column, value)| self.write_equality(context, out, column, value),
            " AND ",
        );
        out.push(';');
        Ok(())
    }

    /// Emit the stored procedure invocation and return how the provider must run it.
    fn write_procedure_call(
        &self,
        _context: &mut Context,
        _out: &mut String,
        _descriptor: &OperationDescriptor,
        metadata: &TableOrViewMetadata,
    ) -> Result<CommandKind> {
        Err(Error::Unsupported(format!(
            "Cannot call `{}`: stored procedures are not supported by this dialect",
            metadata.name()
        )))
    }

    /// Compile `descriptor` into command text and parameters.
    ///
    /// `metadata` describes the target object and is ignored for raw SQL, which passes
    /// through unchanged with its parameters bound by name as supplied.
    fn build(
        &self,
        descriptor: &OperationDescriptor,
        metadata: Option<&TableOrViewMetadata>,
        comparison: NameComparison,
    ) -> Result<CompiledCommand> {
        let mut context = Context::new(Fragment::None, comparison);
        let mut out = String::new();
        let kind = match (descriptor.target(), metadata) {
            (OperationTarget::Sql(text), ..) => {
                return Ok(CompiledCommand {
                    text: text.clone(),
                    parameters: descriptor
                        .parameters()
                        .iter()
                        .map(|(k, v)| Parameter {
                            name: k.clone(),
                            marker: k.clone(),
                            value: v.clone(),
                        })
                        .collect(),
                    kind: CommandKind::Text,
                });
            }
            (OperationTarget::Object(object), None) => {
                return Err(Error::InvalidOperation(format!(
                    "Missing metadata for `{}`",
                    object
                )));
            }
            (.., Some(metadata)) => {
                let is_procedure = metadata.kind() == ObjectKind::StoredProcedure;
                if is_procedure != (descriptor.kind() == OperationKind::StoredProcedure) {
                    return Err(Error::InvalidOperation(format!(
                        "Cannot {} `{}`, it is a {:?}",
                        descriptor.kind().to_string().to_lowercase(),
                        metadata.name(),
                        metadata.kind(),
                    )));
                }
                match descriptor.kind() {
                    OperationKind::Query => {
                        self.write_select(&mut context, &mut out, descriptor, metadata)?
                    }
                    OperationKind::Insert => {
                        self.write_insert(&mut context, &mut out, descriptor, metadata)?
                    }
                    OperationKind::Update => {
                        self.write_update(&mut context, &mut out, descriptor, metadata)?
                    }
                    OperationKind::Delete => {
                        self.write_delete(&mut context, &mut out, descriptor, metadata)?
                    }
                    OperationKind::StoredProcedure => {
                        context.switch_fragment(Fragment::SqlProcedureCall);
                        let kind =
                            self.write_procedure_call(&mut context, &mut out, descriptor, metadata)?;
                        return Ok(CompiledCommand {
                            text: out,
                            parameters: context.parameters,
                            kind,
                        });
                    }
                    OperationKind::RawSql => {
                        return Err(Error::InvalidOperation(
                            "Raw SQL operation without command text".into(),
                        ));
                    }
                }
                CommandKind::Text
            }
        };
        Ok(CompiledCommand {
            text: out,
            parameters: context.parameters,
            kind,
        })
    }
}

/// Supplied values paired with their column, in metadata order.
pub fn supplied_columns<'d, 'm>(
    descriptor: &'d OperationDescriptor,
    metadata: &'m TableOrViewMetadata,
    comparison: NameComparison,
) -> Result<Vec<(&'m ColumnMetadata, &'d Value)>> {
    let mut result = descriptor
        .parameters()
        .iter()
        .map(|(k, v)| {
            let column = resolve_column(metadata, k, comparison)?;
            let position = metadata
                .columns()
                .iter()
                .position(|c| std::ptr::eq(c, column))
                .unwrap_or_default();
            Ok((position, column, v))
        })
        .collect::<Result<Vec<_>>>()?;
    result.sort_by_key(|(position, ..)| *position);
    Ok(result.into_iter().map(|(_, c, v)| (c, v)).collect())
}

/// Values for every primary key column, failing when the object has no key or a key value
/// was not supplied.
fn key_values<'d, 'm>(
    descriptor: &OperationDescriptor,
    metadata: &'m TableOrViewMetadata,
    values: &[(&'m ColumnMetadata, &'d Value)],
) -> Result<Vec<(&'m ColumnMetadata, &'d Value)>> {
    let mut result = Vec::new();
    for key in metadata.primary_keys() {
        let Some(value) = values.iter().find(|(c, _)| std::ptr::eq(*c, key)) else {
            return Err(Error::InvalidOperation(format!(
                "{} requires a value for the primary key column `{}`",
                descriptor.name(),
                key.name
            )));
        };
        result.push(*value);
    }
    if result.is_empty() {
        return Err(Error::InvalidOperation(format!(
            "{} requires a primary key, `{}` has none",
            descriptor.name(),
            metadata.name()
        )));
    }
    Ok(result)
}

/// Fallback writer: ANSI quoting, `?` markers, `LIMIT`/`OFFSET`.
#[derive(Default, Debug, Clone, Copy)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    pub fn new() -> Self {
        Self
    }
}

impl SqlWriter for GenericSqlWriter {}
