use conduit_core::{
    CommandKind, Context, Fragment, Limit, OperationDescriptor, Result, SqlWriter,
    TableOrViewMetadata, supplied_columns,
};
use std::fmt::Write;

/// Keeps the default `?` markers, parameters bind in the order they appear in the text.
#[derive(Default, Debug, Clone, Copy)]
pub struct OleDbSqlWriter {}

impl SqlWriter for OleDbSqlWriter {
    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('[');
        self.write_escaped(context, out, value, ']', "]]");
        out.push(']');
    }

    fn write_select_top(&self, _context: &mut Context, out: &mut String, limit: Limit) {
        match limit {
            Limit::Rows { skip: None, take } | Limit::RandomSampleRows(take) => {
                let _ = write!(out, "TOP {} ", take);
            }
            _ => {}
        }
    }

    fn write_random_order(&self, _context: &mut Context, out: &mut String) -> Result<()> {
        out.push_str("NEWID()");
        Ok(())
    }

    fn write_implicit_order(&self, context: &mut Context, out: &mut String, limit: Limit) {
        if let Limit::Rows { skip: Some(..), .. } = limit {
            context.switch_fragment(Fragment::SqlSelectOrderBy);
            out.push_str("\nORDER BY (SELECT NULL)");
        }
    }

    fn write_select_limit(&self, _context: &mut Context, out: &mut String, limit: Limit) {
        if let Limit::Rows {
            skip: Some(skip),
            take,
        } = limit
        {
            let _ = write!(out, "\nOFFSET {} ROWS FETCH NEXT {} ROWS ONLY", skip, take);
        }
    }

    fn write_procedure_call(
        &self,
        context: &mut Context,
        out: &mut String,
        descriptor: &OperationDescriptor,
        metadata: &TableOrViewMetadata,
    ) -> Result<CommandKind> {
        self.write_object_name(context, out, metadata.name());
        let mut markers = String::new();
        for (column, value) in supplied_columns(descriptor, metadata, context.comparison)? {
            self.write_bound_value(context, &mut markers, &column.name, value);
        }
        Ok(CommandKind::StoredProcedure)
    }
}
