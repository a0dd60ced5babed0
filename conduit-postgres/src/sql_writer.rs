use conduit_core::{
    CommandKind, Context, OperationDescriptor, Result, SqlWriter, TableOrViewMetadata,
    separated_by, supplied_columns,
};
use std::fmt::Write;

#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresSqlWriter {}

impl SqlWriter for PostgresSqlWriter {
    fn write_parameter_marker(
        &self,
        _context: &mut Context,
        out: &mut String,
        _name: &str,
        index: usize,
    ) {
        let _ = write!(out, "${}", index);
    }

    fn write_random_order(&self, _context: &mut Context, out: &mut String) -> Result<()> {
        out.push_str("random()");
        Ok(())
    }

    /// Functions are called with named notation, arguments not supplied take their default.
    fn write_procedure_call(
        &self,
        context: &mut Context,
        out: &mut String,
        descriptor: &OperationDescriptor,
        metadata: &TableOrViewMetadata,
    ) -> Result<CommandKind> {
        let arguments = supplied_columns(descriptor, metadata, context.comparison)?;
        out.push_str("SELECT * FROM ");
        self.write_object_name(context, out, metadata.name());
        out.push('(');
        separated_by(
            out,
            arguments,
            |out, (column, value)| {
                self.write_identifier_quoted(context, out, &column.name);
                out.push_str(" => ");
                self.write_bound_value(context, out, &column.name, value);
            },
            ", ",
        );
        out.push_str(");");
        Ok(CommandKind::Text)
    }
}
