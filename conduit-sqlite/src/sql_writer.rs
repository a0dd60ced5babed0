use conduit_core::{Context, Result, SqlWriter};

#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteSqlWriter {}

impl SqlWriter for SqliteSqlWriter {
    fn write_parameter_marker(
        &self,
        _context: &mut Context,
        out: &mut String,
        name: &str,
        _index: usize,
    ) {
        out.push('@');
        out.push_str(name);
    }

    fn write_random_order(&self, _context: &mut Context, out: &mut String) -> Result<()> {
        out.push_str("RANDOM()");
        Ok(())
    }
}
