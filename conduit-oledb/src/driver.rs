use crate::OleDbSqlWriter;
use conduit_core::{Capabilities, Driver};

/// Generic OleDb backend, positional parameters and Access/Jet style limits.
#[derive(Default, Debug, Clone, Copy)]
pub struct OleDbDriver {}

impl OleDbDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for OleDbDriver {
    type SqlWriter = OleDbSqlWriter;

    const NAME: &'static str = "oledb";

    fn sql_writer(&self) -> OleDbSqlWriter {
        OleDbSqlWriter {}
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            stored_procedures: true,
            change_notification: false,
            random_sampling: true,
            schemas: true,
        }
    }
}
