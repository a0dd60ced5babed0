use crate::MssqlSqlWriter;
use conduit_core::{Capabilities, Driver};

#[derive(Default, Debug, Clone, Copy)]
pub struct MssqlDriver {}

impl MssqlDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for MssqlDriver {
    type SqlWriter = MssqlSqlWriter;

    const NAME: &'static str = "mssql";

    fn sql_writer(&self) -> MssqlSqlWriter {
        MssqlSqlWriter {}
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            stored_procedures: true,
            change_notification: true,
            random_sampling: true,
            schemas: true,
        }
    }
}
