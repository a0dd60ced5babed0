use crate::SqliteSqlWriter;
use conduit_core::{Capabilities, Driver};

#[derive(Default, Debug, Clone, Copy)]
pub struct SqliteDriver {}

impl SqliteDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for SqliteDriver {
    type SqlWriter = SqliteSqlWriter;

    const NAME: &'static str = "sqlite";

    fn sql_writer(&self) -> SqliteSqlWriter {
        SqliteSqlWriter {}
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            stored_procedures: false,
            change_notification: false,
            random_sampling: true,
            schemas: true,
        }
    }
}
