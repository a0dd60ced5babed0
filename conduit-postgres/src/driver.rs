use crate::PostgresSqlWriter;
use conduit_core::{Capabilities, Driver};

#[derive(Default, Debug, Clone, Copy)]
pub struct PostgresDriver {}

impl PostgresDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for PostgresDriver {
    type SqlWriter = PostgresSqlWriter;

    const NAME: &'static str = "postgres";

    fn sql_writer(&self) -> PostgresSqlWriter {
        PostgresSqlWriter {}
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
