use crate::{
    Error, GenericSqlWriter, Limit, OperationDescriptor, OperationKind, Result, SqlWriter,
};

/// Optional features a backend family offers.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub stored_procedures: bool,
    pub change_notification: bool,
    pub random_sampling: bool,
    pub schemas: bool,
}

impl Capabilities {
    /// Fails with [`Error::Unsupported`] when the operation needs a feature this backend
    /// family lacks.
    pub fn ensure_supports(&self, descriptor: &OperationDescriptor) -> Result<()> {
        let procedure = descriptor.kind() == OperationKind::StoredProcedure;
        let sample = matches!(descriptor.limit(), Limit::RandomSampleRows(..));
        let qualified = descriptor.object().is_some_and(|v| !v.schema().is_empty());
        let missing = if procedure && !self.stored_procedures {
            Some("stored procedures")
        } else if sample && !self.random_sampling {
            Some("random sampling")
        } else if qualified && !self.schemas {
            Some("schema qualified names")
        } else {
            None
        };
        match missing {
            Some(feature) => Err(Error::Unsupported(format!(
                "{} requires {}, which this backend does not support",
                descriptor.name(),
                feature
            ))),
            None => Ok(()),
        }
    }
}

/// Backend family: SQL generation plus the capability set checked before resolving an
/// operation or attaching appenders.
pub trait Driver: Send + Sync + 'static {
    type SqlWriter: SqlWriter;

    const NAME: &'static str;

    fn sql_writer(&self) -> Self::SqlWriter;

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}

#[derive(Default, Debug, Clone, Copy)]
pub struct GenericDriver;

impl GenericDriver {
    pub fn new() -> Self {
        Self
    }
}

impl Driver for GenericDriver {
    type SqlWriter = GenericSqlWriter;

    const NAME: &'static str = "generic";

    fn sql_writer(&self) -> GenericSqlWriter {
        GenericSqlWriter::new()
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            schemas: true,
            ..Default::default()
        }
    }
}
