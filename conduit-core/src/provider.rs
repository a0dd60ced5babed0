use crate::{Driver, ObjectName, Result, Row, RowNames, RowSet, RowsAffected, TableOrViewMetadata, Value};
use std::{collections::VecDeque, future::Future, time::Duration};

/// How the provider interprets the command text.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    #[default]
    Text,
    /// The text is the name of a stored procedure, parameters are its arguments.
    StoredProcedure,
}

/// Source of structural information about database objects.
///
/// The async variants default to the blocking ones, providers with a non-blocking driver
/// should override them.
pub trait MetadataProvider: Send + Sync {
    /// Every table, view and stored procedure known to the backend.
    fn list_objects(&self) -> Result<Vec<ObjectName>>;

    /// Columns of `name`, failing with `ObjectNotFound` when it does not exist.
    fn describe(&self, name: &ObjectName) -> Result<TableOrViewMetadata>;

    fn list_objects_async(&self) -> impl Future<Output = Result<Vec<ObjectName>>> + Send {
        async move { self.list_objects() }
    }

    fn describe_async(
        &self,
        name: &ObjectName,
    ) -> impl Future<Output = Result<TableOrViewMetadata>> + Send {
        async move { self.describe(name) }
    }
}

/// Database driver seen by the pipeline: it opens connections and discovers metadata.
pub trait Provider: MetadataProvider + 'static {
    type Driver: Driver;
    type Connection: ProviderConnection;

    fn driver(&self) -> &Self::Driver;

    fn open(&self) -> Result<Self::Connection>;

    fn open_async(&self) -> impl Future<Output = Result<Self::Connection>> + Send {
        async move { self.open() }
    }
}

/// Open connection. Dropping it releases it.
pub trait ProviderConnection: Send {
    type Command: Command;

    fn create_command(&mut self, text: &str, kind: CommandKind) -> Result<Self::Command>;

    fn begin_transaction(&mut self) -> Result<()>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;

    fn begin_transaction_async(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { self.begin_transaction() }
    }
    fn commit_async(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { self.commit() }
    }
    fn rollback_async(&mut self) -> impl Future<Output = Result<()>> + Send {
        async move { self.rollback() }
    }
}

pub trait Command: Send {
    type Cursor: RowCursor;

    /// Upper bound for the command, providers without native support ignore it.
    fn set_timeout(&mut self, _timeout: Duration) {}

    fn bind_parameter(&mut self, name: &str, value: &Value) -> Result<()>;

    fn execute_non_query(&mut self) -> Result<RowsAffected>;

    fn execute_reader(&mut self) -> Result<Self::Cursor>;

    /// First column of the first row, `None` when there are no rows.
    fn execute_scalar(&mut self) -> Result<Option<Value>> {
        let mut cursor = self.execute_reader()?;
        Ok(cursor
            .next_row()?
            .and_then(|row| row.into_vec().into_iter().next()))
    }

    fn execute_non_query_async(&mut self) -> impl Future<Output = Result<RowsAffected>> + Send {
        async move { self.execute_non_query() }
    }

    fn execute_reader_async(&mut self) -> impl Future<Output = Result<Self::Cursor>> + Send {
        async move { self.execute_reader() }
    }

    fn execute_scalar_async(&mut self) -> impl Future<Output = Result<Option<Value>>> + Send {
        async move {
            let mut cursor = self.execute_reader_async().await?;
            Ok(cursor
                .next_row_async()
                .await?
                .and_then(|row| row.into_vec().into_iter().next()))
        }
    }
}

/// Forward only reader over the rows produced by a command.
pub trait RowCursor: Send {
    fn labels(&self) -> RowNames;

    fn next_row(&mut self) -> Result<Option<Row>>;

    fn next_row_async(&mut self) -> impl Future<Output = Result<Option<Row>>> + Send {
        async move { self.next_row() }
    }

    /// Drains the cursor.
    fn read_all(&mut self) -> Result<RowSet> {
        let mut result = RowSet::new(self.labels());
        while let Some(row) = self.next_row()? {
            result.rows.push(row);
        }
        Ok(result)
    }

    fn read_all_async(&mut self) -> impl Future<Output = Result<RowSet>> + Send {
        async move {
            let mut result = RowSet::new(self.labels());
            while let Some(row) = self.next_row_async().await? {
                result.rows.push(row);
            }
            Ok(result)
        }
    }
}

/// Cursor over rows already in memory, for providers that read eagerly.
#[derive(Default, Debug, Clone)]
pub struct BufferedCursor {
    labels: RowNames,
    rows: VecDeque<Row>,
}

impl BufferedCursor {
    pub fn new(labels: RowNames, rows: impl IntoIterator<Item = Row>) -> Self {
        Self {
            labels,
            rows: rows.into_iter().collect(),
        }
    }
}

impl From<RowSet> for BufferedCursor {
    fn from(value: RowSet) -> Self {
        Self::new(value.labels, value.rows)
    }
}

impl RowCursor for BufferedCursor {
    fn labels(&self) -> RowNames {
        self.labels.clone()
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }
}
