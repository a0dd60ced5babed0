use crate::extract::{from_sqlite, map_error, to_sqlite};
use conduit_core::{
    BufferedCursor, Command, CommandKind, Error, ErrorContext, ProviderConnection, Result, Row,
    RowNames, RowSet, RowsAffected, Value,
};
use parking_lot::Mutex;
use rusqlite::{InterruptHandle, Statement, types::Value as SqliteValue};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Virtual machine instructions between two deadline checks.
const PROGRESS_STEPS: i32 = 1000;

/// Open SQLite connection, closed when dropped.
pub struct SqliteConnection {
    pub(crate) connection: Arc<Mutex<rusqlite::Connection>>,
    pub(crate) interrupt: Arc<InterruptHandle>,
}

impl SqliteConnection {
    pub(crate) fn new(connection: rusqlite::Connection) -> Self {
        let interrupt = Arc::new(connection.get_interrupt_handle());
        Self {
            connection: Arc::new(Mutex::new(connection)),
            interrupt,
        }
    }

    fn batch(&self, sql: &str) -> Result<()> {
        self.connection.lock().execute_batch(sql).map_err(map_error)
    }

    fn batch_async(&self, sql: &'static str) -> impl Future<Output = Result<()>> + Send {
        let connection = self.connection.clone();
        async move {
            tokio::task::spawn_blocking(move || connection.lock().execute_batch(sql).map_err(map_error))
                .await
                .context("The SQLite worker task failed")?
        }
    }
}

impl ProviderConnection for SqliteConnection {
    type Command = SqliteCommand;

    fn create_command(&mut self, text: &str, kind: CommandKind) -> Result<SqliteCommand> {
        if kind == CommandKind::StoredProcedure {
            return Err(Error::Unsupported(
                "SQLite does not support stored procedures".into(),
            ));
        }
        Ok(SqliteCommand {
            job: Job {
                connection: self.connection.clone(),
                sql: text.to_owned(),
                parameters: Vec::new(),
                timeout: None,
                aborted: Arc::new(AtomicBool::new(false)),
            },
            interrupt: self.interrupt.clone(),
        })
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.batch("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        self.batch("ROLLBACK")
    }

    fn begin_transaction_async(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.batch_async("BEGIN")
    }

    fn commit_async(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.batch_async("COMMIT")
    }

    fn rollback_async(&mut self) -> impl Future<Output = Result<()>> + Send {
        self.batch_async("ROLLBACK")
    }
}

/// Everything needed to run the statement, movable to a blocking thread.
#[derive(Clone)]
struct Job {
    connection: Arc<Mutex<rusqlite::Connection>>,
    sql: String,
    parameters: Vec<(String, SqliteValue)>,
    timeout: Option<Duration>,
    /// Set once nobody waits for the result anymore.
    aborted: Arc<AtomicBool>,
}

impl Job {
    fn prepare<'c>(&self, connection: &'c rusqlite::Connection) -> Result<Statement<'c>> {
        if let Some(timeout) = self.timeout {
            connection.busy_timeout(timeout).map_err(map_error)?;
        }
        let mut statement = connection.prepare(&self.sql).map_err(map_error)?;
        for (position, (name, value)) in self.parameters.iter().enumerate() {
            let index = parameter_index(&statement, name, position)?;
            statement
                .raw_bind_parameter(index, value)
                .map_err(map_error)?;
        }
        Ok(statement)
    }

    /// Runs `f` while a progress handler stops the statement past the deadline or once the
    /// job is aborted. A job aborted before it starts never touches the database.
    fn watched<T>(
        &self,
        connection: &rusqlite::Connection,
        f: impl FnOnce(&rusqlite::Connection) -> Result<T>,
    ) -> Result<T> {
        if self.aborted.load(Ordering::SeqCst) {
            log::debug!("Skipping an abandoned SQLite statement");
            return Err(abandoned());
        }
        let deadline = self.timeout.map(|v| Instant::now() + v);
        let expired = Arc::new(AtomicBool::new(false));
        let aborted = self.aborted.clone();
        let flag = expired.clone();
        connection.progress_handler(
            PROGRESS_STEPS,
            Some(move || {
                if deadline.is_some_and(|v| Instant::now() >= v) {
                    flag.store(true, Ordering::SeqCst);
                    return true;
                }
                aborted.load(Ordering::SeqCst)
            }),
        );
        let result = f(connection);
        connection.progress_handler(0, None::<fn() -> bool>);
        match result {
            Err(Error::Cancellation { .. }) if expired.load(Ordering::SeqCst) => {
                Err(Error::Timeout {
                    message: format!(
                        "The SQLite command did not complete within {:?}",
                        self.timeout.unwrap_or_default()
                    ),
                })
            }
            result => result,
        }
    }

    fn non_query(&self) -> Result<RowsAffected> {
        let connection = self.connection.lock();
        self.watched(&connection, |connection| {
            let mut statement = self.prepare(connection)?;
            let before = connection.last_insert_rowid();
            let rows_affected = statement.raw_execute().map_err(map_error)? as u64;
            let last = connection.last_insert_rowid();
            let inserted = rows_affected > 0 && (last != before || is_insert(&self.sql));
            Ok(RowsAffected {
                rows_affected,
                last_affected_id: (inserted && last != 0).then_some(last),
            })
        })
    }

    fn reader(&self) -> Result<RowSet> {
        let connection = self.connection.lock();
        self.watched(&connection, |connection| self.read(connection))
    }

    fn read(&self, connection: &rusqlite::Connection) -> Result<RowSet> {
        let mut statement = self.prepare(connection)?;
        let labels: RowNames = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let columns = labels.len();
        let mut result = RowSet::new(labels);
        let mut rows = statement.raw_query();
        while let Some(row) = rows.next().map_err(map_error)? {
            let values = (0..columns)
                .map(|i| row.get_ref(i).map_err(map_error).and_then(from_sqlite))
                .collect::<Result<Row>>()?;
            result.rows.push(values);
        }
        Ok(result)
    }
}

fn abandoned() -> Error {
    Error::Cancellation {
        operation: "SQLite command".into(),
    }
}

/// Whether the statement starts with a row inserting keyword.
fn is_insert(sql: &str) -> bool {
    let keyword = sql
        .trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .unwrap_or_default();
    keyword.eq_ignore_ascii_case("INSERT") || keyword.eq_ignore_ascii_case("REPLACE")
}

/// Finds where `name` binds: as written, with one of the SQLite prefixes, or as a 1-based
/// position.
fn parameter_index(statement: &Statement<'_>, name: &str, position: usize) -> Result<usize> {
    if name.starts_with(['@', ':', '$', '?']) {
        if let Some(index) = statement.parameter_index(name).map_err(map_error)? {
            return Ok(index);
        }
    }
    for prefix in ['@', ':', '$'] {
        if let Some(index) = statement
            .parameter_index(&format!("{}{}", prefix, name))
            .map_err(map_error)?
        {
            return Ok(index);
        }
    }
    match name.parse::<usize>() {
        Ok(index) if index >= 1 && index <= statement.parameter_count() => Ok(index),
        _ if name.is_empty() && position < statement.parameter_count() => Ok(position + 1),
        _ => Err(Error::InvalidOperation(format!(
            "The statement has no parameter named `{}`",
            name
        ))),
    }
}

/// Aborts the job and interrupts its statement if the future driving it is dropped.
struct InterruptOnDrop {
    handle: Arc<InterruptHandle>,
    aborted: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("Interrupting an abandoned SQLite statement");
            self.aborted.store(true, Ordering::SeqCst);
            self.handle.interrupt();
        }
    }
}

async fn run_blocking<T, F>(interrupt: Arc<InterruptHandle>, mut job: Job, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Job) -> Result<T> + Send + 'static,
{
    job.aborted = Arc::new(AtomicBool::new(false));
    let mut guard = InterruptOnDrop {
        handle: interrupt,
        aborted: job.aborted.clone(),
        armed: true,
    };
    let result = tokio::task::spawn_blocking(move || f(&job))
        .await
        .context("The SQLite worker task failed");
    guard.armed = false;
    result?
}

pub struct SqliteCommand {
    job: Job,
    interrupt: Arc<InterruptHandle>,
}

impl Command for SqliteCommand {
    type Cursor = BufferedCursor;

    fn set_timeout(&mut self, timeout: Duration) {
        self.job.timeout = Some(timeout);
    }

    fn bind_parameter(&mut self, name: &str, value: &Value) -> Result<()> {
        self.job.parameters.push((name.to_owned(), to_sqlite(value)?));
        Ok(())
    }

    fn execute_non_query(&mut self) -> Result<RowsAffected> {
        self.job.non_query()
    }

    fn execute_reader(&mut self) -> Result<BufferedCursor> {
        self.job.reader().map(Into::into)
    }

    fn execute_non_query_async(&mut self) -> impl Future<Output = Result<RowsAffected>> + Send {
        run_blocking(self.interrupt.clone(), self.job.clone(), Job::non_query)
    }

    fn execute_reader_async(&mut self) -> impl Future<Output = Result<BufferedCursor>> + Send {
        let future = run_blocking(self.interrupt.clone(), self.job.clone(), Job::reader);
        async move { future.await.map(Into::into) }
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteConnection;
    use conduit_core::{Command, CommandKind, ProviderConnection, Value};
    use std::time::Duration;

    #[tokio::test]
    async fn abandoned_before_start() {
        let mut connection = SqliteConnection::new(
            rusqlite::Connection::open_in_memory().expect("Could not open the database"),
        );
        connection
            .batch("CREATE TABLE note (id INTEGER PRIMARY KEY)")
            .expect("Failed to create the table");
        let mut command = connection
            .create_command("INSERT INTO note (id) VALUES (@id)", CommandKind::Text)
            .expect("Failed to create the command");
        command
            .bind_parameter("id", &Value::from(1i64))
            .expect("Failed to bind");

        // The worker waits on the connection until the caller gives up
        let held = connection.connection.lock();
        let result =
            tokio::time::timeout(Duration::from_millis(50), command.execute_non_query_async())
                .await;
        assert!(result.is_err());
        drop(held);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let count: i64 = connection
            .connection
            .lock()
            .query_row("SELECT COUNT(*) FROM note", [], |row| row.get(0))
            .expect("Failed to count");
        assert_eq!(count, 0);
    }
}
