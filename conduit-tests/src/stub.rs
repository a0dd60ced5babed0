use conduit_core::{
    BufferedCursor, Command, CommandKind, Driver, Error, GenericDriver, MetadataProvider,
    NameComparison, ObjectName, Provider, ProviderConnection, RawResult, Result, RowSet,
    RowsAffected, TableOrViewMetadata, Value,
};
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

/// Command as it reached a [`StubProvider`] connection.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCommand {
    pub text: String,
    pub kind: CommandKind,
    /// Bound parameters, in binding order.
    pub parameters: Vec<(String, Value)>,
    pub timeout: Option<Duration>,
}

#[derive(Default)]
struct State {
    objects: Mutex<Vec<TableOrViewMetadata>>,
    results: Mutex<VecDeque<Result<RawResult>>>,
    commands: Mutex<Vec<RecordedCommand>>,
    transactions: Mutex<Vec<&'static str>>,
    describe_error: Mutex<Option<Error>>,
    open_error: Mutex<Option<Error>>,
    delay: Mutex<Option<Duration>>,
    describe_delay: Mutex<Option<Duration>>,
    opens: AtomicUsize,
    releases: AtomicUsize,
    describes: AtomicUsize,
    dispatches: AtomicUsize,
}

impl State {
    fn find(&self, name: &ObjectName) -> Result<TableOrViewMetadata> {
        if let Some(error) = self.describe_error.lock().take() {
            return Err(error);
        }
        let comparison = NameComparison::CaseInsensitive;
        self.objects
            .lock()
            .iter()
            .find(|v| {
                comparison.eq(v.name().name(), name.name())
                    && (name.schema().is_empty() || comparison.eq(v.name().schema(), name.schema()))
            })
            .cloned()
            .ok_or_else(|| Error::ObjectNotFound {
                object: name.to_string(),
            })
    }
}

/// In memory provider answering with scripted results and recording what it receives.
///
/// Objects are registered up front, results are served in push order. When no result is
/// queued a reader gets no rows and a non query affects none.
pub struct StubProvider<D: Driver = GenericDriver> {
    driver: D,
    state: Arc<State>,
}

impl Default for StubProvider<GenericDriver> {
    fn default() -> Self {
        Self::new(GenericDriver)
    }
}

impl<D: Driver> StubProvider<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            state: Default::default(),
        }
    }

    pub fn with_object(self, metadata: TableOrViewMetadata) -> Self {
        self.state.objects.lock().push(metadata);
        self
    }

    pub fn push_result(&self, result: Result<RawResult>) {
        self.state.results.lock().push_back(result);
    }

    pub fn push_rows(&self, labels: &[&str], rows: impl IntoIterator<Item = Vec<Value>>) {
        let mut result = RowSet::new(labels.iter().map(|v| v.to_string()).collect());
        result.rows = rows.into_iter().map(Vec::into_boxed_slice).collect();
        self.push_result(Ok(result.into()));
    }

    pub fn push_affected(&self, rows_affected: u64) {
        self.push_result(Ok(RowsAffected {
            rows_affected,
            last_affected_id: None,
        }
        .into()));
    }

    /// The next describe fails with `error`.
    pub fn fail_describe(&self, error: Error) {
        *self.state.describe_error.lock() = Some(error);
    }

    /// The next open fails with `error`.
    pub fn fail_open(&self, error: Error) {
        *self.state.open_error.lock() = Some(error);
    }

    /// Time every command takes.
    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock() = Some(delay);
    }

    /// Time every describe takes.
    pub fn set_describe_delay(&self, delay: Duration) {
        *self.state.describe_delay.lock() = Some(delay);
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.state.commands.lock().clone()
    }

    pub fn last_command(&self) -> Option<RecordedCommand> {
        self.state.commands.lock().last().cloned()
    }

    /// Transaction calls received: `begin`, `commit` and `rollback`.
    pub fn transactions(&self) -> Vec<&'static str> {
        self.state.transactions.lock().clone()
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }

    pub fn describes(&self) -> usize {
        self.state.describes.load(Ordering::SeqCst)
    }

    pub fn dispatches(&self) -> usize {
        self.state.dispatches.load(Ordering::SeqCst)
    }
}

impl<D: Driver> MetadataProvider for StubProvider<D> {
    fn list_objects(&self) -> Result<Vec<ObjectName>> {
        Ok(self
            .state
            .objects
            .lock()
            .iter()
            .map(|v| v.name().clone())
            .collect())
    }

    fn describe(&self, name: &ObjectName) -> Result<TableOrViewMetadata> {
        self.state.describes.fetch_add(1, Ordering::SeqCst);
        let delay = *self.state.describe_delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        self.state.find(name)
    }

    fn describe_async(
        &self,
        name: &ObjectName,
    ) -> impl Future<Output = Result<TableOrViewMetadata>> + Send {
        async move {
            self.state.describes.fetch_add(1, Ordering::SeqCst);
            let delay = *self.state.describe_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.state.find(name)
        }
    }
}

impl<D: Driver> Provider for StubProvider<D> {
    type Driver = D;
    type Connection = StubConnection;

    fn driver(&self) -> &D {
        &self.driver
    }

    fn open(&self) -> Result<StubConnection> {
        if let Some(error) = self.state.open_error.lock().take() {
            return Err(error);
        }
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(StubConnection {
            state: self.state.clone(),
        })
    }
}

pub struct StubConnection {
    state: Arc<State>,
}

impl Drop for StubConnection {
    fn drop(&mut self) {
        self.state.releases.fetch_add(1, Ordering::SeqCst);
    }
}

impl ProviderConnection for StubConnection {
    type Command = StubCommand;

    fn create_command(&mut self, text: &str, kind: CommandKind) -> Result<StubCommand> {
        Ok(StubCommand {
            state: self.state.clone(),
            command: RecordedCommand {
                text: text.to_owned(),
                kind,
                parameters: Vec::new(),
                timeout: None,
            },
        })
    }

    fn begin_transaction(&mut self) -> Result<()> {
        self.state.transactions.lock().push("begin");
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.state.transactions.lock().push("commit");
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.state.transactions.lock().push("rollback");
        Ok(())
    }
}

pub struct StubCommand {
    state: Arc<State>,
    command: RecordedCommand,
}

impl StubCommand {
    fn dispatch(&self) -> Option<Duration> {
        self.state.dispatches.fetch_add(1, Ordering::SeqCst);
        self.state.commands.lock().push(self.command.clone());
        *self.state.delay.lock()
    }

    /// Blocks for the configured delay, cut short by the command timeout.
    fn block(&self, delay: Duration) -> Result<()> {
        match self.command.timeout {
            Some(timeout) if timeout < delay => {
                std::thread::sleep(timeout);
                Err(Error::Timeout {
                    message: format!("The stub command did not complete within {:?}", timeout),
                })
            }
            _ => {
                std::thread::sleep(delay);
                Ok(())
            }
        }
    }

    fn next_result(&self) -> Option<Result<RawResult>> {
        self.state.results.lock().pop_front()
    }

    fn non_query(&self) -> Result<RowsAffected> {
        match self.next_result() {
            Some(Ok(RawResult::Affected(v))) => Ok(v),
            Some(Ok(RawResult::Rows(v))) => Ok(RowsAffected {
                rows_affected: v.len() as u64,
                last_affected_id: None,
            }),
            Some(Err(e)) => Err(e),
            None => Ok(RowsAffected::default()),
        }
    }

    fn reader(&self) -> Result<BufferedCursor> {
        match self.next_result() {
            Some(Ok(RawResult::Rows(v))) => Ok(v.into()),
            Some(Ok(RawResult::Affected(..))) | None => Ok(BufferedCursor::default()),
            Some(Err(e)) => Err(e),
        }
    }
}

impl Command for StubCommand {
    type Cursor = BufferedCursor;

    fn set_timeout(&mut self, timeout: Duration) {
        self.command.timeout = Some(timeout);
    }

    fn bind_parameter(&mut self, name: &str, value: &Value) -> Result<()> {
        self.command
            .parameters
            .push((name.to_owned(), value.clone()));
        Ok(())
    }

    fn execute_non_query(&mut self) -> Result<RowsAffected> {
        if let Some(delay) = self.dispatch() {
            self.block(delay)?;
        }
        self.non_query()
    }

    fn execute_reader(&mut self) -> Result<BufferedCursor> {
        if let Some(delay) = self.dispatch() {
            self.block(delay)?;
        }
        self.reader()
    }

    fn execute_non_query_async(&mut self) -> impl Future<Output = Result<RowsAffected>> + Send {
        async move {
            if let Some(delay) = self.dispatch() {
                tokio::time::sleep(delay).await;
            }
            self.non_query()
        }
    }

    fn execute_reader_async(&mut self) -> impl Future<Output = Result<BufferedCursor>> + Send {
        async move {
            if let Some(delay) = self.dispatch() {
                tokio::time::sleep(delay).await;
            }
            self.reader()
        }
    }
}
