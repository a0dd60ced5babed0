use crate::{
    Capabilities, Command, CommandKind, CompiledCommand, Error, Executor, Parameter,
    ProviderConnection, RawResult, Result, RowCursor, send_value, truncate_long,
};
use std::{
    fmt::{self, Debug},
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// Which command entry point the token dispatches to.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    NonQuery,
    #[default]
    Reader,
}

/// Delivered to the listeners when the execution completes.
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    pub operation: Arc<str>,
    pub command_text: String,
    pub elapsed: Duration,
    /// Rows affected or rows read.
    pub outcome: std::result::Result<u64, Error>,
}

pub(crate) enum Listener {
    Callback(Box<dyn FnOnce(&ExecutionEvent) + Send + Sync>),
    Promise(oneshot::Sender<ExecutionEvent>),
}

impl Listener {
    pub(crate) fn promise(operation: Arc<str>) -> (Self, Completion) {
        let (tx, rx) = oneshot::channel();
        (
            Listener::Promise(tx),
            Completion {
                operation,
                receiver: rx,
            },
        )
    }

    fn notify(self, event: &ExecutionEvent) {
        match self {
            Listener::Callback(f) => f(event),
            Listener::Promise(tx) => send_value!(tx, event.clone()),
        }
    }
}

/// Resolves exactly once with the completion event of the token it was registered on, or
/// with `Cancellation` if that token was dropped without running.
pub struct Completion {
    operation: Arc<str>,
    receiver: oneshot::Receiver<ExecutionEvent>,
}

impl Future for Completion {
    type Output = Result<ExecutionEvent>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let operation = self.operation.clone();
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|v| v.map_err(|_| Error::Cancellation { operation }))
    }
}

/// Prepared unit of work: compiled command plus what is needed to run it once.
///
/// The command text and parameters are fixed at construction. Before execution the only
/// mutation allowed is registering listeners.
pub struct ExecutionToken {
    operation: Arc<str>,
    source: Arc<str>,
    command: CompiledCommand,
    mode: ExecutionMode,
    cacheable: bool,
    timeout: Option<Duration>,
    capabilities: Capabilities,
    listeners: Vec<Listener>,
}

impl ExecutionToken {
    pub fn new(
        operation: impl Into<Arc<str>>,
        source: impl Into<Arc<str>>,
        command: CompiledCommand,
        mode: ExecutionMode,
    ) -> Self {
        Self {
            operation: operation.into(),
            source: source.into(),
            command,
            mode,
            cacheable: false,
            timeout: None,
            capabilities: Capabilities::default(),
            listeners: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Diagnostic name of the operation.
    pub fn operation(&self) -> &Arc<str> {
        &self.operation
    }

    /// Name of the data source that produced this token.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn command_text(&self) -> &str {
        &self.command.text
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.command.parameters
    }

    pub fn command_kind(&self) -> CommandKind {
        self.command.kind
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Register a callback invoked once the execution completes. Listeners are not ordered
    /// relative to each other.
    pub fn add_listener(&mut self, listener: impl FnOnce(&ExecutionEvent) + Send + Sync + 'static) {
        self.listeners.push(Listener::Callback(Box::new(listener)));
    }

    /// Future resolved with the completion event.
    pub fn listen(&mut self) -> Completion {
        let (listener, completion) = Listener::promise(self.operation.clone());
        self.listeners.push(listener);
        completion
    }

    pub(crate) fn push_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub(crate) fn cancelled(&self) -> Error {
        Error::Cancellation {
            operation: self.operation.clone(),
        }
    }

    /// Runs the command once on a connection leased from `executor`. The lease is released
    /// on every exit path.
    pub fn run_once<E: Executor>(&self, executor: &mut E) -> Result<RawResult> {
        let mut connection = executor.acquire()?;
        let mut command = connection.create_command(&self.command.text, self.command.kind)?;
        self.bind(&mut command)?;
        match self.mode {
            ExecutionMode::NonQuery => Ok(RawResult::Affected(command.execute_non_query()?)),
            ExecutionMode::Reader => Ok(RawResult::Rows(command.execute_reader()?.read_all()?)),
        }
    }

    /// Same steps as [`ExecutionToken::run_once`]. A cancellation observed before the
    /// command is dispatched prevents the execution, one observed while dispatching or
    /// reading abandons it. The configured timeout is enforced through the same path.
    pub async fn run_once_async<E: Executor>(
        &self,
        executor: &mut E,
        cancel: &CancellationToken,
    ) -> Result<RawResult> {
        if cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        let mut connection = executor.acquire_async().await?;
        let mut command = connection.create_command(&self.command.text, self.command.kind)?;
        self.bind(&mut command)?;
        if cancel.is_cancelled() {
            return Err(self.cancelled());
        }
        let timeout = self.timeout;
        let deadline = async move {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            biased;
            result = self.dispatch_async(&mut command) => result,
            _ = cancel.cancelled() => Err(self.cancelled()),
            _ = deadline => Err(Error::Timeout {
                message: format!(
                    "{} did not complete within {:?}",
                    self.operation,
                    timeout.unwrap_or_default()
                ),
            }),
        }
    }

    fn bind<C: Command>(&self, command: &mut C) -> Result<()> {
        if let Some(timeout) = self.timeout {
            command.set_timeout(timeout);
        }
        for parameter in &self.command.parameters {
            command.bind_parameter(&parameter.name, &parameter.value)?;
        }
        Ok(())
    }

    async fn dispatch_async<C: Command>(&self, command: &mut C) -> Result<RawResult> {
        Ok(match self.mode {
            ExecutionMode::NonQuery => RawResult::Affected(command.execute_non_query_async().await?),
            ExecutionMode::Reader => {
                let mut cursor = command.execute_reader_async().await?;
                RawResult::Rows(cursor.read_all_async().await?)
            }
        })
    }

    /// Fires every listener exactly once with the final outcome.
    pub fn finish(&mut self, result: &Result<RawResult>, elapsed: Duration) {
        let outcome = match result {
            Ok(RawResult::Affected(v)) => Ok(v.rows_affected),
            Ok(RawResult::Rows(v)) => Ok(v.len() as u64),
            Err(e) => {
                log::error!(
                    "{} failed after {:?}: {:#}\n{}",
                    self.operation,
                    elapsed,
                    e,
                    truncate_long!(self.command.text)
                );
                Err(e.clone())
            }
        };
        let listeners = std::mem::take(&mut self.listeners);
        if listeners.is_empty() {
            return;
        }
        let event = ExecutionEvent {
            operation: self.operation.clone(),
            command_text: self.command.text.clone(),
            elapsed,
            outcome,
        };
        for listener in listeners {
            listener.notify(&event);
        }
    }
}

impl Debug for ExecutionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionToken")
            .field("operation", &self.operation)
            .field("source", &self.source)
            .field("command", &self.command)
            .field("mode", &self.mode)
            .field("cacheable", &self.cacheable)
            .field("timeout", &self.timeout)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
