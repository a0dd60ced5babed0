use crate::{
    Appender, AsValue, ChangeNotificationAppender, ChangeSubscriber, Completion, Driver, Error,
    ExecutionEvent, ExecutionToken, Executor, FromRow, Limit, LogSink, MaterializeOptions,
    Materializer, OperationDescriptor, Pipeline, RawResult, Result, RetryAppender, RowLabeled,
    SortExpression, SqlWriter, TableOrViewMetadata, ToCollection, ToObject, ToObjectOrAbsent,
    ToRowSet, ToRowsAffected, ToScalar, ToScalarOrAbsent, TraceSink, TracingAppender, Value,
    materialize, token::Listener,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

/// Fluent chain describing one operation, started from an [`Executor`] and closed by a
/// materializer selection (`to_*`).
pub struct OperationBuilder<E: Executor> {
    executor: E,
    descriptor: OperationDescriptor,
    appenders: Vec<Arc<dyn Appender>>,
}

impl<E: Executor> OperationBuilder<E> {
    pub fn new(executor: E, descriptor: OperationDescriptor) -> Self {
        Self {
            executor,
            descriptor,
            appenders: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    /// Equality filter on `column`, joined with the others by `AND`. A NULL value matches
    /// `IS NULL`.
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.descriptor = self.descriptor.with_parameter(column, value);
        self
    }

    /// Set a parameter: filter for queries, value for writes, argument for procedures.
    pub fn parameter(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(name, value)
    }

    /// Project only these columns instead of every column of the object.
    pub fn columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.descriptor = self.descriptor.with_columns(columns);
        self
    }

    pub fn sort_by(mut self, column: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.with_sort(SortExpression::ascending(column));
        self
    }

    pub fn sort_by_descending(mut self, column: impl Into<String>) -> Self {
        self.descriptor = self
            .descriptor
            .with_sort(SortExpression::descending(column));
        self
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.descriptor = self.descriptor.with_limit(limit);
        self
    }

    /// Allow the caching appender to serve this operation.
    pub fn cacheable(mut self) -> Self {
        self.descriptor = self.descriptor.with_cacheable(true);
        self
    }

    /// Override the data source strict mapping setting.
    pub fn strict(mut self, strict: bool) -> Self {
        self.descriptor = self.descriptor.with_strict(strict);
        self
    }

    /// Attach `appender` closest to the execution so far.
    pub fn with_appender(mut self, appender: impl Appender + 'static) -> Self {
        self.appenders.push(Arc::new(appender));
        self
    }

    pub fn with_tracing(self) -> Self {
        self.with_appender(TracingAppender::new(LogSink))
    }

    pub fn with_tracing_sink(self, sink: impl TraceSink + 'static) -> Self {
        self.with_appender(TracingAppender::new(sink))
    }

    /// Mark the operation cacheable and route it through the data source result cache.
    pub fn with_cache(mut self) -> Self {
        let cache = self.executor.data_source().cache().clone();
        self.appenders.push(cache);
        self.cacheable()
    }

    pub fn with_change_notification(self, subscriber: impl ChangeSubscriber) -> Self {
        self.with_appender(ChangeNotificationAppender::new(subscriber))
    }

    pub fn with_retry(self, attempts: u32, delay: Duration) -> Self {
        self.with_appender(RetryAppender::new(attempts, delay))
    }

    pub fn materialize_with<M: Materializer>(self, materializer: M) -> Link<E, M> {
        Link {
            executor: self.executor,
            descriptor: self.descriptor.with_shape(materializer.shape()),
            appenders: self.appenders,
            materializer,
            listeners: Vec::new(),
        }
    }

    pub fn to_scalar<T: AsValue + 'static>(self) -> Link<E, ToScalar<T>> {
        self.materialize_with(ToScalar::new())
    }

    pub fn to_scalar_or_absent<T: AsValue + 'static>(self) -> Link<E, ToScalarOrAbsent<T>> {
        self.materialize_with(ToScalarOrAbsent::new())
    }

    pub fn to_object<T: FromRow + 'static>(self) -> Link<E, ToObject<T>> {
        self.materialize_with(ToObject::new())
    }

    pub fn to_object_or_absent<T: FromRow + 'static>(self) -> Link<E, ToObjectOrAbsent<T>> {
        self.materialize_with(ToObjectOrAbsent::new())
    }

    pub fn to_collection<T: FromRow + 'static>(self) -> Link<E, ToCollection<T>> {
        self.materialize_with(ToCollection::new())
    }

    pub fn to_row(self) -> Link<E, ToObject<RowLabeled>> {
        self.to_object()
    }

    pub fn to_row_or_absent(self) -> Link<E, ToObjectOrAbsent<RowLabeled>> {
        self.to_object_or_absent()
    }

    pub fn to_rows(self) -> Link<E, ToCollection<RowLabeled>> {
        self.to_collection()
    }

    /// Every row as a dataset.
    pub fn to_row_set(self) -> Link<E, ToRowSet> {
        self.materialize_with(ToRowSet)
    }

    pub fn to_rows_affected(self) -> Link<E, ToRowsAffected> {
        self.materialize_with(ToRowsAffected)
    }
}

/// Operation with its materializer chosen, ready to run.
pub struct Link<E: Executor, M: Materializer> {
    executor: E,
    descriptor: OperationDescriptor,
    appenders: Vec<Arc<dyn Appender>>,
    materializer: M,
    listeners: Vec<Listener>,
}

impl<E: Executor, M: Materializer> Link<E, M> {
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    /// Future resolved once the execution completes.
    pub fn listen(&mut self) -> Completion {
        let (listener, completion) = Listener::promise(self.descriptor.name().into());
        self.listeners.push(listener);
        completion
    }

    /// Callback invoked once the execution completes.
    pub fn on_complete(
        mut self,
        listener: impl FnOnce(&ExecutionEvent) + Send + Sync + 'static,
    ) -> Self {
        self.listeners.push(Listener::Callback(Box::new(listener)));
        self
    }

    fn ensure_supported(&self) -> Result<()> {
        self.executor
            .data_source()
            .driver()
            .capabilities()
            .ensure_supports(&self.descriptor)
            .inspect_err(|e| log::error!("{:#}", e))
    }

    fn compile(&mut self, metadata: Option<&TableOrViewMetadata>) -> Result<ExecutionToken> {
        let data_source = self.executor.data_source();
        let driver = data_source.driver();
        let config = data_source.config();
        let command = driver
            .sql_writer()
            .build(&self.descriptor, metadata, config.name_comparison)
            .inspect_err(|e| log::error!("{:#}", e))?;
        let mut token = ExecutionToken::new(
            self.descriptor.name(),
            data_source.name().clone(),
            command,
            self.descriptor.shape().mode(),
        )
        .with_timeout(config.command_timeout)
        .with_cacheable(self.descriptor.cacheable())
        .with_capabilities(driver.capabilities());
        for listener in self.listeners.drain(..) {
            token.push_listener(listener);
        }
        Ok(token)
    }

    /// Resolve the metadata and compile the command, without running it.
    pub fn prepare(&mut self) -> Result<ExecutionToken> {
        self.ensure_supported()?;
        let metadata = match self.descriptor.object() {
            Some(object) => Some(self.executor.data_source().get_or_load(object)?),
            None => None,
        };
        self.compile(metadata.as_deref())
    }

    pub async fn prepare_async(&mut self) -> Result<ExecutionToken> {
        self.ensure_supported()?;
        let metadata = match self.descriptor.object() {
            Some(object) => Some(
                self.executor
                    .data_source()
                    .get_or_load_async(object)
                    .await?,
            ),
            None => None,
        };
        self.compile(metadata.as_deref())
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.executor
                .data_source()
                .appenders()
                .iter()
                .chain(self.appenders.iter())
                .cloned(),
        )
    }

    fn options(&self) -> MaterializeOptions {
        MaterializeOptions {
            strict: self
                .descriptor
                .strict()
                .unwrap_or(self.executor.data_source().config().strict_mapping),
        }
    }

    fn complete(&self, token: ExecutionToken, raw: RawResult) -> Result<M::Output> {
        let materialized = materialize(token.operation(), raw, self.materializer.shape())?;
        self.materializer.convert(materialized, &self.options())
    }

    pub fn execute(mut self) -> Result<M::Output> {
        let mut token = self.prepare()?;
        let pipeline = self.pipeline();
        let start = Instant::now();
        let result = pipeline.execute(&mut token, &mut self.executor);
        token.finish(&result, start.elapsed());
        self.complete(token, result?)
    }

    /// Asynchronous twin of [`Link::execute`]. Cancelling `cancel` before the command is
    /// dispatched prevents the execution, once the result was read it has no effect.
    pub async fn execute_async(mut self, cancel: &CancellationToken) -> Result<M::Output> {
        if cancel.is_cancelled() {
            return Err(Error::Cancellation {
                operation: self.descriptor.name().into(),
            });
        }
        let mut token = self.prepare_async().await?;
        let pipeline = self.pipeline();
        let start = Instant::now();
        let result = pipeline
            .execute_async(&mut token, &mut self.executor, cancel)
            .await;
        token.finish(&result, start.elapsed());
        self.complete(token, result?)
    }
}
