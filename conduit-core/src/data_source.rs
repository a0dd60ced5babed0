use crate::{
    Appender, CachingAppender, DataSourceConfig, Driver, ObjectName, Provider,
    ProviderConnection, Result, SchemaCache, TableOrViewMetadata, executor::closed_scope,
};
use std::sync::Arc;

/// Entry point of the library: one provider plus the state shared by every operation
/// issued against it (configuration, schema metadata, result cache, default appenders).
///
/// Operations start from `&DataSource` (see [`crate::Executor`]), each execution opening
/// and releasing its own connection.
pub struct DataSource<P: Provider> {
    name: Arc<str>,
    provider: P,
    config: DataSourceConfig,
    schema: SchemaCache,
    cache: Arc<CachingAppender>,
    appenders: Vec<Arc<dyn Appender>>,
}

impl<P: Provider> DataSource<P> {
    pub fn new(provider: P) -> Self {
        Self::with_config(provider, DataSourceConfig::default())
    }

    pub fn with_config(provider: P, config: DataSourceConfig) -> Self {
        Self {
            name: <P::Driver as Driver>::NAME.into(),
            provider,
            schema: SchemaCache::new(config.name_comparison),
            cache: Arc::new(CachingAppender::new(config.cache_capacity)),
            config,
            appenders: Vec::new(),
        }
    }

    /// Name used in diagnostics, the driver name unless changed.
    pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach an appender wrapping every operation of this data source. Data source
    /// appenders run outside the ones attached to a single operation.
    pub fn with_appender(mut self, appender: impl Appender + 'static) -> Self {
        self.appenders.push(Arc::new(appender));
        self
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn driver(&self) -> &P::Driver {
        self.provider.driver()
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    pub fn appenders(&self) -> &[Arc<dyn Appender>] {
        &self.appenders
    }

    /// Shared result cache, attached to the operations that ask for caching.
    pub fn cache(&self) -> &Arc<CachingAppender> {
        &self.cache
    }

    pub fn get_or_load(&self, name: impl Into<ObjectName>) -> Result<Arc<TableOrViewMetadata>> {
        self.schema.get_or_load(&self.provider, &name.into())
    }

    pub async fn get_or_load_async(
        &self,
        name: impl Into<ObjectName>,
    ) -> Result<Arc<TableOrViewMetadata>> {
        self.schema
            .get_or_load_async(&self.provider, &name.into())
            .await
    }

    /// Describe every object the backend lists, returns how many were loaded.
    pub fn preload_all(&self) -> Result<usize> {
        self.schema.preload_all(&self.provider)
    }

    pub async fn preload_all_async(&self) -> Result<usize> {
        self.schema.preload_all_async(&self.provider).await
    }

    /// Forget the cached metadata, it is described again on next use.
    pub fn reset_metadata(&self) {
        self.schema.reset();
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Open a connection and start a transaction on it.
    pub fn begin(&self) -> Result<TransactionScope<'_, P>> {
        let mut connection = self.provider.open()?;
        connection.begin_transaction()?;
        Ok(TransactionScope {
            data_source: self,
            connection: Some(connection),
        })
    }

    pub async fn begin_async(&self) -> Result<TransactionScope<'_, P>> {
        let mut connection = self.provider.open_async().await?;
        connection.begin_transaction_async().await?;
        Ok(TransactionScope {
            data_source: self,
            connection: Some(connection),
        })
    }
}

/// Transaction owning its connection until committed or rolled back. Operations issued
/// through `&mut TransactionScope` run on that connection in issue order.
///
/// Dropping an open scope rolls the transaction back.
pub struct TransactionScope<'d, P: Provider> {
    data_source: &'d DataSource<P>,
    connection: Option<P::Connection>,
}

impl<'d, P: Provider> TransactionScope<'d, P> {
    pub fn data_source(&self) -> &'d DataSource<P> {
        self.data_source
    }

    pub(crate) fn connection(&mut self) -> Result<&mut P::Connection> {
        self.connection.as_mut().ok_or_else(closed_scope)
    }

    fn take(&mut self) -> Result<P::Connection> {
        self.connection.take().ok_or_else(closed_scope)
    }

    pub fn commit(mut self) -> Result<()> {
        self.take()?.commit()
    }

    pub fn rollback(mut self) -> Result<()> {
        self.take()?.rollback()
    }

    pub async fn commit_async(mut self) -> Result<()> {
        self.take()?.commit_async().await
    }

    pub async fn rollback_async(mut self) -> Result<()> {
        self.take()?.rollback_async().await
    }
}

impl<P: Provider> Drop for TransactionScope<'_, P> {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            log::warn!(
                "Transaction on {} dropped without commit or rollback, rolling back",
                self.data_source.name
            );
            if let Err(e) = connection.rollback() {
                log::error!("{:#}", e);
            }
        }
    }
}
