use crate::{Error, MetadataProvider, NameComparison, ObjectName, Result, TableOrViewMetadata};
use parking_lot::{Condvar, Mutex};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Notify;

type Shared = Arc<TableOrViewMetadata>;

/// Lazily populated mapping from object names to their metadata, scoped to one data source.
///
/// A missing key is described by exactly one caller: concurrent callers for the same key,
/// blocking or async, wait for that population and receive the same `Arc`. A failed
/// population is delivered to every waiter and leaves no entry behind, the next call
/// starts over.
pub struct SchemaCache {
    comparison: NameComparison,
    entries: Mutex<HashMap<String, Slot>>,
}

enum Slot {
    Ready(Shared),
    Loading(Arc<Pending>),
}

/// Population in flight, completed exactly once.
struct Pending {
    result: Mutex<Option<Result<Shared>>>,
    ready: Condvar,
    notify: Notify,
}

impl Pending {
    fn new() -> Self {
        Self {
            result: Mutex::new(None),
            ready: Condvar::new(),
            notify: Notify::new(),
        }
    }

    fn complete(&self, result: Result<Shared>) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
        self.notify.notify_waiters();
    }

    fn wait(&self) -> Result<Shared> {
        let mut guard = self.result.lock();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut guard);
        }
    }

    async fn wait_async(&self) -> Result<Shared> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Registered before checking, a completion in between is not lost
            notified.as_mut().enable();
            let current = self.result.lock().clone();
            if let Some(result) = current {
                return result;
            }
            notified.await;
        }
    }
}

enum Lookup<'c> {
    Ready(Shared),
    Wait(Arc<Pending>),
    Populate(PopulateGuard<'c>),
}

/// Held by the caller that won the right to describe a key. Dropping it unfinished (the
/// async caller went away) releases the waiters with `Cancellation`.
struct PopulateGuard<'c> {
    cache: &'c SchemaCache,
    key: String,
    name: ObjectName,
    pending: Arc<Pending>,
    finished: bool,
}

impl PopulateGuard<'_> {
    /// Stores the outcome unless a reset happened meanwhile, then wakes the waiters.
    fn settle(&mut self, result: Result<Shared>) -> Result<Shared> {
        self.finished = true;
        {
            let mut entries = self.cache.entries.lock();
            let current = matches!(
                entries.get(&self.key),
                Some(Slot::Loading(p)) if Arc::ptr_eq(p, &self.pending)
            );
            if current {
                match &result {
                    Ok(v) => {
                        entries.insert(self.key.clone(), Slot::Ready(v.clone()));
                    }
                    Err(..) => {
                        entries.remove(&self.key);
                    }
                }
            }
        }
        self.pending.complete(result.clone());
        result
    }

    fn finish(mut self, result: Result<TableOrViewMetadata>) -> Result<Shared> {
        self.settle(result.map(Arc::new))
    }
}

impl Drop for PopulateGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            log::warn!("Metadata discovery of `{}` was abandoned", self.name);
            let error = Error::Cancellation {
                operation: format!("Describe {}", self.name).into(),
            };
            let _ = self.settle(Err(error));
        }
    }
}

impl SchemaCache {
    pub fn new(comparison: NameComparison) -> Self {
        Self {
            comparison,
            entries: Default::default(),
        }
    }

    pub fn comparison(&self) -> NameComparison {
        self.comparison
    }

    fn lookup(&self, name: &ObjectName) -> Lookup<'_> {
        let key = name.key(self.comparison);
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(Slot::Ready(v)) => Lookup::Ready(v.clone()),
            Some(Slot::Loading(p)) => Lookup::Wait(p.clone()),
            None => {
                let pending = Arc::new(Pending::new());
                entries.insert(key.clone(), Slot::Loading(pending.clone()));
                Lookup::Populate(PopulateGuard {
                    cache: self,
                    key,
                    name: name.clone(),
                    pending,
                    finished: false,
                })
            }
        }
    }

    /// Cached metadata of `name`, describing it through `provider` on the first request.
    pub fn get_or_load(
        &self,
        provider: &impl MetadataProvider,
        name: &ObjectName,
    ) -> Result<Shared> {
        match self.lookup(name) {
            Lookup::Ready(v) => Ok(v),
            Lookup::Wait(pending) => pending.wait(),
            Lookup::Populate(guard) => {
                log::debug!("Describing `{}`", name);
                let result = provider.describe(name);
                guard.finish(result)
            }
        }
    }

    pub async fn get_or_load_async(
        &self,
        provider: &impl MetadataProvider,
        name: &ObjectName,
    ) -> Result<Shared> {
        match self.lookup(name) {
            Lookup::Ready(v) => Ok(v),
            Lookup::Wait(pending) => pending.wait_async().await,
            Lookup::Populate(guard) => {
                log::debug!("Describing `{}`", name);
                let result = provider.describe_async(name).await;
                guard.finish(result)
            }
        }
    }

    /// Describes every object the provider lists, returning how many are cached.
    pub fn preload_all(&self, provider: &impl MetadataProvider) -> Result<usize> {
        let names = provider.list_objects()?;
        for name in &names {
            self.get_or_load(provider, name)?;
        }
        log::debug!("Preloaded the metadata of {} objects", names.len());
        Ok(names.len())
    }

    pub async fn preload_all_async(&self, provider: &impl MetadataProvider) -> Result<usize> {
        let names = provider.list_objects_async().await?;
        for name in &names {
            self.get_or_load_async(provider, name).await?;
        }
        log::debug!("Preloaded the metadata of {} objects", names.len());
        Ok(names.len())
    }

    /// Forgets every entry. Populations in flight still complete for their own waiters but
    /// are not stored.
    pub fn reset(&self) {
        self.entries.lock().clear();
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|v| matches!(v, Slot::Ready(..)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, name: &ObjectName) -> bool {
        matches!(
            self.entries.lock().get(&name.key(self.comparison)),
            Some(Slot::Ready(..))
        )
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new(NameComparison::default())
    }
}
