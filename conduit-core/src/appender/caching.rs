use crate::{Appender, ExecutionToken, Flow, RawResult, Result, Verdict};
use lru::LruCache;
use parking_lot::Mutex;
use std::{fmt::Write, num::NonZeroUsize, time::Duration};

/// Serves repeated cacheable operations from memory.
///
/// Results are keyed by command text and parameter values and kept in a bounded LRU store.
/// Operations not marked cacheable pass through untouched.
pub struct CachingAppender {
    store: Mutex<LruCache<String, RawResult>>,
}

impl CachingAppender {
    pub fn new(capacity: usize) -> Self {
        Self {
            store: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    fn key(token: &ExecutionToken) -> String {
        let mut key = String::with_capacity(token.command_text().len() + 32);
        let _ = write!(key, "{:?}\u{1f}{}", token.mode(), token.command_text());
        for parameter in token.parameters() {
            let _ = write!(key, "\u{1f}{}={:?}", parameter.name, parameter.value);
        }
        key
    }

    /// Drops every stored result.
    pub fn invalidate(&self) {
        self.store.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }
}

impl Default for CachingAppender {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Appender for CachingAppender {
    fn before(&self, token: &mut ExecutionToken) -> Result<Flow> {
        if !token.cacheable() {
            return Ok(Flow::Continue);
        }
        let key = Self::key(token);
        Ok(match self.store.lock().get(&key) {
            Some(result) => {
                log::debug!("{} served from the cache", token.operation());
                Flow::Return(result.clone())
            }
            None => Flow::Continue,
        })
    }

    fn after(
        &self,
        token: &ExecutionToken,
        result: &mut Result<RawResult>,
        _elapsed: Duration,
        _attempt: u32,
    ) -> Verdict {
        if let (true, Ok(result)) = (token.cacheable(), &*result) {
            self.store.lock().put(Self::key(token), result.clone());
        }
        Verdict::Done
    }
}
