mod caching;
mod change;
mod retry;
mod tracing;

pub use caching::*;
pub use change::*;
pub use retry::*;
pub use tracing::*;

use crate::{ExecutionToken, Executor, RawResult, Result};
use futures::{FutureExt, future::BoxFuture};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio_util::sync::CancellationToken;

/// Decision taken by [`Appender::before`].
#[derive(Debug, Clone)]
pub enum Flow {
    Continue,
    /// Skip the execution and the inner appenders, returning this result instead.
    Return(RawResult),
}

/// Decision taken by [`Appender::after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Done,
    /// Run the inner steps again after the delay.
    Retry(Duration),
}

/// Cross-cutting step wrapped around an execution.
///
/// An appender sees the token before it runs and may register listeners on it or
/// short-circuit, then sees the result and may rewrite it or ask for another attempt. It
/// never changes the command text or the parameters.
pub trait Appender: Send + Sync {
    fn before(&self, _token: &mut ExecutionToken) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    /// `elapsed` covers the inner steps of this attempt, `attempt` starts from 1.
    fn after(
        &self,
        _token: &ExecutionToken,
        _result: &mut Result<RawResult>,
        _elapsed: Duration,
        _attempt: u32,
    ) -> Verdict {
        Verdict::Done
    }
}

impl<A: Appender + ?Sized> Appender for Arc<A> {
    fn before(&self, token: &mut ExecutionToken) -> Result<Flow> {
        (**self).before(token)
    }

    fn after(
        &self,
        token: &ExecutionToken,
        result: &mut Result<RawResult>,
        elapsed: Duration,
        attempt: u32,
    ) -> Verdict {
        (**self).after(token, result, elapsed, attempt)
    }
}

/// Ordered appender chain. The first appender is the outermost, the last attached runs
/// closest to the execution.
#[derive(Default, Clone)]
pub struct Pipeline {
    appenders: Vec<Arc<dyn Appender>>,
}

impl Pipeline {
    pub fn new(appenders: impl IntoIterator<Item = Arc<dyn Appender>>) -> Self {
        Self {
            appenders: appenders.into_iter().collect(),
        }
    }

    pub fn push(&mut self, appender: Arc<dyn Appender>) {
        self.appenders.push(appender);
    }

    pub fn len(&self) -> usize {
        self.appenders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.appenders.is_empty()
    }

    /// Runs every `before` outermost first, stopping at the first short-circuit. Returns
    /// how many appenders wrap the core step and the short-circuited result, if any.
    fn prepare(&self, token: &mut ExecutionToken) -> Result<(usize, Option<RawResult>)> {
        for (i, appender) in self.appenders.iter().enumerate() {
            if let Flow::Return(result) = appender.before(token)? {
                return Ok((i, Some(result)));
            }
        }
        Ok((self.appenders.len(), None))
    }

    pub fn execute<E: Executor>(
        &self,
        token: &mut ExecutionToken,
        executor: &mut E,
    ) -> Result<RawResult> {
        let (depth, short) = self.prepare(token)?;
        self.layer(0, depth, token, executor, &short)
    }

    fn layer<E: Executor>(
        &self,
        index: usize,
        depth: usize,
        token: &ExecutionToken,
        executor: &mut E,
        short: &Option<RawResult>,
    ) -> Result<RawResult> {
        if index == depth {
            return match short {
                Some(result) => Ok(result.clone()),
                None => token.run_once(executor),
            };
        }
        let appender = &self.appenders[index];
        let mut attempt = 1;
        loop {
            let start = Instant::now();
            let mut result = self.layer(index + 1, depth, token, executor, short);
            match appender.after(token, &mut result, start.elapsed(), attempt) {
                Verdict::Done => return result,
                Verdict::Retry(delay) => {
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    pub async fn execute_async<E: Executor>(
        &self,
        token: &mut ExecutionToken,
        executor: &mut E,
        cancel: &CancellationToken,
    ) -> Result<RawResult> {
        let (depth, short) = self.prepare(token)?;
        self.layer_async(0, depth, token, executor, &short, cancel)
            .await
    }

    fn layer_async<'a, E: Executor>(
        &'a self,
        index: usize,
        depth: usize,
        token: &'a ExecutionToken,
        executor: &'a mut E,
        short: &'a Option<RawResult>,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<RawResult>> {
        async move {
            if index == depth {
                return match short {
                    Some(result) => Ok(result.clone()),
                    None => token.run_once_async(executor, cancel).await,
                };
            }
            let appender = &self.appenders[index];
            let mut attempt = 1;
            loop {
                let start = Instant::now();
                let mut result = self
                    .layer_async(index + 1, depth, token, &mut *executor, short, cancel)
                    .await;
                match appender.after(token, &mut result, start.elapsed(), attempt) {
                    Verdict::Done => return result,
                    Verdict::Retry(delay) => {
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = cancel.cancelled() => return Err(token.cancelled()),
                        }
                        attempt += 1;
                    }
                }
            }
        }
        .boxed()
    }
}
