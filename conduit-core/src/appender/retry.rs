use crate::{Appender, ExecutionToken, RawResult, Result, Verdict};
use std::time::Duration;

/// Runs the inner steps again when they fail with a transient error (connection failure or
/// timeout), up to `attempts` runs in total.
#[derive(Debug, Clone, Copy)]
pub struct RetryAppender {
    attempts: u32,
    delay: Duration,
}

impl RetryAppender {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

impl Appender for RetryAppender {
    fn after(
        &self,
        token: &ExecutionToken,
        result: &mut Result<RawResult>,
        _elapsed: Duration,
        attempt: u32,
    ) -> Verdict {
        match result {
            Err(e) if e.is_transient() && attempt < self.attempts => {
                log::warn!(
                    "{} failed on attempt {}/{}, retrying in {:?}: {:#}",
                    token.operation(),
                    attempt,
                    self.attempts,
                    self.delay,
                    e
                );
                Verdict::Retry(self.delay)
            }
            _ => Verdict::Done,
        }
    }
}
