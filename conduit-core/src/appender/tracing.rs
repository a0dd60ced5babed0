use crate::{Appender, Error, ExecutionToken, RawResult, Result, Verdict, truncate_long};
use std::time::Duration;

/// Structured record of one execution attempt.
#[derive(Debug)]
pub struct TraceEvent<'a> {
    pub operation: &'a str,
    pub source: &'a str,
    pub command_text: &'a str,
    pub elapsed: Duration,
    pub attempt: u32,
    /// Rows affected or rows read on success.
    pub outcome: std::result::Result<u64, &'a Error>,
}

/// Receives trace events.
pub trait TraceSink: Send + Sync {
    fn record(&self, event: &TraceEvent<'_>);
}

impl<F> TraceSink for F
where
    F: Fn(&TraceEvent<'_>) + Send + Sync,
{
    fn record(&self, event: &TraceEvent<'_>) {
        self(event)
    }
}

/// Writes trace events to the `log` facade under the `conduit::trace` target.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogSink;

impl TraceSink for LogSink {
    fn record(&self, event: &TraceEvent<'_>) {
        match event.outcome {
            Ok(rows) => log::info!(
                target: "conduit::trace",
                "{} on {} succeeded in {:?} (attempt {}, {} rows)\n{}",
                event.operation,
                event.source,
                event.elapsed,
                event.attempt,
                rows,
                truncate_long!(event.command_text),
            ),
            Err(e) => log::warn!(
                target: "conduit::trace",
                "{} on {} failed in {:?} (attempt {}): {:#}\n{}",
                event.operation,
                event.source,
                event.elapsed,
                event.attempt,
                e,
                truncate_long!(event.command_text),
            ),
        }
    }
}

/// Emits one [`TraceEvent`] per attempt without touching the result.
#[derive(Default, Debug, Clone)]
pub struct TracingAppender<S: TraceSink = LogSink> {
    sink: S,
}

impl<S: TraceSink> TracingAppender<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }
}

impl<S: TraceSink> Appender for TracingAppender<S> {
    fn after(
        &self,
        token: &ExecutionToken,
        result: &mut Result<RawResult>,
        elapsed: Duration,
        attempt: u32,
    ) -> Verdict {
        let outcome = match result {
            Ok(RawResult::Affected(v)) => Ok(v.rows_affected),
            Ok(RawResult::Rows(v)) => Ok(v.len() as u64),
            Err(e) => Err(&*e),
        };
        self.sink.record(&TraceEvent {
            operation: token.operation(),
            source: token.source(),
            command_text: token.command_text(),
            elapsed,
            attempt,
            outcome,
        });
        Verdict::Done
    }
}
