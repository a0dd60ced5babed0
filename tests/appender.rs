#[cfg(test)]
mod tests {
    use conduit::{
        Appender, CachingAppender, CancellationToken, DataSource, Error, ExecutionToken,
        Executor, Flow, RawResult, Result, RetryAppender, RowSet, TraceEvent, Value, Verdict,
    };
    use conduit_tests::{StubProvider, employee_table, init_logs, silent_logs};
    use parking_lot::Mutex;
    use std::{sync::Arc, time::Duration};

    /// Records the order in which its hooks run.
    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Appender for Recorder {
        fn before(&self, _token: &mut ExecutionToken) -> Result<Flow> {
            self.log.lock().push(format!("{} before", self.name));
            Ok(Flow::Continue)
        }

        fn after(
            &self,
            _token: &ExecutionToken,
            _result: &mut Result<RawResult>,
            _elapsed: Duration,
            attempt: u32,
        ) -> Verdict {
            self.log
                .lock()
                .push(format!("{} after {}", self.name, attempt));
            Verdict::Done
        }
    }

    /// Answers every operation without reaching the database.
    struct Canned;

    impl Appender for Canned {
        fn before(&self, _token: &mut ExecutionToken) -> Result<Flow> {
            let mut rows = RowSet::new(["answer".to_string()].into());
            rows.rows.push([Value::from(42)].into());
            Ok(Flow::Return(rows.into()))
        }
    }

    fn data_source() -> DataSource<StubProvider> {
        init_logs();
        DataSource::new(StubProvider::default().with_object(employee_table()))
    }

    #[test]
    fn ordering() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let data_source = data_source().with_appender(Recorder {
            name: "source",
            log: log.clone(),
        });
        data_source
            .from("employee")
            .with_appender(Recorder {
                name: "first",
                log: log.clone(),
            })
            .with_appender(Recorder {
                name: "second",
                log: log.clone(),
            })
            .to_rows()
            .execute()
            .expect("Failed to read");
        assert_eq!(
            *log.lock(),
            [
                "source before",
                "first before",
                "second before",
                "second after 1",
                "first after 1",
                "source after 1",
            ]
        );
    }

    #[test]
    fn short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let data_source = data_source();
        let answer = data_source
            .from("employee")
            .with_appender(Recorder {
                name: "outer",
                log: log.clone(),
            })
            .with_appender(Canned)
            .with_appender(Recorder {
                name: "inner",
                log: log.clone(),
            })
            .to_scalar::<i32>()
            .execute()
            .expect("Failed to read");
        assert_eq!(answer, 42);
        assert_eq!(*log.lock(), ["outer before", "outer after 1"]);
        assert_eq!(data_source.provider().opens(), 0);
        assert_eq!(data_source.provider().dispatches(), 0);
    }

    #[tokio::test]
    async fn retry() {
        let data_source = data_source();
        let provider = data_source.provider();
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let sink = attempts.clone();
        let timeout = || {
            Err(Error::Timeout {
                message: "busy".into(),
            })
        };
        provider.push_result(timeout());
        provider.push_result(timeout());
        provider.push_rows(&["id"], [vec![Value::from(1i64)]]);
        silent_logs! {
            let rows = data_source
                .from("employee")
                .with_retry(3, Duration::from_millis(1))
                .with_tracing_sink(move |event: &TraceEvent<'_>| {
                    sink.lock().push((event.attempt, event.outcome.is_ok()));
                })
                .to_rows()
                .execute_async(&CancellationToken::new())
                .await
                .expect("Failed to read after retrying");
            assert_eq!(rows.len(), 1);
        }
        // The tracing appender sits inside the retry, it sees each attempt once
        assert_eq!(*attempts.lock(), [(1, false), (1, false), (1, true)]);
        assert_eq!(provider.dispatches(), 3);
        assert_eq!(provider.opens(), 3);
        assert_eq!(provider.releases(), 3);

        // Exhausted
        for _ in 0..2 {
            provider.push_result(timeout());
        }
        silent_logs! {
            let result = data_source
                .from("employee")
                .with_appender(RetryAppender::new(2, Duration::ZERO))
                .to_rows()
                .execute();
            assert!(matches!(result, Err(Error::Timeout { .. })), "{:?}", result);
        }
        assert_eq!(provider.dispatches(), 5);

        // Cancelled while waiting for the next attempt
        provider.push_result(timeout());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            trigger.cancel();
        });
        silent_logs! {
            let result = data_source
                .from("employee")
                .with_retry(5, Duration::from_secs(10))
                .to_rows()
                .execute_async(&cancel)
                .await;
            assert!(matches!(result, Err(Error::Cancellation { .. })), "{:?}", result);
        }
        assert_eq!(provider.dispatches(), 6);
    }

    #[test]
    fn tracing_outside_retry() {
        let data_source = data_source();
        let provider = data_source.provider();
        provider.push_result(Err(Error::Connection {
            message: "reset".into(),
        }));
        let attempts = Arc::new(Mutex::new(Vec::new()));
        let sink = attempts.clone();
        silent_logs! {
            data_source
                .from("employee")
                .with_tracing_sink(move |event: &TraceEvent<'_>| {
                    sink.lock().push(event.attempt);
                })
                .with_retry(3, Duration::ZERO)
                .to_rows()
                .execute()
                .expect("Failed to read after retrying");
        }
        // One event for the whole retried execution
        assert_eq!(*attempts.lock(), [1]);
        assert_eq!(provider.dispatches(), 2);
    }

    #[test]
    fn caching() {
        let data_source = data_source();
        let provider = data_source.provider();
        let read = |name: &str| {
            data_source
                .from("employee")
                .filter("name", name)
                .with_cache()
                .to_rows()
                .execute()
                .expect("Failed to read")
        };
        provider.push_rows(&["id"], [vec![Value::from(1i64)]]);
        assert_eq!(read("Ada").len(), 1);
        assert_eq!(read("Ada").len(), 1);
        assert_eq!(provider.dispatches(), 1);
        // Different parameters, different entry
        provider.push_rows(&["id"], [vec![Value::from(2i64)], vec![Value::from(3i64)]]);
        assert_eq!(read("Grace").len(), 2);
        assert_eq!(provider.dispatches(), 2);
        assert_eq!(data_source.cache().len(), 2);

        // Not cacheable, the store is bypassed
        data_source
            .from("employee")
            .filter("name", "Ada")
            .with_appender(data_source.cache().clone())
            .to_rows()
            .execute()
            .expect("Failed to read");
        assert_eq!(provider.dispatches(), 3);

        data_source.invalidate_cache();
        assert!(data_source.cache().is_empty());
        assert_eq!(read("Ada").len(), 0);
        assert_eq!(provider.dispatches(), 4);
    }

    #[test]
    fn bounded_cache() {
        let data_source = data_source();
        let cache = Arc::new(CachingAppender::new(2));
        for name in ["a", "b", "c", "a"] {
            data_source
                .from("employee")
                .filter("name", name)
                .cacheable()
                .with_appender(cache.clone())
                .to_rows()
                .execute()
                .expect("Failed to read");
        }
        assert_eq!(cache.len(), 2);
        // `a` was evicted by `c`
        assert_eq!(data_source.provider().dispatches(), 4);
    }

    #[test]
    fn change_notification_unsupported() {
        let data_source = data_source();
        silent_logs! {
            let result = data_source
                .update("employee", [("id", Value::from(1)), ("name", Value::from("Ada"))])
                .with_change_notification(|_: &conduit::ExecutionEvent| {})
                .to_rows_affected()
                .execute();
            assert!(matches!(result, Err(Error::Unsupported(..))), "{:?}", result);
        }
        assert_eq!(data_source.provider().dispatches(), 0);
    }
}
