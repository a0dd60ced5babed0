#[cfg(test)]
mod tests {
    use conduit::{
        CancellationToken, CommandKind, DataSource, DataSourceConfig, Error, ExecutionMode,
        Executor, Value,
    };
    use conduit_tests::{StubProvider, employee_table, init_logs, silent_logs};
    use indoc::indoc;
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    fn data_source() -> DataSource<StubProvider> {
        init_logs();
        DataSource::new(StubProvider::default().with_object(employee_table()))
    }

    fn employees(provider: &StubProvider) {
        provider.push_rows(
            &["id", "name"],
            [
                vec![Value::from(1i64), Value::from("Ada")],
                vec![Value::from(2i64), Value::from("Grace")],
            ],
        );
    }

    #[test]
    fn token() {
        let data_source = data_source().with_name("hr-database");
        let mut link = data_source
            .from("employee")
            .filter("name", "Ada")
            .columns(["id"])
            .to_scalar::<i64>();
        let token = link.prepare().expect("Failed to compile");
        assert_eq!(
            token.command_text(),
            indoc! {r#"
                SELECT "id"
                FROM "employee"
                WHERE "name" = ?;
            "#}
            .trim()
        );
        assert_eq!(token.parameters().len(), 1);
        assert_eq!(token.parameters()[0].value, Value::from("Ada"));
        assert_eq!(token.command_kind(), CommandKind::Text);
        assert_eq!(token.mode(), ExecutionMode::Reader);
        assert_eq!(token.source(), "hr-database");
        assert_eq!(&**token.operation(), "Query employee");
        assert_eq!(token.timeout(), None);
        // Compiling does not touch a connection
        assert_eq!(data_source.provider().opens(), 0);
        assert_eq!(data_source.provider().dispatches(), 0);

        let token = data_source
            .insert("employee", [("name", "Ada")])
            .to_rows_affected()
            .prepare()
            .expect("Failed to compile");
        assert_eq!(token.mode(), ExecutionMode::NonQuery);
    }

    #[test]
    fn connections_released() {
        let data_source = data_source();
        let provider = data_source.provider();
        employees(provider);
        let rows = data_source
            .from("employee")
            .to_rows()
            .execute()
            .expect("Failed to read");
        assert_eq!(rows.len(), 2);
        assert_eq!(provider.opens(), 1);
        assert_eq!(provider.releases(), 1);

        silent_logs! {
            provider.push_result(Err(Error::ConstraintViolation {
                message: "duplicate key".into(),
            }));
            let result = data_source
                .insert("employee", [("id", Value::from(1)), ("name", Value::from("Ada"))])
                .to_rows_affected()
                .execute();
            assert!(matches!(result, Err(Error::ConstraintViolation { .. })), "{:?}", result);

            // An execution error is reported as such, not as missing data
            provider.push_result(Err(Error::Connection {
                message: "reset by peer".into(),
            }));
            let result = data_source.from("employee").to_row().execute();
            assert!(matches!(result, Err(Error::Connection { .. })), "{:?}", result);

            provider.fail_open(Error::Connection {
                message: "refused".into(),
            });
            let result = data_source.from("employee").to_rows().execute();
            assert!(matches!(result, Err(Error::Connection { .. })), "{:?}", result);
        }
        assert_eq!(provider.opens(), 3);
        assert_eq!(provider.releases(), 3);
        assert_eq!(provider.dispatches(), 3);
    }

    #[test]
    fn parameters_bound() {
        init_logs();
        let data_source = DataSource::with_config(
            StubProvider::default().with_object(employee_table()),
            DataSourceConfig::default().with_command_timeout(Duration::from_secs(3)),
        );
        let provider = data_source.provider();
        data_source
            .update(
                "employee",
                [("title", Value::from("CTO")), ("id", Value::from(5))],
            )
            .to_rows_affected()
            .execute()
            .expect("Failed to update");
        let command = provider.last_command().expect("No command was dispatched");
        assert_eq!(
            command.parameters,
            vec![
                ("title".to_string(), Value::from("CTO")),
                ("id".to_string(), Value::from(5)),
            ]
        );
        assert_eq!(command.timeout, Some(Duration::from_secs(3)));
        assert_eq!(command.kind, CommandKind::Text);
    }

    #[tokio::test]
    async fn sync_and_async_agree() {
        let data_source = data_source();
        let provider = data_source.provider();
        employees(provider);
        let sync = data_source
            .from("employee")
            .sort_by("id")
            .to_rows()
            .execute()
            .expect("Failed to read");
        employees(provider);
        let asynchronous = data_source
            .from("employee")
            .sort_by("id")
            .to_rows()
            .execute_async(&CancellationToken::new())
            .await
            .expect("Failed to read");
        assert_eq!(sync, asynchronous);
        let commands = provider.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], commands[1]);
        assert_eq!(provider.describes(), 1);
        assert_eq!(provider.opens(), provider.releases());
    }

    #[tokio::test]
    async fn timeout() {
        init_logs();
        let data_source = DataSource::with_config(
            StubProvider::default().with_object(employee_table()),
            DataSourceConfig::default().with_command_timeout(Duration::from_millis(50)),
        );
        let provider = data_source.provider();
        provider.set_delay(Duration::from_millis(500));
        silent_logs! {
            let result = data_source
                .from("employee")
                .to_rows()
                .execute_async(&CancellationToken::new())
                .await;
            assert!(matches!(result, Err(Error::Timeout { .. })), "{:?}", result);
            assert!(result.is_err_and(|e| e.is_transient()));

            let result = data_source.from("employee").to_rows().execute();
            assert!(matches!(result, Err(Error::Timeout { .. })), "{:?}", result);
        }
        assert_eq!(provider.dispatches(), 2);
        assert_eq!(provider.opens(), provider.releases());
    }

    #[tokio::test]
    async fn cancellation() {
        let data_source = data_source();
        let provider = data_source.provider();

        // Cancelled before dispatch
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = data_source
            .from("employee")
            .to_rows()
            .execute_async(&cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancellation { .. })), "{:?}", result);
        assert_eq!(provider.dispatches(), 0);

        // Cancelled while dispatching
        provider.set_delay(Duration::from_millis(500));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });
        silent_logs! {
            let result = data_source
                .from("employee")
                .to_rows()
                .execute_async(&cancel)
                .await;
            assert!(
                matches!(&result, Err(Error::Cancellation { operation }) if &**operation == "Query employee"),
                "{:?}",
                result
            );
        }
        assert_eq!(provider.dispatches(), 1);
        assert_eq!(provider.opens(), provider.releases());

        // Cancelled after the rows were read
        provider.set_delay(Duration::ZERO);
        employees(provider);
        let cancel = CancellationToken::new();
        let rows = data_source
            .from("employee")
            .to_rows()
            .execute_async(&cancel)
            .await
            .expect("Failed to read");
        cancel.cancel();
        assert_eq!(rows.len(), 2);
        assert_eq!(provider.dispatches(), 2);
        assert_eq!(provider.opens(), provider.releases());
    }

    #[tokio::test]
    async fn completion() {
        let data_source = data_source();
        employees(data_source.provider());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut token = data_source
            .from("employee")
            .to_rows()
            .prepare()
            .expect("Failed to compile");
        let completion = token.listen();
        token.add_listener(move |event| {
            assert!(matches!(event.outcome, Ok(2)));
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(token.listener_count(), 2);
        let mut executor = &data_source;
        let started = std::time::Instant::now();
        let result = token.run_once(&mut executor);
        token.finish(&result, started.elapsed());
        let event = completion.await.expect("The completion was not delivered");
        assert!(matches!(event.outcome, Ok(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Fired once, nothing left to notify
        assert_eq!(token.listener_count(), 0);

        // Dropped without running
        let mut token = data_source
            .from("employee")
            .to_rows()
            .prepare()
            .expect("Failed to compile");
        let completion = token.listen();
        drop(token);
        let result = completion.await;
        assert!(matches!(result, Err(Error::Cancellation { .. })), "{:?}", result);

        // Failed compilation releases the listeners
        let mut link = data_source
            .from("employee")
            .filter("missing", 1)
            .to_rows();
        let completion = link.listen();
        silent_logs! {
            let result = link.execute();
            assert!(matches!(result, Err(Error::ColumnNotFound { .. })), "{:?}", result);
        }
        let result = completion.await;
        assert!(matches!(result, Err(Error::Cancellation { .. })), "{:?}", result);
    }

    #[tokio::test]
    async fn transactions() {
        let data_source = data_source();
        let provider = data_source.provider();

        let mut transaction = data_source.begin().expect("Could not begin");
        transaction
            .insert("employee", [("name", "Ada")])
            .to_rows_affected()
            .execute()
            .expect("Failed to insert");
        employees(provider);
        let rows = transaction
            .from("employee")
            .to_rows()
            .execute_async(&CancellationToken::new())
            .await
            .expect("Failed to read");
        assert_eq!(rows.len(), 2);
        transaction.commit().expect("Failed to commit");
        // Every command ran on the connection of the scope
        assert_eq!(provider.opens(), 1);
        assert_eq!(provider.releases(), 1);
        assert_eq!(provider.transactions(), ["begin", "commit"]);

        {
            let mut transaction = data_source
                .begin_async()
                .await
                .expect("Could not begin");
            transaction
                .delete("employee", [("id", 1)])
                .to_rows_affected()
                .execute()
                .expect("Failed to delete");
            silent_logs! {
                drop(transaction);
            }
        }
        assert_eq!(
            provider.transactions(),
            ["begin", "commit", "begin", "rollback"]
        );

        let transaction = data_source.begin().expect("Could not begin");
        transaction
            .rollback_async()
            .await
            .expect("Failed to rollback");
        assert_eq!(provider.transactions().last(), Some(&"rollback"));
        assert_eq!(provider.opens(), 3);
        assert_eq!(provider.releases(), 3);
    }
}
