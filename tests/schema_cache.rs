#[cfg(test)]
mod tests {
    use conduit::{
        ColumnMetadata, DataSource, Error, NameComparison, ObjectKind, ObjectName, SchemaCache,
        TableOrViewMetadata,
    };
    use conduit_tests::{
        StubProvider, assignment_table, employee_table, init_logs, raise_procedure, silent_logs,
        staff_view,
    };
    use std::{sync::Arc, time::Duration};

    fn provider() -> StubProvider {
        init_logs();
        StubProvider::default()
            .with_object(employee_table())
            .with_object(assignment_table())
            .with_object(staff_view())
            .with_object(raise_procedure())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn single_population() {
        let data_source = Arc::new(DataSource::new(provider()));
        data_source
            .provider()
            .set_describe_delay(Duration::from_millis(50));
        let mut tasks = Vec::new();
        for i in 0..8 {
            let data_source = data_source.clone();
            if i % 2 == 0 {
                tasks.push(tokio::spawn(async move {
                    data_source
                        .get_or_load_async("EMPLOYEE")
                        .await
                        .expect("Failed to describe")
                }));
            } else {
                tasks.push(tokio::task::spawn_blocking(move || {
                    data_source
                        .get_or_load("employee")
                        .expect("Failed to describe")
                }));
            }
        }
        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.expect("The task panicked"));
        }
        assert_eq!(data_source.provider().describes(), 1);
        assert!(results.iter().all(|v| Arc::ptr_eq(v, &results[0])));
        assert_eq!(results[0].columns().len(), 5);
        assert_eq!(data_source.schema().len(), 1);
        assert!(data_source.schema().contains(&"Employee".into()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failure_reaches_every_waiter() {
        let data_source = Arc::new(DataSource::new(provider()));
        let provider = data_source.provider();
        provider.set_describe_delay(Duration::from_millis(50));
        provider.fail_describe(Error::Connection {
            message: "The server went away".into(),
        });
        let mut tasks = Vec::new();
        for _ in 0..4 {
            let data_source = data_source.clone();
            tasks.push(tokio::spawn(async move {
                data_source.get_or_load_async("employee").await
            }));
        }
        for task in tasks {
            let result = task.await.expect("The task panicked");
            assert!(matches!(result, Err(Error::Connection { .. })), "{:?}", result);
        }
        assert_eq!(provider.describes(), 1);
        assert!(data_source.schema().is_empty());

        // No entry left behind, the next call describes again
        let metadata = data_source
            .get_or_load_async("employee")
            .await
            .expect("Failed to describe");
        assert_eq!(metadata.name().name(), "employee");
        assert_eq!(provider.describes(), 2);
    }

    #[tokio::test]
    async fn abandoned_population() {
        let data_source = Arc::new(DataSource::new(provider()));
        data_source
            .provider()
            .set_describe_delay(Duration::from_millis(200));
        let waiter = {
            let data_source = data_source.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                data_source.get_or_load_async("employee").await
            })
        };
        silent_logs! {
            let abandoned = tokio::time::timeout(
                Duration::from_millis(50),
                data_source.get_or_load_async("employee"),
            )
            .await;
            assert!(abandoned.is_err());
            let result = waiter.await.expect("The task panicked");
            assert!(matches!(result, Err(Error::Cancellation { .. })), "{:?}", result);
        }
        assert!(data_source.schema().is_empty());
    }

    #[test]
    fn not_found() {
        let data_source = DataSource::new(provider());
        silent_logs! {
            let result = data_source.get_or_load("missing");
            assert!(matches!(&result, Err(Error::ObjectNotFound { object }) if object == "missing"));
        }
        assert!(!data_source.schema().contains(&"missing".into()));
    }

    #[test]
    fn reset_and_preload() {
        let data_source = DataSource::new(provider());
        let provider = data_source.provider();
        let first = data_source.get_or_load("employee").expect("Failed to describe");
        let again = data_source.get_or_load("Employee").expect("Failed to describe");
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(provider.describes(), 1);

        data_source.reset_metadata();
        assert!(data_source.schema().is_empty());
        let after = data_source.get_or_load("employee").expect("Failed to describe");
        assert!(!Arc::ptr_eq(&first, &after));
        assert_eq!(*first, *after);
        assert_eq!(provider.describes(), 2);

        assert_eq!(data_source.preload_all().expect("Failed to preload"), 4);
        // Employee was already cached
        assert_eq!(provider.describes(), 5);
        assert_eq!(data_source.schema().len(), 4);
        let procedure = data_source
            .get_or_load(ObjectName::new("hr", "raise_salary"))
            .expect("Failed to describe");
        assert_eq!(procedure.kind(), ObjectKind::StoredProcedure);
        assert_eq!(provider.describes(), 5);
    }

    #[test]
    fn ordinal_keys() {
        let cache = SchemaCache::new(NameComparison::Ordinal);
        let provider = provider();
        cache
            .get_or_load(&provider, &"employee".into())
            .expect("Failed to describe");
        cache
            .get_or_load(&provider, &"EMPLOYEE".into())
            .expect("Failed to describe");
        // Distinct keys, described twice
        assert_eq!(provider.describes(), 2);
        assert_eq!(cache.len(), 2);
        cache.reset();
        assert!(cache.is_empty());
    }

    #[test]
    fn dotted_names() {
        init_logs();
        let outer = ObjectName::new("a.b", "c");
        let inner = ObjectName::new("a", "b.c");
        assert_ne!(
            outer.key(NameComparison::Ordinal),
            inner.key(NameComparison::Ordinal)
        );
        let provider = StubProvider::default()
            .with_object(TableOrViewMetadata::new(
                outer.clone(),
                ObjectKind::Table,
                [ColumnMetadata::new("outer_id", "INTEGER")],
            ))
            .with_object(TableOrViewMetadata::new(
                inner.clone(),
                ObjectKind::Table,
                [ColumnMetadata::new("inner_id", "INTEGER")],
            ));
        let cache = SchemaCache::new(NameComparison::CaseInsensitive);
        let first = cache
            .get_or_load(&provider, &outer)
            .expect("Failed to describe");
        let second = cache
            .get_or_load(&provider, &inner)
            .expect("Failed to describe");
        assert_eq!(provider.describes(), 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(first.columns()[0].name, "outer_id");
        assert_eq!(second.columns()[0].name, "inner_id");
    }
}
