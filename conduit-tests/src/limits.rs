use crate::{script, silent_logs};
use conduit_core::{DataSource, Error, Executor, Limit, Provider, Value};
use std::{collections::BTreeSet, sync::LazyLock};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn values<P: Provider>(data_source: &DataSource<P>, limit: Limit, descending: bool) -> Vec<i64> {
    let builder = data_source.from("counter").columns(["value"]);
    let builder = if descending {
        builder.sort_by_descending("value")
    } else {
        builder.sort_by("value")
    };
    builder
        .with_limit(limit)
        .to_row_set()
        .execute()
        .expect("Failed to read the counter")
        .rows
        .into_iter()
        .map(|row| match row.first() {
            Some(Value::Int64(Some(v))) => *v,
            other => panic!("Unexpected value {:?}", other),
        })
        .collect()
}

pub async fn limits<P: Provider>(data_source: &DataSource<P>) {
    let _lock = MUTEX.lock().await;
    script(
        data_source,
        &[
            "DROP TABLE IF EXISTS counter",
            "CREATE TABLE counter (value INTEGER PRIMARY KEY)",
        ],
    );
    for value in 1..=20 {
        data_source
            .insert("counter", [("value", value)])
            .to_rows_affected()
            .execute()
            .expect("Failed to insert a value");
    }

    assert_eq!(values(data_source, Limit::None, false).len(), 20);
    assert_eq!(values(data_source, Limit::rows(5), false), [1, 2, 3, 4, 5]);
    assert_eq!(values(data_source, Limit::page(5, 5), false), [6, 7, 8, 9, 10]);
    assert_eq!(values(data_source, Limit::rows(3), true), [20, 19, 18]);
    assert_eq!(values(data_source, Limit::page(18, 5), false), [19, 20]);

    #[cfg(not(feature = "disable-random-sampling"))]
    {
        let sample = data_source
            .from("counter")
            .with_limit(Limit::sample(4))
            .to_scalar_or_absent::<i64>();
        // Sampling more than one row cannot be materialized as a scalar
        silent_logs! {
            let result = sample.execute();
            assert!(matches!(result, Err(Error::MultipleRows { rows: 4, .. })), "{:?}", result);
        }
        let sample = data_source
            .from("counter")
            .with_limit(Limit::sample(4))
            .to_row_set()
            .execute()
            .expect("Failed to sample the counter");
        assert_eq!(sample.len(), 4);
        let distinct = sample
            .rows
            .iter()
            .map(|row| format!("{:?}", row))
            .collect::<BTreeSet<_>>();
        assert_eq!(distinct.len(), 4);
        let everything = data_source
            .from("counter")
            .with_limit(Limit::sample(100))
            .to_row_set()
            .execute()
            .expect("Failed to sample the counter");
        assert_eq!(everything.len(), 20);
        silent_logs! {
            let result = data_source
                .from("counter")
                .sort_by("value")
                .with_limit(Limit::sample(4))
                .to_row_set()
                .execute();
            assert!(matches!(result, Err(Error::InvalidOperation(..))), "{:?}", result);
        }
    }
}
