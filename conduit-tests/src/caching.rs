use crate::{script, silent_logs};
use conduit_core::{
    DataSource, Driver, Error, ExecutionEvent, Executor, Provider, TraceEvent,
};
use parking_lot::Mutex as SyncMutex;
use std::{
    sync::{
        Arc, LazyLock,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn insert<P: Provider>(data_source: &DataSource<P>, name: &str) {
    data_source
        .insert("product", [("name", name)])
        .to_rows_affected()
        .execute()
        .expect("Failed to insert a product");
}

fn cached_count<P: Provider>(data_source: &DataSource<P>) -> usize {
    data_source
        .from("product")
        .sort_by("id")
        .with_cache()
        .to_rows()
        .execute()
        .expect("Failed to read the products")
        .len()
}

pub async fn caching<P: Provider>(data_source: &DataSource<P>) {
    let _lock = MUTEX.lock().await;
    script(
        data_source,
        &[
            "DROP TABLE IF EXISTS product",
            "CREATE TABLE product (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
        ],
    );
    data_source.invalidate_cache();
    insert(data_source, "lamp");
    insert(data_source, "desk");

    // Results served from the cache until invalidated
    assert_eq!(cached_count(data_source), 2);
    assert!(!data_source.cache().is_empty());
    insert(data_source, "chair");
    assert_eq!(cached_count(data_source), 2);
    let fresh = data_source
        .from("product")
        .to_rows()
        .execute()
        .expect("Failed to read the products");
    assert_eq!(fresh.len(), 3);
    data_source.invalidate_cache();
    assert_eq!(cached_count(data_source), 3);

    // Completion listeners
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let mut link = data_source
        .from("product")
        .to_rows()
        .on_complete(move |event: &ExecutionEvent| {
            assert!(matches!(event.outcome, Ok(3)));
            counter.fetch_add(1, Ordering::SeqCst);
        });
    let completion = link.listen();
    let rows = link.execute().expect("Failed to read the products");
    assert_eq!(rows.len(), 3);
    let event = completion.await.expect("The completion was not delivered");
    assert!(matches!(event.outcome, Ok(3)));
    assert!(event.command_text.contains("product"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Tracing, one event per attempt
    let events = Arc::new(SyncMutex::new(Vec::new()));
    let sink = events.clone();
    data_source
        .from("product")
        .with_tracing_sink(move |event: &TraceEvent<'_>| {
            sink.lock()
                .push((event.attempt, event.outcome.is_ok(), event.source.to_owned()));
        })
        .with_retry(3, Duration::from_millis(5))
        .to_rows()
        .execute()
        .expect("Failed to read the products");
    assert_eq!(events.lock().len(), 1);
    assert_eq!(events.lock()[0].0, 1);
    assert!(events.lock()[0].1);
    assert_eq!(events.lock()[0].2, &**data_source.name());
    events.lock().clear();
    silent_logs! {
        // Not transient, no retry
        let result = data_source
            .sql("SELECT * FROM missing_product", crate::NO_PARAMETERS)
            .with_tracing_sink({
                let sink = events.clone();
                move |event: &TraceEvent<'_>| {
                    sink.lock().push((event.attempt, event.outcome.is_ok(), String::new()));
                }
            })
            .with_retry(3, Duration::from_millis(5))
            .to_rows()
            .execute();
        assert!(result.is_err());
    }
    assert_eq!(events.lock().len(), 1);
    assert!(!events.lock()[0].1);

    // Change notification
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = changes.clone();
    let result = data_source
        .insert("product", [("name", "shelf")])
        .with_change_notification(move |_: &ExecutionEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .to_rows_affected()
        .execute();
    if data_source.driver().capabilities().change_notification {
        assert_eq!(result.expect("Failed to insert a product").rows_affected, 1);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
    } else {
        assert!(matches!(result, Err(Error::Unsupported(..))), "{:?}", result);
        assert_eq!(changes.load(Ordering::SeqCst), 0);
    }
}
