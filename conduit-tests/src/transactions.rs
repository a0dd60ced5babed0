use crate::{NO_PARAMETERS, script};
use conduit_core::{CancellationToken, DataSource, Executor, Provider, Value};
use std::sync::LazyLock;
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn count<P: Provider>(data_source: &DataSource<P>) -> i64 {
    data_source
        .sql("SELECT COUNT(*) FROM account", NO_PARAMETERS)
        .to_scalar()
        .execute()
        .expect("Failed to count the accounts")
}

pub async fn transactions<P: Provider>(data_source: &DataSource<P>) {
    let _lock = MUTEX.lock().await;
    script(
        data_source,
        &[
            "DROP TABLE IF EXISTS account",
            "CREATE TABLE account (id INTEGER PRIMARY KEY, owner TEXT NOT NULL, balance INTEGER NOT NULL)",
        ],
    );

    // Rollback
    let mut transaction = data_source.begin().expect("Could not begin a transaction");
    for (owner, balance) in [("alice", 100), ("bob", 50)] {
        transaction
            .insert(
                "account",
                [("owner", Value::from(owner)), ("balance", Value::from(balance))],
            )
            .to_rows_affected()
            .execute()
            .expect("Failed to insert an account");
    }
    let inside = transaction
        .sql("SELECT COUNT(*) FROM account", NO_PARAMETERS)
        .to_scalar::<i64>()
        .execute()
        .expect("Failed to count inside the transaction");
    assert_eq!(inside, 2);
    transaction
        .rollback()
        .expect("Failed to rollback the transaction");
    assert_eq!(count(data_source), 0);

    // Commit
    let mut transaction = data_source.begin().expect("Could not begin a transaction");
    transaction
        .insert(
            "account",
            [("owner", Value::from("carol")), ("balance", Value::from(75))],
        )
        .to_rows_affected()
        .execute()
        .expect("Failed to insert an account");
    let carol = transaction
        .from("account")
        .filter("owner", "carol")
        .columns(["id"])
        .to_scalar::<i64>()
        .execute()
        .expect("Failed to read the account");
    transaction
        .update(
            "account",
            [("id", Value::from(carol)), ("balance", Value::from(80))],
        )
        .to_rows_affected()
        .execute()
        .expect("Failed to update the account");
    transaction.commit().expect("Failed to commit the transaction");
    assert_eq!(count(data_source), 1);

    // Dropped without commit
    {
        let mut transaction = data_source.begin().expect("Could not begin a transaction");
        transaction
            .delete("account", [("id", carol)])
            .to_rows_affected()
            .execute()
            .expect("Failed to delete the account");
    }
    assert_eq!(count(data_source), 1);

    // Asynchronous
    let cancel = CancellationToken::new();
    let mut transaction = data_source
        .begin_async()
        .await
        .expect("Could not begin a transaction");
    transaction
        .insert(
            "account",
            [("owner", Value::from("dave")), ("balance", Value::from(10))],
        )
        .to_rows_affected()
        .execute_async(&cancel)
        .await
        .expect("Failed to insert an account");
    let balance = transaction
        .from("account")
        .columns(["balance"])
        .filter("id", carol)
        .to_scalar::<i64>()
        .execute_async(&cancel)
        .await
        .expect("Failed to read the balance");
    assert_eq!(balance, 80);
    transaction
        .commit_async()
        .await
        .expect("Failed to commit the transaction");
    assert_eq!(count(data_source), 2);
}
