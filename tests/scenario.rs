#[cfg(test)]
mod tests {
    use conduit::{CancellationToken, DataSource, Executor, FromRow, Limit, RowReader};
    use conduit_sqlite::{SqliteProvider, connect};
    use conduit_tests::{NO_PARAMETERS, init_logs, script};

    #[derive(Debug, PartialEq)]
    struct Person {
        id: i64,
        name: String,
    }

    impl FromRow for Person {
        fn from_row(reader: &mut RowReader<'_>) -> conduit::Result<Self> {
            Ok(Self {
                id: reader.get("id")?,
                name: reader.get("name")?,
            })
        }
    }

    /// First employee, read both ways.
    async fn first(data_source: &DataSource<SqliteProvider>) -> Option<Person> {
        let sync = data_source
            .from("Employee")
            .with_limit(Limit::rows(1))
            .to_object_or_absent::<Person>()
            .execute()
            .expect("Failed to read");
        let asynchronous = data_source
            .from("Employee")
            .with_limit(Limit::rows(1))
            .to_object_or_absent::<Person>()
            .execute_async(&CancellationToken::new())
            .await
            .expect("Failed to read");
        assert_eq!(sync, asynchronous);
        sync
    }

    #[tokio::test]
    async fn first_employee() {
        init_logs();
        let data_source = connect("sqlite::memory:").expect("Could not open the database");
        script(
            &data_source,
            &["CREATE TABLE Employee (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"],
        );
        assert_eq!(first(&data_source).await, None);

        data_source
            .sql(
                "INSERT INTO Employee (id, name) VALUES (1, 'A')",
                NO_PARAMETERS,
            )
            .to_rows_affected()
            .execute()
            .expect("Failed to insert");
        assert_eq!(
            first(&data_source).await,
            Some(Person {
                id: 1,
                name: "A".into()
            })
        );
    }
}
