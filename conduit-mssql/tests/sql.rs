#[cfg(test)]
mod tests {
    use conduit_core::{CommandKind, DataSource, ExecutionEvent, Executor, Limit, Value};
    use conduit_mssql::MssqlDriver;
    use conduit_tests::{StubProvider, employee_table, init_logs, raise_procedure, staff_view};
    use indoc::indoc;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn data_source() -> DataSource<StubProvider<MssqlDriver>> {
        init_logs();
        DataSource::new(
            StubProvider::new(MssqlDriver::new())
                .with_object(employee_table())
                .with_object(staff_view())
                .with_object(raise_procedure()),
        )
    }

    fn select(limit: Limit, descending: bool) -> String {
        let data_source = data_source();
        let builder = data_source.from("employee").columns(["id", "name"]);
        let builder = if descending {
            builder.sort_by_descending("name")
        } else {
            builder
        };
        builder
            .with_limit(limit)
            .to_rows()
            .prepare()
            .expect("Failed to compile the query")
            .command_text()
            .to_owned()
    }

    #[test]
    fn top() {
        assert_eq!(
            select(Limit::rows(5), false),
            indoc! {"
                SELECT TOP (5) [id], [name]
                FROM [employee];
            "}
            .trim()
        );
        assert_eq!(
            select(Limit::rows(5), true),
            indoc! {"
                SELECT TOP (5) [id], [name]
                FROM [employee]
                ORDER BY [name] DESC;
            "}
            .trim()
        );
    }

    #[test]
    fn offset_fetch() {
        assert_eq!(
            select(Limit::page(10, 5), false),
            indoc! {"
                SELECT [id], [name]
                FROM [employee]
                ORDER BY (SELECT NULL)
                OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY;
            "}
            .trim()
        );
        assert_eq!(
            select(Limit::page(10, 5), true),
            indoc! {"
                SELECT [id], [name]
                FROM [employee]
                ORDER BY [name] DESC
                OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY;
            "}
            .trim()
        );
    }

    #[test]
    fn random_sample() {
        assert_eq!(
            select(Limit::sample(3), false),
            indoc! {"
                SELECT TOP (3) [id], [name]
                FROM [employee]
                ORDER BY NEWID();
            "}
            .trim()
        );
    }

    #[test]
    fn filters() {
        let data_source = data_source();
        let token = data_source
            .from("HR.Staff")
            .filter("title", Value::Null)
            .filter("name", "Ada")
            .to_rows()
            .prepare()
            .expect("Failed to compile the query");
        assert_eq!(
            token.command_text(),
            indoc! {"
                SELECT [name], [title]
                FROM [hr].[staff]
                WHERE [name] = @name AND [title] IS NULL;
            "}
            .trim()
        );
        assert_eq!(token.parameters().len(), 1);
        assert_eq!(token.parameters()[0].name, "name");
    }

    #[test]
    fn procedure() {
        let data_source = data_source();
        let token = data_source
            .procedure("hr.raise_salary", [("employee_id", 7), ("percent", 10)])
            .to_rows_affected()
            .prepare()
            .expect("Failed to compile the call");
        assert_eq!(token.command_text(), "[hr].[raise_salary]");
        assert_eq!(token.command_kind(), CommandKind::StoredProcedure);
        let parameters = token
            .parameters()
            .iter()
            .map(|v| (v.name.as_str(), v.marker.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            parameters,
            [("employee_id", "@employee_id"), ("percent", "@percent")]
        );
    }

    #[test]
    fn change_notification() {
        let data_source = data_source();
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        data_source.provider().push_affected(1);
        let affected = data_source
            .update(
                "employee",
                [("id", Value::from(7)), ("title", Value::from("CTO"))],
            )
            .with_change_notification(move |event: &ExecutionEvent| {
                assert!(matches!(event.outcome, Ok(1)));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .to_rows_affected()
            .execute()
            .expect("Failed to update");
        assert_eq!(affected.rows_affected, 1);
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        let command = data_source
            .provider()
            .last_command()
            .expect("No command was dispatched");
        assert_eq!(
            command.parameters,
            [
                ("title".to_string(), Value::from("CTO")),
                ("id".to_string(), Value::from(7))
            ]
        );
    }
}
