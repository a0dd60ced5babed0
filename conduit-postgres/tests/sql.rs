#[cfg(test)]
mod tests {
    use conduit_core::{CommandKind, DataSource, Error, ExecutionEvent, Executor, Limit, Value};
    use conduit_postgres::PostgresDriver;
    use conduit_tests::{StubProvider, employee_table, init_logs, raise_procedure, silent_logs};
    use indoc::indoc;

    type Source = DataSource<StubProvider<PostgresDriver>>;

    fn data_source() -> Source {
        init_logs();
        DataSource::new(
            StubProvider::new(PostgresDriver::new())
                .with_object(employee_table())
                .with_object(raise_procedure()),
        )
    }

    #[test]
    fn select() {
        let data_source = data_source();
        let token = data_source
            .from("employee")
            .filter("name", "Ada")
            .sort_by("id")
            .with_limit(Limit::page(10, 5))
            .to_rows()
            .prepare()
            .expect("Failed to compile the query");
        assert_eq!(
            token.command_text(),
            indoc! {r#"
                SELECT "id", "name", "title", "salary", "hired"
                FROM "employee"
                WHERE "name" = $1
                ORDER BY "id" ASC
                LIMIT 5
                OFFSET 10;
            "#}
            .trim()
        );
        assert_eq!(token.parameters().len(), 1);
        assert_eq!(token.parameters()[0].marker, "$1");
        assert_eq!(token.parameters()[0].value, Value::from("Ada"));
        assert_eq!(token.source(), "postgres");
    }

    #[test]
    fn random_sample() {
        let data_source = data_source();
        let token = data_source
            .from("employee")
            .columns(["name"])
            .with_limit(Limit::sample(3))
            .to_rows()
            .prepare()
            .expect("Failed to compile the query");
        assert_eq!(
            token.command_text(),
            indoc! {r#"
                SELECT "name"
                FROM "employee"
                ORDER BY random()
                LIMIT 3;
            "#}
            .trim()
        );
    }

    #[test]
    fn write() {
        let data_source = data_source();
        let token = data_source
            .insert("employee", [("title", "CTO"), ("name", "Ada")])
            .to_rows_affected()
            .prepare()
            .expect("Failed to compile the insert");
        assert_eq!(
            token.command_text(),
            indoc! {r#"
                INSERT INTO "employee" ("name", "title")
                VALUES ($1, $2);
            "#}
            .trim()
        );
        let token = data_source
            .update(
                "employee",
                [("id", Value::from(7)), ("title", Value::from("CTO"))],
            )
            .to_rows_affected()
            .prepare()
            .expect("Failed to compile the update");
        assert_eq!(
            token.command_text(),
            indoc! {r#"
                UPDATE "employee"
                SET "title" = $1
                WHERE "id" = $2;
            "#}
            .trim()
        );
        let token = data_source
            .delete("employee", [("id", 7)])
            .to_rows_affected()
            .prepare()
            .expect("Failed to compile the delete");
        assert_eq!(
            token.command_text(),
            indoc! {r#"
                DELETE FROM "employee"
                WHERE "id" = $1;
            "#}
            .trim()
        );
    }

    #[test]
    fn procedure() {
        let data_source = data_source();
        let token = data_source
            .procedure("hr.raise_salary", [("percent", 10), ("employee_id", 7)])
            .to_rows()
            .prepare()
            .expect("Failed to compile the call");
        assert_eq!(
            token.command_text(),
            r#"SELECT * FROM "hr"."raise_salary"("employee_id" => $1, "percent" => $2);"#
        );
        assert_eq!(token.command_kind(), CommandKind::Text);
        assert_eq!(token.parameters()[0].value, Value::from(7));
    }

    #[test]
    fn change_notification_unsupported() {
        let data_source = data_source();
        silent_logs! {
            let result = data_source
                .from("employee")
                .with_change_notification(|_: &ExecutionEvent| {})
                .to_rows()
                .execute();
            assert!(matches!(result, Err(Error::Unsupported(..))), "{:?}", result);
        }
        assert_eq!(data_source.provider().dispatches(), 0);
    }
}
