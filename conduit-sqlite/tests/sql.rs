#[cfg(test)]
mod tests {
    use conduit_core::{DataSource, Error, Executor, Limit};
    use conduit_sqlite::SqliteDriver;
    use conduit_tests::{StubProvider, employee_table, raise_procedure, silent_logs};
    use indoc::indoc;

    #[test]
    fn select() {
        let data_source = DataSource::new(
            StubProvider::new(SqliteDriver::new()).with_object(employee_table()),
        );
        let token = data_source
            .from("employee")
            .columns(["id"])
            .filter("name", "Ada")
            .with_limit(Limit::sample(2))
            .to_rows()
            .prepare()
            .expect("Failed to compile the query");
        assert_eq!(
            token.command_text(),
            indoc! {r#"
                SELECT "id"
                FROM "employee"
                WHERE "name" = @name
                ORDER BY RANDOM()
                LIMIT 2;
            "#}
            .trim()
        );
    }

    #[test]
    fn procedure_unsupported() {
        let data_source = DataSource::new(
            StubProvider::new(SqliteDriver::new()).with_object(raise_procedure()),
        );
        silent_logs! {
            let result = data_source
                .procedure("hr.raise_salary", [("employee_id", 1)])
                .to_rows()
                .prepare();
            assert!(matches!(result, Err(Error::Unsupported(..))), "{:?}", result);
        }
    }
}
