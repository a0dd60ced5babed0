use conduit_core::{ColumnMetadata, ObjectKind, ObjectName, TableOrViewMetadata};

/// Same shape as the `employee` table of the shared suite.
pub fn employee_table() -> TableOrViewMetadata {
    TableOrViewMetadata::new(
        "employee",
        ObjectKind::Table,
        [
            ColumnMetadata::new("id", "INTEGER").primary_key(),
            ColumnMetadata::new("name", "VARCHAR(64)")
                .not_null()
                .with_max_length(64),
            ColumnMetadata::new("title", "VARCHAR(64)").with_max_length(64),
            ColumnMetadata::new("salary", "DECIMAL(12, 2)"),
            ColumnMetadata::new("hired", "DATE"),
        ],
    )
}

/// Read only view over the employees.
pub fn staff_view() -> TableOrViewMetadata {
    TableOrViewMetadata::new(
        ObjectName::new("hr", "staff"),
        ObjectKind::View,
        [
            ColumnMetadata::new("name", "VARCHAR(64)"),
            ColumnMetadata::new("title", "VARCHAR(64)"),
        ],
    )
}

/// Table keyed by two columns.
pub fn assignment_table() -> TableOrViewMetadata {
    TableOrViewMetadata::new(
        "assignment",
        ObjectKind::Table,
        [
            ColumnMetadata::new("employee_id", "INTEGER").primary_key(),
            ColumnMetadata::new("project_id", "INTEGER").primary_key(),
            ColumnMetadata::new("role", "VARCHAR(32)"),
        ],
    )
}

/// Stored procedure, its columns are the parameters.
pub fn raise_procedure() -> TableOrViewMetadata {
    TableOrViewMetadata::new(
        ObjectName::new("hr", "raise_salary"),
        ObjectKind::StoredProcedure,
        [
            ColumnMetadata::new("employee_id", "INTEGER"),
            ColumnMetadata::new("percent", "INTEGER"),
        ],
    )
}
