use crate::{NO_PARAMETERS, script, silent_logs};
use conduit_core::{
    CancellationToken, DataSource, Error, Executor, FromRow, Provider, Result, RowReader, Value,
};
use rust_decimal::Decimal;
use std::sync::LazyLock;
use time::{Date, macros::date};
use tokio::sync::Mutex;

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

#[derive(Default, Debug, Clone, PartialEq)]
pub struct Employee {
    pub id: i64,
    pub name: String,
    pub title: Option<String>,
    pub salary: Decimal,
    pub hired: Option<Date>,
}

impl FromRow for Employee {
    fn from_row(reader: &mut RowReader<'_>) -> Result<Self> {
        Ok(Self {
            id: reader.get("id")?,
            name: reader.get("name")?,
            title: reader.get("title")?,
            salary: reader.get("salary")?,
            hired: reader.get("hired")?,
        })
    }
}

/// Reads the name only, any other column is unexpected in strict mode.
#[derive(Debug)]
struct Name(String);

impl FromRow for Name {
    fn from_row(reader: &mut RowReader<'_>) -> Result<Self> {
        Ok(Name(reader.get("name")?))
    }
}

pub async fn employee<P: Provider>(data_source: &DataSource<P>) {
    let _lock = MUTEX.lock().await;
    script(
        data_source,
        &[
            "DROP TABLE IF EXISTS employee",
            "CREATE TABLE employee (id INTEGER PRIMARY KEY, name VARCHAR(64) NOT NULL, title VARCHAR(64), salary DECIMAL(12, 2), hired DATE)",
        ],
    );

    // Insert
    let staff = [
        ("Ada", Some("Engineer"), Decimal::new(42005, 1), date!(2019 - 03 - 01)),
        ("Grace", Some("Admiral"), Decimal::new(51000, 1), date!(2015 - 11 - 20)),
        ("Linus", None, Decimal::new(38250, 1), date!(2021 - 07 - 09)),
    ];
    for (name, title, salary, hired) in staff {
        let affected = data_source
            .insert(
                "employee",
                [
                    ("name", Value::from(name)),
                    ("title", Value::from(title.map(String::from))),
                    ("salary", Value::from(salary)),
                    ("hired", Value::from(hired)),
                ],
            )
            .to_rows_affected()
            .execute()
            .expect("Failed to insert an employee");
        assert_eq!(affected.rows_affected, 1);
        assert!(affected.last_affected_id.is_some());
    }
    let metadata = data_source
        .get_or_load("EMPLOYEE")
        .expect("Could not describe employee");
    assert_eq!(metadata.columns().len(), 5);
    assert!(metadata.columns()[0].is_primary_key());
    assert!(!metadata.columns()[1].nullable);
    assert_eq!(metadata.columns()[1].max_length, Some(64));

    // Scalar
    let count = data_source
        .sql("SELECT COUNT(*) FROM employee", NO_PARAMETERS)
        .to_scalar::<i64>()
        .execute()
        .expect("Failed to count the employees");
    assert_eq!(count, 3);
    let name = data_source
        .sql("SELECT name FROM employee WHERE id = @id", [("id", -1)])
        .to_scalar_or_absent::<String>()
        .execute()
        .expect("Failed to query a missing employee");
    assert_eq!(name, None);
    silent_logs! {
        let result = data_source
            .sql("SELECT name FROM employee WHERE id = @id", [("id", -1)])
            .to_scalar::<String>()
            .execute();
        assert!(matches!(result, Err(Error::NoData { .. })), "{:?}", result);
    }

    // Object
    let ada = data_source
        .from("employee")
        .filter("name", "Ada")
        .to_object::<Employee>()
        .execute()
        .expect("Failed to read Ada");
    assert_eq!(ada.name, "Ada");
    assert_eq!(ada.title.as_deref(), Some("Engineer"));
    assert_eq!(ada.salary, Decimal::new(42005, 1));
    assert_eq!(ada.hired, Some(date!(2019 - 03 - 01)));
    let nobody = data_source
        .from("employee")
        .filter("name", "Nobody")
        .to_object_or_absent::<Employee>()
        .execute()
        .expect("Failed to query a missing employee");
    assert_eq!(nobody, None);
    silent_logs! {
        let result = data_source.from("employee").to_object::<Employee>().execute();
        assert!(
            matches!(result, Err(Error::MultipleRows { rows: 3, .. })),
            "{:?}",
            result
        );
    }

    // Collection
    let employees = data_source
        .from("employee")
        .sort_by_descending("name")
        .to_collection::<Employee>()
        .execute()
        .expect("Failed to read the employees");
    assert_eq!(
        employees.iter().map(|v| v.name.as_str()).collect::<Vec<_>>(),
        ["Linus", "Grace", "Ada"]
    );
    let untitled = data_source
        .from("employee")
        .filter("title", Value::Null)
        .to_collection::<Employee>()
        .execute()
        .expect("Failed to filter on NULL");
    assert_eq!(untitled.len(), 1);
    assert_eq!(untitled[0].name, "Linus");
    let rows = data_source
        .from("employee")
        .columns(["name", "title"])
        .sort_by("id")
        .to_rows()
        .execute()
        .expect("Failed to read the projected rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].names(), ["name", "title"]);
    assert_eq!(rows[2].get_column("TITLE"), Some(&Value::Null));

    // Mapping
    let names = data_source
        .from("employee")
        .columns(["id", "name"])
        .to_collection::<Name>()
        .execute()
        .expect("Extra columns are ignored unless strict");
    assert_eq!(names.len(), 3);
    silent_logs! {
        let result = data_source
            .from("employee")
            .columns(["id", "name"])
            .strict(true)
            .to_collection::<Name>()
            .execute();
        assert!(
            matches!(&result, Err(Error::SchemaMismatch { column, .. }) if column == "id"),
            "{:?}",
            result
        );
        let result = data_source
            .from("employee")
            .filter("name", "Linus")
            .columns(["title"])
            .to_scalar::<String>()
            .execute();
        assert!(matches!(result, Err(Error::NullConversion { .. })), "{:?}", result);
    }

    // Update
    let affected = data_source
        .update(
            "employee",
            [("id", Value::from(ada.id)), ("title", Value::from("Director"))],
        )
        .to_rows_affected()
        .execute()
        .expect("Failed to update Ada");
    assert_eq!(affected.rows_affected, 1);
    let title = data_source
        .from("employee")
        .columns(["title"])
        .filter("id", ada.id)
        .to_scalar::<String>()
        .execute()
        .expect("Failed to read the title");
    assert_eq!(title, "Director");
    silent_logs! {
        let result = data_source
            .update("employee", [("title", "Nobody")])
            .to_rows_affected()
            .execute();
        assert!(matches!(result, Err(Error::InvalidOperation(..))), "{:?}", result);
        let result = data_source
            .from("employee")
            .filter("nickname", "Ada")
            .to_rows()
            .execute();
        assert!(matches!(result, Err(Error::ColumnNotFound { .. })), "{:?}", result);
        let result = data_source.from("no_such_table").to_rows().execute();
        assert!(matches!(result, Err(Error::ObjectNotFound { .. })), "{:?}", result);
    }

    // Delete
    let affected = data_source
        .delete("employee", [("id", ada.id)])
        .to_rows_affected()
        .execute()
        .expect("Failed to delete Ada");
    assert_eq!(affected.rows_affected, 1);

    // Asynchronous
    let cancel = CancellationToken::new();
    let employees = data_source
        .from("employee")
        .sort_by("id")
        .to_collection::<Employee>()
        .execute_async(&cancel)
        .await
        .expect("Failed to read the employees asynchronously");
    assert_eq!(employees.len(), 2);
    let affected = data_source
        .insert("employee", [("name", "Barbara")])
        .to_rows_affected()
        .execute_async(&cancel)
        .await
        .expect("Failed to insert asynchronously");
    assert_eq!(affected.rows_affected, 1);
    cancel.cancel();
    silent_logs! {
        let result = data_source
            .insert("employee", [("name", "Ken")])
            .to_rows_affected()
            .execute_async(&cancel)
            .await;
        assert!(matches!(result, Err(Error::Cancellation { .. })), "{:?}", result);
    }
    let count = data_source
        .sql("SELECT COUNT(*) FROM employee", NO_PARAMETERS)
        .to_scalar::<u32>()
        .execute_async(&CancellationToken::new())
        .await
        .expect("Failed to count the employees");
    assert_eq!(count, 3);

    // Metadata
    let loaded = data_source
        .preload_all_async()
        .await
        .expect("Failed to preload the metadata");
    assert!(loaded >= 1);
    assert!(data_source.schema().contains(&"employee".into()));
}
