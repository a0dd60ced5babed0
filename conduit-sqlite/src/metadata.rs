use crate::extract::map_error;
use conduit_core::{
    ColumnMetadata, Error, KeyRole, ObjectKind, ObjectName, Result, TableOrViewMetadata,
};
use rusqlite::{Connection, OptionalExtension, params};

fn catalog(schema: &str) -> String {
    if schema.is_empty() {
        "sqlite_master".into()
    } else {
        format!("\"{}\".sqlite_master", schema.replace('"', "\"\""))
    }
}

/// Tables and views, internal `sqlite_` objects excluded.
pub(crate) fn list_objects(connection: &Connection) -> Result<Vec<ObjectName>> {
    let mut statement = connection
        .prepare(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .map_err(map_error)?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(map_error)?
        .map(|v| v.map(|name| ObjectName::new("", name)).map_err(map_error))
        .collect::<Result<Vec<_>>>()?;
    Ok(names)
}

pub(crate) fn describe(connection: &Connection, name: &ObjectName) -> Result<TableOrViewMetadata> {
    let found = connection
        .query_row(
            &format!(
                "SELECT name, type FROM {} WHERE name = ?1 COLLATE NOCASE AND type IN ('table', 'view')",
                catalog(name.schema())
            ),
            params![name.name()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()
        .map_err(map_error)?;
    let Some((canonical, kind)) = found else {
        return Err(Error::ObjectNotFound {
            object: name.to_string(),
        });
    };
    let schema = if name.schema().is_empty() {
        "main"
    } else {
        name.schema()
    };
    let mut statement = connection
        .prepare("SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1, ?2) ORDER BY cid")
        .map_err(map_error)?;
    let columns = statement
        .query_map(params![canonical, schema], |row| {
            let data_type = row.get::<_, String>(1)?;
            Ok(ColumnMetadata {
                name: row.get(0)?,
                max_length: max_length(&data_type),
                data_type,
                nullable: row.get::<_, i64>(2)? == 0,
                key: if row.get::<_, i64>(3)? > 0 {
                    KeyRole::PrimaryKey
                } else {
                    KeyRole::None
                },
            })
        })
        .map_err(map_error)?
        .map(|v| v.map_err(map_error))
        .collect::<Result<Vec<_>>>()?;
    Ok(TableOrViewMetadata::new(
        ObjectName::new(name.schema().to_owned(), canonical),
        if kind == "view" {
            ObjectKind::View
        } else {
            ObjectKind::Table
        },
        columns,
    ))
}

/// Length declared in types like `VARCHAR(50)`.
fn max_length(data_type: &str) -> Option<u32> {
    let start = data_type.find('(')?;
    let end = data_type[start..].find([')', ','])? + start;
    data_type[start + 1..end].trim().parse().ok()
}
