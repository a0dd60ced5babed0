use crate::{SqliteConnection, SqliteDriver, extract::map_error, metadata};
use conduit_core::{
    DataSource, DataSourceConfig, Error, ErrorContext, MetadataProvider, ObjectName, Provider,
    Result, TableOrViewMetadata,
};
use parking_lot::Mutex;
use rusqlite::OpenFlags;
use std::{
    future::Future,
    path::PathBuf,
    sync::atomic::{AtomicUsize, Ordering},
};
use url::form_urlencoded;

static MEMORY_DATABASES: AtomicUsize = AtomicUsize::new(0);

/// Opens SQLite connections on a database file, or on a private in-memory database.
///
/// Every execution opens its own connection. An in-memory database is shared by the
/// connections of one provider and lives as long as the provider.
pub struct SqliteProvider {
    driver: SqliteDriver,
    path: PathBuf,
    flags: OpenFlags,
    /// Keeps a shared in-memory database alive.
    anchor: Option<Mutex<rusqlite::Connection>>,
}

impl SqliteProvider {
    /// Parses `sqlite://path?mode=ro|rw|rwc` or `sqlite::memory:`.
    pub fn new(url: &str) -> Result<Self> {
        let Some(rest) = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
        else {
            let error = Error::Configuration(format!(
                "Expected a SQLite connection URL (sqlite://path), found `{}`",
                url
            ));
            log::error!("{:#}", error);
            return Err(error);
        };
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let mut flags = OpenFlags::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key == "mode" {
                let mode = match &*value {
                    "ro" => OpenFlags::SQLITE_OPEN_READ_ONLY,
                    "rw" => OpenFlags::SQLITE_OPEN_READ_WRITE,
                    "rwc" => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
                    _ => {
                        let error = Error::Configuration(format!(
                            "Invalid SQLite mode `{}`, expected ro, rw or rwc",
                            value
                        ));
                        log::error!("{:#}", error);
                        return Err(error);
                    }
                };
                flags = mode | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            }
        }
        if path.is_empty() || path == ":memory:" {
            return Self::memory();
        }
        let provider = Self {
            driver: SqliteDriver::new(),
            path: PathBuf::from(path),
            flags,
            anchor: None,
        };
        // Fail early on a database that cannot be opened
        provider.open_raw()?;
        Ok(provider)
    }

    /// Private in-memory database.
    pub fn memory() -> Result<Self> {
        let id = MEMORY_DATABASES.fetch_add(1, Ordering::Relaxed);
        let path = PathBuf::from(format!("file:conduit_memory_{}?mode=memory&cache=shared", id));
        let flags = OpenFlags::default() | OpenFlags::SQLITE_OPEN_URI;
        let anchor = rusqlite::Connection::open_with_flags(&path, flags).map_err(map_error)?;
        Ok(Self {
            driver: SqliteDriver::new(),
            path,
            flags,
            anchor: Some(Mutex::new(anchor)),
        })
    }

    pub fn is_memory(&self) -> bool {
        self.anchor.is_some()
    }

    fn open_raw(&self) -> Result<rusqlite::Connection> {
        rusqlite::Connection::open_with_flags(&self.path, self.flags).map_err(|e| {
            let error = map_error(e);
            log::error!("Could not open {}: {:#}", self.path.display(), error);
            error
        })
    }
}

impl MetadataProvider for SqliteProvider {
    fn list_objects(&self) -> Result<Vec<ObjectName>> {
        metadata::list_objects(&self.open_raw()?)
    }

    fn describe(&self, name: &ObjectName) -> Result<TableOrViewMetadata> {
        metadata::describe(&self.open_raw()?, name)
    }
}

impl Provider for SqliteProvider {
    type Driver = SqliteDriver;
    type Connection = SqliteConnection;

    fn driver(&self) -> &SqliteDriver {
        &self.driver
    }

    fn open(&self) -> Result<SqliteConnection> {
        Ok(SqliteConnection::new(self.open_raw()?))
    }

    fn open_async(&self) -> impl Future<Output = Result<SqliteConnection>> + Send {
        let path = self.path.clone();
        let flags = self.flags;
        async move {
            let connection = tokio::task::spawn_blocking(move || {
                rusqlite::Connection::open_with_flags(&path, flags).map_err(map_error)
            })
            .await
            .context("The SQLite worker task failed")??;
            Ok(SqliteConnection::new(connection))
        }
    }
}

/// Data source over the SQLite database at `url`. Connection options understood by the
/// data source (`timeout`, `strict`, `names`, `cache`) may be appended to the query.
pub fn connect(url: &str) -> Result<DataSource<SqliteProvider>> {
    let config = if url.contains('?') && !url.starts_with("sqlite::memory:") {
        DataSourceConfig::from_url(url)?.0
    } else {
        DataSourceConfig::default()
    };
    Ok(DataSource::with_config(SqliteProvider::new(url)?, config))
}
