//! Connection providers.
//!
//! The executor never opens databases itself: it asks a
//! [`ConnectionProvider`] for a connection at the start of every operation
//! and hands it back through [`ConnectionProvider::release`] when the
//! operation is over, whatever the outcome.

use rusqlite::{Connection, OpenFlags};

use crate::config::DbConfig;
use crate::error::{Error, Result};

/// Source of database connections.
pub trait ConnectionProvider: Send + Sync {
    /// Returns a live connection for exclusive use by one operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if no connection can be established.
    fn acquire(&self) -> Result<Connection>;

    /// Takes back a connection obtained from [`acquire`](Self::acquire).
    ///
    /// Called exactly once per acquired connection. The default closes it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceRelease`] if the connection cannot be closed.
    fn release(&self, conn: Connection) -> Result<()> {
        close_connection(conn)
    }
}

/// Closes `conn`, reporting the driver error if the close fails.
///
/// # Errors
///
/// Returns [`Error::ResourceRelease`] if SQLite refuses to close the handle.
pub fn close_connection(conn: Connection) -> Result<()> {
    conn.close().map_err(|(_conn, source)| {
        log::error!("could not close connection: {source}");
        Error::ResourceRelease {
            resource: "connection",
            source,
        }
    })
}

/// Opens a fresh SQLite connection per call from a [`DbConfig`].
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    config: DbConfig,
}

impl SqliteProvider {
    /// Creates a provider for `config`.
    pub const fn new(config: DbConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration connections are opened with.
    pub const fn config(&self) -> &DbConfig {
        &self.config
    }

    fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if self.config.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            if self.config.create {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }
        flags
    }
}

impl ConnectionProvider for SqliteProvider {
    fn acquire(&self) -> Result<Connection> {
        let database = &self.config.database;
        let connect = || -> rusqlite::Result<Connection> {
            let conn = Connection::open_with_flags(database, self.open_flags())?;
            conn.busy_timeout(self.config.busy_timeout())?;
            Ok(conn)
        };
        connect().map_err(|source| {
            log::error!("could not connect to `{database}`: {source}");
            Error::Connection {
                database: database.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_creates_database() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("created.db");
        let provider = SqliteProvider::new(DbConfig::new(path.to_string_lossy()));

        let conn = provider.acquire().expect("acquire");
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
            .expect("create table");
        provider.release(conn).expect("release");

        assert!(path.exists());
    }

    #[test]
    fn test_acquire_missing_database_without_create() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.db");
        let mut config = DbConfig::new(path.to_string_lossy());
        config.create = false;

        let err = SqliteProvider::new(config).acquire().expect_err("must fail");
        assert!(matches!(err, Error::Connection { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn test_read_only_connection_rejects_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ro.db");
        let writer = SqliteProvider::new(DbConfig::new(path.to_string_lossy()));
        let conn = writer.acquire().expect("acquire");
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
            .expect("create table");
        writer.release(conn).expect("release");

        let mut config = DbConfig::new(path.to_string_lossy());
        config.read_only = true;
        let reader = SqliteProvider::new(config);
        let conn = reader.acquire().expect("acquire read-only");
        assert!(conn.execute("INSERT INTO t (id) VALUES (1)", []).is_err());
        reader.release(conn).expect("release");
    }
}
