//! Common test utilities shared across integration tests.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::NaiveDateTime;
use rowkit::{
    close_connection, ConnectionProvider, DbConfig, Error, Executor, Mappable, Mutators,
    SqliteProvider,
};
use rusqlite::Connection;
use tempfile::TempDir;

pub const PEOPLE_SCHEMA: &str = "CREATE TABLE person (
    id INTEGER PRIMARY KEY,
    name TEXT,
    weight REAL,
    active BOOLEAN,
    photo BLOB,
    born DATETIME
);";

/// A database file in its own temporary directory.
pub struct TestDb {
    _dir: TempDir,
    path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rowkit.db");
        Self { _dir: dir, path }
    }

    pub fn config(&self) -> DbConfig {
        DbConfig::new(self.path.to_string_lossy())
    }

    /// Executor over a fresh database holding the `person` table.
    pub fn people(&self) -> (Executor, Arc<CountingProvider>) {
        let provider = Arc::new(CountingProvider::new(self.config()));
        let executor = Executor::with_provider(provider.clone());
        executor.execute_script(PEOPLE_SCHEMA).expect("create schema");
        (executor, provider)
    }
}

/// Wraps [`SqliteProvider`], counting acquisitions and releases.
pub struct CountingProvider {
    inner: SqliteProvider,
    fail_release: bool,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl CountingProvider {
    pub fn new(config: DbConfig) -> Self {
        Self {
            inner: SqliteProvider::new(config),
            fail_release: false,
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    /// Closes connections normally but reports every release as failed.
    pub fn failing_release(config: DbConfig) -> Self {
        Self {
            fail_release: true,
            ..Self::new(config)
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }
}

impl ConnectionProvider for CountingProvider {
    fn acquire(&self) -> rowkit::Result<Connection> {
        let conn = self.inner.acquire()?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(conn)
    }

    fn release(&self, conn: Connection) -> rowkit::Result<()> {
        self.released.fetch_add(1, Ordering::SeqCst);
        close_connection(conn)?;
        if self.fail_release {
            return Err(Error::ResourceRelease {
                resource: "connection",
                source: rusqlite::Error::InvalidQuery,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub id: i64,
    pub name: Option<String>,
    pub weight: f64,
    pub active: bool,
    pub photo: Option<Vec<u8>>,
    pub born: Option<NaiveDateTime>,
}

impl Mappable for Person {
    fn mutators() -> Mutators<Self> {
        Mutators::new()
            .integer("Id", |p: &mut Self, v| p.id = v)
            .text("Name", |p: &mut Self, v| p.name = Some(v))
            .double("Weight", |p: &mut Self, v| p.weight = v)
            .boolean("Active", |p: &mut Self, v| p.active = v)
            .blob("Photo", |p: &mut Self, v| p.photo = Some(v))
            .timestamp("Born", |p: &mut Self, v| p.born = Some(v))
    }
}
