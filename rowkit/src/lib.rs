//! Minimal data access over `SQLite`.
//!
//! `rowkit` runs parameterized statements on connections supplied by a
//! [`ConnectionProvider`] and hands results back in one of two shapes:
//!
//! * generic [`Record`]s, maps from lower-cased column name to [`Value`];
//! * typed objects populated through a [`Mutators`] registry, one mutator
//!   per `set<Column>` name.
//!
//! Every operation owns its connection for its whole duration and gives it
//! back, along with the statement and cursor, on every exit path. Batches
//! run in a single transaction and are rolled back on the first failure.
//!
//! ```rust,no_run
//! use rowkit::{params, DbConfig, Executor};
//!
//! # fn main() -> rowkit::Result<()> {
//! let executor = Executor::from_config(DbConfig::new("people.db"));
//! executor.execute_script("CREATE TABLE IF NOT EXISTS person (id INTEGER, name TEXT)")?;
//! executor.execute_update("INSERT INTO person VALUES (?, ?)", params![1, "ann"])?;
//! let row = executor.query_one("SELECT * FROM person WHERE id = ?", params![1])?;
//! assert!(row.is_some());
//! # Ok(())
//! # }
//! ```

mod binder;
pub mod config;
pub mod error;
mod executor;
pub mod logger;
mod mapper;
mod materializer;
mod provider;
mod release;
pub mod value;

pub use binder::bind;
pub use config::DbConfig;
pub use error::{Error, Result};
pub use executor::{Executor, NO_STATEMENTS};
pub use mapper::{Coercion, Mappable, Mutator, MutatorResult, Mutators};
pub use materializer::Record;
pub use provider::{close_connection, ConnectionProvider, SqliteProvider};
pub use value::{BlobStream, Param, Value};
