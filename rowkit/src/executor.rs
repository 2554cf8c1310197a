//! Statement execution against connections obtained from a provider.

use std::fmt;
use std::sync::Arc;

use rusqlite::{Connection, Statement};

use crate::binder::bind;
use crate::config::DbConfig;
use crate::error::{Error, Result};
use crate::mapper::{map_row, Mappable, MappingPlan, Mutators};
use crate::materializer::{materialize, ColumnLayout, Record};
use crate::provider::{ConnectionProvider, SqliteProvider};
use crate::release::{using, Lease};
use crate::value::Param;

/// Returned by [`Executor::execute_batch`] for a batch with no statements.
pub const NO_STATEMENTS: i64 = -1;

/// Runs statements, one provider connection per operation.
///
/// Every operation acquires a connection, prepares and binds its statement,
/// runs it and releases cursor, statement and connection in that order,
/// whether or not it succeeded.
#[derive(Clone)]
pub struct Executor {
    provider: Arc<dyn ConnectionProvider>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor").finish_non_exhaustive()
    }
}

impl Executor {
    /// Creates an executor drawing connections from `provider`.
    pub fn new(provider: impl ConnectionProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Creates an executor sharing an existing provider.
    pub fn with_provider(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    /// Creates an executor that opens SQLite connections from `config`.
    pub fn from_config(config: DbConfig) -> Self {
        Self::new(SqliteProvider::new(config))
    }

    /// Executes a data-modifying statement.
    ///
    /// Returns the number of affected rows.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Connection`], [`Error::Bind`] or
    /// [`Error::Execution`], or with [`Error::ResourceRelease`] if the
    /// statement succeeded but cleanup did not.
    pub fn execute_update(&self, sql: &str, params: &[Param]) -> Result<usize> {
        self.with_connection(|conn| execute_statement(conn, sql, params))
    }

    /// Executes `sqls[i]` with `param_lists[i]` for every `i` in one
    /// transaction.
    ///
    /// Returns the total number of affected rows, or [`NO_STATEMENTS`] when
    /// `sqls` is empty, in which case no connection is acquired. If any
    /// statement fails the transaction is rolled back and that statement's
    /// error is returned.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::BatchShape`] if the two lists differ in length,
    /// otherwise as [`execute_update`](Self::execute_update). A failed
    /// commit is reported as [`Error::Execution`].
    pub fn execute_batch<S, P>(&self, sqls: &[S], param_lists: &[P]) -> Result<i64>
    where
        S: AsRef<str>,
        P: AsRef<[Param]>,
    {
        if sqls.len() != param_lists.len() {
            let err = Error::BatchShape {
                statements: sqls.len(),
                parameter_lists: param_lists.len(),
            };
            log::error!("{err}");
            return Err(err);
        }
        if sqls.is_empty() {
            return Ok(NO_STATEMENTS);
        }

        self.with_connection(|conn| {
            let tx = conn.transaction().map_err(failed("BEGIN"))?;
            let outcome = sqls
                .iter()
                .zip(param_lists)
                .try_fold(0_i64, |total, (sql, params)| -> Result<i64> {
                    let count = execute_statement(&tx, sql.as_ref(), params.as_ref())?;
                    Ok(total.saturating_add(i64::try_from(count).unwrap_or(i64::MAX)))
                });
            match outcome {
                Ok(total) => {
                    tx.commit().map_err(failed("COMMIT"))?;
                    log::debug!("batch of {} statements committed", sqls.len());
                    Ok(total)
                }
                Err(err) => {
                    if let Err(rollback) = tx.rollback() {
                        log::error!("rollback after failed batch also failed: {rollback}");
                    }
                    Err(err)
                }
            }
        })
    }

    /// Runs a query and materializes its first row.
    ///
    /// Returns `None` when the query yields no rows.
    ///
    /// # Errors
    ///
    /// As [`execute_update`](Self::execute_update), plus
    /// [`Error::Materialization`] if a binary column cannot be read.
    pub fn query_one(&self, sql: &str, params: &[Param]) -> Result<Option<Record>> {
        self.with_statement(sql, params, |stmt| {
            let layout = ColumnLayout::of(stmt);
            using(stmt.raw_query(), |rows| {
                rows.next()
                    .map_err(failed(sql))?
                    .map(|row| materialize(row, &layout))
                    .transpose()
            })
        })
    }

    /// Runs a query and materializes every row, in order.
    ///
    /// Returns `None` when the query yields no rows; a returned list is
    /// never empty.
    ///
    /// # Errors
    ///
    /// As [`query_one`](Self::query_one).
    pub fn query_list(&self, sql: &str, params: &[Param]) -> Result<Option<Vec<Record>>> {
        self.with_statement(sql, params, |stmt| {
            let layout = ColumnLayout::of(stmt);
            using(stmt.raw_query(), |rows| {
                let mut records = Vec::new();
                while let Some(row) = rows.next().map_err(failed(sql))? {
                    records.push(materialize(row, &layout)?);
                }
                Ok((!records.is_empty()).then_some(records))
            })
        })
    }

    /// Runs a query and maps every row onto a new `T`.
    ///
    /// # Errors
    ///
    /// As [`execute_update`](Self::execute_update), plus [`Error::Mapping`]
    /// if a `T` cannot be created or one of its mutators rejects a value.
    pub fn find<T: Mappable + 'static>(&self, sql: &str, params: &[Param]) -> Result<Vec<T>> {
        self.find_with(sql, params, &T::mutators())
    }

    /// Like [`find`](Self::find), with a registry built by the caller.
    ///
    /// # Errors
    ///
    /// As [`find`](Self::find).
    pub fn find_with<T: Mappable + 'static>(
        &self,
        sql: &str,
        params: &[Param],
        mutators: &Mutators<T>,
    ) -> Result<Vec<T>> {
        self.with_statement(sql, params, |stmt| {
            let plan = MappingPlan::new(stmt, mutators);
            using(stmt.raw_query(), |rows| {
                let mut objects = Vec::new();
                while let Some(row) = rows.next().map_err(failed(sql))? {
                    let object = map_row(row, &plan).inspect_err(|err| log::error!("{err}"))?;
                    objects.push(object);
                }
                Ok(objects)
            })
        })
    }

    /// Runs one or more `;`-separated statements without parameters.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Connection`] or [`Error::Execution`].
    pub fn execute_script(&self, sql: &str) -> Result<()> {
        self.with_connection(|conn| conn.execute_batch(sql).map_err(failed(sql)))
    }

    fn with_connection<T>(&self, body: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let lease = Lease::acquire(self.provider.as_ref())?;
        using(lease, |lease| body(lease.connection_mut()))
    }

    fn with_statement<T>(
        &self,
        sql: &str,
        params: &[Param],
        body: impl FnOnce(&mut Statement<'_>) -> Result<T>,
    ) -> Result<T> {
        self.with_connection(|conn| {
            let stmt = conn.prepare(sql).map_err(failed(sql))?;
            using(stmt, |stmt| {
                bind(stmt, params)?;
                body(stmt)
            })
        })
    }
}

fn execute_statement(conn: &Connection, sql: &str, params: &[Param]) -> Result<usize> {
    let stmt = conn.prepare(sql).map_err(failed(sql))?;
    using(stmt, |stmt| {
        bind(stmt, params)?;
        stmt.raw_execute().map_err(failed(sql))
    })
}

fn failed(sql: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |source| {
        log::error!("statement failed: `{sql}`: {source}");
        Error::execution(sql, source)
    }
}
