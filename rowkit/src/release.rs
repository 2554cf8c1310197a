//! Scoped acquisition with guaranteed release.
//!
//! Every operation nests three scopes: connection, statement and cursor.
//! [`using`] runs a body against a resource and then releases the resource
//! no matter how the body ended, so nesting gives release in reverse
//! acquisition order. Each release is attempted independently of the
//! others; the error reported is the body's error if there is one,
//! otherwise the first release failure. Anything suppressed is logged.

use rusqlite::{Connection, Rows, Statement};

use crate::error::{Error, Result};
use crate::provider::ConnectionProvider;

/// A resource that must be given back when its scope ends.
pub(crate) trait Release {
    /// Resource kind used in logs and errors.
    const RESOURCE: &'static str;

    /// Gives the resource back.
    fn release(self) -> Result<()>;
}

/// Runs `body` against `resource`, then releases it.
pub(crate) fn using<R, T>(mut resource: R, body: impl FnOnce(&mut R) -> Result<T>) -> Result<T>
where
    R: Release,
{
    let outcome = body(&mut resource);
    settle(R::RESOURCE, outcome, resource.release())
}

fn settle<T>(resource: &str, outcome: Result<T>, released: Result<()>) -> Result<T> {
    match (outcome, released) {
        (outcome, Ok(())) => outcome,
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Err(suppressed)) => {
            log::warn!("{resource} release failed while another error was in flight: {suppressed}");
            Err(err)
        }
    }
}

/// A connection on loan from a [`ConnectionProvider`].
///
/// Released through [`Release::release`] at the end of the scope, or from
/// `Drop` when a panic unwinds through it.
pub(crate) struct Lease<'p> {
    provider: &'p dyn ConnectionProvider,
    conn: Option<Connection>,
}

impl<'p> Lease<'p> {
    /// Asks `provider` for a connection.
    pub(crate) fn acquire(provider: &'p dyn ConnectionProvider) -> Result<Self> {
        let conn = provider.acquire()?;
        Ok(Self {
            provider,
            conn: Some(conn),
        })
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        self.conn
            .as_mut()
            .expect("lease holds its connection until released")
    }
}

impl Release for Lease<'_> {
    const RESOURCE: &'static str = "connection";

    fn release(mut self) -> Result<()> {
        match self.conn.take() {
            Some(conn) => self.provider.release(conn),
            None => Ok(()),
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            // Best-effort release on unwind.
            if let Err(err) = self.provider.release(conn) {
                log::error!("could not release connection during unwind: {err}");
            }
        }
    }
}

impl Release for Statement<'_> {
    const RESOURCE: &'static str = "statement";

    fn release(self) -> Result<()> {
        self.finalize().map_err(|source| {
            log::error!("could not finalize statement: {source}");
            Error::ResourceRelease {
                resource: Self::RESOURCE,
                source,
            }
        })
    }
}

impl Release for Rows<'_> {
    const RESOURCE: &'static str = "cursor";

    fn release(self) -> Result<()> {
        // Dropping the cursor resets its statement; SQLite reports nothing.
        drop(self);
        Ok(())
    }
}
