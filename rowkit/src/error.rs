//! Error types for statement execution and row mapping.

use thiserror::Error;

/// Result type for `rowkit` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed source for failures that may come from the driver or from I/O.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while acquiring connections, executing statements and
/// converting rows.
///
/// Parameter values are never part of an error; statement text is.
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be opened.
    #[error("could not connect to `{database}`: {source}")]
    Connection {
        /// Database the provider tried to open.
        database: String,
        /// Driver error.
        #[source]
        source: rusqlite::Error,
    },

    /// The configuration is missing a value or a value does not parse.
    #[error("invalid configuration for `{key}`: {message}")]
    Config {
        /// Configuration key (environment variable name).
        key: String,
        /// What was wrong with it.
        message: String,
    },

    /// A parameter was rejected while binding it to its placeholder.
    #[error("could not bind parameter {index}: {source}")]
    Bind {
        /// 1-based placeholder index.
        index: usize,
        /// Driver or stream error.
        #[source]
        source: BoxedSource,
    },

    /// Preparing, executing, committing or stepping a statement failed.
    #[error("statement failed: `{sql}`: {source}")]
    Execution {
        /// Statement text.
        sql: String,
        /// Driver error.
        #[source]
        source: rusqlite::Error,
    },

    /// The statement and parameter lists of a batch have different lengths.
    #[error("batch has {statements} statements but {parameter_lists} parameter lists")]
    BatchShape {
        /// Number of statements.
        statements: usize,
        /// Number of parameter lists.
        parameter_lists: usize,
    },

    /// A large-binary column could not be read into memory.
    #[error("could not read binary column `{column}`: {message}")]
    Materialization {
        /// Lower-cased column name.
        column: String,
        /// Failure detail.
        message: String,
    },

    /// A target object could not be created or one of its mutators failed.
    #[error("could not map row onto `{target}`: {message}")]
    Mapping {
        /// Target type name.
        target: &'static str,
        /// Failure detail.
        message: String,
    },

    /// Releasing a connection, statement or cursor failed.
    #[error("could not release {resource}: {source}")]
    ResourceRelease {
        /// Kind of resource (`connection`, `statement`, `cursor`).
        resource: &'static str,
        /// Driver error.
        #[source]
        source: rusqlite::Error,
    },
}

impl Error {
    pub(crate) fn execution(sql: &str, source: rusqlite::Error) -> Self {
        Self::Execution {
            sql: sql.to_string(),
            source,
        }
    }

    pub(crate) fn bind(index: usize, source: impl Into<BoxedSource>) -> Self {
        Self::Bind {
            index,
            source: source.into(),
        }
    }

    pub(crate) fn mapping<T>(message: impl Into<String>) -> Self {
        Self::Mapping {
            target: std::any::type_name::<T>(),
            message: message.into(),
        }
    }
}
