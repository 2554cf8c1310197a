//! Bridge from the `log` facade to an application-supplied logger.
//!
//! `rowkit` reports every failure through the `log` crate at the point it is
//! detected. Applications that already run a `log` or `tracing` subscriber
//! get those records for free; everyone else can hand a [`Logger`] to
//! [`set_logger`].

use std::sync::{Arc, OnceLock};

/// Trait representing a logger that can log messages at various levels.
///
/// # Examples
///
/// ```rust
/// use rowkit::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    ///
    /// Called synchronously from the thread that detected the event; it
    /// must not block for long and must not panic.
    fn log(&self, level: LogLevel, message: String);
}

/// Enumeration of possible log levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Designates very low priority, often extremely detailed messages.
    Trace,
    /// Designates lower priority debugging information.
    Debug,
    /// Designates informational messages.
    Info,
    /// Designates potentially harmful situations.
    Warn,
    /// Designates failures that were reported to the caller.
    Error,
}

/// Forwards `log` records to the installed [`Logger`].
struct ForwardingLogger;

impl log::Log for ForwardingLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        // Without an installed logger records are dropped.
        if let Some(logger) = LOGGER_INSTANCE.get() {
            forward(logger.as_ref(), record);
        }
    }

    fn flush(&self) {}
}

/// Hands `record` to `logger` unless it is debug or trace output from
/// another crate.
fn forward(logger: &dyn Logger, record: &log::Record) {
    let from_rowkit = record
        .module_path()
        .is_some_and(|module_path| module_path.starts_with("rowkit"));
    if record.level() >= log::Level::Debug && !from_rowkit {
        return;
    }
    logger.log(log_level(record.level()), record.args().to_string());
}

const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs `logger` as the destination of all `log` records.
///
/// Only the first call has an effect. If another `log` implementation was
/// already registered by the application, records keep flowing there and
/// `logger` is never called.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForwardingLogger = ForwardingLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
