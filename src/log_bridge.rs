//! Bridge from the `log` facade.
//!
//! Libraries that log through `log::info!` and friends end up in a logging
//! context like any other record once [`init_log_bridge`] has been called.

use log::{Level, LevelFilter, Metadata, SetLoggerError};

use crate::api;
use crate::context::LogHandle;
use crate::kind::Kind;

/// A [`log::Log`] implementation that forwards to a logging context.
#[derive(Debug)]
pub struct LogBridge {
    handle: Option<LogHandle>,
    level: LevelFilter,
}

impl LogBridge {
    /// Forwards records at or above `level` to `handle`, or to the default
    /// context.
    pub fn new(handle: Option<LogHandle>, level: LevelFilter) -> Self {
        Self { handle, level }
    }
}

/// Kind used for records of a `log` level.
pub fn kind_for_level(level: Level) -> Kind {
    match level {
        Level::Error => Kind::Fault,
        Level::Warn => Kind::Warning,
        Level::Info => Kind::Message,
        Level::Debug => Kind::Debug1,
        Level::Trace => Kind::Trace1,
    }
}

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        // Our own crate's records would come straight back in
        metadata.level() <= self.level && !metadata.target().starts_with("ring_logger")
    }

    fn log(&self, record: &log::Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let _ = api::emit(
            self.handle.as_ref(),
            kind_for_level(record.level()),
            format_args!("[{}] {}", record.target(), record.args()),
        );
    }

    fn flush(&self) {
        api::sync(self.handle.as_ref());
    }
}

/// Installs a [`LogBridge`] as the global `log` logger.
///
/// Fails if another logger was installed first.
pub fn init_log_bridge(handle: Option<LogHandle>, level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_boxed_logger(Box::new(LogBridge::new(handle, level)))?;
    log::set_max_level(level);
    Ok(())
}
