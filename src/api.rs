//! Public logging API.
//!
//! Every function takes an optional context handle; `None` means the default
//! context. While the enable gate is [`EnableMode::None`] nothing reaches any
//! context: fallible calls return [`LogError::Disabled`] and the rest do
//! nothing.

use std::fmt;

use crate::clock::current_tid;
use crate::config::LogConfig;
use crate::context::LogHandle;
use crate::error::{LogError, Result};
use crate::kind::Kind;
use crate::record::Record;
use crate::registry::{self, EnableMode};
use crate::writer::WriterStats;

/// Initializes a context, or the default one. Nested calls only bump a
/// reference count; each needs a matching [`term`].
///
/// # Examples
///
/// ```no_run
/// # use ring_logger::{init, emit_str, term, Kind, LogConfig};
/// let config = LogConfig::new().path("/tmp/app.log").max_files(3);
/// let ctx = init(None, &config)?;
/// emit_str(Some(&ctx), Kind::Message, "started")?;
/// term(Some(&ctx));
/// # Ok::<(), ring_logger::LogError>(())
/// ```
pub fn init(handle: Option<&LogHandle>, config: &LogConfig) -> Result<LogHandle> {
    let ctx = registry::resolve(handle).ok_or(LogError::Disabled)?;
    ctx.init(config)?;
    Ok(LogHandle::clone(ctx))
}

/// Initializes a context separate from the default one, reusing an inactive
/// context when there is one.
pub fn init_new(config: &LogConfig) -> Result<LogHandle> {
    if registry::enable_mode() == EnableMode::None {
        return Err(LogError::Disabled);
    }
    registry::init_new(config)
}

/// Logs one record. The context is initialized from the environment on
/// first use if needed.
///
/// High-frequency kinds are dropped without formatting unless the enable
/// gate is [`EnableMode::Full`].
pub fn emit(handle: Option<&LogHandle>, kind: Kind, args: fmt::Arguments<'_>) -> Result<()> {
    let ctx = registry::resolve(handle).ok_or(LogError::Disabled)?;
    if kind.is_high_frequency() && registry::enable_mode() != EnableMode::Full {
        return Ok(());
    }
    let record = Record::format_args(kind, current_tid(), args);
    ctx.emit(&record)
}

/// [`emit`] for text that needs no formatting.
pub fn emit_str(handle: Option<&LogHandle>, kind: Kind, text: &str) -> Result<()> {
    emit(handle, kind, format_args!("{}", text))
}

/// Blocks until every record queued for the writer so far is in the file.
///
/// Records still sitting in the active ring are not queued; see
/// [`flush_active_ring`].
pub fn sync(handle: Option<&LogHandle>) {
    if let Some(ctx) = registry::resolve(handle) {
        ctx.sync();
    }
}

/// Drops one reference; the last one drains and stops the context.
pub fn term(handle: Option<&LogHandle>) {
    if let Some(ctx) = registry::resolve(handle) {
        ctx.term(false);
    }
}

/// Drains and stops every context, ignoring reference counts.
pub fn term_all() {
    registry::global_init();
    registry::term_all();
}

/// Sets the levels of debug and trace records mirrored to stderr. A negative
/// level leaves that group unchanged; both zero turns mirroring off.
pub fn set_stderr_levels(
    handle: Option<&LogHandle>,
    debug_level: i32,
    trace_level: i32,
) -> Result<()> {
    let ctx = registry::resolve(handle).ok_or(LogError::Disabled)?;
    ctx.set_stderr_levels(debug_level, trace_level);
    Ok(())
}

/// Current `(debug, trace)` stderr levels.
pub fn stderr_levels(handle: Option<&LogHandle>) -> Result<Option<(i32, i32)>> {
    let ctx = registry::resolve(handle).ok_or(LogError::Disabled)?;
    Ok(ctx.stderr_levels())
}

/// Queues the active ring for writing.
pub fn flush_active_ring(handle: Option<&LogHandle>) {
    if let Some(ctx) = registry::resolve(handle) {
        ctx.flush_active_ring();
    }
}

/// Discards whatever is in the active ring.
pub fn clear_active_ring(handle: Option<&LogHandle>) {
    if let Some(ctx) = registry::resolve(handle) {
        ctx.clear_active_ring();
    }
}

/// Rotates the log file now and waits for it. Does nothing when rotation is
/// disabled.
pub fn force_rotate(handle: Option<&LogHandle>) {
    if let Some(ctx) = registry::resolve(handle) {
        ctx.force_rotate();
    }
}

/// Sends every record through the write-through ring while enabled. Turning
/// it on flushes the active ring if `flush` is set, clears it otherwise.
/// Returns the previous setting.
pub fn autoflush(handle: Option<&LogHandle>, enable: bool, flush: bool) -> bool {
    registry::resolve(handle).is_some_and(|ctx| ctx.autoflush(enable, flush))
}

/// Turns writing to the log file on or off and returns the previous setting.
pub fn write_to_file(handle: Option<&LogHandle>, enable: bool) -> bool {
    registry::resolve(handle).is_some_and(|ctx| ctx.write_to_file(enable))
}

/// Writer counters, if the context is running.
pub fn stats(handle: Option<&LogHandle>) -> Option<WriterStats> {
    registry::resolve(handle)?.stats()
}

/// Sets the process-wide enable gate and returns the previous mode.
pub fn set_enable(mode: EnableMode) -> EnableMode {
    registry::set_enable(mode)
}

/// Re-reads the enable gate from `RING_LOGGER_ENABLE`.
pub fn set_enable_from_env() -> EnableMode {
    registry::set_enable(EnableMode::from_env())
}

/// Current enable gate.
pub fn enable_mode() -> EnableMode {
    registry::enable_mode()
}
