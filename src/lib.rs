//! # Ring Logger
//!
//! An in-process logging engine that keeps disk I/O off the calling thread:
//!
//! * **Non-blocking trace history**: debug and trace records land in fixed-size
//!   ring buffers that overwrite their oldest content and are only written out
//!   when something worth keeping happens
//! * **Lossless messages**: informational records go through a write-through
//!   ring whose producers wait for space instead of dropping
//! * **Shared log files**: processes logging to the same path agree on one
//!   rotation policy and rotate safely using POSIX record locks
//!
//! ## Key Features
//!
//! * One writer thread per logging context, woken only when there is work
//! * Warnings, faults and critical records flush the ring they land in, so
//!   the trace leading up to them reaches the file too
//! * Size-triggered and on-demand rotation with numbered archives
//! * Fork-safe: a forked child gets fresh writer threads automatically
//! * `SIGSEGV`/`SIGBUS` and normal exit drain every context before the
//!   process goes away
//!
//! ## Main Components
//!
//! * [`Record`]: a formatted log event, its binary form and its text line
//! * [`ring::Ring`]: fixed-capacity circular buffer of encoded records
//! * [`LogContext`]: rings, routing and the writer thread of one log file
//! * [`LogReader`]: utility for reading rendered log files back
//!
//! ## Quick Start
//!
//! ```no_run
//! use ring_logger::{init, log_record, sync, term, Kind, LogConfig};
//!
//! let config = LogConfig::new()
//!     .path("/tmp/example.log")
//!     .max_size(64 * 1024)
//!     .max_files(3);
//! let ctx = init(None, &config)?;
//!
//! log_record!(Some(&ctx), Kind::Message, "Hello, world!")?;
//! log_record!(Some(&ctx), Kind::Debug1, "Temperature: {} C", 25.5)?;
//! log_record!(Some(&ctx), Kind::Warning, "Status: {}, Count: {}", true, 42)?;
//!
//! sync(Some(&ctx));
//! term(Some(&ctx));
//! # Ok::<(), ring_logger::LogError>(())
//! ```

pub mod api;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
mod hooks;
pub mod kind;
pub mod log_bridge;
pub mod log_reader;
mod macros;
pub mod record;
pub mod registry;
pub mod ring;
pub mod rotation;
pub mod writer;

pub use api::{
    autoflush, clear_active_ring, emit, emit_str, enable_mode, flush_active_ring, force_rotate,
    init, init_new, set_enable, set_enable_from_env, set_stderr_levels, stats, stderr_levels,
    sync, term, term_all, write_to_file,
};
pub use config::LogConfig;
pub use context::{LogContext, LogHandle};
pub use error::{LogError, Result};
pub use kind::Kind;
pub use log_bridge::{init_log_bridge, LogBridge};
pub use log_reader::{parse_line, LogReader, ParsedLine};
pub use record::Record;
pub use registry::EnableMode;
pub use rotation::archive_path;
pub use writer::WriterStats;
