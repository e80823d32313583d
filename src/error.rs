use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Errors reported by the logging API.
///
/// Once a context is running, emitting a record never fails: ring overflow
/// evicts old records and writer-side I/O problems are only counted. Errors
/// therefore come from the enable gate and from bringing a context up.
#[derive(Debug, Error)]
pub enum LogError {
    /// Logging is switched off process-wide
    #[error("logging is disabled")]
    Disabled,

    /// Ring buffers could not be allocated
    #[error("out of memory allocating log rings: {0}")]
    OutOfMemory(#[from] TryReserveError),

    /// The writer thread could not be started or went away during init
    #[error("log writer thread unavailable")]
    WriterUnavailable,

    /// The log file or its control file could not be opened
    #[error("log file error: {0}")]
    FileSystem(#[from] io::Error),
}

impl LogError {
    /// OS error code, where one applies.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            LogError::FileSystem(e) => e.raw_os_error(),
            LogError::OutOfMemory(_) => Some(libc::ENOMEM),
            LogError::WriterUnavailable => Some(libc::EAGAIN),
            LogError::Disabled => None,
        }
    }
}

/// A specialized Result type for logging operations
pub type Result<T> = std::result::Result<T, LogError>;
