//! Logging context configuration.
//!
//! Every numeric parameter follows the same three-step resolution: a non-zero
//! value from the caller wins, zero falls back to the matching environment
//! variable, and a value that is still zero takes the built-in default.
//! Negative values switch the feature off.

use std::path::{Path, PathBuf};

/// Log file used when neither the caller nor the environment names one.
pub const DEFAULT_FILE_PATH: &str = "/var/opt/powerapi/log/powerapi.log";
pub const DEFAULT_MAX_FILE_SIZE: i64 = 1024 * 1024;
pub const DEFAULT_MAX_FILE_COUNT: i64 = 5;
pub const DEFAULT_NUM_RINGS: i64 = 2;
pub const DEFAULT_RING_SIZE: i64 = 256 * 1024;

pub const ENV_FILE_PATH: &str = "RING_LOGGER_FILE_PATH";
pub const ENV_MAX_FILE_SIZE: &str = "RING_LOGGER_MAX_FILE_SIZE";
pub const ENV_MAX_FILE_COUNT: &str = "RING_LOGGER_MAX_FILE_COUNT";
pub const ENV_NUM_RINGS: &str = "RING_LOGGER_NUM_RINGS";
pub const ENV_RING_SIZE: &str = "RING_LOGGER_RING_SIZE";
pub const ENV_DEBUG_LEVEL: &str = "RING_LOGGER_DEBUG_LEVEL";
pub const ENV_TRACE_LEVEL: &str = "RING_LOGGER_TRACE_LEVEL";
pub const ENV_ENABLE: &str = "RING_LOGGER_ENABLE";

/// Caller-supplied parameters for [`init`](crate::init).
///
/// All fields are optional; `LogConfig::default()` means "environment, then
/// built-in defaults" for everything.
///
/// # Examples
///
/// ```
/// # use ring_logger::LogConfig;
/// let config = LogConfig::new()
///     .path("/tmp/example.log")
///     .max_size(64 * 1024)
///     .max_files(3)
///     .num_rings(4);
/// let resolved = config.resolve_with(|_| None);
/// assert_eq!(resolved.max_files, 3);
/// assert_eq!(resolved.ring_size, 256 * 1024);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogConfig {
    pub path: Option<PathBuf>,
    /// Rotation threshold in bytes; negative for unlimited growth
    pub max_size: i64,
    /// Files kept in rotation, current one included; negative disables rotation
    pub max_files: i64,
    /// Normal rings; negative for none (write-through only)
    pub num_rings: i64,
    /// Bytes per normal ring; negative or tiny values clamp to 4096
    pub ring_size: i64,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn max_size(mut self, max_size: i64) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn max_files(mut self, max_files: i64) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn num_rings(mut self, num_rings: i64) -> Self {
        self.num_rings = num_rings;
        self
    }

    pub fn ring_size(mut self, ring_size: i64) -> Self {
        self.ring_size = ring_size;
        self
    }

    /// Resolves against the process environment.
    pub fn resolve(&self) -> ResolvedConfig {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolves against an arbitrary variable lookup.
    pub fn resolve_with(&self, env: impl Fn(&str) -> Option<String>) -> ResolvedConfig {
        let env_number = |name: &str| env(name).map(|v| parse_number(&v)).unwrap_or(0);
        let pick = |value: i64, name: &str, default: i64| {
            let value = if value == 0 { env_number(name) } else { value };
            if value == 0 {
                default
            } else {
                value
            }
        };

        let path = self
            .path
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .or_else(|| env(ENV_FILE_PATH).filter(|p| !p.is_empty()).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_PATH));

        let max_size = pick(self.max_size, ENV_MAX_FILE_SIZE, DEFAULT_MAX_FILE_SIZE);
        let max_files = pick(self.max_files, ENV_MAX_FILE_COUNT, DEFAULT_MAX_FILE_COUNT);
        let num_rings = pick(self.num_rings, ENV_NUM_RINGS, DEFAULT_NUM_RINGS);
        let ring_size = pick(self.ring_size, ENV_RING_SIZE, DEFAULT_RING_SIZE);

        ResolvedConfig {
            path,
            max_size: round_max_size(max_size.max(0) as u64),
            max_files: if max_files < 0 { 1 } else { max_files as u64 },
            num_rings: num_rings.max(0) as usize,
            ring_size: crate::ring::round_ring_size(ring_size.max(0) as usize),
            debug_level: clamp_level(env_number(ENV_DEBUG_LEVEL)),
            trace_level: clamp_level(env_number(ENV_TRACE_LEVEL)),
        }
    }
}

/// Fully resolved parameters of a running context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub path: PathBuf,
    /// Multiple of 1024; 0 means unlimited
    pub max_size: u64,
    /// At least 1; 1 means no rotation
    pub max_files: u64,
    pub num_rings: usize,
    /// Multiple of 8, at least 4096
    pub ring_size: usize,
    /// Initial stderr debug level
    pub debug_level: i32,
    /// Initial stderr trace level
    pub trace_level: i32,
}

fn round_max_size(size: u64) -> u64 {
    size.saturating_add(1023) & !1023
}

fn clamp_level(level: i64) -> i32 {
    level.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Parses an integer the way C's `strtol` does with base 0: optional sign,
/// then `0x` for hex, a leading `0` for octal, decimal otherwise.
///
/// Anything malformed, including trailing garbage, yields 0.
pub fn parse_number(text: &str) -> i64 {
    let text = text.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let (radix, digits) = if let Some(hex) = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        (16, hex)
    } else if digits.len() > 1 && digits.starts_with('0') {
        (8, &digits[1..])
    } else {
        (10, digits)
    };
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return 0;
    }
    match i64::from_str_radix(digits, radix) {
        Ok(value) if negative => -value,
        Ok(value) => value,
        Err(_) => 0,
    }
}
