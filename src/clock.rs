//! Wall-clock timestamps and thread/process identity for log records.
//!
//! Records carry a `timeval`-like timestamp (seconds plus microseconds) taken
//! as close as possible to the logging call, and the kernel thread id of the
//! caller. The human-readable form is always local time.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{Local, NaiveDateTime, TimeZone};

/// `strftime`-style layout of the date/time part of a rendered timestamp.
pub const TIME_FORMAT: &str = "%Y/%m/%d-%H:%M:%S";

/// Maximum length of a cached application name.
const APP_NAME_MAX: usize = 15;

/// A point in time with microsecond resolution.
///
/// # Examples
///
/// ```
/// # use ring_logger::clock::Timestamp;
/// let ts = Timestamp::new(1_700_000_000, 42);
/// let text = ts.render();
/// assert!(text.ends_with(".000042"));
/// assert_eq!(Timestamp::parse(&text), Some(ts));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    /// Seconds since the UNIX epoch
    pub secs: i64,
    /// Microseconds within the second (0..1_000_000)
    pub micros: i64,
}

impl Timestamp {
    pub const fn new(secs: i64, micros: i64) -> Self {
        Self { secs, micros }
    }

    /// Captures the current wall-clock time.
    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, d.subsec_micros() as i64),
            // Clock set before 1970; clamp rather than fail the log call
            Err(_) => Self::default(),
        }
    }

    /// Renders `YYYY/MM/DD-HH:MM:SS.uuuuuu` in local time.
    pub fn render(&self) -> String {
        let date = match Local.timestamp_opt(self.secs, 0).earliest() {
            Some(dt) => dt.format(TIME_FORMAT).to_string(),
            None => "0000/00/00-00:00:00".to_string(),
        };
        format!("{}.{:06}", date, self.micros)
    }

    /// Parses the output of [`Timestamp::render`].
    ///
    /// The microsecond field must be all digits and below one million.
    ///
    /// Local time is ambiguous in the hour repeated when daylight saving
    /// ends; such times parse as the earlier instant, so a record taken in
    /// the second pass of that hour comes back one hour early.
    pub fn parse(text: &str) -> Option<Self> {
        let (date, micros) = text.split_once('.')?;
        if micros.is_empty() || micros.len() > 6 || !micros.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let micros: i64 = micros.parse().ok()?;
        let naive = NaiveDateTime::parse_from_str(date, TIME_FORMAT).ok()?;
        let local = Local.from_local_datetime(&naive).earliest()?;
        Some(Self::new(local.timestamp(), micros))
    }
}

/// Kernel thread id of the calling thread.
#[cfg(target_os = "linux")]
pub fn current_tid() -> u32 {
    // SAFETY: gettid has no preconditions and cannot fail.
    unsafe { libc::syscall(libc::SYS_gettid) as u32 }
}

#[cfg(not(target_os = "linux"))]
pub fn current_tid() -> u32 {
    std::process::id()
}

/// Cached identity of the logging process, rendered into every line.
///
/// Fork changes the PID, so the child refreshes this before restarting its
/// writer threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub app_name: String,
    pub pid: u32,
}

impl ProcessIdentity {
    /// Reads the application name from `/proc/self/comm` and the current PID.
    pub fn current() -> Self {
        let app_name = std::fs::read_to_string("/proc/self/comm")
            .ok()
            .map(|comm| sanitize_app_name(&comm))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "(unknown)".to_string());
        Self {
            app_name,
            pid: std::process::id(),
        }
    }
}

impl Default for ProcessIdentity {
    fn default() -> Self {
        Self::current()
    }
}

/// App names are a single whitespace-free column of the log line.
fn sanitize_app_name(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .take(APP_NAME_MAX)
        .collect()
}
