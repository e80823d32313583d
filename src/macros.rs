//! Logging macros.
//!
//! [`log_record!`] is the general form and returns the [`Result`](crate::Result)
//! of [`emit`](crate::emit). The shorthands log to the default context, prefix
//! the text with `[module:line]` and ignore failures, which is what call sites
//! sprinkled through application code want.

/// Logs a formatted record of `kind` to a context.
///
/// # Examples
///
/// ```no_run
/// use ring_logger::{log_record, Kind};
///
/// let temperature = 25.5;
/// log_record!(None, Kind::Message, "Temperature: {} C", temperature)?;
/// # Ok::<(), ring_logger::LogError>(())
/// ```
#[macro_export]
macro_rules! log_record {
    ($ctx:expr, $kind:expr, $($arg:tt)+) => {
        $crate::emit($ctx, $kind, format_args!($($arg)+))
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __log_at {
    ($kind:expr, $($arg:tt)+) => {{
        let _ = $crate::emit(
            None,
            $kind,
            format_args!("[{}:{}] {}", module_path!(), line!(), format_args!($($arg)+)),
        );
    }};
}

/// Informational message.
#[macro_export]
macro_rules! log_msg {
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Message, $($arg)+) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Warning, $($arg)+) };
}

#[macro_export]
macro_rules! log_crit {
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Critical, $($arg)+) };
}

#[macro_export]
macro_rules! log_fault {
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Fault, $($arg)+) };
}

/// Normal debug record, kept in the ring until something flushes it.
#[macro_export]
macro_rules! log_dbg {
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Debug1, $($arg)+) };
}

/// High-frequency debug record.
#[macro_export]
macro_rules! log_vrb {
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Debug2, $($arg)+) };
}

/// Console message; never reaches the log file.
#[macro_export]
macro_rules! log_cons {
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Console, $($arg)+) };
}

/// Top-level trace. `trace1!(ENTER)` and `trace1!(EXIT)` mark function
/// boundaries.
#[macro_export]
macro_rules! trace1 {
    (ENTER) => { $crate::__log_at!($crate::Kind::Trace1, "ENTER") };
    (EXIT) => { $crate::__log_at!($crate::Kind::Trace1, "EXIT") };
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Trace1, $($arg)+) };
}

#[macro_export]
macro_rules! trace2 {
    (ENTER) => { $crate::__log_at!($crate::Kind::Trace2, "ENTER") };
    (EXIT) => { $crate::__log_at!($crate::Kind::Trace2, "EXIT") };
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Trace2, $($arg)+) };
}

#[macro_export]
macro_rules! trace3 {
    (ENTER) => { $crate::__log_at!($crate::Kind::Trace3, "ENTER") };
    (EXIT) => { $crate::__log_at!($crate::Kind::Trace3, "EXIT") };
    ($($arg:tt)+) => { $crate::__log_at!($crate::Kind::Trace3, $($arg)+) };
}
