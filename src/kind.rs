use std::borrow::Cow;
use std::fmt;

/// Message kinds understood by the logging engine.
///
/// The kind decides how a record is routed: straight to the console, through
/// the write-through ring (never dropped), through the active ring with an
/// immediate flush (critical path), or into the active ring only (best-effort
/// trace history that may be overwritten).
///
/// Every kind has a stable 4-character code that appears in the fifth column of
/// a rendered log line. Kinds beyond the built-in set are caller-defined and
/// render as `USR<n>`.
///
/// # Examples
///
/// ```
/// # use ring_logger::Kind;
/// assert_eq!(Kind::Warning.code(), "WARN");
/// assert_eq!(Kind::User(42).code(), "USR42");
/// assert_eq!(Kind::parse_code("DBG2"), Some(Kind::Debug2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Console only, never reaches the log file
    Console,
    /// Messages produced by the logging engine itself
    Internal,
    /// Informational message
    Message,
    /// Critical message, usually right before the process gives up
    Critical,
    /// Something looks wrong
    Warning,
    /// An actual failure
    Fault,
    /// Top-level trace
    Trace1,
    /// Mid-level trace (high frequency)
    Trace2,
    /// Low-level trace (high frequency)
    Trace3,
    /// Normal debug
    Debug1,
    /// High-frequency debug
    Debug2,
    /// Caller-defined kind. The value should be at least [`Kind::NUM_BUILTIN`];
    /// smaller values are treated as the matching built-in kind once a
    /// record is made from them.
    User(u32),
}

const CODES: [&str; Kind::NUM_BUILTIN as usize] = [
    "CONS", "LOGR", "MESG", "CRIT", "WARN", "FAIL", "TRC1", "TRC2", "TRC3", "DBG1", "DBG2",
];

/// Stderr mask bits covering every trace kind.
pub const MASK_TRACE: u64 =
    Kind::Trace1.mask_bit() | Kind::Trace2.mask_bit() | Kind::Trace3.mask_bit();

/// Stderr mask bits covering every debug kind.
pub const MASK_DEBUG: u64 = Kind::Debug1.mask_bit() | Kind::Debug2.mask_bit();

impl Kind {
    /// Number of built-in kinds. Wire values below this are reserved.
    pub const NUM_BUILTIN: u32 = 11;

    /// Wire value of the kind, as stored in the binary record header.
    pub const fn as_u32(self) -> u32 {
        match self {
            Kind::Console => 0,
            Kind::Internal => 1,
            Kind::Message => 2,
            Kind::Critical => 3,
            Kind::Warning => 4,
            Kind::Fault => 5,
            Kind::Trace1 => 6,
            Kind::Trace2 => 7,
            Kind::Trace3 => 8,
            Kind::Debug1 => 9,
            Kind::Debug2 => 10,
            Kind::User(n) => n,
        }
    }

    /// Decodes a wire value. Never fails: unknown values are user kinds.
    pub const fn from_u32(value: u32) -> Self {
        match value {
            0 => Kind::Console,
            1 => Kind::Internal,
            2 => Kind::Message,
            3 => Kind::Critical,
            4 => Kind::Warning,
            5 => Kind::Fault,
            6 => Kind::Trace1,
            7 => Kind::Trace2,
            8 => Kind::Trace3,
            9 => Kind::Debug1,
            10 => Kind::Debug2,
            n => Kind::User(n),
        }
    }

    /// The 4-character code (or `USR<n>`) used in rendered log lines.
    pub fn code(self) -> Cow<'static, str> {
        let value = self.as_u32();
        if value < Self::NUM_BUILTIN {
            Cow::Borrowed(CODES[value as usize])
        } else {
            Cow::Owned(format!("USR{}", value))
        }
    }

    /// Parses a kind code as produced by [`Kind::code`].
    ///
    /// Returns `None` for anything that is neither a built-in code nor
    /// `USR` followed by a decimal number.
    pub fn parse_code(code: &str) -> Option<Self> {
        if let Some(pos) = CODES.iter().position(|c| *c == code) {
            return Some(Kind::from_u32(pos as u32));
        }
        let digits = code.strip_prefix("USR")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse::<u32>().ok().map(Kind::from_u32)
    }

    /// High-frequency kinds are rejected before formatting unless the enable
    /// gate is `Full`.
    pub const fn is_high_frequency(self) -> bool {
        matches!(self, Kind::Trace2 | Kind::Trace3 | Kind::Debug2)
    }

    /// Bit of this kind in a stderr mask. Kinds that do not fit in the mask
    /// have no bit and can never be mirrored to stderr.
    pub const fn mask_bit(self) -> u64 {
        let value = self.as_u32();
        if value < 64 {
            1u64 << value
        } else {
            0
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// Folds debug and trace levels into a stderr mask.
///
/// Both levels zero switches stderr mirroring off entirely. Otherwise every
/// non-debug, non-trace kind is enabled, and the debug/trace bits are rebuilt
/// from the levels. A negative level leaves that group of bits untouched.
pub fn level_to_mask(mask: u64, debug_level: i32, trace_level: i32) -> u64 {
    if debug_level == 0 && trace_level == 0 {
        return 0;
    }
    let mut mask = mask | !(MASK_TRACE | MASK_DEBUG);
    if debug_level >= 0 {
        mask &= !MASK_DEBUG;
    }
    if trace_level >= 0 {
        mask &= !MASK_TRACE;
    }
    if debug_level >= 2 {
        mask |= Kind::Debug2.mask_bit();
    }
    if debug_level >= 1 {
        mask |= Kind::Debug1.mask_bit();
    }
    if trace_level >= 3 {
        mask |= Kind::Trace3.mask_bit();
    }
    if trace_level >= 2 {
        mask |= Kind::Trace2.mask_bit();
    }
    if trace_level >= 1 {
        mask |= Kind::Trace1.mask_bit();
    }
    mask
}

/// Inverse of [`level_to_mask`]: the highest debug and trace levels enabled.
pub fn mask_to_levels(mask: u64) -> (i32, i32) {
    let debug_level = if mask & Kind::Debug2.mask_bit() != 0 {
        2
    } else if mask & Kind::Debug1.mask_bit() != 0 {
        1
    } else {
        0
    };
    let trace_level = if mask & Kind::Trace3.mask_bit() != 0 {
        3
    } else if mask & Kind::Trace2.mask_bit() != 0 {
        2
    } else if mask & Kind::Trace1.mask_bit() != 0 {
        1
    } else {
        0
    };
    (debug_level, trace_level)
}
