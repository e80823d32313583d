//! Binary log records.
//!
//! A record is one formatted log event in the form that travels through the
//! ring buffers. It is length-prefixed and padded to an 8-byte boundary so
//! that any number of records can be packed back to back into a ring.
//!
//! # Binary Format
//!
//! All header fields are little-endian:
//!
//! ```text
//! [total_len(4) | text_len(4) | kind(4) | tid(4) | secs(8) | micros(8) | text(N) | NUL | pad]
//! ```
//!
//! `total_len` covers the header, the text, the terminating NUL and the
//! padding, and is always a positive multiple of 8.

use std::fmt::{self, Write as _};

use crate::clock::Timestamp;
use crate::kind::Kind;

/// Size of the text buffer of a record, including the terminating NUL.
///
/// A rendered line adds a human-readable header to the text, and the whole
/// line has to stay within 4096 bytes so that writes to network filesystems
/// are not split. 128 bytes are reserved for that header.
pub const MAX_TEXT_SIZE: usize = 4096 - 128;

/// Longest text a record can carry.
pub const MAX_TEXT_LEN: usize = MAX_TEXT_SIZE - 1;

/// Size of the fixed record header in bytes.
pub const HEADER_SIZE: usize = 32;

/// Largest encoded record.
pub const MAX_RECORD_SIZE: usize = HEADER_SIZE + MAX_TEXT_SIZE;

const _: () = assert!(MAX_RECORD_SIZE % 8 == 0);

/// One log event.
///
/// # Examples
///
/// ```
/// # use ring_logger::{Kind, Record};
/// let record = Record::format(Kind::Message, 7, "Temperature: 25.5 C");
/// let bytes = record.encode();
/// assert_eq!(bytes.len() % 8, 0);
/// assert_eq!(Record::decode(&bytes), Some(record));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: Kind,
    pub tid: u32,
    pub timestamp: Timestamp,
    text: String,
}

impl Record {
    /// Creates a record stamped with the current time.
    ///
    /// Overlong text is truncated, never rejected. Trailing line breaks are
    /// dropped and interior ones become spaces, so a record always renders as
    /// exactly one line.
    pub fn format(kind: Kind, tid: u32, text: &str) -> Self {
        Self::with_timestamp(kind, tid, Timestamp::now(), text)
    }

    /// Like [`Record::format`], for `format_args!` output. The timestamp is
    /// taken before the arguments are formatted.
    pub fn format_args(kind: Kind, tid: u32, args: fmt::Arguments<'_>) -> Self {
        let timestamp = Timestamp::now();
        let mut text = String::new();
        // Display impls can fail; keep whatever made it into the buffer
        let _ = text.write_fmt(args);
        Self::with_timestamp(kind, tid, timestamp, &text)
    }

    /// Creates a record with an explicit timestamp. Deterministic.
    ///
    /// A `User` kind with a reserved value becomes the built-in kind it
    /// encodes to, so routing matches what the file will say.
    pub fn with_timestamp(kind: Kind, tid: u32, timestamp: Timestamp, text: &str) -> Self {
        Self {
            kind: Kind::from_u32(kind.as_u32()),
            tid,
            timestamp,
            text: clean_text(text),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn text_len(&self) -> usize {
        self.text.len()
    }

    /// Encoded size of this record.
    pub fn total_len(&self) -> usize {
        padded_len(self.text.len())
    }

    /// Encodes the record into `out`, replacing its contents.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let total = self.total_len();
        out.clear();
        out.reserve(total);
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(self.text.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.kind.as_u32().to_le_bytes());
        out.extend_from_slice(&self.tid.to_le_bytes());
        out.extend_from_slice(&self.timestamp.secs.to_le_bytes());
        out.extend_from_slice(&self.timestamp.micros.to_le_bytes());
        out.extend_from_slice(self.text.as_bytes());
        // NUL terminator plus padding to the 8-byte boundary
        out.resize(total, 0);
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        self.encode_into(&mut out);
        out
    }

    /// Decodes one record from the start of `bytes`.
    ///
    /// Returns `None` for truncated, misaligned or otherwise inconsistent
    /// input, including text that is not valid UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let total = encoded_len(bytes)?;
        let text_len = read_u32(bytes, 4)? as usize;
        if text_len > MAX_TEXT_LEN || padded_len(text_len) != total || total > bytes.len() {
            return None;
        }
        let kind = Kind::from_u32(read_u32(bytes, 8)?);
        let tid = read_u32(bytes, 12)?;
        let secs = read_i64(bytes, 16)?;
        let micros = read_i64(bytes, 24)?;
        let text = std::str::from_utf8(&bytes[HEADER_SIZE..HEADER_SIZE + text_len]).ok()?;
        Some(Self {
            kind,
            tid,
            timestamp: Timestamp::new(secs, micros),
            text: text.to_string(),
        })
    }

    /// Renders the record as one log file line, newline included:
    /// `TIMESTAMP APPNAME PID TID KIND TEXT\n`.
    pub fn render_line(&self, app_name: &str, pid: u32) -> String {
        format!(
            "{} {} {} {} {} {}\n",
            self.timestamp.render(),
            app_name,
            pid,
            self.tid,
            self.kind.code(),
            self.text
        )
    }
}

/// Reads the `total_len` field at the start of an encoded record.
///
/// Only validates what can be validated from the header alone: a length that
/// is a positive multiple of 8, large enough for the header and no larger than
/// [`MAX_RECORD_SIZE`].
pub fn encoded_len(bytes: &[u8]) -> Option<usize> {
    let total = read_u32(bytes, 0)? as usize;
    if total <= HEADER_SIZE || total % 8 != 0 || total > MAX_RECORD_SIZE {
        return None;
    }
    Some(total)
}

/// Encoded size for a text of `text_len` bytes: header, text, NUL, padding.
pub const fn padded_len(text_len: usize) -> usize {
    (HEADER_SIZE + text_len + 1 + 7) & !7
}

fn clean_text(text: &str) -> String {
    let text = text.trim_end_matches(['\n', '\r']);
    let mut end = text.len().min(MAX_TEXT_LEN);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].replace(['\n', '\r'], " ")
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes(raw.try_into().ok()?))
}

fn read_i64(bytes: &[u8], at: usize) -> Option<i64> {
    let raw = bytes.get(at..at + 8)?;
    Some(i64::from_le_bytes(raw.try_into().ok()?))
}
