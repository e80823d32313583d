//! Reader and utilities for decoding rendered log files.
//!
//! Log files are plain text, one record per line. This module turns those
//! lines back into their fields, which is what the inspection binary and the
//! tests use to check what the writer thread produced.

use std::collections::BTreeMap;
use std::fmt;

use crate::clock::Timestamp;
use crate::kind::Kind;

/// One log line split into its fields.
///
/// Borrows from the line it was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    pub timestamp: Timestamp,
    pub app_name: &'a str,
    pub pid: u32,
    pub tid: u32,
    pub kind: Kind,
    /// Everything after the kind code, leading spaces preserved.
    pub text: &'a str,
}

impl fmt::Display for ParsedLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.timestamp.render(),
            self.app_name,
            self.pid,
            self.tid,
            self.kind.code(),
            self.text
        )
    }
}

/// Parses one line as produced by [`Record::render_line`](crate::Record::render_line).
///
/// The trailing newline is optional. Returns `None` for anything that does
/// not have all six fields in the expected shape; never panics.
///
/// # Examples
///
/// ```
/// # use ring_logger::{parse_line, Kind};
/// let parsed = parse_line("2024/03/01-12:00:00.000001 powerd 10 11 WARN fan 2 slow\n").unwrap();
/// assert_eq!(parsed.kind, Kind::Warning);
/// assert_eq!(parsed.text, "fan 2 slow");
/// ```
pub fn parse_line(line: &str) -> Option<ParsedLine<'_>> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let mut fields = line.splitn(6, ' ');
    let timestamp = Timestamp::parse(fields.next()?)?;
    let app_name = fields.next()?;
    if app_name.is_empty() {
        return None;
    }
    let pid = parse_decimal(fields.next()?)?;
    let tid = parse_decimal(fields.next()?)?;
    let kind = Kind::parse_code(fields.next()?)?;
    let text = fields.next()?;
    Some(ParsedLine {
        timestamp,
        app_name,
        pid,
        tid,
        kind,
        text,
    })
}

fn parse_decimal(field: &str) -> Option<u32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Sequential reader over the contents of a log file.
///
/// Yields `Ok` for every well-formed line and `Err` with the raw line for
/// everything else, and keeps a per-kind tally along the way.
///
/// # Examples
///
/// ```
/// # use ring_logger::{Kind, LogReader};
/// let data = "2024/03/01-12:00:00.000001 powerd 10 11 MESG hello\n\
///             not a log line\n";
/// let mut reader = LogReader::new(data);
/// while let Some(entry) = reader.read_entry() {
///     let _ = entry;
/// }
/// assert_eq!(LogReader::count(&reader, Kind::Message), 1);
/// assert_eq!(reader.malformed(), 1);
/// ```
pub struct LogReader<'a> {
    lines: std::str::Lines<'a>,
    counts: BTreeMap<u32, usize>,
    malformed: usize,
}

impl<'a> LogReader<'a> {
    pub fn new(data: &'a str) -> Self {
        Self {
            lines: data.lines(),
            counts: BTreeMap::new(),
            malformed: 0,
        }
    }

    /// Reads the next line. Returns `None` at the end of the data.
    pub fn read_entry(&mut self) -> Option<Result<ParsedLine<'a>, &'a str>> {
        let line = self.lines.next()?;
        match parse_line(line) {
            Some(parsed) => {
                *self.counts.entry(parsed.kind.as_u32()).or_default() += 1;
                Some(Ok(parsed))
            }
            None => {
                self.malformed += 1;
                Some(Err(line))
            }
        }
    }

    /// Number of well-formed lines of `kind` read so far.
    pub fn count(&self, kind: Kind) -> usize {
        self.counts.get(&kind.as_u32()).copied().unwrap_or(0)
    }

    /// Per-kind tallies in wire-value order.
    pub fn counts(&self) -> impl Iterator<Item = (Kind, usize)> + '_ {
        self.counts.iter().map(|(k, n)| (Kind::from_u32(*k), *n))
    }

    pub fn malformed(&self) -> usize {
        self.malformed
    }
}

impl<'a> Iterator for LogReader<'a> {
    type Item = Result<ParsedLine<'a>, &'a str>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_entry()
    }
}
