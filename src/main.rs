//! Log file inspection tool.
//!
//! `ring_logger <file>...` reads rendered log files and prints how many
//! records of each kind they hold, followed by any lines that do not parse.

use std::fs;
use std::io;
use std::process::ExitCode;

use ring_logger::LogReader;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_timer(UtcTime::rfc_3339())
        .with_writer(io::stderr)
        .init();

    let paths: Vec<String> = std::env::args().skip(1).collect();
    if paths.is_empty() {
        eprintln!("usage: ring_logger <log file>...");
        return ExitCode::from(2);
    }

    let mut failed = false;
    for path in &paths {
        match inspect(path) {
            Ok(malformed) => failed |= malformed > 0,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "cannot read log file");
                failed = true;
            }
        }
    }
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Prints a summary of one file and returns its count of malformed lines.
fn inspect(path: &str) -> io::Result<usize> {
    let data = fs::read_to_string(path)?;
    let mut reader = LogReader::new(&data);
    let mut bad = Vec::new();
    let mut total = 0;
    for (lineno, entry) in reader.by_ref().enumerate() {
        match entry {
            Ok(_) => total += 1,
            Err(line) => bad.push((lineno + 1, line)),
        }
    }
    tracing::debug!(path, total, malformed = bad.len(), "file read");

    println!("{}: {} records", path, total);
    for (kind, count) in reader.counts() {
        println!("  {:<6} {}", kind.code(), count);
    }
    for (lineno, line) in &bad {
        println!("  malformed line {}: {}", lineno, line);
    }
    Ok(bad.len())
}
