//! The per-context writer thread.
//!
//! Producers never touch the disk. They drop encoded records into rings and
//! kick the writer, which drains locked rings and the write-through ring into
//! the log file. The context mutex is held while the writer looks at rings and
//! queues and released around every file operation.
//!
//! Each started writer is one generation: it gets a fresh [`WriterShared`]
//! whose `terminate` flag only ever goes from false to true. Once the flag is
//! set the context may free its rings at any time, so the writer re-checks it
//! after every reacquisition of the mutex and bails out before looking at
//! anything else.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, MutexGuard};

use crate::context::LogHandle;
use crate::record::{Record, MAX_RECORD_SIZE};
use crate::ring::RingState;
use crate::rotation::LogFiles;

/// Name given to every writer thread.
pub const WRITER_THREAD_NAME: &str = "ring_logger writer";

/// Counters reported by [`stats`](crate::stats).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Records that failed to decode or to reach the file
    pub write_errors: u64,
    /// Rotations performed by this process since the writer started
    pub rotations: u64,
}

/// Lock-free state shared by a writer generation and its context.
#[derive(Debug)]
pub(crate) struct WriterFlags {
    pub terminate: AtomicBool,
    pub write_to_file: AtomicBool,
    pub file_open: AtomicBool,
    /// OS error of the last failed open, 0 if none
    pub errcode: AtomicI32,
    pub write_errors: AtomicU64,
    pub rotations: AtomicU64,
}

impl WriterFlags {
    pub fn new() -> Self {
        Self {
            terminate: AtomicBool::new(false),
            write_to_file: AtomicBool::new(true),
            file_open: AtomicBool::new(false),
            errcode: AtomicI32::new(0),
            write_errors: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn terminated(&self) -> bool {
        self.terminate.load(Ordering::Acquire)
    }

    pub fn record_error(&self, err: &io::Error) {
        self.errcode
            .store(err.raw_os_error().unwrap_or(libc::EIO), Ordering::Release);
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            write_errors: self.write_errors.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
        }
    }
}

/// Everything one writer generation owns.
#[derive(Debug)]
pub(crate) struct WriterShared {
    pub flags: WriterFlags,
    pub files: Mutex<LogFiles>,
}

impl WriterShared {
    pub fn new(files: LogFiles) -> Self {
        Self {
            flags: WriterFlags::new(),
            files: Mutex::new(files),
        }
    }

    /// Writes one encoded record, rotating first if the file has grown too
    /// large. Called with the context mutex released.
    fn write_encoded(&self, bytes: &[u8]) {
        let Some(record) = Record::decode(bytes) else {
            tracing::warn!(len = bytes.len(), "dropping undecodable record");
            self.flags.write_errors.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let mut files = self.files.lock();
        files.maybe_rotate(&self.flags);
        files.write_record(&record, &self.flags);
    }
}

/// Starts a writer thread for `ctx`.
pub(crate) fn spawn(ctx: LogHandle, shared: Arc<WriterShared>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(WRITER_THREAD_NAME.to_string())
        .spawn(move || run(ctx, shared))
}

fn run(ctx: LogHandle, shared: Arc<WriterShared>) {
    block_signals();
    let flags = &shared.flags;
    tracing::debug!("writer thread started");

    shared.files.lock().open(flags);

    let mut buf = Vec::with_capacity(MAX_RECORD_SIZE);
    let mut inner = ctx.inner.lock();
    // Start with a full pass so that anything queued before we got the lock
    // is written before the first idle handshake
    let mut did_work = true;

    'run: while !flags.terminated() {
        if !did_work {
            if let Some(writer) = inner.writer.as_mut() {
                writer.sync = false;
            }
            ctx.idle.notify_all();
            ctx.work.wait(&mut inner);
            if flags.terminated() {
                break;
            }
        }
        did_work = false;

        if inner.writer.as_ref().is_some_and(|w| w.rotate) {
            MutexGuard::unlocked(&mut inner, || shared.files.lock().force_rotate(flags));
            if flags.terminated() {
                break;
            }
            if let Some(writer) = inner.writer.as_mut() {
                writer.rotate = false;
            }
            ctx.idle.notify_all();
            did_work = true;
        }

        while let Some(index) = inner.locked_q.pop_front() {
            while inner.rings[index].pop_into(&mut buf) {
                MutexGuard::unlocked(&mut inner, || shared.write_encoded(&buf));
                if flags.terminated() {
                    break 'run;
                }
            }
            inner.rings[index].state = RingState::Idle;
            inner.idle_q.push_back(index);
            ctx.idle.notify_all();
            did_work = true;
        }

        loop {
            let popped = inner
                .write_through
                .as_mut()
                .is_some_and(|ring| ring.pop_into(&mut buf));
            if !popped {
                break;
            }
            // Space was just freed; producers waiting on it can race for it
            // while we write
            ctx.through.notify_all();
            MutexGuard::unlocked(&mut inner, || shared.write_encoded(&buf));
            if flags.terminated() {
                break 'run;
            }
            did_work = true;
        }
    }

    ctx.idle.notify_all();
    drop(inner);

    shared.files.lock().close_log();
    tracing::debug!("writer thread stopped");
}

/// The writer must never run signal handlers: they may need the context
/// mutex, and the writer releases it only at well-defined points.
fn block_signals() {
    // SAFETY: sigset_t is plain data; sigfillset initializes it before use
    // and pthread_sigmask only affects the calling thread.
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigfillset(&mut set);
        libc::pthread_sigmask(libc::SIG_BLOCK, &set, std::ptr::null_mut());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ProcessIdentity;
    use crate::config::LogConfig;
    use crate::kind::Kind;
    use tempfile::tempdir;

    #[test]
    fn test_flags_defaults() {
        let flags = WriterFlags::new();
        assert!(!flags.terminated());
        assert!(flags.write_to_file.load(Ordering::Relaxed));
        assert!(!flags.file_open.load(Ordering::Relaxed));
        assert_eq!(flags.stats(), WriterStats::default());
    }

    #[test]
    fn test_record_error_defaults_to_eio() {
        let flags = WriterFlags::new();
        flags.record_error(&io::Error::new(io::ErrorKind::Other, "no code"));
        assert_eq!(flags.errcode.load(Ordering::Relaxed), libc::EIO);
        flags.record_error(&io::Error::from_raw_os_error(libc::EACCES));
        assert_eq!(flags.errcode.load(Ordering::Relaxed), libc::EACCES);
    }

    #[test]
    fn test_undecodable_record_counted() {
        let dir = tempdir().unwrap();
        let config = LogConfig::new()
            .path(dir.path().join("w.log"))
            .resolve_with(|_| None);
        let shared = WriterShared::new(LogFiles::new(&config, ProcessIdentity::current()));
        shared.files.lock().open(&shared.flags);

        shared.write_encoded(&[0u8; 16]);
        assert_eq!(shared.flags.stats().write_errors, 1);

        shared.write_encoded(&Record::format(Kind::Message, 7, "fine").encode());
        assert_eq!(shared.flags.stats().write_errors, 1);
        let data = std::fs::read_to_string(dir.path().join("w.log")).unwrap();
        assert!(data.contains(" 7 MESG fine\n"));
    }
}
