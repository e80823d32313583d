//! Log file ownership, rotation and the inter-process locking protocol.
//!
//! Several processes may log to the same path. They coordinate through POSIX
//! record locks:
//!
//! * `<path>.ctl` is the control file. An exclusive blocking lock on it acts as
//!   an inter-process mutex around opening and rotating the log, and its
//!   content (`max_size,max_files\n`) holds the rotation parameters shared by
//!   every process using the path.
//! * The log file itself carries a shared lock for as long as a process has
//!   it open. The first process to open it can take an exclusive lock instead,
//!   which is how it learns that it gets to write its own parameters to the
//!   control file.
//!
//! Rotation is decided independently by every process: whoever notices the
//! file has outgrown `max_size` contends for the control file, and the winner
//! shifts the archives `path.N-2 -> path.N-1 ... path -> path.1`. Everyone else
//! notices the inode change and reopens `path`.
//!
//! POSIX locks belong to the process, not the file handle. Two contexts of the
//! same process logging to the same path do not exclude each other, and closing
//! any handle on a file drops every lock the process holds on it.

use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::fs::{MetadataExt, OpenOptionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use crate::clock::{current_tid, ProcessIdentity};
use crate::config::ResolvedConfig;
use crate::kind::Kind;
use crate::record::Record;
use crate::writer::WriterFlags;

/// Bytes written between two size checks of the log file.
const SIZE_CHECK_INTERVAL: u64 = 1024;

/// Path of archive `n` of `base`: `base` itself for 0, `base.n` otherwise.
///
/// # Examples
///
/// ```
/// # use ring_logger::archive_path;
/// # use std::path::{Path, PathBuf};
/// assert_eq!(archive_path(Path::new("/tmp/app.log"), 0), PathBuf::from("/tmp/app.log"));
/// assert_eq!(archive_path(Path::new("/tmp/app.log"), 3), PathBuf::from("/tmp/app.log.3"));
/// ```
pub fn archive_path(base: &Path, n: u64) -> PathBuf {
    if n == 0 {
        base.to_path_buf()
    } else {
        with_suffix(base, &format!(".{}", n))
    }
}

/// Path of the control file for `base`.
pub fn control_path(base: &Path) -> PathBuf {
    with_suffix(base, ".ctl")
}

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes a record produced by the writer itself, straight to the log file,
/// tagged with the source location.
macro_rules! note {
    ($files:expr, $flags:expr, $kind:expr, $($arg:tt)*) => {
        $files.note(
            $flags,
            $kind,
            format_args!("[{}:{}] {}", module_path!(), line!(), format_args!($($arg)*)),
        )
    };
}

/// The files a writer thread owns.
///
/// Only the writer thread uses this while it runs; it lives behind the
/// writer's shared state so that the fork handler can drop the inherited log
/// handle in the child.
#[derive(Debug)]
pub(crate) struct LogFiles {
    path: PathBuf,
    ctl_path: PathBuf,
    pub max_size: u64,
    pub max_files: u64,
    log: Option<File>,
    ino: u64,
    ctl: Option<File>,
    written: u64,
    identity: ProcessIdentity,
}

impl LogFiles {
    pub fn new(config: &ResolvedConfig, identity: ProcessIdentity) -> Self {
        Self {
            path: config.path.clone(),
            ctl_path: control_path(&config.path),
            max_size: config.max_size,
            max_files: config.max_files,
            log: None,
            ino: 0,
            ctl: None,
            written: 0,
            identity,
        }
    }

    pub fn set_identity(&mut self, identity: ProcessIdentity) {
        self.identity = identity;
    }

    /// First open by a writer thread: settle the shared parameters, then get
    /// rid of archives beyond `max_files`.
    pub fn open(&mut self, flags: &WriterFlags) {
        if self.open_ctl(flags) {
            if self.open_log(false, flags) {
                self.purge(flags);
            }
            self.close_ctl();
        }
    }

    pub fn close_log(&mut self) {
        self.log = None;
    }

    /// Renders `record` into the log file.
    ///
    /// Failed writes only bump the error counter. With file output switched
    /// off the line is dropped but still counts toward the size check.
    pub fn write_record(&mut self, record: &Record, flags: &WriterFlags) {
        let line = record.render_line(&self.identity.app_name, self.identity.pid);
        if flags.write_to_file.load(Ordering::Relaxed) {
            if let Some(log) = self.log.as_mut() {
                if log.write_all(line.as_bytes()).is_err() {
                    flags.write_errors.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
        self.written += line.len() as u64;
    }

    /// Size-triggered rotation, checked before every file write.
    pub fn maybe_rotate(&mut self, flags: &WriterFlags) {
        if self.max_files <= 1 || self.max_size == 0 || self.written < SIZE_CHECK_INTERVAL {
            return;
        }
        self.written = 0;

        let size = match self.log.as_ref().map(File::metadata) {
            Some(Ok(meta)) => meta.len(),
            _ => return,
        };
        if size < self.max_size {
            return;
        }

        // A peer already rotated; follow it to the new file
        if self.path_replaced() {
            self.open_log(true, flags);
            return;
        }

        if !self.open_ctl(flags) {
            return;
        }
        // Check again now that no one else can be rotating
        if self.path_replaced() {
            self.open_log(true, flags);
        } else {
            note!(self, flags, Kind::Internal, "Rotating log files");
            self.rotate(flags);
        }
        self.close_ctl();
    }

    /// Rotation on request. Two requests rotate twice.
    pub fn force_rotate(&mut self, flags: &WriterFlags) {
        if self.max_files <= 1 {
            tracing::debug!(path = %self.path.display(), "rotation prohibited");
            return;
        }
        if !self.open_ctl(flags) {
            return;
        }
        note!(self, flags, Kind::Internal, "Rotating log files (forced)");
        self.rotate(flags);
        self.close_ctl();
    }

    /// Shifts the archive chain by one and starts a fresh `path`. Must hold
    /// the control file lock.
    fn rotate(&mut self, flags: &WriterFlags) {
        let mut dst = archive_path(&self.path, self.max_files - 1);
        match fs::remove_file(&dst) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                note!(self, flags, Kind::Warning, "remove({}) failed: {}, rotate halted", dst.display(), e);
                return;
            }
        }
        for n in (0..self.max_files - 1).rev() {
            let src = archive_path(&self.path, n);
            match fs::rename(&src, &dst) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    note!(
                        self,
                        flags,
                        Kind::Warning,
                        "rename({},{}) failed: {}, rotate halted",
                        src.display(),
                        dst.display(),
                        e
                    );
                    return;
                }
            }
            dst = src;
        }
        self.open_log(true, flags);
        flags.rotations.fetch_add(1, Ordering::Relaxed);
    }

    /// Removes `path.max_files`, `path.max_files+1`, ... until one is missing.
    fn purge(&mut self, flags: &WriterFlags) {
        if self.max_files <= 1 {
            return;
        }
        for n in self.max_files.. {
            let stale = archive_path(&self.path, n);
            if fs::remove_file(&stale).is_err() {
                break;
            }
            note!(self, flags, Kind::Internal, "Purged log file {}", stale.display());
        }
    }

    /// True if `path` now names a different file than the one we hold.
    /// A failed stat is not trusted either way.
    fn path_replaced(&self) -> bool {
        match fs::metadata(&self.path) {
            Ok(meta) => meta.ino() != self.ino,
            Err(_) => false,
        }
    }

    /// Opens and exclusively locks the control file, blocking until the lock
    /// is granted.
    fn open_ctl(&mut self, flags: &WriterFlags) -> bool {
        let result = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .mode(0o666)
            .open(&self.ctl_path)
            .and_then(|ctl| {
                lock(&ctl, libc::F_WRLCK, true)?;
                Ok(ctl)
            });
        match result {
            Ok(ctl) => {
                self.ctl = Some(ctl);
                true
            }
            Err(e) => {
                tracing::warn!(path = %self.ctl_path.display(), error = %e, "cannot lock control file");
                flags.record_error(&e);
                false
            }
        }
    }

    fn close_ctl(&mut self) {
        self.ctl = None;
    }

    /// (Re)opens `path` for appending.
    ///
    /// Unless `rotating`, this also runs the election: returns true if this
    /// process was the first to open the file and wrote the shared rotation
    /// parameters.
    fn open_log(&mut self, rotating: bool, flags: &WriterFlags) -> bool {
        self.close_log();
        let opened = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .mode(0o666)
            .open(&self.path)
            .and_then(|log| {
                let ino = log.metadata()?.ino();
                Ok((log, ino))
            });
        let log = match opened {
            Ok((log, ino)) => {
                self.ino = ino;
                log
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot open log file");
                flags.record_error(&e);
                flags.file_open.store(false, Ordering::Release);
                return false;
            }
        };

        let mut first = false;
        let mut shared = Ok(());
        if !rotating {
            // Only the first process gets the exclusive lock; it publishes
            // its parameters before downgrading to shared like everyone else
            if lock(&log, libc::F_WRLCK, false).is_ok() {
                first = self.write_params().is_ok();
            }
            shared = lock(&log, libc::F_RDLCK, true);
        }
        self.log = Some(log);
        flags.file_open.store(true, Ordering::Release);
        if rotating {
            return false;
        }

        tracing::debug!(path = %self.path.display(), first, "log file opened");
        match shared {
            Ok(()) => self.adopt_params(flags),
            Err(e) => {
                note!(self, flags, Kind::Warning, "Control file shared lock failed: {}", e);
                self.note_params(flags);
            }
        }
        first
    }

    fn write_params(&mut self) -> io::Result<()> {
        let ctl = self.ctl.as_mut().ok_or(io::ErrorKind::NotConnected)?;
        ctl.set_len(0)?;
        ctl.seek(SeekFrom::Start(0))?;
        writeln!(ctl, "{},{}", self.max_size, self.max_files)?;
        ctl.flush()
    }

    /// Takes over the parameters published in the control file.
    fn adopt_params(&mut self, flags: &WriterFlags) {
        let Some(ctl) = self.ctl.as_mut() else {
            note!(self, flags, Kind::Warning, "Control file is not open");
            self.note_params(flags);
            return;
        };
        let mut content = String::new();
        let parsed = ctl
            .seek(SeekFrom::Start(0))
            .and_then(|_| ctl.read_to_string(&mut content))
            .ok()
            .and_then(|_| parse_params(&content));
        match parsed {
            Some((max_size, max_files)) => {
                if (max_size, max_files) != (self.max_size, self.max_files) {
                    note!(
                        self,
                        flags,
                        Kind::Internal,
                        "Use max_size={}, max_files={}",
                        max_size,
                        max_files
                    );
                }
                self.max_size = max_size;
                self.max_files = max_files;
            }
            None => {
                note!(self, flags, Kind::Warning, "Control file is corrupt");
                self.note_params(flags);
            }
        }
    }

    fn note_params(&mut self, flags: &WriterFlags) {
        let (max_size, max_files) = (self.max_size, self.max_files);
        note!(self, flags, Kind::Warning, "Use max_size={}, max_files={}", max_size, max_files);
    }

    /// Formats a record for the writer's own messages and writes it directly
    /// to the file, mirroring it to `tracing`.
    fn note(&mut self, flags: &WriterFlags, kind: Kind, args: fmt::Arguments<'_>) {
        let record = Record::format_args(kind, current_tid(), args);
        match kind {
            Kind::Warning => tracing::warn!("{}", record.text()),
            _ => tracing::debug!("{}", record.text()),
        }
        self.write_record(&record, flags);
    }
}

/// Parses the control file content `max_size,max_files\n`.
fn parse_params(content: &str) -> Option<(u64, u64)> {
    let line = content.lines().next()?;
    let (size, files) = line.split_once(',')?;
    let size = size.trim().parse().ok()?;
    let files: u64 = files.trim().parse().ok()?;
    (files > 0).then_some((size, files))
}

/// Sets a whole-file POSIX record lock of `kind` (`F_RDLCK` or `F_WRLCK`).
fn lock(file: &File, kind: libc::c_int, wait: bool) -> io::Result<()> {
    // SAFETY: flock is a plain C struct; all-zero is a valid value.
    let mut lk: libc::flock = unsafe { std::mem::zeroed() };
    lk.l_type = kind as libc::c_short;
    lk.l_whence = libc::SEEK_SET as libc::c_short;
    lk.l_start = 0;
    lk.l_len = 0;
    let cmd = if wait { libc::F_SETLKW } else { libc::F_SETLK };
    loop {
        // SAFETY: the descriptor is owned by `file` and `lk` outlives the call.
        if unsafe { libc::fcntl(file.as_raw_fd(), cmd, &lk) } != -1 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogConfig;
    use crate::log_reader::LogReader;
    use tempfile::tempdir;

    fn files_for(path: &Path, max_size: i64, max_files: i64) -> LogFiles {
        let config = LogConfig::new()
            .path(path)
            .max_size(max_size)
            .max_files(max_files)
            .resolve_with(|_| None);
        LogFiles::new(&config, ProcessIdentity::current())
    }

    fn texts(path: &Path, kind: Kind) -> Vec<String> {
        let data = fs::read_to_string(path).unwrap_or_default();
        LogReader::new(&data)
            .filter_map(Result::ok)
            .filter(|line| line.kind == kind)
            .map(|line| line.text.to_string())
            .collect()
    }

    #[test]
    fn test_archive_paths() {
        let base = Path::new("/var/log/x.log");
        assert_eq!(archive_path(base, 0), base);
        assert_eq!(archive_path(base, 12), PathBuf::from("/var/log/x.log.12"));
        assert_eq!(control_path(base), PathBuf::from("/var/log/x.log.ctl"));
    }

    #[test]
    fn test_parse_params() {
        assert_eq!(parse_params("1024,5\n"), Some((1024, 5)));
        assert_eq!(parse_params("1024,0\n"), None);
        assert_eq!(parse_params("garbage"), None);
        assert_eq!(parse_params(""), None);
    }

    #[test]
    fn test_open_writes_control_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.log");
        let flags = WriterFlags::new();
        let mut files = files_for(&path, 2048, 3);
        files.open(&flags);
        assert!(flags.file_open.load(Ordering::Acquire));
        assert!(files.ctl.is_none());
        let ctl = fs::read_to_string(control_path(&path)).unwrap();
        assert_eq!(ctl, "2048,3\n");
    }

    #[test]
    fn test_open_failure_records_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("a.log");
        let flags = WriterFlags::new();
        let mut files = files_for(&path, 0, 0);
        files.open(&flags);
        assert!(!flags.file_open.load(Ordering::Acquire));
        assert_eq!(flags.errcode.load(Ordering::Acquire), libc::ENOENT);
    }

    #[test]
    fn test_forced_rotation_chain() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("r.log");
        let flags = WriterFlags::new();
        let mut files = files_for(&path, 0, 3);
        files.open(&flags);
        for pass in 0..4 {
            let record = Record::format(Kind::Message, 1, &format!("pass {}", pass));
            files.write_record(&record, &flags);
            files.force_rotate(&flags);
        }
        assert_eq!(flags.rotations.load(Ordering::Relaxed), 4);
        assert!(texts(&path, Kind::Message).is_empty());
        assert_eq!(texts(&archive_path(&path, 1), Kind::Message), ["pass 3"]);
        assert_eq!(texts(&archive_path(&path, 2), Kind::Message), ["pass 2"]);
        assert!(!archive_path(&path, 3).exists());
        let internal = texts(&archive_path(&path, 1), Kind::Internal);
        assert!(internal.iter().any(|t| t.ends_with("Rotating log files (forced)")));
    }

    #[test]
    fn test_single_file_never_rotates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("one.log");
        let flags = WriterFlags::new();
        let mut files = files_for(&path, -1, -1);
        files.open(&flags);
        files.force_rotate(&flags);
        assert_eq!(flags.rotations.load(Ordering::Relaxed), 0);
        assert!(!archive_path(&path, 1).exists());
    }

    #[test]
    fn test_size_rotation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("s.log");
        let flags = WriterFlags::new();
        let mut files = files_for(&path, 4096, 4);
        files.open(&flags);
        let text = "x".repeat(200);
        for i in 0..100 {
            files.maybe_rotate(&flags);
            files.write_record(&Record::format(Kind::Message, i, &text), &flags);
        }
        assert!(flags.rotations.load(Ordering::Relaxed) >= 1);
        assert!(archive_path(&path, 1).exists());
        assert!(!archive_path(&path, 4).exists());
        // Size check runs every 1 KiB, so a file overshoots by less than that
        // plus one line
        let limit = 4096 + SIZE_CHECK_INTERVAL + 512;
        assert!(fs::metadata(archive_path(&path, 1)).unwrap().len() <= limit);
    }

    #[test]
    fn test_follows_peer_rotation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("p.log");
        let flags = WriterFlags::new();
        let mut files = files_for(&path, 1024, 5);
        files.open(&flags);
        let text = "y".repeat(600);
        files.write_record(&Record::format(Kind::Message, 1, &text), &flags);
        files.write_record(&Record::format(Kind::Message, 2, &text), &flags);
        // Someone else moves the file away
        fs::rename(&path, archive_path(&path, 1)).unwrap();
        fs::write(&path, b"").unwrap();
        files.maybe_rotate(&flags);
        assert_eq!(flags.rotations.load(Ordering::Relaxed), 0);
        files.write_record(&Record::format(Kind::Message, 3, "after"), &flags);
        assert_eq!(texts(&path, Kind::Message), ["after"]);
    }

    #[test]
    fn test_purge_on_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("g.log");
        for n in 1..=6 {
            fs::write(archive_path(&path, n), b"old\n").unwrap();
        }
        let flags = WriterFlags::new();
        let mut files = files_for(&path, 0, 3);
        files.open(&flags);
        assert!(archive_path(&path, 2).exists());
        for n in 3..=6 {
            assert!(!archive_path(&path, n).exists(), "archive {} left behind", n);
        }
        let internal = texts(&path, Kind::Internal);
        assert_eq!(internal.iter().filter(|t| t.contains("Purged log file")).count(), 4);
    }

    #[test]
    fn test_stale_control_file_replaced_by_first_opener() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c.log");
        fs::write(control_path(&path), b"not numbers\n").unwrap();
        let flags = WriterFlags::new();
        let mut files = files_for(&path, 8192, 2);
        files.open(&flags);
        assert_eq!(fs::read_to_string(control_path(&path)).unwrap(), "8192,2\n");
        assert_eq!((files.max_size, files.max_files), (8192, 2));
        assert!(texts(&path, Kind::Warning).is_empty());
    }

    #[test]
    fn test_write_to_file_disabled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("w.log");
        let flags = WriterFlags::new();
        flags.write_to_file.store(false, Ordering::Relaxed);
        let mut files = files_for(&path, 0, 0);
        files.open(&flags);
        files.write_record(&Record::format(Kind::Message, 1, "hidden"), &flags);
        assert!(texts(&path, Kind::Message).is_empty());
        assert!(files.written > 0);
    }
}
