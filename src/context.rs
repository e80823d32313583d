//! Logging contexts: ring pools, routing and writer lifecycle.
//!
//! A context owns everything needed to get records from producer threads to
//! one log file. All of its mutable state lives in [`Inner`] behind a single
//! mutex, with three condition variables:
//!
//! * `through`: the writer freed space in the write-through ring
//! * `idle`: a ring went back to the idle pool, or the writer went idle
//! * `work`: producers have something for the writer
//!
//! Functions with a `_locked` suffix expect the caller to hold the mutex and
//! may release it while they wait.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::mem;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::clock::ProcessIdentity;
use crate::config::{LogConfig, ResolvedConfig};
use crate::error::{LogError, Result};
use crate::kind::{level_to_mask, mask_to_levels, Kind};
use crate::record::{Record, MAX_TEXT_SIZE};
use crate::registry::{self, EnableMode};
use crate::ring::{Ring, RingState};
use crate::rotation::LogFiles;
use crate::writer::{self, WriterShared, WriterStats};

/// Capacity of the write-through ring.
pub const WRITE_THROUGH_SIZE: usize = 100 * MAX_TEXT_SIZE;

const CONSOLE_PATH: &str = "/dev/console";

/// Shared handle to a logging context.
pub type LogHandle = Arc<LogContext>;

/// One logging context.
///
/// Contexts are created by the registry and live for the rest of the process.
/// They can be initialized and terminated any number of times.
#[derive(Debug)]
pub struct LogContext {
    pub(crate) inner: Mutex<Inner>,
    pub(crate) through: Condvar,
    pub(crate) idle: Condvar,
    pub(crate) work: Condvar,
    is_default: bool,
}

#[derive(Debug)]
pub(crate) struct Inner {
    init_count: u32,
    pub rings: Vec<Ring>,
    pub idle_q: VecDeque<usize>,
    pub locked_q: VecDeque<usize>,
    active: Option<usize>,
    pub write_through: Option<Ring>,
    stderr_mask: u64,
    identity: ProcessIdentity,
    pub writer: Option<WriterState>,
}

/// Bookkeeping for the running writer generation.
#[derive(Debug)]
pub(crate) struct WriterState {
    pub shared: Arc<WriterShared>,
    thread: Option<JoinHandle<()>>,
    config: ResolvedConfig,
    pub sync: bool,
    pub rotate: bool,
    autoflush: bool,
}

/// Writer thread to join once the context mutex is released.
///
/// Declare it before the guard: locals drop in reverse order, so the guard
/// is released first.
#[derive(Default)]
pub(crate) struct PendingJoin(Option<JoinHandle<()>>);

impl PendingJoin {
    pub fn set(&mut self, thread: Option<JoinHandle<()>>) {
        if let Some(thread) = thread {
            self.0 = Some(thread);
        }
    }
}

impl Drop for PendingJoin {
    fn drop(&mut self) {
        if let Some(thread) = self.0.take() {
            if thread.thread().id() == thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                tracing::warn!("writer thread panicked");
            }
        }
    }
}

impl LogContext {
    pub(crate) fn new(is_default: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                init_count: 0,
                rings: Vec::new(),
                idle_q: VecDeque::new(),
                locked_q: VecDeque::new(),
                active: None,
                write_through: None,
                stderr_mask: 0,
                identity: ProcessIdentity::current(),
                writer: None,
            }),
            through: Condvar::new(),
            idle: Condvar::new(),
            work: Condvar::new(),
            is_default,
        }
    }

    /// True for the context used when callers pass no handle.
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    /// True while a writer thread is running for this context.
    pub fn is_running(&self) -> bool {
        self.inner.lock().writer.is_some()
    }

    /// Current initialization reference count.
    pub fn init_count(&self) -> u32 {
        self.inner.lock().init_count
    }

    /// Initializes the context, or bumps its reference count if it is
    /// already running.
    pub(crate) fn init(self: &Arc<Self>, config: &LogConfig) -> Result<()> {
        let mut pending = PendingJoin::default();
        let mut inner = self.inner.lock();
        self.init_locked(&mut inner, config, &mut pending)
    }

    fn init_locked(
        self: &Arc<Self>,
        inner: &mut MutexGuard<'_, Inner>,
        config: &LogConfig,
        pending: &mut PendingJoin,
    ) -> Result<()> {
        if inner.init_count > 0 {
            inner.init_count += 1;
            return Ok(());
        }
        // The gate may have closed since the caller checked it
        if registry::enable_mode() == EnableMode::None {
            return Err(LogError::Disabled);
        }
        inner.init_count = 1;

        let resolved = config.resolve();
        if let Err(e) = self.start_locked(inner, resolved) {
            pending.set(self.term_locked(inner, false));
            return Err(e);
        }

        // Wait for the writer to get through its first open
        self.sync_locked(inner);
        let failure = match inner.writer.as_ref() {
            None => Some(LogError::WriterUnavailable),
            Some(w) if !w.shared.flags.file_open.load(Ordering::Acquire) => {
                let code = match w.shared.flags.errcode.load(Ordering::Acquire) {
                    0 => libc::EIO,
                    code => code,
                };
                Some(LogError::FileSystem(io::Error::from_raw_os_error(code)))
            }
            Some(_) => None,
        };
        match failure {
            Some(e) => {
                tracing::debug!(error = %e, "context initialization failed");
                pending.set(self.term_locked(inner, false));
                Err(e)
            }
            None => Ok(()),
        }
    }

    fn start_locked(self: &Arc<Self>, inner: &mut Inner, config: ResolvedConfig) -> Result<()> {
        let mut rings = Vec::new();
        rings.try_reserve_exact(config.num_rings)?;
        for _ in 0..config.num_rings {
            rings.push(Ring::try_new(config.ring_size, RingState::Idle)?);
        }
        let write_through = Ring::try_new(WRITE_THROUGH_SIZE, RingState::WriteThrough)?;

        inner.idle_q = (0..rings.len()).collect();
        inner.locked_q.clear();
        inner.active = None;
        inner.rings = rings;
        inner.write_through = Some(write_through);
        inner.identity = ProcessIdentity::current();
        inner.stderr_mask = level_to_mask(0, config.debug_level, config.trace_level);

        tracing::debug!(
            path = %config.path.display(),
            max_size = config.max_size,
            max_files = config.max_files,
            num_rings = config.num_rings,
            ring_size = config.ring_size,
            "starting writer"
        );
        let shared = Arc::new(WriterShared::new(LogFiles::new(
            &config,
            inner.identity.clone(),
        )));
        let thread = writer::spawn(Arc::clone(self), Arc::clone(&shared)).map_err(|e| {
            tracing::warn!(error = %e, "cannot start writer thread");
            LogError::WriterUnavailable
        })?;
        inner.writer = Some(WriterState {
            shared,
            thread: Some(thread),
            config,
            sync: false,
            rotate: false,
            autoflush: false,
        });
        Ok(())
    }

    /// Drops one reference, shutting the context down when it was the last.
    /// `force` ignores the count.
    ///
    /// Returns the writer thread, which the caller must join after releasing
    /// the mutex.
    pub(crate) fn term_locked(&self, inner: &mut Inner, force: bool) -> Option<JoinHandle<()>> {
        if !force && inner.init_count > 1 {
            inner.init_count -= 1;
            return None;
        }
        inner.init_count = 0;

        let thread = inner.writer.take().and_then(|mut writer| {
            writer.shared.flags.terminate.store(true, Ordering::Release);
            writer.thread.take()
        });

        inner.rings = Vec::new();
        inner.idle_q.clear();
        inner.locked_q.clear();
        inner.active = None;
        inner.write_through = None;

        // Producers parked on a ring must notice the context is gone
        self.work.notify_all();
        self.idle.notify_all();
        self.through.notify_all();
        thread
    }

    pub(crate) fn term(&self, force: bool) {
        let mut pending = PendingJoin::default();
        let mut inner = self.inner.lock();
        self.sync_locked(&mut inner);
        pending.set(self.term_locked(&mut inner, force));
    }

    /// Waits until the writer has drained every locked ring and the
    /// write-through ring.
    pub(crate) fn sync_locked(&self, inner: &mut MutexGuard<'_, Inner>) {
        let Some(writer) = inner.writer.as_mut() else {
            return;
        };
        writer.sync = true;
        self.work.notify_all();
        while inner.writer.as_ref().is_some_and(|w| w.sync) {
            self.idle.wait(inner);
        }
    }

    pub(crate) fn sync(&self) {
        let mut inner = self.inner.lock();
        self.sync_locked(&mut inner);
    }

    /// Routes one formatted record.
    pub(crate) fn emit(self: &Arc<Self>, record: &Record) -> Result<()> {
        let kind = record.kind;
        let bytes = record.encode();

        let mut pending = PendingJoin::default();
        let mut inner = self.inner.lock();

        if inner.stderr_mask & kind.mask_bit() != 0 {
            let line = record.render_line(&inner.identity.app_name, inner.identity.pid);
            let mut stderr = io::stderr().lock();
            let _ = stderr.write_all(line.as_bytes()).and_then(|_| stderr.flush());
        }

        if kind == Kind::Console {
            console_write(&inner.identity, record);
            return Ok(());
        }

        if inner.writer.is_none() {
            self.init_locked(&mut inner, &LogConfig::default(), &mut pending)?;
        }

        let autoflush = inner.writer.as_ref().is_some_and(|w| w.autoflush);
        if autoflush || matches!(kind, Kind::Internal | Kind::Message) {
            if !self.put_write_through(&mut inner, &bytes) {
                return Err(LogError::WriterUnavailable);
            }
            return Ok(());
        }

        if matches!(kind, Kind::Critical | Kind::Warning | Kind::Fault) {
            console_write(&inner.identity, record);
            if let Some(index) = self.active_ring(&mut inner) {
                inner.rings[index].put(&bytes);
                self.lock_ring(&mut inner, index);
            }
        } else if let Some(index) = self.active_ring(&mut inner) {
            inner.rings[index].put(&bytes);
        }
        Ok(())
    }

    /// Waits for room in the write-through ring, stores `bytes` and kicks the
    /// writer. Returns false if the context shut down meanwhile.
    fn put_write_through(&self, inner: &mut MutexGuard<'_, Inner>, bytes: &[u8]) -> bool {
        loop {
            match inner.write_through.as_ref() {
                None => return false,
                Some(ring) if ring.space_remaining() > bytes.len() => break,
                Some(_) => self.through.wait(inner),
            }
        }
        if let Some(ring) = inner.write_through.as_mut() {
            ring.put(bytes);
        }
        self.work.notify_all();
        true
    }

    /// Index of the active ring, activating an idle one if needed and
    /// waiting for one to come back if all are busy.
    ///
    /// `None` when the context has no normal rings or is not running.
    fn active_ring(&self, inner: &mut MutexGuard<'_, Inner>) -> Option<usize> {
        loop {
            if inner.writer.is_none() || inner.rings.is_empty() {
                return None;
            }
            if let Some(index) = inner.active {
                return Some(index);
            }
            if let Some(index) = inner.idle_q.pop_front() {
                inner.rings[index].state = RingState::Active;
                inner.active = Some(index);
                return Some(index);
            }
            self.idle.wait(inner);
        }
    }

    /// Freezes the active ring and hands it to the writer.
    fn lock_ring(&self, inner: &mut Inner, index: usize) {
        let ring = &mut inner.rings[index];
        if ring.state == RingState::Active {
            ring.state = RingState::Locked;
            inner.locked_q.push_back(index);
            inner.active = None;
        }
        self.work.notify_all();
    }

    pub(crate) fn flush_active_ring(&self) {
        let mut inner = self.inner.lock();
        if let Some(index) = self.active_ring(&mut inner) {
            self.lock_ring(&mut inner, index);
        }
    }

    pub(crate) fn clear_active_ring(&self) {
        let mut inner = self.inner.lock();
        if let Some(index) = self.active_ring(&mut inner) {
            inner.rings[index].clear();
        }
    }

    /// Switches autoflush mode, returning the previous setting. When turning
    /// it on, the active ring is flushed if `flush` is set and cleared
    /// otherwise.
    pub(crate) fn autoflush(&self, enable: bool, flush: bool) -> bool {
        let mut inner = self.inner.lock();
        self.sync_locked(&mut inner);
        if inner.writer.is_none() {
            return false;
        }
        if enable {
            if let Some(index) = self.active_ring(&mut inner) {
                if flush {
                    self.lock_ring(&mut inner, index);
                } else {
                    inner.rings[index].clear();
                }
            }
        }
        match inner.writer.as_mut() {
            Some(writer) => mem::replace(&mut writer.autoflush, enable),
            None => false,
        }
    }

    /// Turns file output on or off, returning the previous setting.
    pub(crate) fn write_to_file(&self, enable: bool) -> bool {
        let mut inner = self.inner.lock();
        self.sync_locked(&mut inner);
        match inner.writer.as_ref() {
            Some(writer) => writer.shared.flags.write_to_file.swap(enable, Ordering::AcqRel),
            None => false,
        }
    }

    pub(crate) fn set_stderr_levels(&self, debug_level: i32, trace_level: i32) {
        let mut inner = self.inner.lock();
        self.sync_locked(&mut inner);
        inner.stderr_mask = level_to_mask(inner.stderr_mask, debug_level, trace_level);
    }

    /// Current `(debug, trace)` stderr levels, `None` if not running.
    pub(crate) fn stderr_levels(&self) -> Option<(i32, i32)> {
        let mut inner = self.inner.lock();
        self.sync_locked(&mut inner);
        inner.writer.as_ref()?;
        Some(mask_to_levels(inner.stderr_mask))
    }

    /// Asks the writer to rotate and waits until it has. Everything queued
    /// before the call lands in the file being rotated out.
    pub(crate) fn force_rotate(&self) {
        let mut inner = self.inner.lock();
        self.sync_locked(&mut inner);
        let Some(writer) = inner.writer.as_mut() else {
            return;
        };
        writer.rotate = true;
        self.work.notify_all();
        while inner.writer.as_ref().is_some_and(|w| w.rotate) {
            self.idle.wait(&mut inner);
        }
    }

    pub(crate) fn stats(&self) -> Option<WriterStats> {
        let inner = self.inner.lock();
        inner.writer.as_ref().map(|w| w.shared.flags.stats())
    }

    /// Rebuilds the writer in a freshly forked child. The caller holds the
    /// mutex, inherited locked from the parent.
    ///
    /// The parent's writer thread does not exist here. Its log file handle
    /// is closed and a new generation starts on the same rings, so anything
    /// still queued is written by the child.
    pub(crate) fn restart_after_fork(self: &Arc<Self>, inner: &mut MutexGuard<'_, Inner>) {
        let identity = ProcessIdentity::current();
        inner.identity = identity.clone();
        let Some(state) = inner.writer.as_mut() else {
            return;
        };

        // Joining or detaching a thread that only exists in the parent is
        // undefined; just forget the handle
        if let Some(stale) = state.thread.take() {
            mem::forget(stale);
        }
        if let Some(mut files) = state.shared.files.try_lock() {
            files.close_log();
        }

        let write_to_file = state.shared.flags.write_to_file.load(Ordering::Acquire);
        let shared = Arc::new(WriterShared::new(LogFiles::new(&state.config, identity)));
        shared.flags.write_to_file.store(write_to_file, Ordering::Release);
        state.shared = Arc::clone(&shared);
        state.sync = false;
        state.rotate = false;

        match writer::spawn(Arc::clone(self), shared) {
            Ok(thread) => {
                state.thread = Some(thread);
                self.sync_locked(inner);
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot restart writer thread after fork");
                self.term_locked(inner, true);
            }
        }
    }
}

/// Writes a record to the system console. Failures are ignored.
fn console_write(identity: &ProcessIdentity, record: &Record) {
    let line = record.render_line(&identity.app_name, identity.pid);
    let result = OpenOptions::new()
        .write(true)
        .open(CONSOLE_PATH)
        .and_then(|mut console| console.write_all(line.as_bytes()));
    if let Err(e) = result {
        tracing::debug!(error = %e, "console write failed");
    }
}
