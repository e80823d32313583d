//! Process-level hooks: fork, fatal signals and exit.
//!
//! * Before a fork every context is drained and left locked, so the child
//!   inherits quiescent state. The parent just unlocks. The child, which has
//!   no writer threads, starts a new writer generation per running context.
//! * `SIGSEGV` and `SIGBUS` log a fault, shut every context down so queued
//!   records reach the file, then hand the signal to whatever handler was
//!   installed before us.
//! * A normal exit shuts every context down.

use std::ffi::CStr;
use std::mem;
use std::ptr;
use std::sync::OnceLock;

use crate::api;
use crate::kind::Kind;
use crate::registry::{self, REGISTRY};

const FATAL_SIGNALS: [libc::c_int; 2] = [libc::SIGSEGV, libc::SIGBUS];

static PREVIOUS_ACTIONS: [OnceLock<libc::sigaction>; 2] = [OnceLock::new(), OnceLock::new()];

pub(crate) fn install() {
    // SAFETY: the callbacks are plain functions valid for the whole process.
    let fork_rc = unsafe {
        libc::pthread_atfork(
            Some(prepare_fork),
            Some(parent_after_fork),
            Some(child_after_fork),
        )
    };
    if fork_rc != 0 {
        tracing::warn!(rc = fork_rc, "cannot install fork handlers");
    }
    // SAFETY: as above.
    if unsafe { libc::atexit(at_exit) } != 0 {
        tracing::warn!("cannot install exit handler");
    }
    for (slot, &signal) in FATAL_SIGNALS.iter().enumerate() {
        install_fatal_handler(slot, signal);
    }
}

unsafe extern "C" fn prepare_fork() {
    let registry = REGISTRY.lock();
    for ctx in registry.iter() {
        let mut inner = ctx.inner.lock();
        ctx.sync_locked(&mut inner);
        mem::forget(inner);
    }
    mem::forget(registry);
}

unsafe extern "C" fn parent_after_fork() {
    // SAFETY: prepare_fork left the registry and every context locked by
    // this thread.
    let registry = unsafe { REGISTRY.make_guard_unchecked() };
    for ctx in registry.iter().rev() {
        unsafe { ctx.inner.force_unlock() };
    }
}

unsafe extern "C" fn child_after_fork() {
    // SAFETY: the child inherits the locks prepare_fork took; the only
    // thread left is the one that owns them.
    let registry = unsafe { REGISTRY.make_guard_unchecked() };
    for ctx in registry.iter() {
        let mut inner = unsafe { ctx.inner.make_guard_unchecked() };
        ctx.restart_after_fork(&mut inner);
    }
}

extern "C" fn at_exit() {
    registry::term_all();
}

fn install_fatal_handler(slot: usize, signal: libc::c_int) {
    let handler: extern "C" fn(libc::c_int) = on_fatal_signal;
    // SAFETY: sigaction structs are plain data and fully initialized before
    // being handed to the kernel.
    unsafe {
        let mut action: libc::sigaction = mem::zeroed();
        action.sa_sigaction = handler as libc::sighandler_t;
        libc::sigemptyset(&mut action.sa_mask);
        let mut previous: libc::sigaction = mem::zeroed();
        if libc::sigaction(signal, &action, &mut previous) != 0 {
            tracing::warn!(signal, "cannot install fatal signal handler");
            return;
        }
        let _ = PREVIOUS_ACTIONS[slot].set(previous);
    }
}

extern "C" fn on_fatal_signal(signal: libc::c_int) {
    let _ = api::emit(None, Kind::Fault, format_args!("Signal {} caught", signal_name(signal)));
    registry::term_all();

    let previous = FATAL_SIGNALS
        .iter()
        .position(|&s| s == signal)
        .and_then(|slot| PREVIOUS_ACTIONS[slot].get());
    // SAFETY: restores a disposition the kernel gave us, or the default.
    unsafe {
        match previous {
            Some(action) => {
                libc::sigaction(signal, action, ptr::null_mut());
            }
            None => {
                libc::signal(signal, libc::SIG_DFL);
            }
        }
        libc::raise(signal);
    }
}

fn signal_name(signal: libc::c_int) -> String {
    // SAFETY: strsignal returns a NUL-terminated string that stays valid
    // until the next call on this thread.
    unsafe {
        let name = libc::strsignal(signal);
        if name.is_null() {
            format!("{}", signal)
        } else {
            CStr::from_ptr(name).to_string_lossy().into_owned()
        }
    }
}
