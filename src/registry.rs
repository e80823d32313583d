//! Process-wide registry of logging contexts and the enable gate.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Once};

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::config::{LogConfig, ENV_ENABLE};
use crate::context::{LogContext, LogHandle};
use crate::error::Result;
use crate::hooks;

/// Process-wide logging switch.
///
/// # Examples
///
/// ```
/// # use ring_logger::EnableMode;
/// assert_eq!(EnableMode::parse(Some("FULL")), EnableMode::Full);
/// assert_eq!(EnableMode::parse(Some("none")), EnableMode::None);
/// assert_eq!(EnableMode::parse(Some("verbose")), EnableMode::Default);
/// assert_eq!(EnableMode::parse(None), EnableMode::Default);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnableMode {
    /// Every call fails with [`LogError::Disabled`](crate::LogError::Disabled)
    None = 0,
    /// High-frequency kinds are dropped before formatting
    Default = 1,
    /// Everything is logged
    Full = 2,
}

impl EnableMode {
    /// Interprets a `RING_LOGGER_ENABLE` value. Unknown or missing values
    /// mean `Default`.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("none") => EnableMode::None,
            Some(v) if v.eq_ignore_ascii_case("full") => EnableMode::Full,
            _ => EnableMode::Default,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var(ENV_ENABLE).ok().as_deref())
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => EnableMode::None,
            2 => EnableMode::Full,
            _ => EnableMode::Default,
        }
    }
}

lazy_static! {
    static ref DEFAULT_CONTEXT: LogHandle = Arc::new(LogContext::new(true));
    /// Every context ever created; the default context comes first.
    pub(crate) static ref REGISTRY: Mutex<Vec<LogHandle>> =
        Mutex::new(vec![Arc::clone(&DEFAULT_CONTEXT)]);
}

static ENABLE: AtomicU8 = AtomicU8::new(EnableMode::Default as u8);
static GLOBAL_INIT: Once = Once::new();

/// One-time setup on first use: reads the enable gate from the environment
/// and installs the fork, exit and fatal signal hooks.
pub(crate) fn global_init() {
    GLOBAL_INIT.call_once(|| {
        ENABLE.store(EnableMode::from_env() as u8, Ordering::SeqCst);
        lazy_static::initialize(&REGISTRY);
        hooks::install();
    });
}

pub(crate) fn enable_mode() -> EnableMode {
    global_init();
    EnableMode::from_u8(ENABLE.load(Ordering::Acquire))
}

/// Sets the gate and returns the previous mode. Switching to `None` shuts
/// down every context.
pub(crate) fn set_enable(mode: EnableMode) -> EnableMode {
    global_init();
    let previous = EnableMode::from_u8(ENABLE.swap(mode as u8, Ordering::AcqRel));
    tracing::debug!(?previous, ?mode, "enable mode changed");
    if mode == EnableMode::None && previous != EnableMode::None {
        term_all();
    }
    previous
}

/// The context to use for `handle`, the default one if absent.
///
/// `None` while the gate is closed.
pub(crate) fn resolve(handle: Option<&LogHandle>) -> Option<&LogHandle> {
    if enable_mode() == EnableMode::None {
        return None;
    }
    Some(handle.unwrap_or(&DEFAULT_CONTEXT))
}

/// Initializes a context other than the default one. Contexts that are not
/// running are reused before a new one is created.
pub(crate) fn init_new(config: &LogConfig) -> Result<LogHandle> {
    let mut registry = REGISTRY.lock();
    let reusable = registry
        .iter()
        .skip(1)
        .find(|ctx| !ctx.is_running())
        .cloned();
    let ctx = match reusable {
        Some(ctx) => ctx,
        None => {
            let ctx = Arc::new(LogContext::new(false));
            registry.push(Arc::clone(&ctx));
            ctx
        }
    };
    ctx.init(config)?;
    Ok(ctx)
}

/// Shuts down every context regardless of reference counts.
pub(crate) fn term_all() {
    let registry = REGISTRY.lock();
    for ctx in registry.iter() {
        ctx.term(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        for mode in [EnableMode::None, EnableMode::Default, EnableMode::Full] {
            assert_eq!(EnableMode::from_u8(mode as u8), mode);
        }
        assert_eq!(EnableMode::from_u8(200), EnableMode::Default);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(EnableMode::parse(Some("NoNe")), EnableMode::None);
        assert_eq!(EnableMode::parse(Some("Full")), EnableMode::Full);
        assert_eq!(EnableMode::parse(Some("")), EnableMode::Default);
    }

    #[test]
    fn test_default_context_first() {
        global_init();
        let registry = REGISTRY.lock();
        assert!(registry[0].is_default());
        assert!(Arc::ptr_eq(&registry[0], &DEFAULT_CONTEXT));
        assert!(registry.iter().skip(1).all(|ctx| !ctx.is_default()));
    }
}
