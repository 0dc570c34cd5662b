//! Process-wide tracing setup.
//!
//! The library only emits `tracing` events. Hosts call [`init`] once at
//! startup to get them on stderr; the filter follows `RUST_LOG` and defaults
//! to `info`.

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Install the global fmt subscriber. Later calls are no-ops.
///
/// Returns `false` when another subscriber was already registered by the host.
pub fn init() -> bool {
    *INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .is_ok()
    })
}

/// Whether [`init`] installed the subscriber in this process.
pub fn is_installed() -> bool {
    INSTALLED.get().copied().unwrap_or(false)
}
