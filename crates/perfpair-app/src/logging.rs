//! Run-scoped `tracing` subscriber.
//!
//! Hosts that already install a global subscriber don't need this. Otherwise
//! hold the guard for the lifetime of the run; dropping it restores the
//! previous default dispatcher.

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::EnvFilter;

/// Keeps the run's subscriber installed as the thread default.
#[must_use = "the subscriber is uninstalled when the guard is dropped"]
pub struct RunLogGuard {
    _default: DefaultGuard,
}

impl std::fmt::Debug for RunLogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLogGuard").finish_non_exhaustive()
    }
}

/// Filter from `RUST_LOG` when set, else `default_level`, else `info`.
pub fn run_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a stderr `fmt` subscriber for the current thread.
///
/// Tasks spawned by [`RunManager`](crate::RunManager) carry the dispatcher
/// that was current when the run started, so they log through it too.
pub fn init_run_logging(default_level: &str) -> RunLogGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(run_filter(default_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    RunLogGuard {
        _default: tracing::subscriber::set_default(subscriber),
    }
}
