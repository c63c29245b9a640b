//! Tracing initialization shared by binaries and test harnesses.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initializes structured logging with log levels configurable via the
/// `RUST_LOG` environment variable.
///
/// Falls back to `info` for the `frbr` crate when no filter is set. Safe to
/// call once per process; subsequent calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "frbr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
