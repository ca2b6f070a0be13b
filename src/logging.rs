//! Diagnostic tracing, written to stderr and controlled by `RUST_LOG`.
//!
//! User-facing results never go through here: they are printed by the
//! command handlers (plain text or `--json`).

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Defaults to `warn` when `RUST_LOG` is unset, e.g. `RUST_LOG=quill=debug`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
