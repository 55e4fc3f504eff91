//! Logging for the reprobox binary.
//!
//! reprobox writes two streams. Stdout carries reporter output: the
//! `<task>: <status>` lines, diagnostics and command summaries that users
//! pipe or diff. Stderr carries `tracing` events from the workflow and the
//! Docker backend. `--verbose` raises the default level from `info` to
//! `debug`, `--json` switches stderr to one JSON object per line, and
//! `RUST_LOG` overrides the level entirely.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` when set, otherwise `level`.
fn log_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

/// Install the global subscriber writing to stderr. Only the first call
/// takes effect.
pub fn init_tracing(json: bool, level: Level) {
    let json_events = json.then(|| {
        fmt::layer()
            .json()
            .with_target(false)
            .with_writer(std::io::stderr)
    });
    let text_events = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(log_filter(level))
        .with(json_events)
        .with(text_events)
        .try_init()
        .ok();
}
