//! Tracing setup for the `umls-sim` binary and embedders.
//!
//! Events go to stderr; stdout belongs to result tables. Without `RUST_LOG`
//! only this workspace's crates log at the requested level, everything else
//! (tokio, regex) stays at `warn`.

use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Targets that follow the requested level.
const WORKSPACE_TARGETS: [&str; 3] = ["umls_sim", "umls_sim_core", "umls_toolkit"];

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    std::iter::once("warn".to_string())
        .chain(WORKSPACE_TARGETS.iter().map(|t| format!("{t}={level}")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Only the first call has any effect.
///
/// With `json`, events are newline-delimited JSON and every closed span
/// (one per toolkit operation or batch) reports its busy/idle time.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

    let installed = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer.json().with_span_events(FmtSpan::CLOSE))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init()
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
