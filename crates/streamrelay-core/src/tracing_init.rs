//! Tracing/logging initialization for the `streamrelay` binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// * `default_filter` -- filter used when `RUST_LOG` is unset
///   (e.g. `"streamrelay=info,streamrelay_core=info"`).
/// * `log_json` -- emit one JSON object per line instead of the
///   human-readable format.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(default_filter: &str, log_json: bool) -> bool {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.is_ok()
}

/// Build the default filter directive for a log level such as `"debug"`.
pub fn default_filter(level: &str) -> String {
    format!("streamrelay={level},streamrelay_core={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_both_crates() {
        assert_eq!(
            default_filter("debug"),
            "streamrelay=debug,streamrelay_core=debug"
        );
    }

    #[test]
    fn second_init_reports_already_installed() {
        // Only this test installs a subscriber in this test binary.
        assert!(init_tracing("off", false));
        assert!(!init_tracing("off", true));
    }
}
