//! Logging setup

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `fallback` (e.g. `"info"`) is used.
/// Returns `false` when a subscriber was already installed, which happens when
/// the host process or a previous plugin instance set one up first.
pub fn init_logging(fallback: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        let _ = init_logging("warn");
        // The second install always loses to the first one.
        assert!(!init_logging("warn"));
    }
}
