//! Logging setup for hosts that do not install their own subscriber

use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset or invalid
const DEFAULT_LEVEL: &str = "warn";

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed, which is
/// not an error: the host's subscriber keeps receiving the gate's events.
pub fn init_logging() -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(version = apigate_core::VERSION, "Logging system initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_logging();
        assert!(!init_logging());
    }
}
