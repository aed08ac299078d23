use tracing_subscriber::EnvFilter;

/// Installs a formatted `tracing` subscriber for processes embedding the
/// retrieval core.
///
/// `RUST_LOG` wins when set, `default_level` applies otherwise. Returns an error
/// when a global subscriber is already installed.
pub fn init_logging(default_level: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        // Another test may already have installed a subscriber, so only the
        // second of two calls is guaranteed to fail.
        let _ = init_logging("debug");
        assert!(init_logging("debug").is_err());
    }
}
