//! Tracing setup for the binary.

use tracing_subscriber::EnvFilter;

/// Filter directive for a configured level and the `--verbose` flag.
pub fn directive(configured: &str, verbose: bool) -> String {
    if verbose {
        "debug".to_string()
    } else if configured.trim().is_empty() {
        "warn".to_string()
    } else {
        configured.trim().to_string()
    }
}

/// Install a stderr subscriber; `RUST_LOG` wins over the configured level.
pub fn init(configured: &str, verbose: bool) {
    let fallback = directive(configured, verbose);
    let filter = if verbose {
        EnvFilter::new(fallback)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
    };

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive() {
        assert_eq!(directive("info", false), "info");
        assert_eq!(directive("info", true), "debug");
        assert_eq!(directive("  ", false), "warn");
        assert_eq!(directive("pactum_extractor=debug", false), "pactum_extractor=debug");
    }
}
