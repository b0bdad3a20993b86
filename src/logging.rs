//! Logging configuration using tracing
//!
//! Structured logging to stderr. The level comes from the configuration file
//! (or `-v` on the command line) unless RUST_LOG is set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber
///
/// `level` is any EnvFilter directive (`info`, `debug`, `icinga2rt=trace,rt=debug`)
/// and is used when RUST_LOG is not set.
///
/// # Example RUST_LOG values
/// - `RUST_LOG=info` - Show info and above
/// - `RUST_LOG=icinga2rt=debug` - Debug the daemon, keep dependencies quiet
/// - `RUST_LOG=icinga2rt=debug,rt=trace` - Different levels per crate
///
/// # Errors
/// Returns an error if the directive is invalid or the subscriber has
/// already been initialized
pub fn init(level: &str) -> crate::Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| {
            crate::Icinga2RtError::Config(format!("Invalid log level '{}': {}", level, e))
        })?,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_line_number(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| crate::Icinga2RtError::Other(format!("Failed to initialize tracing: {}", e)))?;

    Ok(())
}

/// Map `-v` occurrences to a level, falling back to the configured one
pub fn level_for_verbosity(verbosity: u8, configured: &str) -> String {
    match verbosity {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init("debug");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_helper() {
        // Should never panic
        init_test();
        init_test();
    }

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0, "warn"), "warn");
        assert_eq!(level_for_verbosity(1, "warn"), "debug");
        assert_eq!(level_for_verbosity(3, "warn"), "trace");
    }

    #[test]
    fn test_logging_macros() {
        init_test();

        tracing::debug!("This is a debug message");
        tracing::info!(host = "web1", service = "http", "Testing structured logging");
    }
}
