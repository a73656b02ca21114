use crate::config::LoggingConfig;
use std::sync::OnceLock;

static INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install the global tracing subscriber. Call once during startup; later
/// calls are no-ops.
pub fn init(logging: &LoggingConfig) {
    INITIALIZED.get_or_init(|| {
        let filter = tracing_subscriber::EnvFilter::try_new(&logging.level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let result = if logging.format == "json" {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .with_writer(std::io::stderr)
                .try_init()
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
        };
        if let Err(err) = result {
            eprintln!("termwire: logging already configured: {err}");
        }
    });
}
