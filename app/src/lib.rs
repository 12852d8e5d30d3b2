//! Registration web application secured by `registration-security-core`.

pub mod error;
pub mod handlers;
pub mod security;
pub mod settings;

use tracing_subscriber::EnvFilter;

use crate::settings::LoggingSettings;

/// Installs the global subscriber; `RUST_LOG` wins over the configured filter.
pub fn init_tracing(settings: &LoggingSettings) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
