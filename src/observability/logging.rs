//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Pick pretty or JSON output from config
//!
//! # Design Decisions
//! - `RUST_LOG` overrides the configured level
//! - JSON format for production, pretty format for development

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::schema::{LogFormat, ObservabilityConfig};

/// Install the global subscriber. Returns an error if one is already set.
pub fn init_logging(
    config: &ObservabilityConfig,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("pool_warden={level},tower_http={level}", level = config.log_level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    }
}
