//! Process-wide tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, LogLevel, ServerConfig};

/// Filter directives used when `RUST_LOG` is not set.
pub fn default_directives(level: LogLevel) -> String {
    let level = level.as_str();
    format!(
        "querator={level},querator_server={level},querator_client={level},tower_http=warn"
    )
}

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// if a global subscriber was already installed.
pub fn init(config: &ServerConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directives(config.log_level).into());

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .is_ok(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .is_ok(),
    }
}
