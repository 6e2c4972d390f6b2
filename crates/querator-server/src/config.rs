//! Server configuration and its layered resolution.
//!
//! Sources, applied in order (later sources override earlier ones):
//!  1. Built-in defaults (serde defaults on [`ServerConfig`])
//!  2. The YAML file named by `--config` / `QUERATOR_CONFIG`, if any
//!  3. Environment variables prefixed `QUERATOR_`
//!     e.g. `QUERATOR_LOG_LEVEL=debug` sets `log_level`
//!  4. Explicit overrides (command-line flags)
//!
//! A file that is named but cannot be read or parsed is a hard error: it is
//! deliberate-but-broken operator configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Address bound when nothing else is configured.
pub const DEFAULT_ADDRESS: &str = "localhost:2319";

/// Prefix of every configuration environment variable.
pub const ENV_PREFIX: &str = "QUERATOR";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("while reading config file '{path}': {message}")]
    File { path: PathBuf, message: String },

    #[error("while loading configuration: {message}")]
    Load { message: String },

    #[error("invalid configuration value for '{key}': {message}")]
    Invalid { key: String, message: String },
}

/// Logging verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Resolved configuration of the service process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// HTTP address to bind, `host:port`
    pub address: String,

    pub log_level: LogLevel,

    pub log_format: LogFormat,

    /// How long shutdown waits for in-flight requests
    pub shutdown_timeout_seconds: u64,

    /// Maximum accepted request body size
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            log_level: LogLevel::Info,
            log_format: LogFormat::Text,
            shutdown_timeout_seconds: 30,
            max_body_bytes: 4 * 1024 * 1024, // 4MB
        }
    }
}

impl ServerConfig {
    /// Validate resolved values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: String| ConfigError::Invalid {
            key: key.to_string(),
            message,
        };

        let (host, port) = self.address.rsplit_once(':').ok_or_else(|| {
            invalid(
                "address",
                format!("'{}' is not in the form host:port", self.address),
            )
        })?;
        if host.is_empty() {
            return Err(invalid("address", "host is empty".to_string()));
        }
        port.parse::<u16>()
            .map_err(|_| invalid("address", format!("'{}' is not a valid port", port)))?;

        if self.shutdown_timeout_seconds == 0 {
            return Err(invalid(
                "shutdown_timeout_seconds",
                "must be greater than zero".to_string(),
            ));
        }

        if self.max_body_bytes == 0 {
            return Err(invalid(
                "max_body_bytes",
                "must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Values given explicitly on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub address: Option<String>,
    pub log_level: Option<String>,
}

/// Resolves a [`ServerConfig`] from defaults, file, environment and overrides.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    file: Option<PathBuf>,
    overrides: ConfigOverrides,
    environment: Option<::config::Map<String, String>>,
}

impl LayeredConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this YAML file; it must exist and parse.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Use `vars` instead of the process environment.
    pub fn with_environment(mut self, vars: ::config::Map<String, String>) -> Self {
        self.environment = Some(vars);
        self
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Resolve and validate the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::File`] if the named file cannot be read or parsed
    /// - [`ConfigError::Invalid`] if a resolved value has the wrong type or
    ///   fails validation
    pub fn load(&self) -> Result<ServerConfig, ConfigError> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = &self.file {
            builder = builder.add_source(
                ::config::File::from(path.as_path())
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .source(self.environment.clone()),
        );

        let overrides = [
            ("address", self.overrides.address.as_deref()),
            ("log_level", self.overrides.log_level.as_deref()),
        ];
        for (key, value) in overrides {
            if let Some(value) = value {
                builder = builder
                    .set_override(key, value)
                    .map_err(|e| ConfigError::Load {
                        message: e.to_string(),
                    })?;
            }
        }

        let raw = builder.build().map_err(|e| match &self.file {
            Some(path) => ConfigError::File {
                path: path.clone(),
                message: e.to_string(),
            },
            None => ConfigError::Load {
                message: e.to_string(),
            },
        })?;

        let config: ServerConfig = raw.try_deserialize().map_err(|e| ConfigError::Invalid {
            key: "configuration".to_string(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }
}

/// Source of the configuration the lifecycle starts from.
pub trait ConfigResolver: Send + Sync {
    fn resolve(&self) -> Result<ServerConfig, ConfigError>;
}

impl ConfigResolver for LayeredConfig {
    fn resolve(&self) -> Result<ServerConfig, ConfigError> {
        self.load()
    }
}

/// A fixed configuration resolves to itself once validated.
impl ConfigResolver for ServerConfig {
    fn resolve(&self) -> Result<ServerConfig, ConfigError> {
        self.validate()?;
        Ok(self.clone())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
