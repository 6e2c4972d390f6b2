//! Client and transport configuration.
//!
//! A [`ClientConfig`] names the service endpoint and describes the connection
//! pool. Pool limits left unset fall back to defaults sized for a
//! high-fanout client; values the caller sets are never overridden.
//!
//! # Examples
//!
//! ```
//! use querator_client::ClientConfig;
//! use std::time::Duration;
//!
//! let config = ClientConfig::with_no_tls("localhost:2319")
//!     .with_idle_timeout(Duration::from_secs(30));
//! assert_eq!(config.endpoint, "http://localhost:2319");
//! ```

use std::time::Duration;

use crate::error::ClientError;

/// Pool size applied to any limit the caller leaves unset.
pub const DEFAULT_POOL_SIZE: usize = 5_000;

/// Pool size used by [`ClientConfig::with_no_tls`] and [`ClientConfig::with_tls`].
pub const ADDRESS_POOL_SIZE: usize = 2_000;

/// Idle connection timeout applied when the caller leaves it unset.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// TLS material for connecting to an `https` endpoint.
#[derive(Clone, Default)]
pub struct TlsConfig {
    /// PEM encoded certificates trusted in addition to the system roots.
    pub root_certificates_pem: Vec<Vec<u8>>,
    /// PEM encoded client certificate chain and private key for mutual TLS.
    pub identity_pem: Option<Vec<u8>>,
    /// Skip server certificate verification. Only for local testing.
    pub danger_accept_invalid_certs: bool,
}

impl TlsConfig {
    pub fn with_root_certificate(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.root_certificates_pem.push(pem.into());
        self
    }

    pub fn with_identity(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.identity_pem = Some(pem.into());
        self
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("root_certificates", &self.root_certificates_pem.len())
            .field(
                "identity",
                &self.identity_pem.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "danger_accept_invalid_certs",
                &self.danger_accept_invalid_certs,
            )
            .finish()
    }
}

/// Connection pool settings.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Maximum number of calls in flight at once. Further callers wait for a slot.
    pub max_connections: Option<usize>,
    /// Maximum number of idle connections kept in the pool.
    pub max_idle_connections: Option<usize>,
    /// Maximum number of idle connections kept per host.
    pub max_idle_per_host: Option<usize>,
    /// How long an idle connection stays in the pool.
    pub idle_timeout: Option<Duration>,
    pub tls: Option<TlsConfig>,
}

/// [`TransportConfig`] with every default applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub max_connections: usize,
    pub max_idle_connections: usize,
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
}

impl TransportConfig {
    /// Transport with every pool limit set to `size`.
    pub fn with_pool_size(size: usize) -> Self {
        Self {
            max_connections: Some(size),
            max_idle_connections: Some(size),
            max_idle_per_host: Some(size),
            idle_timeout: Some(DEFAULT_IDLE_TIMEOUT),
            tls: None,
        }
    }

    /// Resolve the pool limits, filling only the fields left unset.
    pub fn limits(&self) -> PoolLimits {
        PoolLimits {
            max_connections: self.max_connections.unwrap_or(DEFAULT_POOL_SIZE),
            max_idle_connections: self.max_idle_connections.unwrap_or(DEFAULT_POOL_SIZE),
            max_idle_per_host: self.max_idle_per_host.unwrap_or(DEFAULT_POOL_SIZE),
            idle_timeout: self.idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT),
        }
    }
}

/// Configuration for [`crate::Client`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Caller supplied HTTP client. When set it is used as-is and the pool
    /// and TLS settings of [`TransportConfig`] only bound in-flight calls.
    pub http_client: Option<reqwest::Client>,
    /// Endpoint in the form `<scheme>://<host>:<port>`.
    pub endpoint: String,
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Configuration for `endpoint` with default pool settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Plain HTTP configuration for a bare `host:port` address.
    pub fn with_no_tls(address: &str) -> Self {
        Self {
            http_client: None,
            endpoint: format!("http://{}", address),
            transport: TransportConfig::with_pool_size(ADDRESS_POOL_SIZE),
        }
    }

    /// HTTPS configuration for a bare `host:port` address.
    pub fn with_tls(tls: TlsConfig, address: &str) -> Self {
        let mut transport = TransportConfig::with_pool_size(ADDRESS_POOL_SIZE);
        transport.tls = Some(tls);
        Self {
            http_client: None,
            endpoint: format!("https://{}", address),
            transport,
        }
    }

    /// Use a caller supplied HTTP client.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.transport.max_connections = Some(max);
        self
    }

    pub fn with_max_idle_connections(mut self, max: usize) -> Self {
        self.transport.max_idle_connections = Some(max);
        self
    }

    pub fn with_max_idle_per_host(mut self, max: usize) -> Self {
        self.transport.max_idle_per_host = Some(max);
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.transport.idle_timeout = Some(timeout);
        self
    }

    /// Validate the endpoint and return it without a trailing slash.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the endpoint is empty, is not
    /// an absolute URL, or uses a scheme other than `http`/`https`.
    pub fn normalized_endpoint(&self) -> Result<String, ClientError> {
        if self.endpoint.is_empty() {
            return Err(ClientError::Configuration {
                message: "endpoint is empty; must provide an http endpoint".to_string(),
            });
        }

        let url = url::Url::parse(&self.endpoint).map_err(|e| ClientError::Configuration {
            message: format!("endpoint '{}' is not a valid URL: {}", self.endpoint, e),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ClientError::Configuration {
                message: format!(
                    "endpoint '{}' must use the http or https scheme",
                    self.endpoint
                ),
            });
        }

        if url.host_str().is_none() {
            return Err(ClientError::Configuration {
                message: format!("endpoint '{}' has no host", self.endpoint),
            });
        }

        Ok(self.endpoint.trim_end_matches('/').to_string())
    }

    /// Build the pooled HTTP client described by this configuration.
    pub(crate) fn build_http_client(&self) -> Result<reqwest::Client, ClientError> {
        if let Some(client) = &self.http_client {
            return Ok(client.clone());
        }

        let limits = self.transport.limits();
        let mut builder = reqwest::Client::builder()
            // The pool only bounds idle connections per host; the total idle
            // ceiling is applied by taking the smaller of the two.
            .pool_max_idle_per_host(limits.max_idle_per_host.min(limits.max_idle_connections))
            .pool_idle_timeout(limits.idle_timeout);

        if let Some(tls) = &self.transport.tls {
            builder = builder.use_rustls_tls();
            for pem in &tls.root_certificates_pem {
                let certificate =
                    reqwest::Certificate::from_pem(pem).map_err(|e| ClientError::Configuration {
                        message: format!("invalid root certificate: {}", e),
                    })?;
                builder = builder.add_root_certificate(certificate);
            }
            if let Some(pem) = &tls.identity_pem {
                let identity =
                    reqwest::Identity::from_pem(pem).map_err(|e| ClientError::Configuration {
                        message: format!("invalid client identity: {}", e),
                    })?;
                builder = builder.identity(identity);
            }
            if tls.danger_accept_invalid_certs {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder.build().map_err(|e| ClientError::Configuration {
            message: format!("failed to create HTTP client: {}", e),
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
