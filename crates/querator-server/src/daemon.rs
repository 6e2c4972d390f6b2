//! HTTP daemon serving the Querator route table.
//!
//! The daemon is a protocol shell: it accepts protobuf POSTs on every
//! [`Operation`] route and hands the raw body to a [`Backend`]. Queue
//! semantics live behind that trait.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;
use prost::Message;
use querator_client::wire::codes;
use querator_client::{Operation, Reply, CONTENT_TYPE_PROTOBUF, MSG_SERVICE_IN_SHUTDOWN};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServiceError;
use crate::lifecycle::{Service, ServiceFactory};
use crate::logging;

/// Handles decoded route dispatch for the daemon.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Handle one request body for `operation`.
    ///
    /// `Ok` bodies are returned with status 200. An `Err` reply is encoded
    /// and returned with its code as the HTTP status.
    async fn handle(&self, operation: Operation, body: Bytes) -> Result<Bytes, Reply>;
}

/// Backend that answers every operation with code 501.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedBackend;

#[async_trait]
impl Backend for UnimplementedBackend {
    async fn handle(&self, operation: Operation, _body: Bytes) -> Result<Bytes, Reply> {
        Err(Reply::error(
            codes::NOT_IMPLEMENTED,
            format!("'{}' is not implemented by this server", operation),
        ))
    }
}

#[derive(Clone)]
struct DaemonState {
    backend: Arc<dyn Backend>,
    shutting_down: CancellationToken,
}

fn router(state: DaemonState, max_body_bytes: usize) -> Router {
    let mut router: Router<DaemonState> = Router::new();
    for operation in Operation::ALL {
        router = router.route(operation.route(), post(route_request));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_body_bytes))
                .into_inner(),
        )
        .with_state(state)
}

async fn route_request(
    State(state): State<DaemonState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match Operation::from_route(uri.path()) {
        Some(operation) => dispatch(state, operation, headers, body).await,
        None => reply_response(Reply::error(
            codes::NOT_FOUND,
            format!("no operation is served at '{}'", uri.path()),
        )),
    }
}

async fn dispatch(
    state: DaemonState,
    operation: Operation,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if state.shutting_down.is_cancelled() {
        return reply_response(Reply::error(codes::RETRY_REQUEST, MSG_SERVICE_IN_SHUTDOWN));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with(CONTENT_TYPE_PROTOBUF) {
        debug!(operation = %operation, content_type, "Rejected non-protobuf request");
        return reply_response(Reply::error(
            codes::BAD_REQUEST,
            format!(
                "Content-Type header must be '{}', got '{}'",
                CONTENT_TYPE_PROTOBUF, content_type
            ),
        ));
    }

    match state.backend.handle(operation, body).await {
        Ok(payload) => protobuf_response(StatusCode::OK, payload),
        Err(reply) => {
            debug!(
                operation = %operation,
                code = reply.code,
                message = %reply.message,
                "Request rejected"
            );
            reply_response(reply)
        }
    }
}

fn reply_response(reply: Reply) -> Response {
    let status = if (400..=599).contains(&reply.code) {
        StatusCode::from_u16(reply.code as u16).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    protobuf_response(status, Bytes::from(reply.encode_to_vec()))
}

fn protobuf_response(status: StatusCode, payload: Bytes) -> Response {
    (status, [(header::CONTENT_TYPE, CONTENT_TYPE_PROTOBUF)], payload).into_response()
}

/// A bound, serving HTTP daemon.
pub struct Daemon {
    local_addr: SocketAddr,
    shutdown: CancellationToken,
    serve_task: Mutex<Option<JoinHandle<std::io::Result<()>>>>,
    shutdown_timeout: Duration,
}

impl Daemon {
    /// Bind `config.address` and start serving.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Bind`] if the address cannot be bound.
    pub async fn start(
        config: &ServerConfig,
        backend: Arc<dyn Backend>,
    ) -> Result<Self, ServiceError> {
        let listener = tokio::net::TcpListener::bind(config.address.as_str())
            .await
            .map_err(|source| ServiceError::Bind {
                address: config.address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr().map_err(|source| ServiceError::Bind {
            address: config.address.clone(),
            source,
        })?;

        let shutdown = CancellationToken::new();
        let app = router(
            DaemonState {
                backend,
                shutting_down: shutdown.clone(),
            },
            config.max_body_bytes,
        );

        let signal = shutdown.clone();
        let serve_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await })
                .await
        });

        info!(address = %local_addr, "Listening");

        Ok(Self {
            local_addr,
            shutdown,
            serve_task: Mutex::new(Some(serve_task)),
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_seconds),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL clients use to reach this daemon.
    pub fn endpoint(&self) -> String {
        format!("http://{}", self.local_addr)
    }
}

#[async_trait]
impl Service for Daemon {
    async fn shutdown(&self, ctx: CancellationToken) -> Result<(), ServiceError> {
        self.shutdown.cancel();

        let task = {
            let mut guard = match self.serve_task.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };
        let Some(mut task) = task else {
            return Ok(());
        };

        info!(
            timeout_seconds = self.shutdown_timeout.as_secs(),
            "Waiting for in-flight requests"
        );

        tokio::select! {
            joined = &mut task => match joined {
                Ok(Ok(())) => {
                    info!("HTTP server shutdown complete");
                    Ok(())
                }
                Ok(Err(e)) => Err(ServiceError::Failed { message: e.to_string() }),
                Err(e) => Err(ServiceError::Failed { message: e.to_string() }),
            },
            _ = tokio::time::sleep(self.shutdown_timeout) => {
                warn!("Shutdown timed out; aborting open connections");
                task.abort();
                Err(ServiceError::ShutdownTimeout { seconds: self.shutdown_timeout.as_secs() })
            }
            _ = ctx.cancelled() => {
                warn!("Shutdown interrupted; aborting open connections");
                task.abort();
                Err(ServiceError::Interrupted)
            }
        }
    }
}

/// Builds a [`Daemon`] around a backend.
pub struct DaemonFactory {
    backend: Arc<dyn Backend>,
    init_logging: bool,
}

impl DaemonFactory {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            init_logging: false,
        }
    }

    /// Install the global tracing subscriber when building.
    pub fn with_logging(mut self) -> Self {
        self.init_logging = true;
        self
    }
}

#[async_trait]
impl ServiceFactory for DaemonFactory {
    type Service = Daemon;

    async fn build(&self, config: ServerConfig) -> Result<Daemon, ServiceError> {
        if self.init_logging {
            logging::init(&config);
        }

        info!(
            "Querator {} ({}/{})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::ARCH,
            std::env::consts::OS
        );

        Daemon::start(&config, self.backend.clone()).await
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
