//! The dispatch client.
//!
//! Every remote capability goes through [`Client::invoke`]: encode the
//! request, POST it to the operation's route, decode the typed response or
//! the error reply. The named methods only choose the route and the message
//! types.

use std::sync::Arc;

use bytes::Bytes;
use prost::Message;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::config::{ClientConfig, PoolLimits};
use crate::context::{CallContext, Interrupted};
use crate::error::{ClientError, TransportErrorKind};
use crate::pagination::ListOptions;
use crate::routes::Operation;
use crate::wire::{
    QueueClearRequest, QueueCompleteRequest, QueueInfo, QueueLeaseRequest, QueueLeaseResponse,
    QueueProduceRequest, QueueRetryRequest, QueueStatsRequest, QueueStatsResponse,
    QueuesDeleteRequest, QueuesInfoRequest, QueuesListRequest, QueuesListResponse, Reply,
    StorageItemsDeleteRequest, StorageItemsImportRequest, StorageItemsImportResponse,
    StorageItemsListRequest, StorageItemsListResponse, CONTENT_TYPE_PROTOBUF,
};

/// Client for the Querator service.
///
/// Cheap to clone; clones share the connection pool. Safe for concurrent use
/// from many tasks. Calls beyond the configured connection limit wait for a
/// free slot instead of failing.
///
/// # Examples
///
/// ```no_run
/// # use querator_client::{CallContext, Client, ClientConfig, wire::QueueInfo};
/// # async fn example() -> Result<(), querator_client::ClientError> {
/// let client = Client::new(ClientConfig::with_no_tls("localhost:2319"))?;
///
/// client
///     .queues_create(
///         &CallContext::background(),
///         &QueueInfo {
///             queue_name: "orders".to_string(),
///             lease_timeout: "1m".to_string(),
///             expire_timeout: "24h".to_string(),
///             requested_partitions: 1,
///             ..Default::default()
///         },
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    http_client: reqwest::Client,
    endpoint: Arc<str>,
    limits: PoolLimits,
    connection_slots: Arc<Semaphore>,
}

impl Client {
    /// Create a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the endpoint is empty or
    /// malformed, or the HTTP client cannot be built from the TLS material.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let endpoint = config.normalized_endpoint()?;
        let http_client = config.build_http_client()?;
        let limits = config.transport.limits();

        debug!(
            endpoint = %endpoint,
            max_connections = limits.max_connections,
            max_idle_per_host = limits.max_idle_per_host,
            "Created Querator client"
        );

        // usize::MAX and other oversized limits mean "unbounded".
        let slots = limits.max_connections.clamp(1, Semaphore::MAX_PERMITS);

        Ok(Self {
            http_client,
            endpoint: Arc::from(endpoint),
            connection_slots: Arc::new(Semaphore::new(slots)),
            limits,
        })
    }

    /// Endpoint every route is appended to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Pool limits in effect for this client.
    pub fn limits(&self) -> PoolLimits {
        self.limits
    }

    /// Call `operation` with `request` and decode the response as `Res`.
    ///
    /// This is the single transport path of the client. Operations whose
    /// response carries no payload decode a [`Reply`] and discard it.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Serialization`] / [`ClientError::RequestConstruction`]
    ///   before anything is sent
    /// - [`ClientError::Transport`] for network failures, cancellation and
    ///   deadline expiry
    /// - [`ClientError::Remote`] for a non-2xx response
    /// - [`ClientError::Decode`] for a 2xx body that is not a `Res`
    pub async fn invoke<Req, Res>(
        &self,
        ctx: &CallContext,
        operation: Operation,
        request: &Req,
    ) -> Result<Res, ClientError>
    where
        Req: Message,
        Res: Message + Default,
    {
        let mut payload = Vec::with_capacity(request.encoded_len());
        request
            .encode(&mut payload)
            .map_err(|source| ClientError::Serialization { operation, source })?;

        let url = format!("{}{}", self.endpoint, operation.route());
        let http_request = self
            .http_client
            .post(&url)
            .header(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_PROTOBUF))
            .body(payload)
            .build()
            .map_err(|e| ClientError::RequestConstruction {
                operation,
                message: e.to_string(),
            })?;

        debug!(
            operation = %operation,
            route = operation.route(),
            "Dispatching request"
        );

        let exchange = async {
            let _slot = self.connection_slots.acquire().await.map_err(|_| {
                ClientError::transport(
                    operation,
                    TransportErrorKind::Other,
                    "connection pool is closed",
                )
            })?;

            let response = self
                .http_client
                .execute(http_request)
                .await
                .map_err(|e| ClientError::from_reqwest(operation, e))?;

            let status = response.status();
            let is_protobuf = has_protobuf_content_type(&response);
            let body = response
                .bytes()
                .await
                .map_err(|e| ClientError::from_reqwest(operation, e))?;

            Ok::<_, ClientError>((status, is_protobuf, body))
        };

        let (status, is_protobuf, body) = match ctx.guard(exchange).await {
            Ok(outcome) => outcome?,
            Err(Interrupted::Cancelled) => {
                debug!(operation = %operation, "Call cancelled by caller");
                return Err(ClientError::transport(
                    operation,
                    TransportErrorKind::Cancelled,
                    "context cancelled",
                ));
            }
            Err(Interrupted::DeadlineExceeded) => {
                debug!(operation = %operation, "Call deadline exceeded");
                return Err(ClientError::transport(
                    operation,
                    TransportErrorKind::DeadlineExceeded,
                    "context deadline exceeded",
                ));
            }
        };

        if status.is_success() {
            return Res::decode(body).map_err(|source| ClientError::Decode { operation, source });
        }

        let err = decode_error_reply(operation, status, is_protobuf, body);
        warn!(
            operation = %operation,
            status = status.as_u16(),
            error = %err,
            "Request failed"
        );
        Err(err)
    }

    // ========================================================================
    // Queue operations
    // ========================================================================

    /// Produce items onto a queue.
    pub async fn queue_produce(
        &self,
        ctx: &CallContext,
        request: &QueueProduceRequest,
    ) -> Result<(), ClientError> {
        self.invoke::<_, Reply>(ctx, Operation::QueueProduce, request)
            .await
            .map(drop)
    }

    /// Lease a batch of items from a queue.
    pub async fn queue_lease(
        &self,
        ctx: &CallContext,
        request: &QueueLeaseRequest,
    ) -> Result<QueueLeaseResponse, ClientError> {
        self.invoke(ctx, Operation::QueueLease, request).await
    }

    /// Mark leased items as complete.
    pub async fn queue_complete(
        &self,
        ctx: &CallContext,
        request: &QueueCompleteRequest,
    ) -> Result<(), ClientError> {
        self.invoke::<_, Reply>(ctx, Operation::QueueComplete, request)
            .await
            .map(drop)
    }

    /// Return leased items to the queue or send them to the dead letter queue.
    pub async fn queue_retry(
        &self,
        ctx: &CallContext,
        request: &QueueRetryRequest,
    ) -> Result<(), ClientError> {
        self.invoke::<_, Reply>(ctx, Operation::QueueRetry, request)
            .await
            .map(drop)
    }

    /// Remove items from a queue.
    pub async fn queue_clear(
        &self,
        ctx: &CallContext,
        request: &QueueClearRequest,
    ) -> Result<(), ClientError> {
        self.invoke::<_, Reply>(ctx, Operation::QueueClear, request)
            .await
            .map(drop)
    }

    pub async fn queue_stats(
        &self,
        ctx: &CallContext,
        request: &QueueStatsRequest,
    ) -> Result<QueueStatsResponse, ClientError> {
        self.invoke(ctx, Operation::QueueStats, request).await
    }

    // ========================================================================
    // Queue administration
    // ========================================================================

    pub async fn queues_create(
        &self,
        ctx: &CallContext,
        info: &QueueInfo,
    ) -> Result<(), ClientError> {
        self.invoke::<_, Reply>(ctx, Operation::QueuesCreate, info)
            .await
            .map(drop)
    }

    /// List queues, starting at the options' pivot.
    pub async fn queues_list(
        &self,
        ctx: &CallContext,
        options: Option<&ListOptions>,
    ) -> Result<QueuesListResponse, ClientError> {
        let (pivot, limit) = ListOptions::wire_fields(options);
        let request = QueuesListRequest { pivot, limit };
        self.invoke(ctx, Operation::QueuesList, &request).await
    }

    pub async fn queues_update(
        &self,
        ctx: &CallContext,
        info: &QueueInfo,
    ) -> Result<(), ClientError> {
        self.invoke::<_, Reply>(ctx, Operation::QueuesUpdate, info)
            .await
            .map(drop)
    }

    pub async fn queues_delete(
        &self,
        ctx: &CallContext,
        request: &QueuesDeleteRequest,
    ) -> Result<(), ClientError> {
        self.invoke::<_, Reply>(ctx, Operation::QueuesDelete, request)
            .await
            .map(drop)
    }

    pub async fn queues_info(
        &self,
        ctx: &CallContext,
        request: &QueuesInfoRequest,
    ) -> Result<QueueInfo, ClientError> {
        self.invoke(ctx, Operation::QueuesInfo, request).await
    }

    // ========================================================================
    // Storage administration
    // ========================================================================

    /// List items stored in a queue partition.
    ///
    /// If the pivot no longer exists the service returns the nearest next
    /// item. Check the first item with [`crate::begins_at_pivot`] when the
    /// difference matters; it is not an error.
    pub async fn storage_items_list(
        &self,
        ctx: &CallContext,
        queue_name: &str,
        partition: i32,
        options: Option<&ListOptions>,
    ) -> Result<StorageItemsListResponse, ClientError> {
        let request = storage_list_request(queue_name, partition, options);
        self.invoke(ctx, Operation::StorageItemsList, &request)
            .await
    }

    /// List scheduled items in a queue partition.
    ///
    /// Same pivot behaviour as [`Client::storage_items_list`].
    pub async fn storage_scheduled_list(
        &self,
        ctx: &CallContext,
        queue_name: &str,
        partition: i32,
        options: Option<&ListOptions>,
    ) -> Result<StorageItemsListResponse, ClientError> {
        let request = storage_list_request(queue_name, partition, options);
        self.invoke(ctx, Operation::StorageScheduledList, &request)
            .await
    }

    /// Write items directly into partition storage.
    pub async fn storage_items_import(
        &self,
        ctx: &CallContext,
        request: &StorageItemsImportRequest,
    ) -> Result<StorageItemsImportResponse, ClientError> {
        self.invoke(ctx, Operation::StorageItemsImport, request)
            .await
    }

    pub async fn storage_items_delete(
        &self,
        ctx: &CallContext,
        request: &StorageItemsDeleteRequest,
    ) -> Result<(), ClientError> {
        self.invoke::<_, Reply>(ctx, Operation::StorageItemsDelete, request)
            .await
            .map(drop)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("limits", &self.limits)
            .finish()
    }
}

fn storage_list_request(
    queue_name: &str,
    partition: i32,
    options: Option<&ListOptions>,
) -> StorageItemsListRequest {
    let (pivot, limit) = ListOptions::wire_fields(options);
    StorageItemsListRequest {
        queue_name: queue_name.to_string(),
        partition,
        pivot,
        limit,
    }
}

fn has_protobuf_content_type(response: &reqwest::Response) -> bool {
    match response.headers().get(CONTENT_TYPE) {
        // A missing header is accepted; some proxies strip it from error replies.
        None => true,
        Some(value) => value
            .to_str()
            .map(|v| v.trim_start().starts_with(CONTENT_TYPE_PROTOBUF))
            .unwrap_or(false),
    }
}

fn decode_error_reply(
    operation: Operation,
    status: StatusCode,
    is_protobuf: bool,
    body: Bytes,
) -> ClientError {
    if is_protobuf {
        if let Ok(reply) = Reply::decode(body.clone()) {
            if reply.code != 0 || !reply.message.is_empty() {
                return ClientError::remote(operation, status.as_u16(), reply);
            }
        }
    }
    ClientError::infrastructure(operation, status.as_u16(), &body)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
