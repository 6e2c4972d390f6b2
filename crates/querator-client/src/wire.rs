//! Wire messages exchanged with the Querator service.
//!
//! Every request and response body is a protobuf message. The structs below
//! mirror the service schema field-for-field (names and tags), so they can be
//! encoded and decoded with [`prost`] without a build-time code generation
//! step.
//!
//! [`Reply`] is the generic envelope: operations without a payload still
//! answer with it on success, and every non-2xx response carries one.

use std::collections::HashMap;

use prost_types::Timestamp;

/// Content type of every request and response body.
pub const CONTENT_TYPE_PROTOBUF: &str = "application/protobuf";

/// Status codes used in [`Reply::code`].
pub mod codes {
    pub const OK: i32 = 200;
    pub const BAD_REQUEST: i32 = 400;
    pub const UNAUTHORIZED: i32 = 401;
    pub const FORBIDDEN: i32 = 403;
    pub const NOT_FOUND: i32 = 404;
    pub const CONFLICT: i32 = 409;
    pub const TOO_MANY_REQUESTS: i32 = 429;
    /// The request was valid but could not be fulfilled.
    pub const REQUEST_FAILED: i32 = 453;
    /// The service asks the caller to try again later.
    pub const RETRY_REQUEST: i32 = 454;
    pub const INTERNAL_ERROR: i32 = 500;
    pub const NOT_IMPLEMENTED: i32 = 501;
}

/// Generic reply envelope.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Reply {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub code_text: String,
    #[prost(string, tag = "3")]
    pub message: String,
    #[prost(map = "string, string", tag = "4")]
    pub details: HashMap<String, String>,
}

impl Reply {
    /// Build an error reply with the given code and message.
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            code_text: code_text(code).to_string(),
            message: message.into(),
            details: HashMap::new(),
        }
    }
}

/// Human readable label for a reply code.
pub fn code_text(code: i32) -> &'static str {
    match code {
        codes::OK => "OK",
        codes::BAD_REQUEST => "Bad Request",
        codes::UNAUTHORIZED => "Unauthorized",
        codes::FORBIDDEN => "Forbidden",
        codes::NOT_FOUND => "Not Found",
        codes::CONFLICT => "Conflict",
        codes::TOO_MANY_REQUESTS => "Too Many Requests",
        codes::REQUEST_FAILED => "Request Failed",
        codes::RETRY_REQUEST => "Retry Request",
        codes::INTERNAL_ERROR => "Internal Server Error",
        codes::NOT_IMPLEMENTED => "Not Implemented",
        _ => "Unknown",
    }
}

// ============================================================================
// Queue operations
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueProduceRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    /// How long the server may hold the request open, as a duration string ("30s").
    #[prost(string, tag = "2")]
    pub request_timeout: String,
    #[prost(message, repeated, tag = "3")]
    pub items: Vec<QueueProduceItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueProduceItem {
    #[prost(string, tag = "1")]
    pub encoding: String,
    #[prost(string, tag = "2")]
    pub kind: String,
    #[prost(string, tag = "3")]
    pub reference: String,
    #[prost(bytes = "vec", tag = "4")]
    pub bytes: Vec<u8>,
    #[prost(string, tag = "5")]
    pub utf8: String,
    /// When set, the item is scheduled and only becomes leasable at this time.
    #[prost(message, optional, tag = "6")]
    pub enqueue_at: Option<Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueLeaseRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    #[prost(int32, tag = "2")]
    pub batch_size: i32,
    /// Identifies the consumer; a client may only hold one lease request per queue.
    #[prost(string, tag = "3")]
    pub client_id: String,
    #[prost(string, tag = "4")]
    pub request_timeout: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueLeaseResponse {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    #[prost(int32, tag = "2")]
    pub partition: i32,
    #[prost(message, repeated, tag = "3")]
    pub items: Vec<QueueLeaseItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueLeaseItem {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(string, tag = "2")]
    pub encoding: String,
    #[prost(string, tag = "3")]
    pub kind: String,
    #[prost(string, tag = "4")]
    pub reference: String,
    #[prost(bytes = "vec", tag = "5")]
    pub bytes: Vec<u8>,
    #[prost(int32, tag = "6")]
    pub attempts: i32,
    #[prost(message, optional, tag = "7")]
    pub lease_deadline: Option<Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueCompleteRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    #[prost(int32, tag = "2")]
    pub partition: i32,
    #[prost(string, tag = "3")]
    pub request_timeout: String,
    #[prost(string, repeated, tag = "4")]
    pub ids: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueRetryRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    #[prost(int32, tag = "2")]
    pub partition: i32,
    #[prost(message, repeated, tag = "3")]
    pub items: Vec<QueueRetryItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueRetryItem {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub retry_at: Option<Timestamp>,
    /// Move the item straight to the dead letter queue.
    #[prost(bool, tag = "3")]
    pub dead: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueClearRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    #[prost(bool, tag = "2")]
    pub retry: bool,
    #[prost(bool, tag = "3")]
    pub scheduled: bool,
    #[prost(bool, tag = "4")]
    pub queue: bool,
    /// Also remove items that are currently leased.
    #[prost(bool, tag = "5")]
    pub destructive: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueStatsRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueStatsResponse {
    #[prost(message, repeated, tag = "1")]
    pub logical_queues: Vec<QueueLogicalStats>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueLogicalStats {
    #[prost(int32, tag = "1")]
    pub produce_waiting: i32,
    #[prost(int32, tag = "2")]
    pub lease_waiting: i32,
    #[prost(int32, tag = "3")]
    pub complete_waiting: i32,
    #[prost(int32, tag = "4")]
    pub in_flight: i32,
    #[prost(message, repeated, tag = "5")]
    pub partitions: Vec<QueuePartitionStats>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueuePartitionStats {
    #[prost(int32, tag = "1")]
    pub partition: i32,
    #[prost(int32, tag = "2")]
    pub total: i32,
    #[prost(int32, tag = "3")]
    pub num_leased: i32,
    #[prost(string, tag = "4")]
    pub average_age: String,
    #[prost(string, tag = "5")]
    pub average_leased_age: String,
    #[prost(int32, tag = "6")]
    pub failures: i32,
}

// ============================================================================
// Queue administration
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueueInfo {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    #[prost(string, tag = "2")]
    pub dead_queue: String,
    #[prost(string, tag = "3")]
    pub reference: String,
    #[prost(string, tag = "4")]
    pub lease_timeout: String,
    #[prost(string, tag = "5")]
    pub expire_timeout: String,
    #[prost(int32, tag = "6")]
    pub max_attempts: i32,
    #[prost(int32, tag = "7")]
    pub requested_partitions: i32,
    #[prost(message, optional, tag = "8")]
    pub created_at: Option<Timestamp>,
    #[prost(message, optional, tag = "9")]
    pub updated_at: Option<Timestamp>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueuesListRequest {
    #[prost(string, tag = "1")]
    pub pivot: String,
    #[prost(int32, tag = "2")]
    pub limit: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueuesListResponse {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<QueueInfo>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueuesDeleteRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct QueuesInfoRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
}

// ============================================================================
// Storage administration
// ============================================================================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StorageItem {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(bool, tag = "2")]
    pub is_leased: bool,
    #[prost(message, optional, tag = "3")]
    pub lease_deadline: Option<Timestamp>,
    #[prost(message, optional, tag = "4")]
    pub expire_deadline: Option<Timestamp>,
    #[prost(message, optional, tag = "5")]
    pub enqueue_at: Option<Timestamp>,
    #[prost(message, optional, tag = "6")]
    pub created_at: Option<Timestamp>,
    #[prost(int32, tag = "7")]
    pub attempts: i32,
    #[prost(int32, tag = "8")]
    pub max_attempts: i32,
    #[prost(string, tag = "9")]
    pub reference: String,
    #[prost(string, tag = "10")]
    pub encoding: String,
    #[prost(string, tag = "11")]
    pub kind: String,
    #[prost(bytes = "vec", tag = "12")]
    pub payload: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StorageItemsListRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    #[prost(int32, tag = "2")]
    pub partition: i32,
    #[prost(string, tag = "3")]
    pub pivot: String,
    #[prost(int32, tag = "4")]
    pub limit: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StorageItemsListResponse {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<StorageItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StorageItemsImportRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    #[prost(int32, tag = "2")]
    pub partition: i32,
    #[prost(message, repeated, tag = "3")]
    pub items: Vec<StorageItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StorageItemsImportResponse {
    #[prost(message, repeated, tag = "1")]
    pub items: Vec<StorageItem>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StorageItemsDeleteRequest {
    #[prost(string, tag = "1")]
    pub queue_name: String,
    #[prost(int32, tag = "2")]
    pub partition: i32,
    #[prost(string, repeated, tag = "3")]
    pub ids: Vec<String>,
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
