//! # Querator Client
//!
//! Dispatch client for the Querator queue service.
//!
//! Every remote capability (produce, lease, complete, retry, clear, queue and
//! storage administration, statistics) is one HTTP POST to a fixed route with
//! a protobuf body. [`Client`] owns a single pooled HTTP transport and funnels
//! every operation through one generic call path, so adding a capability only
//! needs a new [`Operation`] and its two message types.
//!
//! # Examples
//!
//! ```no_run
//! use querator_client::{CallContext, Client, ClientConfig, ErrorCategory};
//! use querator_client::wire::QueueLeaseRequest;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), querator_client::ClientError> {
//! let client = Client::new(ClientConfig::with_no_tls("localhost:2319"))?;
//! let ctx = CallContext::background().with_timeout(Duration::from_secs(10));
//!
//! let request = QueueLeaseRequest {
//!     queue_name: "orders".to_string(),
//!     batch_size: 10,
//!     client_id: "worker-1".to_string(),
//!     request_timeout: "5s".to_string(),
//! };
//!
//! match client.queue_lease(&ctx, &request).await {
//!     Ok(leased) => println!("leased {} items", leased.items.len()),
//!     Err(e) if e.category() == Some(ErrorCategory::RequestTimeout) => {
//!         println!("queue is empty");
//!     }
//!     Err(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod ids;
pub mod pagination;
pub mod routes;
pub mod wire;

pub use client::Client;
pub use config::{ClientConfig, PoolLimits, TlsConfig, TransportConfig};
pub use context::CallContext;
pub use error::{
    ClientError, ErrorCategory, TransportErrorKind, MSG_DUPLICATE_CLIENT_ID,
    MSG_QUEUE_IN_SHUTDOWN, MSG_QUEUE_OVERLOADED, MSG_REQUEST_TIMEOUT, MSG_SERVICE_IN_SHUTDOWN,
};
pub use ids::{collect_ids, HasId};
pub use pagination::{begins_at_pivot, ListOptions};
pub use routes::Operation;
pub use wire::{Reply, CONTENT_TYPE_PROTOBUF};
