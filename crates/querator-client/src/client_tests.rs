//! Tests for the dispatch client.

use super::*;
use crate::error::{
    ErrorCategory, MSG_DUPLICATE_CLIENT_ID, MSG_QUEUE_IN_SHUTDOWN, MSG_QUEUE_OVERLOADED,
    MSG_REQUEST_TIMEOUT, MSG_SERVICE_IN_SHUTDOWN,
};
use crate::wire::{codes, QueueLeaseItem, StorageItem};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

fn client_for(server: &MockServer) -> Client {
    Client::new(ClientConfig::new(server.uri())).expect("valid client config")
}

fn protobuf_response<M: Message>(status: u16, message: &M) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_raw(message.encode_to_vec(), CONTENT_TYPE_PROTOBUF)
}

async fn mount(server: &MockServer, operation: Operation, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(operation.route()))
        .and(header("content-type", CONTENT_TYPE_PROTOBUF))
        .respond_with(response)
        .expect(1)
        .mount(server)
        .await;
}

async fn single_request_body<M: Message + Default>(server: &MockServer) -> M {
    let requests = server
        .received_requests()
        .await
        .expect("request recording is enabled");
    assert_eq!(requests.len(), 1, "expected exactly one request");
    M::decode(requests[0].body.as_slice()).expect("request body is a valid message")
}

// ============================================================================
// Construction
// ============================================================================

mod construction_tests {
    use super::*;

    /// An empty endpoint is a configuration error.
    #[test]
    fn test_empty_endpoint_is_rejected() {
        let result = Client::new(ClientConfig::default());

        assert!(matches!(result, Err(ClientError::Configuration { .. })));
    }

    /// Unset transport limits fall back to the pool defaults.
    #[test]
    fn test_default_limits_applied() {
        let client = Client::new(ClientConfig::new("http://localhost:2319")).unwrap();

        assert_eq!(client.limits().max_connections, 5_000);
        assert_eq!(client.endpoint(), "http://localhost:2319");
    }

    /// A caller supplied reqwest client is used as-is.
    #[test]
    fn test_caller_supplied_http_client_is_accepted() {
        let http = reqwest::Client::new();
        let config = ClientConfig::new("http://localhost:2319").with_http_client(http);

        assert!(Client::new(config).is_ok());
    }

    /// The client can be shared across tasks.
    #[test]
    fn test_client_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<Client>();
    }
}

// ============================================================================
// Successful calls
// ============================================================================

mod success_tests {
    use super::*;

    /// One POST to the documented route whose body decodes to the original name.
    #[tokio::test]
    async fn test_queues_create_posts_once_to_route() {
        let server = MockServer::start().await;
        mount(
            &server,
            Operation::QueuesCreate,
            protobuf_response(200, &Reply::default()),
        )
        .await;
        let client = client_for(&server);

        let info = QueueInfo {
            queue_name: "queue-echo-1".to_string(),
            lease_timeout: "1m".to_string(),
            expire_timeout: "24h".to_string(),
            requested_partitions: 1,
            ..Default::default()
        };
        client
            .queues_create(&CallContext::background(), &info)
            .await
            .expect("create succeeds");

        let sent: QueueInfo = single_request_body(&server).await;
        assert_eq!(sent.queue_name, "queue-echo-1");
        assert_eq!(sent, info);
    }

    /// Verify a lease response decodes into exactly the fields sent.
    #[tokio::test]
    async fn test_queue_lease_decodes_response() {
        let server = MockServer::start().await;
        let expected = QueueLeaseResponse {
            queue_name: "orders".to_string(),
            partition: 2,
            items: vec![QueueLeaseItem {
                id: "item-1".to_string(),
                attempts: 1,
                bytes: b"payload".to_vec(),
                ..Default::default()
            }],
        };
        mount(&server, Operation::QueueLease, protobuf_response(200, &expected)).await;
        let client = client_for(&server);

        let request = QueueLeaseRequest {
            queue_name: "orders".to_string(),
            batch_size: 5,
            client_id: "worker-1".to_string(),
            request_timeout: "5s".to_string(),
        };
        let response = client
            .queue_lease(&CallContext::background(), &request)
            .await
            .unwrap();

        assert_eq!(response, expected);
        let sent: QueueLeaseRequest = single_request_body(&server).await;
        assert_eq!(sent, request);
    }

    /// A fire-and-forget operation succeeds on an empty 200 body.
    #[tokio::test]
    async fn test_queue_complete_accepts_empty_reply() {
        let server = MockServer::start().await;
        mount(&server, Operation::QueueComplete, ResponseTemplate::new(200)).await;
        let client = client_for(&server);

        let request = QueueCompleteRequest {
            queue_name: "orders".to_string(),
            partition: 0,
            ids: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        let result = client
            .queue_complete(&CallContext::background(), &request)
            .await;

        assert!(result.is_ok(), "got {:?}", result);
    }

    /// Every payload-less operation posts to its own route and accepts a reply.
    #[tokio::test]
    async fn test_fire_and_forget_operations_hit_their_routes() {
        let server = MockServer::start().await;
        for operation in [
            Operation::QueueProduce,
            Operation::QueueRetry,
            Operation::QueuesUpdate,
            Operation::QueuesDelete,
            Operation::StorageItemsDelete,
        ] {
            mount(&server, operation, protobuf_response(200, &Reply::default())).await;
        }
        let client = client_for(&server);
        let ctx = CallContext::background();

        client
            .queue_produce(
                &ctx,
                &QueueProduceRequest {
                    queue_name: "orders".to_string(),
                    request_timeout: "1m".to_string(),
                    items: vec![Default::default()],
                },
            )
            .await
            .expect("produce succeeds");
        client
            .queue_retry(
                &ctx,
                &QueueRetryRequest {
                    queue_name: "orders".to_string(),
                    ..Default::default()
                },
            )
            .await
            .expect("retry succeeds");
        client
            .queues_update(
                &ctx,
                &QueueInfo {
                    queue_name: "orders".to_string(),
                    max_attempts: 5,
                    ..Default::default()
                },
            )
            .await
            .expect("update succeeds");
        client
            .queues_delete(
                &ctx,
                &QueuesDeleteRequest {
                    queue_name: "orders".to_string(),
                },
            )
            .await
            .expect("delete succeeds");
        client
            .storage_items_delete(
                &ctx,
                &StorageItemsDeleteRequest {
                    queue_name: "orders".to_string(),
                    partition: 0,
                    ids: vec!["item-1".to_string()],
                },
            )
            .await
            .expect("storage delete succeeds");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 5);
    }

    /// Without options the list starts at the beginning with the server limit.
    #[tokio::test]
    async fn test_queues_list_without_options_sends_defaults() {
        let server = MockServer::start().await;
        let listing = QueuesListResponse {
            items: vec![QueueInfo {
                queue_name: "a".to_string(),
                ..Default::default()
            }],
        };
        mount(&server, Operation::QueuesList, protobuf_response(200, &listing)).await;
        let client = client_for(&server);

        let response = client
            .queues_list(&CallContext::background(), None)
            .await
            .unwrap();

        assert_eq!(response.items.len(), 1);
        let sent: QueuesListRequest = single_request_body(&server).await;
        assert_eq!(sent.pivot, "");
        assert_eq!(sent.limit, 0);
    }

    /// Stats keep the per-partition breakdown.
    #[tokio::test]
    async fn test_queue_stats_decodes_partitions() {
        let server = MockServer::start().await;
        let stats = QueueStatsResponse {
            logical_queues: vec![crate::wire::QueueLogicalStats {
                in_flight: 3,
                partitions: vec![crate::wire::QueuePartitionStats {
                    partition: 0,
                    total: 10,
                    num_leased: 3,
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };
        mount(&server, Operation::QueueStats, protobuf_response(200, &stats)).await;
        let client = client_for(&server);

        let response = client
            .queue_stats(
                &CallContext::background(),
                &QueueStatsRequest {
                    queue_name: "orders".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(response, stats);
    }

    /// Import returns the items as stored by the server.
    #[tokio::test]
    async fn test_storage_items_import_returns_stored_items() {
        let server = MockServer::start().await;
        let imported = StorageItemsImportResponse {
            items: vec![StorageItem {
                id: "new-1".to_string(),
                reference: "r".to_string(),
                ..Default::default()
            }],
        };
        mount(
            &server,
            Operation::StorageItemsImport,
            protobuf_response(200, &imported),
        )
        .await;
        let client = client_for(&server);

        let response = client
            .storage_items_import(
                &CallContext::background(),
                &StorageItemsImportRequest {
                    queue_name: "orders".to_string(),
                    partition: 0,
                    items: vec![StorageItem {
                        reference: "r".to_string(),
                        ..Default::default()
                    }],
                },
            )
            .await
            .unwrap();

        assert_eq!(crate::collect_ids(&response.items), vec!["new-1"]);
    }
}

// ============================================================================
// Pagination
// ============================================================================

mod pagination_tests {
    use super::*;

    /// The pivot item was removed; the server resumed at the next item.
    #[tokio::test]
    async fn test_storage_items_list_pivot_mismatch_is_not_an_error() {
        let server = MockServer::start().await;
        let page = StorageItemsListResponse {
            items: vec![
                StorageItem {
                    id: "item-6".to_string(),
                    ..Default::default()
                },
                StorageItem {
                    id: "item-7".to_string(),
                    ..Default::default()
                },
            ],
        };
        mount(
            &server,
            Operation::StorageItemsList,
            protobuf_response(200, &page),
        )
        .await;
        let client = client_for(&server);

        let options = ListOptions::new("item-5", 2);
        let response = client
            .storage_items_list(&CallContext::background(), "orders", 3, Some(&options))
            .await
            .expect("pivot mismatch must not fail the call");

        assert!(!crate::begins_at_pivot(&response.items, "item-5"));
        assert_eq!(response.items[0].id, "item-6");

        let sent: StorageItemsListRequest = single_request_body(&server).await;
        assert_eq!(sent.queue_name, "orders");
        assert_eq!(sent.partition, 3);
        assert_eq!(sent.pivot, "item-5");
        assert_eq!(sent.limit, 2);
    }

    /// Scheduled items are listed through their own route.
    #[tokio::test]
    async fn test_storage_scheduled_list_uses_scheduled_route() {
        let server = MockServer::start().await;
        mount(
            &server,
            Operation::StorageScheduledList,
            protobuf_response(200, &StorageItemsListResponse::default()),
        )
        .await;
        let client = client_for(&server);

        let response = client
            .storage_scheduled_list(&CallContext::background(), "orders", 0, None)
            .await
            .unwrap();

        assert!(response.items.is_empty());
        let sent: StorageItemsListRequest = single_request_body(&server).await;
        assert_eq!(sent.queue_name, "orders");
        assert_eq!(sent.pivot, "");
    }
}

// ============================================================================
// Remote failures
// ============================================================================

mod remote_failure_tests {
    use super::*;

    async fn assert_category(message: &str, expected: ErrorCategory) {
        let server = MockServer::start().await;
        mount(
            &server,
            Operation::QueueLease,
            protobuf_response(454, &Reply::error(codes::RETRY_REQUEST, message)),
        )
        .await;
        let client = client_for(&server);

        let err = client
            .queue_lease(&CallContext::background(), &QueueLeaseRequest::default())
            .await
            .expect_err("non-2xx reply must fail");

        match err {
            ClientError::Remote {
                operation,
                status,
                code,
                category,
                message: reported,
                ..
            } => {
                assert_eq!(operation, Operation::QueueLease);
                assert_eq!(status, 454);
                assert_eq!(code, codes::RETRY_REQUEST);
                assert_eq!(category, expected);
                assert_eq!(reported, message);
            }
            other => panic!("expected Remote, got {:?}", other),
        }
    }

    /// Every route surfaces a structured error reply as `Remote` tagged with
    /// the operation that was called.
    #[tokio::test]
    async fn test_every_operation_reports_remote_failure() {
        let server = MockServer::start().await;
        let reply = Reply::error(codes::RETRY_REQUEST, MSG_SERVICE_IN_SHUTDOWN);
        for operation in Operation::ALL {
            mount(&server, operation, protobuf_response(454, &reply)).await;
        }
        let client = client_for(&server);
        let ctx = CallContext::background();

        for operation in Operation::ALL {
            let err = client
                .invoke::<Reply, Reply>(&ctx, operation, &Reply::default())
                .await
                .expect_err("non-2xx reply must fail");

            match err {
                ClientError::Remote {
                    operation: reported,
                    status,
                    category,
                    ..
                } => {
                    assert_eq!(reported, operation);
                    assert_eq!(status, 454);
                    assert_eq!(category, ErrorCategory::ServiceShuttingDown);
                }
                other => panic!("{}: expected Remote, got {:?}", operation, other),
            }
        }

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), Operation::ALL.len());
    }

    /// A second lease from the same client id is reported as such.
    #[tokio::test]
    async fn test_duplicate_client_id() {
        assert_category(MSG_DUPLICATE_CLIENT_ID, ErrorCategory::DuplicateClientId).await;
    }

    /// Service shutdown replies map to `ServiceShuttingDown`.
    #[tokio::test]
    async fn test_service_shutting_down() {
        assert_category(MSG_SERVICE_IN_SHUTDOWN, ErrorCategory::ServiceShuttingDown).await;
    }

    /// Queue shutdown replies map to `QueueShuttingDown`.
    #[tokio::test]
    async fn test_queue_shutting_down() {
        assert_category(MSG_QUEUE_IN_SHUTDOWN, ErrorCategory::QueueShuttingDown).await;
    }

    /// Overload replies map to `QueueOverloaded`.
    #[tokio::test]
    async fn test_queue_overloaded() {
        assert_category(MSG_QUEUE_OVERLOADED, ErrorCategory::QueueOverloaded).await;
    }

    /// An empty-queue timeout maps to `RequestTimeout`.
    #[tokio::test]
    async fn test_request_timeout() {
        assert_category(MSG_REQUEST_TIMEOUT, ErrorCategory::RequestTimeout).await;
    }

    /// Messages without a known category are `Other`.
    #[tokio::test]
    async fn test_unlisted_message_is_other() {
        assert_category("queue 'orders' does not exist", ErrorCategory::Other).await;
    }

    /// A proxy error page is reported as an infrastructure failure.
    #[tokio::test]
    async fn test_non_protobuf_error_body_is_infrastructure() {
        let server = MockServer::start().await;
        mount(
            &server,
            Operation::QueueProduce,
            ResponseTemplate::new(502).set_body_raw("<html>Bad Gateway</html>", "text/html"),
        )
        .await;
        let client = client_for(&server);

        let err = client
            .queue_produce(&CallContext::background(), &QueueProduceRequest::default())
            .await
            .unwrap_err();

        assert_eq!(err.category(), Some(ErrorCategory::Infrastructure));
        assert!(err.to_string().contains("Bad Gateway"), "{}", err);
    }

    /// A 2xx body that is not the expected message is a decode error.
    #[tokio::test]
    async fn test_undecodable_success_body_is_decode_error() {
        let server = MockServer::start().await;
        mount(
            &server,
            Operation::QueuesInfo,
            ResponseTemplate::new(200).set_body_raw(vec![0xFFu8, 0xFF, 0xFF], CONTENT_TYPE_PROTOBUF),
        )
        .await;
        let client = client_for(&server);

        let err = client
            .queues_info(&CallContext::background(), &QueuesInfoRequest::default())
            .await
            .unwrap_err();

        assert!(
            matches!(
                err,
                ClientError::Decode {
                    operation: Operation::QueuesInfo,
                    ..
                }
            ),
            "got {:?}",
            err
        );
    }
}

// ============================================================================
// Transport failures and cancellation
// ============================================================================

mod transport_tests {
    use super::*;

    /// Verify cancelling mid-call returns without waiting for the server.
    #[tokio::test]
    async fn test_cancellation_returns_promptly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(Operation::QueueLease.route()))
            .respond_with(
                protobuf_response(200, &QueueLeaseResponse::default())
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;
        let client = client_for(&server);

        let token = CancellationToken::new();
        let ctx = CallContext::with_cancellation(token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let started = Instant::now();
        let err = client
            .queue_lease(&ctx, &QueueLeaseRequest::default())
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        canceller.await.unwrap();
        assert!(
            elapsed < Duration::from_secs(2),
            "cancelled call took {:?}",
            elapsed
        );
        assert!(
            matches!(
                err,
                ClientError::Transport {
                    kind: TransportErrorKind::Cancelled,
                    ..
                }
            ),
            "got {:?}",
            err
        );
    }

    /// A context cancelled up front never reaches the network.
    #[tokio::test]
    async fn test_already_cancelled_context_sends_nothing() {
        let server = MockServer::start().await;
        let client = client_for(&server);
        let token = CancellationToken::new();
        token.cancel();

        let err = client
            .queue_retry(
                &CallContext::with_cancellation(token),
                &QueueRetryRequest::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ClientError::Transport {
                kind: TransportErrorKind::Cancelled,
                ..
            }
        ));
        let requests = server.received_requests().await.unwrap();
        assert!(requests.is_empty());
    }

    /// An expired deadline is a transport failure, not a hang.
    #[tokio::test]
    async fn test_deadline_exceeded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(Operation::QueueClear.route()))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;
        let client = client_for(&server);

        let ctx = CallContext::background().with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let err = client
            .queue_clear(&ctx, &QueueClearRequest::default())
            .await
            .unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(matches!(
            err,
            ClientError::Transport {
                kind: TransportErrorKind::DeadlineExceeded,
                ..
            }
        ));
    }

    /// Nothing listening on the endpoint is a connect failure.
    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Bind then drop a listener so the port is very likely closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let client = Client::new(ClientConfig::with_no_tls(&address.to_string())).unwrap();

        let err = client
            .queues_delete(
                &CallContext::background().with_timeout(Duration::from_secs(5)),
                &QueuesDeleteRequest {
                    queue_name: "orders".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert!(
            matches!(
                err,
                ClientError::Transport {
                    operation: Operation::QueuesDelete,
                    kind: TransportErrorKind::Connect,
                    ..
                }
            ),
            "got {:?}",
            err
        );
        assert!(err.is_transient());
    }

    /// Callers beyond the connection limit wait for a slot instead of failing.
    #[tokio::test]
    async fn test_connection_limit_queues_callers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(Operation::StorageItemsDelete.route()))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .expect(2)
            .mount(&server)
            .await;
        let client =
            Client::new(ClientConfig::new(server.uri()).with_max_connections(1)).unwrap();

        let started = Instant::now();
        let ctx = CallContext::background();
        let request = StorageItemsDeleteRequest::default();
        let (first, second) = tokio::join!(
            client.storage_items_delete(&ctx, &request),
            client.storage_items_delete(&ctx, &request),
        );

        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(
            started.elapsed() >= Duration::from_millis(380),
            "calls were not serialized: {:?}",
            started.elapsed()
        );
    }
}
