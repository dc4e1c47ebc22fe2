//! Tests for the typed client against a WireMock data service
//!
//! Cover response mapping (values, 404 as absence, empty bodies), error
//! translation, and retry counts observed on the wire.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};
    use tokio_test::{assert_err, assert_ok};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::{DataServiceClient, Reply, RequestOptions};
    use crate::context::RequestContext;
    use crate::error::ServiceError;
    use crate::resilience::{CircuitBreakerConfig, RetryConfig};
    use crate::telemetry::ClientMetrics;
    use crate::ClientBuilder;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(10),
            backoff_factor: 2.0,
            max_delay: Duration::from_millis(40),
        }
    }

    fn create_test_client(server: &MockServer, max_retries: u32) -> DataServiceClient {
        ClientBuilder::new()
            .service_name("postgres")
            .base_url(server.uri())
            .timeout(Duration::from_secs(2))
            .retry_config(fast_retry(max_retries))
            .circuit_breaker(CircuitBreakerConfig {
                failure_threshold: 50,
                recovery_timeout: Duration::from_secs(30),
            })
            .build()
            .expect("Failed to build test client")
    }

    fn problem(status: u16, detail: &str) -> Value {
        json!({
            "type": "https://errors.example.com/problem",
            "title": "Request failed",
            "status": status,
            "detail": detail,
            "instance": "/loans"
        })
    }

    async fn received(server: &MockServer) -> usize {
        server
            .received_requests()
            .await
            .map(|requests| requests.len())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_get_decodes_typed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "ada"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 2);
        let user: Option<User> = assert_ok!(client.get(&RequestContext::generate(), "/users/1").await);

        assert_eq!(
            user,
            Some(User {
                id: 1,
                name: "ada".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_get_404_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/999"))
            .respond_with(ResponseTemplate::new(404).set_body_json(problem(404, "no such user")))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 3);
        let user: Option<User> =
            assert_ok!(client.get(&RequestContext::generate(), "/users/999").await);
        assert!(user.is_none());
    }

    #[tokio::test]
    async fn test_get_with_params_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .and(query_param("limit", "10"))
            .and(query_param("active", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 0);
        let users: Option<Vec<User>> = assert_ok!(
            client
                .get_with_params(
                    &RequestContext::generate(),
                    "/users",
                    &[("limit", "10"), ("active", "true")]
                )
                .await
        );
        assert_eq!(users, Some(vec![]));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(503).set_body_json(problem(503, "warming up")))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "ada"})))
            .mount(&server)
            .await;

        let metrics = Arc::new(ClientMetrics::new());
        let client = ClientBuilder::new()
            .service_name("postgres")
            .base_url(server.uri())
            .retry_config(fast_retry(2))
            .telemetry(metrics.clone())
            .build()
            .unwrap();

        let started = Instant::now();
        let user: Option<User> = assert_ok!(client.get(&RequestContext::generate(), "/users/1").await);

        assert_eq!(user.map(|u| u.id), Some(1));
        assert_eq!(received(&server).await, 3);
        // 10ms + 20ms of backoff between the three attempts
        assert!(started.elapsed() >= Duration::from_millis(30));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.calls, 1);
        assert_eq!(snapshot.successes, 1);
        assert_eq!(snapshot.attempts, 3);
        assert_eq!(snapshot.status_counts.get(&503), Some(&2));
    }

    #[tokio::test]
    async fn test_persistent_503_exhausts_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/accounts/7"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 3);
        let result: crate::Result<Option<Value>> =
            client.get(&RequestContext::generate(), "/accounts/7").await;

        let err = assert_err!(result);
        assert!(matches!(err.root(), ServiceError::ServiceUnavailable(_)));
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.attempts(), Some(4));
        assert_eq!(err.service_name(), Some("postgres"));
    }

    #[tokio::test]
    async fn test_429_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let client = create_test_client(&server, 1);
        let value: Option<Value> = assert_ok!(client.get(&RequestContext::generate(), "/limits").await);
        assert_eq!(value, Some(json!({"ok": true})));
        assert_eq!(received(&server).await, 2);
    }

    #[tokio::test]
    async fn test_validation_error_is_not_retried() {
        let server = MockServer::start().await;
        let mut body = problem(422, "Loan request failed validation");
        body["errors"] = json!({"amount": ["must be positive"]});

        Mock::given(method("POST"))
            .and(path("/loans"))
            .respond_with(ResponseTemplate::new(422).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 3);
        let result: crate::Result<Option<Value>> = client
            .post(&RequestContext::generate(), "/loans", &json!({"amount": -5}))
            .await;

        let err = assert_err!(result);
        assert!(matches!(err.root(), ServiceError::Validation(_)));
        assert_eq!(err.status_code(), Some(422));
        assert_eq!(err.detail(), Some("Loan request failed validation"));
        assert!(err.errors().map_or(false, |errors| errors.contains_key("amount")));
        assert_eq!(err.attempts(), Some(1));
    }

    #[tokio::test]
    async fn test_client_errors_map_by_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(409).set_body_json(problem(409, "version clash")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/users/404"))
            .respond_with(ResponseTemplate::new(404).set_body_json(problem(404, "gone")))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 3);
        let ctx = RequestContext::generate();
        let update = json!({"name": "grace"});

        let err = assert_err!(client.put::<_, Value>(&ctx, "/users/1", &update).await);
        assert!(matches!(err.root(), ServiceError::Conflict(_)));

        let err = assert_err!(client.patch::<_, Value>(&ctx, "/users/1", &update).await);
        assert!(matches!(err.root(), ServiceError::GenericClient(_)));
        assert_eq!(err.status_code(), Some(403));
        assert!(err.to_string().contains("forbidden"));

        // 404 is only an absence signal for reads
        let err = assert_err!(client.post::<_, Value>(&ctx, "/users/404", &update).await);
        assert!(matches!(err.root(), ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users"))
            .and(header("Content-Type", "application/json"))
            .and(body_json(json!({"id": 2, "name": "grace"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 2, "name": "grace"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 0);
        let user = User {
            id: 2,
            name: "grace".to_string(),
        };
        let created: Option<User> =
            assert_ok!(client.post(&RequestContext::generate(), "/users", &user).await);
        assert_eq!(created, Some(user));
    }

    #[tokio::test]
    async fn test_empty_success_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = create_test_client(&server, 0);
        let reply: Option<Value> = assert_ok!(
            client
                .put(&RequestContext::generate(), "/users/1", &json!({"name": "x"}))
                .await
        );
        assert!(reply.is_none());
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/users/1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/users/2"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = create_test_client(&server, 0);
        let ctx = RequestContext::generate();

        assert!(assert_ok!(client.delete(&ctx, "/users/1").await));
        assert!(!assert_ok!(client.delete(&ctx, "/users/2").await));
    }

    #[tokio::test]
    async fn test_delete_ignores_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/sessions/7"))
            .respond_with(ResponseTemplate::new(200).set_body_string("deleted"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/sessions/8"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"deleted": true, "id": 8})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 0);
        let ctx = RequestContext::generate();

        assert!(assert_ok!(client.delete(&ctx, "/sessions/7").await));
        assert!(assert_ok!(client.delete(&ctx, "/sessions/8").await));
    }

    #[tokio::test]
    async fn test_exchange_separates_empty_from_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/1/avatar"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/2/avatar"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = create_test_client(&server, 0);
        let ctx = RequestContext::generate();

        let empty: Reply<Value> = assert_ok!(
            client
                .exchange(&ctx, reqwest::Method::GET, "/users/1/avatar", RequestOptions::new())
                .await
        );
        let absent: Reply<Value> = assert_ok!(
            client
                .exchange(&ctx, reqwest::Method::GET, "/users/2/avatar", RequestOptions::new())
                .await
        );

        assert_eq!(empty, Reply::Empty);
        assert_eq!(absent, Reply::Absent);

        // The Option-returning helpers fold both into `None`
        let via_get: Option<Value> = assert_ok!(client.get(&ctx, "/users/1/avatar").await);
        assert!(via_get.is_none());
    }

    #[tokio::test]
    async fn test_post_bulk_wraps_items() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/bulk"))
            .and(body_json(json!({"items": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"inserted": 2})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 0);
        let items = vec![
            User {
                id: 1,
                name: "a".to_string(),
            },
            User {
                id: 2,
                name: "b".to_string(),
            },
        ];
        let reply: Option<Value> =
            assert_ok!(client.post_bulk(&RequestContext::generate(), "/users", &items).await);
        assert_eq!(reply, Some(json!({"inserted": 2})));
    }

    #[tokio::test]
    async fn test_send_with_options() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("Authorization", "Bearer opaque-token"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hits": 0})))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 0);
        let options = RequestOptions::new()
            .header("Authorization", "Bearer opaque-token")
            .unwrap()
            .query("page", 2)
            .json(&json!({"q": "ada"}))
            .unwrap();

        let reply: Option<Value> = assert_ok!(
            client
                .send(
                    &RequestContext::generate(),
                    reqwest::Method::POST,
                    "/search",
                    options
                )
                .await
        );
        assert_eq!(reply, Some(json!({"hits": 0})));
    }

    #[tokio::test]
    async fn test_undecodable_body_is_parsing_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_test_client(&server, 3);
        let err = assert_err!(
            client
                .get::<User>(&RequestContext::generate(), "/users/1")
                .await
        );
        assert!(matches!(err.root(), ServiceError::Parsing(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_retried_then_raised() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = ClientBuilder::new()
            .base_url(server.uri())
            .timeout(Duration::from_millis(50))
            .retry_config(fast_retry(1))
            .build()
            .unwrap();

        let err = assert_err!(
            client
                .get::<Value>(&RequestContext::generate(), "/slow")
                .await
        );
        assert!(matches!(err.root(), ServiceError::Timeout(_)));
        assert_eq!(err.attempts(), Some(2));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;

        let ctx = RequestContext::generate();
        let healthy = create_test_client(&server, 0);
        assert!(assert_ok!(healthy.health_check(&ctx).await));

        let unreachable = ClientBuilder::new()
            .base_url("http://127.0.0.1:1")
            .timeout(Duration::from_millis(200))
            .build()
            .unwrap();
        assert!(!assert_ok!(unreachable.health_check(&ctx).await));
    }
}
