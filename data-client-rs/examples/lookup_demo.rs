//! Data Client Demo
//!
//! Starts a local mock data service, then walks through a lookup that is
//! retried, a lookup that finds nothing, a validation failure and a breaker
//! that opens.
//!
//! Run with `cargo run --example lookup_demo`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use data_client_rs::logging::{init_logging, LoggingConfig};
use data_client_rs::resilience::{CircuitBreakerConfig, RetryConfig};
use data_client_rs::{ClientMetrics, RequestContext};

#[derive(Debug, Deserialize)]
struct User {
    id: u64,
    name: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig {
        json_format: false,
        ..LoggingConfig::default()
    })?;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "ada"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/loans"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "type": "https://errors.example.com/validation",
            "title": "Validation failed",
            "status": 422,
            "detail": "Loan request failed validation",
            "instance": "/loans",
            "errors": {"amount": ["must be positive"]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/reports"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let metrics = Arc::new(ClientMetrics::new());
    let client = data_client_rs::client()
        .service_name("postgres")
        .base_url(server.uri())
        .timeout(Duration::from_secs(2))
        .retry_config(RetryConfig {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(1),
        })
        .circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_secs(5),
        })
        .telemetry(metrics.clone())
        .build()
        .context("building client")?;

    let ctx = RequestContext::generate_with_prefix("data");
    println!("Context: {}", ctx);

    let user: Option<User> = client.get(&ctx, "/users/1").await?;
    if let Some(user) = user {
        println!("Found user {} ({}) after retries", user.id, user.name);
    }

    let missing: Option<User> = client.get(&ctx, "/users/999").await?;
    println!("Lookup of /users/999 returned {:?}", missing);

    match client
        .post::<_, serde_json::Value>(&ctx, "/loans", &json!({"amount": -5}))
        .await
    {
        Ok(_) => println!("Loan unexpectedly accepted"),
        Err(err) => println!(
            "Loan rejected: {} (errors: {:?})",
            err.detail().unwrap_or("-"),
            err.errors()
        ),
    }

    for round in 1..=3 {
        let result = client.get::<serde_json::Value>(&ctx, "/reports").await;
        println!(
            "Report call {}: {} (breaker {})",
            round,
            result.err().map(|e| e.kind()).unwrap_or("ok"),
            client.circuit_breaker_status()
        );
    }

    println!("Metrics: {:?}", metrics.as_map());
    Ok(())
}
