//! Tests for loading client configuration from providers

#[cfg(test)]
mod tests {
    use std::env;
    use std::time::Duration;

    use serde_json::{json, Value};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::config::{
        CompositeConfigProvider, ConfigProvider, ConfigProviderExt, DataClientConfig,
        EnvConfigProvider, MemoryConfigProvider,
    };
    use crate::context::RequestContext;
    use crate::error::ServiceError;
    use crate::ClientBuilder;

    #[test]
    fn test_env_values_override_memory_defaults() {
        // Unique names so parallel tests never race on the same variables
        env::set_var("DCTEST_LEDGER_SERVICE_URL", "http://ledger-data:8000");
        env::set_var("DCTEST_LEDGER_MAX_RETRIES", "5");
        env::set_var("DCTEST_LEDGER_RECOVERY_TIMEOUT", "2m");

        let mut fallback = MemoryConfigProvider::new();
        fallback.set("ledger_max_retries", "1");
        fallback.set("ledger_base_delay", "250ms");
        fallback.set("ledger_backoff_factor", "3");

        let provider = CompositeConfigProvider::new()
            .with_provider(EnvConfigProvider::new().with_prefix("DCTEST"))
            .with_provider(fallback);

        let config = DataClientConfig::from_provider(&provider, "ledger").unwrap();
        assert_eq!(config.base_url, "http://ledger-data:8000");
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.base_delay, Duration::from_millis(250));
        assert_eq!(config.retry.backoff_factor, 3.0);
        assert_eq!(
            config.circuit_breaker.recovery_timeout,
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        let malformed = [
            ("postgres_max_retries", "three"),
            ("postgres_max_retries", "-1"),
            ("postgres_timeout", "5sec"),
            ("postgres_failure_threshold", "-4"),
            ("postgres_backoff_factor", "quick"),
            ("postgres_pool_max_idle", "lots"),
            ("postgres_recovery_timeout", "999999999999999999h"),
        ];

        for (key, value) in malformed {
            let mut provider = MemoryConfigProvider::new();
            provider.set("postgres_service_url", "http://postgres-data:8000");
            provider.set(key, value);

            let err = DataClientConfig::from_provider(&provider, "postgres").unwrap_err();
            assert!(
                matches!(err, ServiceError::Configuration(_)),
                "{}={} should be rejected, got {:?}",
                key,
                value,
                err
            );
        }
    }

    #[test]
    fn test_well_formed_values_fail_validation() {
        let mut provider = MemoryConfigProvider::new();
        provider.set("mongo_service_url", "http://mongo-data:8000");
        provider.set("mongo_backoff_factor", "0.5");

        let err = DataClientConfig::from_provider(&provider, "mongo").unwrap_err();
        assert!(matches!(err, ServiceError::Configuration(_)));
    }

    #[test]
    fn test_unset_env_keys_take_defaults() {
        env::set_var("DCTEST_SEARCH_SERVICE_URL", "http://search-data:8000");
        env::set_var("DCTEST_SEARCH_TIMEOUT", "5s");

        let provider = EnvConfigProvider::new().with_prefix("DCTEST");
        let config = DataClientConfig::from_provider(&provider, "search").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
    }

    #[tokio::test]
    async fn test_client_built_from_provider_calls_service() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/records/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let mut provider = MemoryConfigProvider::new();
        provider.set("records_service_url", server.uri());
        provider.set("records_timeout", "2s");
        provider.set("records_max_retries", "0");

        let config = DataClientConfig::from_provider(&provider, "records").unwrap();
        let client = ClientBuilder::from_config(config).build().unwrap();

        assert_eq!(client.config().service_name, "records");
        let record: Option<Value> = client
            .get(&RequestContext::generate(), "/records/1")
            .await
            .unwrap();
        assert_eq!(record, Some(json!({"id": 1})));
    }

    #[test]
    fn test_provider_is_object_safe() {
        let providers: Vec<Box<dyn ConfigProvider>> = vec![Box::new(MemoryConfigProvider::new())];
        assert!(providers[0].get_string("anything").is_err());
        assert_eq!(providers[0].get_int_or("anything", 7).unwrap(), 7);
    }
}
