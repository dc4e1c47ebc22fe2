//! Configuration management for data-service clients
//!
//! Values are looked up through a `ConfigProvider` chain (environment
//! variables, in-memory maps, or both) and validated once, before the client
//! is built. After that the client treats them as immutable.

use std::collections::HashMap;
use std::env;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use url::Url;

use crate::error::{Result, ServiceError};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};
use crate::transport::http::PoolConfig;
use crate::util::parse_duration;

/// Base trait for configuration providers
pub trait ConfigProvider: Send + Sync {
    /// Look up a raw value; `Ok(None)` when the key is not set
    fn lookup(&self, key: &str) -> Result<Option<String>>;
}

/// Typed accessors over a [`ConfigProvider`].
///
/// The `*_or` forms fall back to the default only when the key is absent.
/// A value that is present but malformed is always an error.
pub trait ConfigProviderExt: ConfigProvider {
    /// Get a string configuration value
    fn get_string(&self, key: &str) -> Result<String> {
        self.lookup(key)?.ok_or_else(|| {
            ServiceError::configuration(format!("Configuration key not found: {}", key))
        })
    }

    /// Get an integer configuration value
    fn get_int(&self, key: &str) -> Result<i64> {
        parse_int(key, &self.get_string(key)?)
    }

    /// Get a float configuration value
    fn get_float(&self, key: &str) -> Result<f64> {
        parse_float(key, &self.get_string(key)?)
    }

    /// Get a duration such as `250ms`, `30s`, `5m` or a bare number of seconds
    fn get_duration(&self, key: &str) -> Result<Duration> {
        parse_duration_value(key, &self.get_string(key)?)
    }

    /// Get an integer configuration value, or `default` if it is not set
    fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        self.lookup(key)?
            .map_or(Ok(default), |value| parse_int(key, &value))
    }

    /// Get a float configuration value, or `default` if it is not set
    fn get_float_or(&self, key: &str, default: f64) -> Result<f64> {
        self.lookup(key)?
            .map_or(Ok(default), |value| parse_float(key, &value))
    }

    /// Get a duration, or `default` if it is not set
    fn get_duration_or(&self, key: &str, default: Duration) -> Result<Duration> {
        self.lookup(key)?
            .map_or(Ok(default), |value| parse_duration_value(key, &value))
    }

    /// Get a count that must fit `T` (e.g. `u32`), or `default` if it is not set
    fn get_count_or<T: TryFrom<i64>>(&self, key: &str, default: T) -> Result<T> {
        let Some(value) = self.lookup(key)? else {
            return Ok(default);
        };
        let parsed = parse_int(key, &value)?;
        T::try_from(parsed).map_err(|_| {
            ServiceError::configuration(format!(
                "Invalid value for key {}: {} (expected a non-negative integer)",
                key, parsed
            ))
        })
    }
}

impl<T: ConfigProvider + ?Sized> ConfigProviderExt for T {}

fn parse_int(key: &str, value: &str) -> Result<i64> {
    value.trim().parse::<i64>().map_err(|e| {
        ServiceError::configuration(format!("Invalid integer for key {}: {}", key, e))
    })
}

fn parse_float(key: &str, value: &str) -> Result<f64> {
    value.trim().parse::<f64>().map_err(|e| {
        ServiceError::configuration(format!("Invalid float for key {}: {}", key, e))
    })
}

fn parse_duration_value(key: &str, value: &str) -> Result<Duration> {
    parse_duration(value).ok_or_else(|| {
        ServiceError::configuration(format!("Invalid duration for key {}: {}", key, value))
    })
}

/// Environment variable based configuration provider
#[derive(Debug, Clone, Default)]
pub struct EnvConfigProvider {
    /// Optional prefix for environment variables
    prefix: Option<String>,

    /// Optional namespace for variables (e.g., "DATA")
    namespace: Option<String>,
}

impl EnvConfigProvider {
    /// Create a new environment variable config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a prefix for environment variables
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set a namespace for environment variables
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Format a configuration key as an environment variable
    fn format_key(&self, key: &str) -> String {
        let mut env_key = String::new();

        for part in [&self.prefix, &self.namespace].into_iter().flatten() {
            env_key.push_str(part);
            env_key.push('_');
        }

        env_key.push_str(
            &key.to_uppercase()
                .replace(|c: char| !c.is_ascii_alphanumeric(), "_"),
        );
        env_key
    }
}

impl ConfigProvider for EnvConfigProvider {
    fn lookup(&self, key: &str) -> Result<Option<String>> {
        let env_key = self.format_key(key);

        match env::var(&env_key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(ServiceError::configuration(format!(
                "Environment variable is not valid unicode: {}",
                env_key
            ))),
        }
    }
}

/// In-memory config provider for testing or static configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryConfigProvider {
    values: HashMap<String, String>,
}

impl MemoryConfigProvider {
    /// Create a new empty memory config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a memory config provider with initial values
    pub fn with_values(values: HashMap<String, String>) -> Self {
        Self { values }
    }

    /// Set a configuration value
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: ToString,
    {
        self.values.insert(key.into(), value.to_string());
    }
}

impl ConfigProvider for MemoryConfigProvider {
    fn lookup(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }
}

/// A composite config provider that tries multiple providers in order
#[derive(Default)]
pub struct CompositeConfigProvider {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl CompositeConfigProvider {
    /// Create a new composite config provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider to the end of the chain
    pub fn add_provider(&mut self, provider: impl ConfigProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    /// Builder form of [`add_provider`](Self::add_provider)
    pub fn with_provider(mut self, provider: impl ConfigProvider + 'static) -> Self {
        self.add_provider(provider);
        self
    }
}

impl ConfigProvider for CompositeConfigProvider {
    fn lookup(&self, key: &str) -> Result<Option<String>> {
        for provider in &self.providers {
            if let Some(value) = provider.lookup(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// Global default configuration provider
pub static DEFAULT_PROVIDER: Lazy<Arc<EnvConfigProvider>> =
    Lazy::new(|| Arc::new(EnvConfigProvider::new()));

/// Trait for service-specific configuration
pub trait ServiceConfig: Debug + Send + Sync {
    /// Validate this configuration
    fn validate(&self) -> Result<()>;

    /// Service name
    fn service_name(&self) -> &str;
}

/// Construction parameters for one `DataServiceClient`
#[derive(Debug, Clone, PartialEq)]
pub struct DataClientConfig {
    /// Logical name of the destination, e.g. `postgres`
    pub service_name: String,

    /// Base URL every path is resolved against
    pub base_url: String,

    /// Per-attempt timeout
    pub timeout: Duration,

    /// Retry policy
    pub retry: RetryConfig,

    /// Circuit breaker policy
    pub circuit_breaker: CircuitBreakerConfig,

    /// Connection pool settings
    pub pool: PoolConfig,
}

impl DataClientConfig {
    /// Defaults for `service_name` against `base_url`
    pub fn new(service_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            pool: PoolConfig::default(),
        }
    }

    /// Load configuration for `service` from a config provider.
    ///
    /// Keys are `{service}_service_url` (required) and `{service}_timeout`,
    /// `_max_retries`, `_backoff_factor`, `_base_delay`, `_max_delay`,
    /// `_failure_threshold`, `_recovery_timeout`, `_pool_max_idle`,
    /// `_pool_idle_timeout` (optional).
    pub fn from_provider<P: ConfigProvider + ?Sized>(provider: &P, service: &str) -> Result<Self> {
        let key = |suffix: &str| format!("{}_{}", service, suffix);
        let defaults = Self::new(service, String::new());

        let base_url = provider.get_string(&key("service_url"))?;

        let config = Self {
            service_name: service.to_string(),
            base_url,
            timeout: provider.get_duration_or(&key("timeout"), defaults.timeout)?,
            retry: RetryConfig {
                max_retries: provider
                    .get_count_or(&key("max_retries"), defaults.retry.max_retries)?,
                base_delay: provider
                    .get_duration_or(&key("base_delay"), defaults.retry.base_delay)?,
                backoff_factor: provider
                    .get_float_or(&key("backoff_factor"), defaults.retry.backoff_factor)?,
                max_delay: provider.get_duration_or(&key("max_delay"), defaults.retry.max_delay)?,
            },
            circuit_breaker: CircuitBreakerConfig {
                failure_threshold: provider.get_count_or(
                    &key("failure_threshold"),
                    defaults.circuit_breaker.failure_threshold,
                )?,
                recovery_timeout: provider.get_duration_or(
                    &key("recovery_timeout"),
                    defaults.circuit_breaker.recovery_timeout,
                )?,
            },
            pool: PoolConfig {
                max_idle_per_host: provider.get_count_or(
                    &key("pool_max_idle"),
                    defaults.pool.max_idle_per_host,
                )?,
                idle_timeout: provider
                    .get_duration_or(&key("pool_idle_timeout"), defaults.pool.idle_timeout)?,
                tcp_keepalive: defaults.pool.tcp_keepalive,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the process environment
    pub fn from_env(service: &str) -> Result<Self> {
        Self::from_provider(&**DEFAULT_PROVIDER, service)
    }
}

impl ServiceConfig for DataClientConfig {
    fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(ServiceError::configuration("Service name is required"));
        }

        if self.base_url.trim().is_empty() {
            return Err(ServiceError::configuration(format!(
                "Base URL for {} is required",
                self.service_name
            )));
        }

        Url::parse(&self.base_url).map_err(|e| {
            ServiceError::configuration(format!(
                "Invalid base URL for {}: {}",
                self.service_name, e
            ))
        })?;

        if self.timeout.is_zero() {
            return Err(ServiceError::configuration("Timeout must be greater than zero"));
        }

        if !(self.retry.backoff_factor >= 1.0) {
            return Err(ServiceError::configuration(format!(
                "Backoff factor must be at least 1.0, got {}",
                self.retry.backoff_factor
            )));
        }

        if self.retry.max_delay < self.retry.base_delay {
            return Err(ServiceError::configuration(
                "Max delay must not be shorter than the base delay",
            ));
        }

        if self.circuit_breaker.failure_threshold == 0 {
            return Err(ServiceError::configuration(
                "Failure threshold must be greater than zero",
            ));
        }

        Ok(())
    }

    fn service_name(&self) -> &str {
        &self.service_name
    }
}
