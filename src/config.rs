//! Client and reconnection configuration.

use std::{collections::HashMap, time::Duration};

use crate::{
    error::{TransportError, TransportResult},
    stream::TerminalKinds,
};

/// Environment variable that overrides the API base URL.
pub const API_BASE_URL_ENV: &str = "API_BASE_URL";

/// Lower bound for [`ReconnectConfig::max_attempts`].
pub const MIN_ATTEMPTS: u32 = 1;
/// Upper bound for [`ReconnectConfig::max_attempts`].
pub const MAX_ATTEMPTS: u32 = 50;

/// Configuration for the [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for all requests
    pub base_url: String,

    /// Path prefix inserted between the base URL and every request path
    /// (for example `/api/v1`).
    pub api_prefix: String,

    /// Total timeout for single-shot requests. Never applied to streams.
    pub timeout: Duration,

    /// Connection timeout, applied to both single-shot and streaming calls.
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Sent as `X-Client` when set.
    pub client_name: Option<String>,

    /// Sent as `X-Client-Id` when set.
    pub client_id: Option<String>,

    /// Default headers to include with all requests
    pub default_headers: HashMap<String, String>,
}

impl ClientConfig {
    /// Create a new client configuration with defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_prefix: String::new(),
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("runfeed/", env!("CARGO_PKG_VERSION")).to_string(),
            client_name: None,
            client_id: None,
            default_headers: HashMap::new(),
        }
    }

    /// Create a configuration from `API_BASE_URL`, falling back to `default_url`.
    pub fn from_env(default_url: impl Into<String>) -> Self {
        let base_url = std::env::var(API_BASE_URL_ENV)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default_url.into());
        Self::new(base_url)
    }

    /// Create a builder for the client configuration.
    pub fn builder(base_url: impl Into<String>) -> ClientConfigBuilder {
        ClientConfigBuilder::new(base_url)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> TransportResult<()> {
        if self.base_url.is_empty() {
            return Err(TransportError::config("Base URL cannot be empty"));
        }

        if self.timeout.is_zero() {
            return Err(TransportError::config("Timeout cannot be zero"));
        }

        if self.connect_timeout.is_zero() {
            return Err(TransportError::config("Connect timeout cannot be zero"));
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| TransportError::config(format!("Invalid base URL: {e}")))?;

        Ok(())
    }

    /// Resolve a request path against the base URL and prefix.
    ///
    /// Absolute `http(s)://` paths are returned unchanged.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let prefix = self.api_prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        let base = self.base_url.trim_end_matches('/');
        if prefix.is_empty() {
            format!("{base}/{path}")
        } else {
            format!("{base}/{prefix}/{path}")
        }
    }
}

/// Builder for [`ClientConfig`].
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: ClientConfig::new(base_url),
        }
    }

    /// Set the path prefix.
    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.api_prefix = prefix.into();
        self
    }

    /// Set the single-shot request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the `X-Client` header value.
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = Some(name.into());
        self
    }

    /// Set the `X-Client-Id` header value. Blank ids are ignored.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        let id = id.into().trim().to_string();
        if !id.is_empty() {
            self.config.client_id = Some(id);
        }
        self
    }

    /// Add a default header.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .insert(name.into(), value.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TransportResult<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Reconnection policy for a subscription.
///
/// The delay before reconnecting after attempt `n` is
/// `min(max_delay, initial_delay * 2^min(max_exponent, n))` plus a uniform
/// jitter in `[0, max_jitter)`.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// Base delay the exponential factor is applied to.
    pub initial_delay: Duration,
    /// Cap on the exponential part of the delay.
    pub max_delay: Duration,
    /// Cap on the exponent.
    pub max_exponent: u32,
    /// Upper bound (exclusive) of the random jitter.
    pub max_jitter: Duration,
    /// Total connection attempts allowed, clamped to `[1, 50]`.
    pub max_attempts: u32,
    /// Event kinds that end the subscription normally.
    pub terminal_kinds: TerminalKinds,
    /// Buffer size of the channel feeding a spawned subscription's receiver.
    pub event_channel_capacity: usize,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(400),
            max_delay: Duration::from_millis(8000),
            max_exponent: 5,
            max_jitter: Duration::from_millis(240),
            max_attempts: 5,
            terminal_kinds: TerminalKinds::default(),
            event_channel_capacity: 256,
        }
    }
}

impl ReconnectConfig {
    /// Create a configuration with the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of attempts (clamped to `[1, 50]`).
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.clamp(MIN_ATTEMPTS, MAX_ATTEMPTS);
        self
    }

    /// Set the base delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the delay cap.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter bound. `Duration::ZERO` disables jitter.
    #[must_use]
    pub fn max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Add a domain-specific terminal event kind.
    #[must_use]
    pub fn terminal_kind(mut self, kind: impl Into<String>) -> Self {
        self.terminal_kinds.insert(kind);
        self
    }

    /// Replace the terminal kinds entirely.
    #[must_use]
    pub fn terminal_kinds(mut self, kinds: TerminalKinds) -> Self {
        self.terminal_kinds = kinds;
        self
    }

    /// Set the event channel capacity used by spawned subscriptions.
    #[must_use]
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// The attempt budget after clamping.
    pub fn attempt_budget(&self) -> u32 {
        self.max_attempts.clamp(MIN_ATTEMPTS, MAX_ATTEMPTS)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.initial_delay.is_zero() {
            return Err("Initial reconnect delay must be > 0".to_string());
        }
        if self.max_delay < self.initial_delay {
            return Err("Max reconnect delay must be >= initial reconnect delay".to_string());
        }
        if self.max_exponent > 31 {
            return Err("Max exponent must be <= 31".to_string());
        }
        if self.event_channel_capacity == 0 {
            return Err("Event channel capacity must be > 0".to_string());
        }
        Ok(())
    }
}
