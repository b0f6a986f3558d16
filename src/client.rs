//! Request client built on reqwest.
//!
//! [`ApiClient`] performs single-shot calls that always resolve to an
//! [`Envelope`], opens streaming connections for the event-stream pipeline,
//! and offers an idempotent retry helper for mutating calls.

use std::{
    collections::VecDeque,
    fmt,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant, SystemTime},
};

use async_trait::async_trait;
use futures_util::StreamExt;
use http::{
    Method, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL},
};
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    config::{ClientConfig, ReconnectConfig},
    envelope::{self, Envelope},
    error::{ErrorCode, TransportError, TransportResult},
    idempotency::{IDEMPOTENCY_KEY_HEADER, IdempotencyKey},
    reconnect::calculate_backoff,
    session::{SessionStore, bearer},
    stream::{
        EventSource, Supervisor,
        source::{ByteStream, stream_url},
    },
};

/// Header carrying the configured client name.
pub const CLIENT_HEADER: &str = "X-Client";
/// Header carrying the configured client id.
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

const JSON: &str = "application/json";
const EVENT_STREAM: &str = "text/event-stream";

// ---------------------------------------------------------------------------
// RequestOptions
// ---------------------------------------------------------------------------

/// Per-call options for [`ApiClient::request`].
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method. Defaults to `GET`.
    pub method: Method,
    /// JSON body; sets `Content-Type: application/json` when present.
    pub body: Option<Value>,
    /// Extra headers for this call only.
    pub headers: Vec<(String, String)>,
    /// Attach the session's bearer token. Defaults to `true`.
    pub auth_required: bool,
    /// Sent as `Idempotency-Key` on every physical attempt.
    pub idempotency_key: Option<IdempotencyKey>,
    /// Payload reported for `204 No Content` and empty 2xx bodies.
    pub default_payload: Option<Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
            headers: Vec::new(),
            auth_required: true,
            idempotency_key: None,
            default_payload: None,
        }
    }
}

impl RequestOptions {
    /// Options for a request with the given method.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    /// Set the JSON body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Whether to attach the bearer token.
    pub fn auth_required(mut self, required: bool) -> Self {
        self.auth_required = required;
        self
    }

    /// Attach an idempotency key.
    pub fn idempotency_key(mut self, key: IdempotencyKey) -> Self {
        self.idempotency_key = Some(key);
        self
    }

    /// Payload to report when the server answers without content.
    pub fn default_payload(mut self, payload: Value) -> Self {
        self.default_payload = Some(payload);
        self
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Request client metrics. Streaming connections are not counted.
#[derive(Debug)]
pub struct ClientMetrics {
    pub requests_sent: AtomicU64,
    pub requests_succeeded: AtomicU64,
    pub requests_failed: AtomicU64,
    response_times: RwLock<VecDeque<Duration>>,
    pub last_error_at: RwLock<Option<SystemTime>>,
}

impl ClientMetrics {
    fn new() -> Self {
        Self {
            requests_sent: AtomicU64::new(0),
            requests_succeeded: AtomicU64::new(0),
            requests_failed: AtomicU64::new(0),
            response_times: RwLock::new(VecDeque::with_capacity(1000)),
            last_error_at: RwLock::new(None),
        }
    }

    fn record(&self, success: bool, duration: Duration) {
        if success {
            self.requests_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.requests_failed.fetch_add(1, Ordering::Relaxed);
            *self.last_error_at.write() = Some(SystemTime::now());
        }
        if let Some(mut times) = self.response_times.try_write() {
            if times.len() >= 1000 {
                times.pop_front();
            }
            times.push_back(duration);
        }
    }

    /// Average duration over the most recent requests.
    pub fn avg_response_time(&self) -> Duration {
        let times = self.response_times.read();
        if times.is_empty() {
            Duration::ZERO
        } else {
            let total: Duration = times.iter().sum();
            total / times.len() as u32
        }
    }

    /// Get the success rate.
    pub fn success_rate(&self) -> f64 {
        let total = self.requests_sent.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            self.requests_succeeded.load(Ordering::Relaxed) as f64 / total as f64
        }
    }
}

// ---------------------------------------------------------------------------
// ApiClient
// ---------------------------------------------------------------------------

/// Envelope-normalizing request client and event source.
///
/// Cheap to clone; clones share connection pools, the session store and
/// metrics.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    session: Arc<dyn SessionStore>,
    http: reqwest::Client,
    streaming: reqwest::Client,
    metrics: Arc<ClientMetrics>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("session", &self.session)
            .finish()
    }
}

impl ApiClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid or the HTTP
    /// clients cannot be built.
    pub fn new(config: ClientConfig, session: Arc<dyn SessionStore>) -> TransportResult<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TransportError::config(format!("Failed to build client: {e}")))?;

        // Streams may stay open for the length of a run: no total timeout.
        let streaming = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                TransportError::config(format!("Failed to build streaming client: {e}"))
            })?;

        Ok(Self {
            config: Arc::new(config),
            session,
            http,
            streaming,
            metrics: Arc::new(ClientMetrics::new()),
        })
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get client metrics.
    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    /// The session store this client reports to.
    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// A reconnecting supervisor streaming through this client.
    pub fn supervisor(&self, config: ReconnectConfig) -> Supervisor<ApiClient> {
        Supervisor::new(self.clone(), config)
    }

    /// Perform a single-shot call.
    ///
    /// Never fails: transport errors, non-2xx statuses and shape mismatches
    /// are all reported through the returned envelope. On `401` (or an
    /// `UNAUTHORIZED` envelope) the session is refreshed and the call retried
    /// once; if that is not possible the session is logged out, at most once
    /// per call and only while authenticated.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Envelope<T> {
        self.execute(path, &options).await.into_typed()
    }

    /// Send a GET request.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Envelope<T> {
        self.request(path, RequestOptions::new(Method::GET)).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Envelope<T> {
        self.request_with_body(Method::POST, path, body).await
    }

    /// Send a PUT request with a JSON body.
    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Envelope<T> {
        self.request_with_body(Method::PUT, path, body).await
    }

    /// Send a DELETE request.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Envelope<T> {
        self.request(path, RequestOptions::new(Method::DELETE)).await
    }

    async fn request_with_body<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Envelope<T> {
        match serde_json::to_value(body) {
            Ok(body) => self.request(path, RequestOptions::new(method).body(body)).await,
            Err(e) => Envelope::failure(
                ErrorCode::InvalidFormat,
                format!("Failed to serialize request body: {e}"),
            ),
        }
    }

    /// Perform a mutating call that is safe to retry.
    ///
    /// One [`IdempotencyKey`] (the caller's, or a fresh one) is attached to
    /// every physical attempt. Only `NETWORK_ERROR` outcomes are retried,
    /// with the same backoff as stream reconnects and within
    /// `policy`'s attempt budget.
    pub async fn request_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        mut options: RequestOptions,
        policy: &ReconnectConfig,
    ) -> Envelope<T> {
        let key = options
            .idempotency_key
            .get_or_insert_with(IdempotencyKey::new)
            .clone();
        let budget = policy.attempt_budget();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let envelope = self.execute(path, &options).await;
            let retryable = envelope.error_code() == Some(&ErrorCode::NetworkError);
            if !retryable || attempt >= budget {
                return envelope.into_typed();
            }

            let delay = calculate_backoff(policy, attempt);
            warn!(
                path,
                attempt,
                idempotency_key = %key,
                "Request failed with network error, retrying in {:?}",
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn execute(&self, path: &str, options: &RequestOptions) -> Envelope<Value> {
        let url = self.config.url_for(path);
        debug!(method = %options.method, url = %url, "Sending request");

        let (status, envelope) = self.send_once(&url, options).await;
        if !is_unauthorized(status, &envelope) {
            return envelope;
        }

        if options.auth_required && self.session.refresh().await {
            info!(url = %url, "Session refreshed, retrying request");
            let (status, retried) = self.send_once(&url, options).await;
            if !is_unauthorized(status, &retried) {
                return retried;
            }
            self.invalidate_session(&url);
            return retried;
        }

        self.invalidate_session(&url);
        envelope
    }

    async fn send_once(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> (Option<StatusCode>, Envelope<Value>) {
        self.metrics.requests_sent.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();

        let mut builder = self
            .http
            .request(options.method.clone(), url)
            .header(ACCEPT, JSON);
        builder = self.with_client_headers(builder, options.auth_required);
        if let Some(key) = &options.idempotency_key {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, key.as_str());
        }
        for (name, value) in &options.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &options.body {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record(false, started.elapsed());
                if e.is_builder() {
                    warn!(url, error = %e, "Invalid request");
                    return (
                        None,
                        Envelope::failure(ErrorCode::Unknown, format!("Invalid request: {e}")),
                    );
                }
                warn!(url, error = %e, "Request failed before a response");
                return (None, envelope::network_failure(e.to_string()));
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                self.metrics.record(false, started.elapsed());
                warn!(url, %status, error = %e, "Failed to read response body");
                return (Some(status), envelope::network_failure(e.to_string()));
            }
        };

        let envelope = envelope::decode(status, &body, options.default_payload.clone());
        self.metrics.record(envelope.success, started.elapsed());
        debug!(url, %status, success = envelope.success, "Request completed");
        (Some(status), envelope)
    }

    fn with_client_headers(
        &self,
        mut builder: reqwest::RequestBuilder,
        auth_required: bool,
    ) -> reqwest::RequestBuilder {
        for (name, value) in &self.config.default_headers {
            builder = builder.header(name, value);
        }
        if let Some(name) = &self.config.client_name {
            builder = builder.header(CLIENT_HEADER, name);
        }
        if let Some(id) = &self.config.client_id {
            builder = builder.header(CLIENT_ID_HEADER, id);
        }
        if auth_required && let Some(token) = self.session.token() {
            builder = builder.header(AUTHORIZATION, bearer(&token));
        }
        builder
    }

    fn invalidate_session(&self, url: &str) {
        if self.session.is_authenticated() {
            warn!(url, "Credentials rejected, logging out");
            self.session.logout();
        }
    }

    async fn open_stream(&self, url: &Url) -> TransportResult<reqwest::Response> {
        let builder = self
            .streaming
            .get(url.clone())
            .header(ACCEPT, EVENT_STREAM)
            .header(CACHE_CONTROL, "no-cache");
        Ok(self.with_client_headers(builder, true).send().await?)
    }
}

fn is_unauthorized(status: Option<StatusCode>, envelope: &Envelope<Value>) -> bool {
    status == Some(StatusCode::UNAUTHORIZED) || envelope.is_unauthorized()
}

#[async_trait]
impl EventSource for ApiClient {
    async fn open(&self, resource: &str, after_seq: Option<u64>) -> TransportResult<ByteStream> {
        let resource_url = Url::parse(&self.config.url_for(resource))
            .map_err(|e| TransportError::config(format!("Invalid stream URL: {e}")))?;
        let url = stream_url(resource_url, after_seq)?;
        debug!(url = %url, "Opening event stream");

        let mut response = self.open_stream(&url).await?;
        if response.status() == StatusCode::UNAUTHORIZED && self.session.refresh().await {
            info!(url = %url, "Session refreshed, reopening event stream");
            response = self.open_stream(&url).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                self.invalidate_session(url.as_str());
            }
            return Err(TransportError::status(status, body));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::stream(e.to_string())))
            .boxed())
    }
}
