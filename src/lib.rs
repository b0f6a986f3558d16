//! # runfeed
//!
//! Client-side plumbing for services that expose long-running work as a
//! resumable event stream.
//!
//! ## Features
//!
//! - **Uniform Envelopes**: every single-shot call resolves to an
//!   [`Envelope`] (`{success, data, error}`), whatever the server sent.
//! - **Session Handling**: bearer credentials from a [`SessionStore`], with
//!   refresh-then-logout on `401`.
//! - **Idempotent Mutations**: one [`IdempotencyKey`] per logical operation,
//!   reused across physical retries.
//! - **Resumable Streams**: a chunk-boundary independent frame parser, and a
//!   [`Supervisor`](stream::Supervisor) that reconnects with bounded
//!   exponential backoff, resuming after the last delivered `seq`.
//! - **Cooperative Cancellation**: hierarchical
//!   [`CancellationToken`](tokio_util::sync::CancellationToken)s; cancelling
//!   is never reported as an error.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use runfeed::{
//!     ApiClient, ClientConfig, IdempotencyKey, ReconnectConfig, RequestOptions,
//!     session::InMemorySession,
//! };
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder("https://api.example.com")
//!         .api_prefix("/api/v1")
//!         .client_name("desktop")
//!         .build()?;
//!     let session = Arc::new(InMemorySession::with_token("token"));
//!     let client = ApiClient::new(config, session)?;
//!
//!     let options = RequestOptions::new(http::Method::POST)
//!         .body(json!({"prompt": "hello"}))
//!         .idempotency_key(IdempotencyKey::new());
//!     let created = client
//!         .request_with_retry::<Value>("/runs", options, &ReconnectConfig::default())
//!         .await;
//!     if let Some(error) = created.error {
//!         eprintln!("{error}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod idempotency;
pub(crate) mod reconnect;
pub mod session;
pub mod stream;

// Re-export commonly used types
pub use client::{ApiClient, ClientMetrics, RequestOptions};
pub use config::{ClientConfig, ClientConfigBuilder, ReconnectConfig};
pub use envelope::{ApiError, Envelope};
pub use error::{ErrorCode, TransportError, TransportResult};
pub use idempotency::{IDEMPOTENCY_KEY_HEADER, IdempotencyKey};
pub use session::{InMemorySession, NoSession, SessionStore};
pub use stream::{
    EventHandler, EventSource, StreamEvent, SubscriptionReport, SubscriptionStatus, Supervisor,
    TerminalKinds,
};
