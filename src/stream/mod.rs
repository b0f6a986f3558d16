//! Resumable event streams.
//!
//! This module provides:
//!
//! - **Frame Parsing**: [`FrameParser`]/[`FrameStream`] split chunked bytes
//!   into `event:`/`data:` frames regardless of chunk boundaries.
//! - **Event Decoding**: [`StreamEvent`] pulls `seq`, kind and timestamp out
//!   of each frame's JSON payload.
//! - **Consumption**: [`StreamConsumer`] drives one connection and delivers
//!   events in wire order to an [`EventHandler`].
//! - **Reconnection**: [`Supervisor`] reconnects with exponential backoff and
//!   jitter, resuming from the last delivered `seq` via `afterSeq`.
//!
//! # Architecture
//!
//! ```text
//! Supervisor::subscribe(resource, cursor, handler, cancel)
//!   └─ loop per attempt (child token of `cancel`)
//!        │
//!        ├── EventSource::open(resource, afterSeq) ──► ByteStream
//!        ├── FrameStream ──► StreamEvent::decode ──► handler ──► cursor
//!        │
//!        └── on failure: backoff sleep (cancellable), then reconnect
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use runfeed::{
//!     ApiClient, ClientConfig, ReconnectConfig, session::NoSession,
//!     stream::{StreamEvent, Supervisor},
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfig::new("http://localhost:8080"), Arc::new(NoSession))?;
//! let supervisor = Supervisor::new(client, ReconnectConfig::default().max_attempts(10));
//!
//! let cancel = CancellationToken::new();
//! let report = supervisor
//!     .subscribe(
//!         "/runs/run-1",
//!         None,
//!         &mut |event: StreamEvent| println!("{} {:?}", event.kind, event.seq),
//!         &cancel,
//!     )
//!     .await?;
//! println!("finished at seq {:?}", report.last_seq);
//! # Ok(())
//! # }
//! ```

pub mod consumer;
pub mod event;
pub mod parse;
pub mod source;
pub mod supervisor;

pub use consumer::{AttemptOutcome, EventHandler, StreamConsumer};
pub use event::{StreamEvent, TerminalKinds};
pub use parse::{Frame, FrameParser, FrameStream, FrameStreamError};
pub use source::{ByteStream, EventSource, stream_url};
pub use supervisor::{
    Cursor, EventReceiver, RetryState, SubscriptionHandle, SubscriptionReport, SubscriptionStatus,
    Supervisor,
};
