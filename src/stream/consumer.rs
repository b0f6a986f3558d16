//! Single-connection stream consumption.
//!
//! [`StreamConsumer`] opens one connection, drives the frame parser, decodes
//! frames into [`StreamEvent`]s and hands them to an [`EventHandler`] in wire
//! order. It keeps no cursor of its own; resumption bookkeeping belongs to the
//! [`Supervisor`](super::Supervisor).

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    event::{StreamEvent, TerminalKinds},
    parse::{FrameStream, FrameStreamError},
    source::EventSource,
};
use crate::error::TransportResult;

/// Receives decoded events in wire order.
///
/// Each call completes before the next frame is read, so a handler that
/// awaits (for example on a full channel) applies backpressure to the stream.
/// Plain `FnMut(StreamEvent)` closures implement this trait.
#[async_trait]
pub trait EventHandler: Send {
    /// Called once per delivered event.
    async fn on_event(&mut self, event: StreamEvent);
}

#[async_trait]
impl<F> EventHandler for F
where
    F: FnMut(StreamEvent) + Send,
{
    async fn on_event(&mut self, event: StreamEvent) {
        self(event)
    }
}

/// How a single connection attempt ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The server closed the stream.
    Ended,
    /// A terminal event was delivered.
    Terminal {
        /// Kind of the terminal event.
        kind: String,
    },
    /// The attempt's cancellation token fired.
    Cancelled,
}

/// Drives one streaming connection.
pub struct StreamConsumer<'a, S: ?Sized> {
    source: &'a S,
    terminal_kinds: &'a TerminalKinds,
}

impl<'a, S> StreamConsumer<'a, S>
where
    S: EventSource + ?Sized,
{
    /// Create a consumer over `source`.
    pub fn new(source: &'a S, terminal_kinds: &'a TerminalKinds) -> Self {
        Self {
            source,
            terminal_kinds,
        }
    }

    /// Run one attempt to completion.
    ///
    /// Cancellation is observed while connecting, while waiting for the next
    /// chunk, and before and during each delivery; once `cancel` fires the
    /// handler is not invoked again.
    ///
    /// # Errors
    ///
    /// A failed open (transport failure or non-2xx status) or a fault while
    /// reading. Frames with invalid UTF-8 or a non-JSON payload are dropped,
    /// not fatal.
    pub async fn run<H>(
        &self,
        resource: &str,
        after_seq: Option<u64>,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> TransportResult<AttemptOutcome>
    where
        H: EventHandler + ?Sized,
    {
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(AttemptOutcome::Cancelled),
            opened = self.source.open(resource, after_seq) => opened,
        };
        let mut frames = FrameStream::new(opened?);
        info!(resource, ?after_seq, "Event stream connected");

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(AttemptOutcome::Cancelled),
                next = frames.next() => next,
            };

            let frame = match next {
                None => {
                    info!(resource, "Event stream ended by server");
                    return Ok(AttemptOutcome::Ended);
                }
                Some(Err(FrameStreamError::Utf8Error(err))) => {
                    debug!(resource, error = %err, "Dropping frame with invalid UTF-8");
                    continue;
                }
                Some(Err(FrameStreamError::Transport(err))) => {
                    warn!(resource, error = %err, "Event stream read failed");
                    return Err(err);
                }
                Some(Ok(frame)) => frame,
            };

            let event = match StreamEvent::decode(frame) {
                Ok(event) => event,
                Err(err) => {
                    debug!(resource, error = %err, "Dropping undecodable frame");
                    continue;
                }
            };

            debug!(resource, kind = %event.kind, seq = ?event.seq, "Event received");
            let terminal = self.terminal_kinds.is_terminal(&event);
            let kind = terminal.then(|| event.kind.clone());
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(AttemptOutcome::Cancelled),
                _ = handler.on_event(event) => {}
            }

            if let Some(kind) = kind {
                info!(resource, kind = %kind, "Terminal event received");
                return Ok(AttemptOutcome::Terminal { kind });
            }
        }
    }
}
