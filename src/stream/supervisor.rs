//! Reconnecting subscription driver.
//!
//! The [`Supervisor`] repeatedly runs a [`StreamConsumer`] attempt against an
//! [`EventSource`], resuming from the cursor after each failure. Every attempt
//! runs under a child of the subscription's cancellation token, so cancelling
//! the subscription stops the in-flight attempt and any pending backoff, while
//! an attempt ending never touches the parent.
//!
//! Delivery is at-least-once: the cursor advances only after the handler has
//! returned from an event, so an event interrupted mid-delivery is re-requested
//! on reconnect. Events at or before the cursor are delivered as-is; handlers
//! that need exactly-once behaviour dedupe on `seq` themselves.

use std::{
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures_core::Stream;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use super::{
    consumer::{AttemptOutcome, EventHandler, StreamConsumer},
    event::StreamEvent,
    source::EventSource,
};
use crate::{
    config::ReconnectConfig,
    error::{TransportError, TransportResult},
    reconnect::calculate_backoff,
};

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Highest sequence number fully delivered to the handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    last_seq: Option<u64>,
}

impl Cursor {
    /// Start from `last_seq` (`None` streams from the beginning).
    pub fn new(last_seq: Option<u64>) -> Self {
        Self { last_seq }
    }

    /// The current position.
    pub fn last_seq(&self) -> Option<u64> {
        self.last_seq
    }

    /// Move forward to `seq`. The cursor never moves backwards.
    pub fn advance(&mut self, seq: u64) {
        if self.last_seq.is_none_or(|last| seq > last) {
            self.last_seq = Some(seq);
        }
    }

    /// Returns true if `seq` was already covered by the cursor.
    pub fn covers(&self, seq: u64) -> bool {
        self.last_seq.is_some_and(|last| seq <= last)
    }
}

/// Wraps the user handler so that the cursor moves only after delivery.
struct CursorTracking<'a, H: ?Sized> {
    inner: &'a mut H,
    cursor: &'a mut Cursor,
}

#[async_trait]
impl<'a, H> EventHandler for CursorTracking<'a, H>
where
    H: EventHandler + ?Sized,
{
    async fn on_event(&mut self, event: StreamEvent) {
        let seq = event.seq;
        if let Some(seq) = seq
            && self.cursor.covers(seq)
        {
            debug!(seq, last_seq = ?self.cursor.last_seq(), "Re-delivering event at or before cursor");
        }
        self.inner.on_event(event).await;
        if let Some(seq) = seq {
            self.cursor.advance(seq);
        }
    }
}

// ---------------------------------------------------------------------------
// RetryState / reports
// ---------------------------------------------------------------------------

/// Attempt bookkeeping for one subscription.
///
/// The counter is never reset by a successful connection, so the budget
/// bounds the total number of connects for the subscription's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Attempts started so far.
    pub attempt: u32,
    /// Attempt budget.
    pub max_attempts: u32,
}

impl RetryState {
    /// A fresh state with the given budget.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
        }
    }

    /// Returns true once the budget is spent.
    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// How a subscription ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    /// The stream ended or a terminal event was delivered.
    Completed {
        /// The terminal kind, if completion came from an event.
        terminal_kind: Option<String>,
    },
    /// The subscription was cancelled by its owner.
    Cancelled,
}

/// Summary of a finished subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionReport {
    /// Final status.
    pub status: SubscriptionStatus,
    /// Cursor at exit.
    pub last_seq: Option<u64>,
    /// Connection attempts made.
    pub attempts: u32,
}

impl SubscriptionReport {
    /// Returns true if the subscription completed (not cancelled).
    pub fn is_completed(&self) -> bool {
        matches!(self.status, SubscriptionStatus::Completed { .. })
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Drives reconnecting subscriptions over an [`EventSource`].
///
/// A supervisor is cheap to share; each [`subscribe`](Supervisor::subscribe)
/// call is an independent subscription with its own cursor and budget.
#[derive(Debug, Clone)]
pub struct Supervisor<S> {
    source: S,
    config: ReconnectConfig,
}

impl<S> Supervisor<S>
where
    S: EventSource,
{
    /// Create a supervisor.
    pub fn new(source: S, config: ReconnectConfig) -> Self {
        Self { source, config }
    }

    /// The reconnect configuration.
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Access the event source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run a subscription to `resource` until it completes, is cancelled, or
    /// runs out of attempts.
    ///
    /// `initial_cursor` is the last sequence number the caller already holds.
    ///
    /// # Errors
    ///
    /// A configuration error for an invalid [`ReconnectConfig`], or
    /// [`TransportError::RetriesExhausted`] wrapping the last attempt's error
    /// once the budget is spent, or the attempt's error directly when it is an
    /// authentication failure (reconnecting cannot fix it). Cancellation is
    /// never an error.
    pub async fn subscribe<H>(
        &self,
        resource: &str,
        initial_cursor: Option<u64>,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> TransportResult<SubscriptionReport>
    where
        H: EventHandler + ?Sized,
    {
        self.config.validate().map_err(TransportError::config)?;

        let consumer = StreamConsumer::new(&self.source, &self.config.terminal_kinds);
        let mut cursor = Cursor::new(initial_cursor);
        let mut retry = RetryState::new(self.config.attempt_budget());

        let report = |status, cursor: &Cursor, retry: &RetryState| SubscriptionReport {
            status,
            last_seq: cursor.last_seq(),
            attempts: retry.attempt,
        };

        loop {
            if cancel.is_cancelled() {
                info!(resource, "Subscription cancelled");
                return Ok(report(SubscriptionStatus::Cancelled, &cursor, &retry));
            }

            retry.attempt += 1;
            let after_seq = cursor.last_seq();
            info!(
                resource,
                attempt = retry.attempt,
                max_attempts = retry.max_attempts,
                ?after_seq,
                "Connecting event stream"
            );

            let attempt_token = cancel.child_token();
            let result = {
                let mut tracking = CursorTracking {
                    inner: &mut *handler,
                    cursor: &mut cursor,
                };
                consumer
                    .run(resource, after_seq, &mut tracking, &attempt_token)
                    .await
            };
            attempt_token.cancel();

            if cancel.is_cancelled() {
                info!(resource, last_seq = ?cursor.last_seq(), "Subscription cancelled");
                return Ok(report(SubscriptionStatus::Cancelled, &cursor, &retry));
            }

            let err = match result {
                Ok(AttemptOutcome::Ended) => {
                    return Ok(report(
                        SubscriptionStatus::Completed {
                            terminal_kind: None,
                        },
                        &cursor,
                        &retry,
                    ));
                }
                Ok(AttemptOutcome::Terminal { kind }) => {
                    return Ok(report(
                        SubscriptionStatus::Completed {
                            terminal_kind: Some(kind),
                        },
                        &cursor,
                        &retry,
                    ));
                }
                Ok(AttemptOutcome::Cancelled) => {
                    TransportError::stream("attempt cancelled before completion")
                }
                Err(err) => err,
            };

            if err.code().is_unauthorized() {
                error!(resource, error = %err, "Event stream rejected credentials");
                return Err(err);
            }

            if retry.exhausted() {
                error!(
                    resource,
                    attempts = retry.attempt,
                    error = %err,
                    "Event stream retries exhausted"
                );
                return Err(TransportError::RetriesExhausted {
                    attempts: retry.attempt,
                    last_seq: cursor.last_seq(),
                    source: Box::new(err),
                });
            }

            let delay = calculate_backoff(&self.config, retry.attempt);
            warn!(
                resource,
                attempt = retry.attempt,
                error = %err,
                "Event stream attempt failed, reconnecting in {:?}",
                delay
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(resource, "Subscription cancelled during backoff");
                    return Ok(report(SubscriptionStatus::Cancelled, &cursor, &retry));
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl<S> Supervisor<S>
where
    S: EventSource + Clone + 'static,
{
    /// Spawn a subscription on the runtime and receive its events over a
    /// channel.
    ///
    /// The channel holds [`ReconnectConfig::event_channel_capacity`] events;
    /// when it is full the subscription stops reading until the receiver
    /// catches up. The subscription runs under a child of `parent` and stops
    /// when the [`SubscriptionHandle`] or the [`EventReceiver`] is dropped.
    pub fn spawn(
        &self,
        resource: impl Into<String>,
        initial_cursor: Option<u64>,
        parent: &CancellationToken,
    ) -> (SubscriptionHandle, EventReceiver) {
        let (tx, rx) = mpsc::channel(self.config.event_channel_capacity.max(1));
        let cancel = parent.child_token();
        let supervisor = Supervisor::new(self.source.clone(), self.config.clone());
        let resource = resource.into();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let mut forward = ChannelForward {
                tx,
                cancel: task_cancel.clone(),
            };
            supervisor
                .subscribe(&resource, initial_cursor, &mut forward, &task_cancel)
                .await
        });

        (
            SubscriptionHandle {
                guard: cancel.clone().drop_guard(),
                cancel,
                task,
            },
            EventReceiver { rx },
        )
    }
}

/// Forwards events into a spawned subscription's channel.
struct ChannelForward {
    tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

#[async_trait]
impl EventHandler for ChannelForward {
    async fn on_event(&mut self, event: StreamEvent) {
        if self.tx.send(event).await.is_err() {
            debug!("Event receiver dropped, stopping subscription");
            self.cancel.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// SubscriptionHandle / EventReceiver
// ---------------------------------------------------------------------------

/// Control half of a spawned subscription.
///
/// Dropping the handle cancels the subscription.
#[derive(Debug)]
pub struct SubscriptionHandle {
    cancel: CancellationToken,
    task: JoinHandle<TransportResult<SubscriptionReport>>,
    guard: DropGuard,
}

impl SubscriptionHandle {
    /// Stop the subscription. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns true if the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// The subscription's own cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for the subscription to finish.
    ///
    /// # Errors
    ///
    /// The subscription's error, or a stream error if the task panicked.
    pub async fn join(self) -> TransportResult<SubscriptionReport> {
        let Self { task, guard, .. } = self;
        let result = task.await;
        // Finished on its own; leave the token as it is.
        drop(guard.disarm());
        result.map_err(|e| TransportError::stream(format!("subscription task failed: {e}")))?
    }
}

/// Event half of a spawned subscription.
///
/// Ends once the subscription finishes and all buffered events are read.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::Receiver<StreamEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    pub async fn recv(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

impl Stream for EventReceiver {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Arc, time::Duration};

    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::{StreamExt, stream};
    use parking_lot::Mutex;

    use super::*;
    use crate::stream::source::ByteStream;

    enum Script {
        Fail(TransportError),
        Body(Vec<TransportResult<Bytes>>),
        Hang(Vec<TransportResult<Bytes>>),
    }

    #[derive(Default)]
    struct Scripted {
        scripts: Mutex<VecDeque<Script>>,
        opens: Mutex<Vec<Option<u64>>>,
    }

    impl Scripted {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
                opens: Mutex::default(),
            })
        }

        fn opens(&self) -> Vec<Option<u64>> {
            self.opens.lock().clone()
        }
    }

    #[async_trait]
    impl EventSource for Scripted {
        async fn open(
            &self,
            _resource: &str,
            after_seq: Option<u64>,
        ) -> TransportResult<ByteStream> {
            self.opens.lock().push(after_seq);
            let next = self.scripts.lock().pop_front();
            match next {
                Some(Script::Fail(err)) => Err(err),
                Some(Script::Body(chunks)) => Ok(stream::iter(chunks).boxed()),
                Some(Script::Hang(chunks)) => {
                    Ok(stream::iter(chunks).chain(stream::pending()).boxed())
                }
                None => Err(TransportError::network("connection refused")),
            }
        }
    }

    fn events(seqs: &[u64]) -> TransportResult<Bytes> {
        let mut body = String::new();
        for seq in seqs {
            body.push_str(&format!("data: {{\"seq\":{seq}}}\n\n"));
        }
        Ok(Bytes::from(body))
    }

    fn config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig::default().max_attempts(max_attempts)
    }

    #[test]
    fn test_cursor_never_moves_backwards() {
        let mut cursor = Cursor::new(Some(5));
        cursor.advance(3);
        assert_eq!(cursor.last_seq(), Some(5));
        cursor.advance(8);
        assert_eq!(cursor.last_seq(), Some(8));
        assert!(cursor.covers(8));
        assert!(!cursor.covers(9));

        let mut fresh = Cursor::default();
        assert!(!fresh.covers(0));
        fresh.advance(0);
        assert_eq!(fresh.last_seq(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn resumes_from_initial_cursor_until_terminal() {
        let source = Scripted::new(vec![Script::Body(vec![
            events(&[6, 7, 8]),
            Ok(Bytes::from_static(
                b"event: run_completed\ndata: {\"seq\":9}\n\n",
            )),
        ])]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(5));

        let mut seen = Vec::new();
        let report = supervisor
            .subscribe(
                "/runs/r1",
                Some(5),
                &mut |e: StreamEvent| seen.push((e.seq, e.kind)),
                &CancellationToken::new(),
            )
            .await
            .expect("subscription");

        assert_eq!(
            seen.iter().map(|(s, _)| *s).collect::<Vec<_>>(),
            vec![Some(6), Some(7), Some(8), Some(9)]
        );
        assert_eq!(seen[3].1, "run_completed");
        assert_eq!(report.last_seq, Some(9));
        assert_eq!(report.attempts, 1);
        assert_eq!(
            report.status,
            SubscriptionStatus::Completed {
                terminal_kind: Some("run_completed".into())
            }
        );
        assert_eq!(source.opens(), vec![Some(5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_drop_with_cursor() {
        let source = Scripted::new(vec![
            Script::Body(vec![
                events(&[1, 2, 3]),
                Err(TransportError::stream("connection reset")),
            ]),
            Script::Body(vec![events(&[4])]),
        ]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(5));

        let mut seen = Vec::new();
        let report = supervisor
            .subscribe(
                "/runs/r1",
                None,
                &mut |e: StreamEvent| seen.push(e.seq),
                &CancellationToken::new(),
            )
            .await
            .expect("subscription");

        assert_eq!(seen, vec![Some(1), Some(2), Some(3), Some(4)]);
        assert_eq!(source.opens(), vec![None, Some(3)]);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.last_seq, Some(4));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicates_are_delivered_as_is() {
        let source = Scripted::new(vec![
            Script::Body(vec![events(&[1, 2]), Err(TransportError::stream("reset"))]),
            Script::Body(vec![events(&[2, 3])]),
        ]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(5));

        let mut seen = Vec::new();
        let report = supervisor
            .subscribe("/r", None, &mut |e: StreamEvent| seen.push(e.seq), &CancellationToken::new())
            .await
            .expect("subscription");

        assert_eq!(seen, vec![Some(1), Some(2), Some(2), Some(3)]);
        assert_eq!(report.last_seq, Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_utf8_frame_does_not_stall_the_subscription() {
        let source = Scripted::new(vec![Script::Body(vec![
            events(&[1]),
            Ok(Bytes::from_static(b"event: step\ndata: {\"seq\":\xFF}\n\n")),
            events(&[2]),
            Ok(Bytes::from_static(b"event: done\ndata: {\"seq\":3}\n\n")),
        ])]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(3));

        let mut seen = Vec::new();
        let report = supervisor
            .subscribe("/r", None, &mut |e: StreamEvent| seen.push(e.seq), &CancellationToken::new())
            .await
            .expect("subscription");

        assert_eq!(seen, vec![Some(1), Some(2), Some(3)]);
        assert_eq!(source.opens(), vec![None]);
        assert_eq!(report.attempts, 1);
        assert_eq!(
            report.status,
            SubscriptionStatus::Completed {
                terminal_kind: Some("done".into())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn attempt_budget_is_honoured() {
        let source = Scripted::new(vec![]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(3));

        let started = tokio::time::Instant::now();
        let err = supervisor
            .subscribe("/r", Some(2), &mut |_e: StreamEvent| {}, &CancellationToken::new())
            .await
            .expect_err("budget spent");

        match err {
            TransportError::RetriesExhausted {
                attempts,
                last_seq,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_seq, Some(2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(source.opens().len(), 3);
        // Two backoffs: 800ms and 1600ms plus jitter.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(2400), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(2400 + 2 * 240), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn clamped_budget_allows_at_least_one_attempt() {
        let source = Scripted::new(vec![]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(0));

        let err = supervisor
            .subscribe("/r", None, &mut |_e: StreamEvent| {}, &CancellationToken::new())
            .await
            .expect_err("budget spent");
        assert!(matches!(
            err,
            TransportError::RetriesExhausted { attempts: 1, .. }
        ));
        assert_eq!(source.opens().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_is_not_retried() {
        let source = Scripted::new(vec![Script::Fail(TransportError::status(
            http::StatusCode::UNAUTHORIZED,
            "",
        ))]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(5));

        let err = supervisor
            .subscribe("/r", None, &mut |_e: StreamEvent| {}, &CancellationToken::new())
            .await
            .expect_err("unauthorized");
        assert!(err.code().is_unauthorized());
        assert_eq!(source.opens().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_streaming_is_quiet() {
        let source = Scripted::new(vec![Script::Hang(vec![events(&[1])])]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(5));
        let parent = CancellationToken::new();

        let (handle, mut rx) = supervisor.spawn("/r", None, &parent);
        let first = rx.recv().await.expect("first event");
        assert_eq!(first.seq, Some(1));

        parent.cancel();
        assert!(handle.is_cancelled());
        let report = handle.join().await.expect("no error");
        assert_eq!(report.status, SubscriptionStatus::Cancelled);
        assert_eq!(report.last_seq, Some(1));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_is_quiet() {
        let source = Scripted::new(vec![]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(50));

        let (handle, _rx) = supervisor.spawn("/r", None, &CancellationToken::new());
        while source.opens().is_empty() {
            tokio::task::yield_now().await;
        }
        handle.cancel();

        let report = handle.join().await.expect("no error");
        assert_eq!(report.status, SubscriptionStatus::Cancelled);
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_channel_is_bounded_and_ordered() {
        let source = Scripted::new(vec![Script::Hang(vec![events(&[1, 2, 3, 4, 5])])]);
        let supervisor = Supervisor::new(
            Arc::clone(&source),
            config(5).event_channel_capacity(1),
        );

        let (handle, mut rx) = supervisor.spawn("/r", None, &CancellationToken::new());
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        // One buffered event; the rest wait for the reader.
        assert_eq!(rx.rx.len(), 1);

        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(rx.recv().await.expect("event").seq);
        }
        assert_eq!(seen, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);

        handle.cancel();
        let report = handle.join().await.expect("no error");
        assert_eq!(report.last_seq, Some(5));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_receiver_stops_the_subscription() {
        let source = Scripted::new(vec![Script::Hang(vec![events(&[1, 2])])]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(5));

        let (handle, rx) = supervisor.spawn("/r", None, &CancellationToken::new());
        drop(rx);

        let report = handle.join().await.expect("no error");
        assert_eq!(report.status, SubscriptionStatus::Cancelled);
        assert_eq!(report.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let source = Scripted::new(vec![Script::Hang(vec![events(&[1])])]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(5));
        let parent = CancellationToken::new();

        let (handle, mut rx) = supervisor.spawn("/r", None, &parent);
        assert_eq!(rx.recv().await.map(|e| e.seq), Some(Some(1)));

        let token = handle.token().clone();
        drop(handle);
        assert!(token.is_cancelled());
        assert!(!parent.is_cancelled());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn subscriptions_are_independent() {
        let source = Scripted::new(vec![
            Script::Hang(vec![events(&[1])]),
            Script::Hang(vec![events(&[10])]),
        ]);
        let supervisor = Supervisor::new(Arc::clone(&source), config(5));

        let (first, mut first_rx) = supervisor.spawn("/a", None, &CancellationToken::new());
        assert_eq!(first_rx.recv().await.map(|e| e.seq), Some(Some(1)));
        let (second, mut second_rx) = supervisor.spawn("/b", None, &CancellationToken::new());
        assert_eq!(second_rx.recv().await.map(|e| e.seq), Some(Some(10)));

        first.cancel();
        assert_eq!(
            first.join().await.expect("first").status,
            SubscriptionStatus::Cancelled
        );
        assert!(!second.is_cancelled());
        second.cancel();
        second.join().await.expect("second");
    }
}
