use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::events::{EventContext, EventHandler, HandlerResult, StreamEnvelope, StreamEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("stream failed to connect: {0}")]
    Connect(String),
    #[error("stream read failed: {0}")]
    Receive(String),
    #[error("stream disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 1_000, max_delay_ms: 60_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_envelope(&self) -> Result<Option<StreamEnvelope>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Pumps the mention stream and handles each envelope on its own task, so a
/// slow quote never holds up the next mention.
pub struct StreamRunner {
    transport: Arc<dyn StreamTransport>,
    handler: Arc<dyn EventHandler>,
    reconnect_policy: ReconnectPolicy,
}

impl StreamRunner {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        handler: Arc<dyn EventHandler>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, handler, reconnect_policy }
    }

    /// Keeps the stream open for the life of the process. A session that
    /// delivered anything (keep-alives included) resets the backoff, so only
    /// consecutive dead sessions count toward `max_retries`.
    pub async fn start(&self) -> Result<()> {
        let max_retries = self.reconnect_policy.max_retries;
        let mut attempt = 0;

        loop {
            let session = self.connect_and_pump(attempt).await;
            match &session.outcome {
                Ok(()) => info!(attempt, received = session.received, "mention stream closed"),
                Err(transport_error) => warn!(
                    attempt,
                    max_retries,
                    received = session.received,
                    error = %transport_error,
                    "mention stream transport failed"
                ),
            }

            if session.received {
                attempt = 0;
            } else if attempt >= max_retries {
                warn!(
                    max_retries,
                    "mention stream retries exhausted; continuing process without crash"
                );
                return Ok(());
            }

            let delay = self.reconnect_policy.backoff(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if !session.received {
                attempt += 1;
            }
        }
    }

    async fn connect_and_pump(&self, attempt: u32) -> Session {
        info!(attempt, "opening mention stream connection");
        if let Err(error) = self.transport.connect().await {
            return Session { received: false, outcome: Err(error) };
        }
        info!(attempt, "mention stream connected");

        let mut in_flight = JoinSet::new();
        let mut received = false;
        let outcome = self.pump(&mut in_flight, &mut received).await;

        // Dropping a JoinSet aborts its tasks; let in-flight replies finish.
        while let Some(joined) = in_flight.join_next().await {
            report_join(joined);
        }
        Session { received, outcome }
    }

    async fn pump(
        &self,
        in_flight: &mut JoinSet<()>,
        received: &mut bool,
    ) -> Result<(), TransportError> {
        loop {
            let Some(envelope) = self.transport.next_envelope().await? else {
                self.transport.disconnect().await?;
                return Ok(());
            };
            *received = true;

            while let Some(joined) = in_flight.try_join_next() {
                report_join(joined);
            }

            if matches!(envelope.event, StreamEvent::KeepAlive) {
                continue;
            }

            info!(
                event_name = "ingress.twitter.envelope_received",
                event_type = envelope.event.event_type(),
                correlation_id = %envelope.event_id,
                in_flight = in_flight.len(),
                "received stream envelope"
            );

            let handler = Arc::clone(&self.handler);
            in_flight.spawn(handle_envelope(handler, envelope));
        }
    }
}

/// How one connection ended, and whether the stream delivered anything first.
struct Session {
    received: bool,
    outcome: Result<(), TransportError>,
}

fn report_join(joined: Result<(), JoinError>) {
    if let Err(error) = joined {
        warn!(
            event_name = "ingress.twitter.handler_failed",
            panicked = error.is_panic(),
            error = %error,
            "mention task did not finish; no reply posted"
        );
    }
}

async fn handle_envelope(handler: Arc<dyn EventHandler>, envelope: StreamEnvelope) {
    let context = EventContext { correlation_id: envelope.event_id.clone() };
    match handler.handle(&envelope, &context).await {
        Ok(HandlerResult::Replied(reply)) => {
            info!(
                event_name = "egress.twitter.reply_posted",
                correlation_id = %context.correlation_id,
                reply = %reply,
                "reply posted"
            );
        }
        Ok(HandlerResult::Ignored) => {
            debug!(
                event_name = "ingress.twitter.envelope_ignored",
                correlation_id = %context.correlation_id,
                "envelope ignored"
            );
        }
        Err(error) => {
            warn!(
                event_name = "ingress.twitter.handler_failed",
                correlation_id = %context.correlation_id,
                error_kind = error.kind(),
                error = %error,
                "mention handling failed; no reply posted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use super::{ReconnectPolicy, StreamRunner, StreamTransport, TransportError};
    use crate::events::{
        EventContext, EventHandler, EventHandlerError, HandlerResult, MentionEvent,
        StreamEnvelope, StreamEvent,
    };
    use async_trait::async_trait;
    use shipbot_core::errors::{ApplicationError, IntegrationError};
    use tokio::sync::{Barrier, Mutex};

    /// Replays scripted connect and read results. Once the connect script
    /// runs out every further connect fails, which lets the runner give up.
    #[derive(Default)]
    struct ScriptedTransport {
        state: Mutex<ScriptedState>,
    }

    #[derive(Default)]
    struct ScriptedState {
        connect_results: VecDeque<Result<(), TransportError>>,
        envelopes: VecDeque<Result<Option<StreamEnvelope>, TransportError>>,
        connect_attempts: usize,
        disconnect_calls: usize,
    }

    impl ScriptedTransport {
        fn with_script(
            connect_results: Vec<Result<(), TransportError>>,
            envelopes: Vec<Result<Option<StreamEnvelope>, TransportError>>,
        ) -> Self {
            Self {
                state: Mutex::new(ScriptedState {
                    connect_results: connect_results.into(),
                    envelopes: envelopes.into(),
                    ..ScriptedState::default()
                }),
            }
        }

        async fn connect_attempts(&self) -> usize {
            self.state.lock().await.connect_attempts
        }

        async fn disconnect_calls(&self) -> usize {
            self.state.lock().await.disconnect_calls
        }
    }

    #[async_trait]
    impl StreamTransport for ScriptedTransport {
        async fn connect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.connect_attempts += 1;
            state
                .connect_results
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::Connect("script exhausted".to_owned())))
        }

        async fn next_envelope(&self) -> Result<Option<StreamEnvelope>, TransportError> {
            let mut state = self.state.lock().await;
            state.envelopes.pop_front().unwrap_or(Ok(None))
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            let mut state = self.state.lock().await;
            state.disconnect_calls += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(
            &self,
            envelope: &StreamEnvelope,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.seen.lock().await.push(envelope.event_id.clone());
            match envelope.event_id.as_str() {
                "boom" => Err(ApplicationError::address_search(IntegrationError::Transport(
                    "dns failure".to_owned(),
                ))
                .into()),
                "crash" => panic!("handler bug"),
                _ => Ok(HandlerResult::Ignored),
            }
        }
    }

    /// Completes only once two envelopes are being handled at the same time.
    struct RendezvousHandler {
        barrier: Barrier,
    }

    #[async_trait]
    impl EventHandler for RendezvousHandler {
        async fn handle(
            &self,
            _envelope: &StreamEnvelope,
            _ctx: &EventContext,
        ) -> Result<HandlerResult, EventHandlerError> {
            self.barrier.wait().await;
            Ok(HandlerResult::Ignored)
        }
    }

    fn envelope(event_id: &str) -> StreamEnvelope {
        StreamEnvelope {
            event_id: event_id.to_owned(),
            event: StreamEvent::Mention(MentionEvent {
                tweet_id: event_id.to_owned(),
                author_id: "2244994945".to_owned(),
                author_username: "jamie".to_owned(),
                text: "2 kg from Oslo to Tokyo".to_owned(),
            }),
        }
    }

    fn keep_alive() -> StreamEnvelope {
        StreamEnvelope { event_id: "keep-alive".to_owned(), event: StreamEvent::KeepAlive }
    }

    fn reset() -> Result<Option<StreamEnvelope>, TransportError> {
        Err(TransportError::Receive("connection reset".to_owned()))
    }

    fn immediate_policy() -> ReconnectPolicy {
        ReconnectPolicy { max_retries: 2, base_delay_ms: 0, max_delay_ms: 0 }
    }

    async fn sorted_seen(handler: &RecordingHandler) -> Vec<String> {
        let mut seen = handler.seen.lock().await.clone();
        seen.sort();
        seen
    }

    #[tokio::test]
    async fn reconnects_after_initial_connect_failure() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Err(TransportError::Connect("network down".to_owned())), Ok(())],
            vec![Ok(Some(envelope("m-1"))), Ok(None)],
        ));
        let handler = Arc::new(RecordingHandler::default());

        let runner = StreamRunner::new(transport.clone(), handler.clone(), immediate_policy());
        runner.start().await.expect("runner should not fail");

        // failed, healthy, then three failures once the script runs out
        assert_eq!(transport.connect_attempts().await, 5);
        assert_eq!(transport.disconnect_calls().await, 1);
        assert_eq!(*handler.seen.lock().await, vec!["m-1"]);
    }

    #[tokio::test]
    async fn exhausts_retries_without_crashing() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![
                Err(TransportError::Connect("fail-1".to_owned())),
                Err(TransportError::Connect("fail-2".to_owned())),
                Err(TransportError::Connect("fail-3".to_owned())),
            ],
            vec![],
        ));

        let runner = StreamRunner::new(
            transport.clone(),
            Arc::new(RecordingHandler::default()),
            immediate_policy(),
        );

        runner.start().await.expect("runner should degrade gracefully");
        assert_eq!(transport.connect_attempts().await, 3);
    }

    #[tokio::test]
    async fn clean_close_reconnects_instead_of_stopping() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(())],
            vec![Ok(Some(envelope("m-1"))), Ok(None), Ok(Some(envelope("m-2"))), Ok(None)],
        ));
        let handler = Arc::new(RecordingHandler::default());

        let runner = StreamRunner::new(transport.clone(), handler.clone(), immediate_policy());
        runner.start().await.expect("runner should not fail");

        assert_eq!(sorted_seen(&handler).await, vec!["m-1", "m-2"]);
        assert_eq!(transport.disconnect_calls().await, 2);
    }

    #[tokio::test]
    async fn healthy_sessions_reset_the_retry_budget() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(()), Ok(()), Ok(()), Ok(())],
            vec![
                Ok(Some(envelope("s-0"))),
                reset(),
                Ok(Some(envelope("s-1"))),
                reset(),
                Ok(Some(envelope("s-2"))),
                reset(),
                Ok(Some(envelope("s-3"))),
                reset(),
                Ok(Some(envelope("s-4"))),
                Ok(None),
            ],
        ));
        let handler = Arc::new(RecordingHandler::default());

        let runner = StreamRunner::new(transport.clone(), handler.clone(), immediate_policy());
        runner.start().await.expect("runner should not fail");

        assert_eq!(sorted_seen(&handler).await, vec!["s-0", "s-1", "s-2", "s-3", "s-4"]);
    }

    #[tokio::test]
    async fn keep_alives_count_as_a_healthy_session() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(()), Ok(()), Ok(())],
            vec![
                Ok(Some(keep_alive())),
                reset(),
                Ok(Some(keep_alive())),
                reset(),
                Ok(Some(keep_alive())),
                reset(),
                Ok(Some(envelope("m-1"))),
                Ok(None),
            ],
        ));
        let handler = Arc::new(RecordingHandler::default());

        let runner = StreamRunner::new(transport.clone(), handler.clone(), immediate_policy());
        runner.start().await.expect("runner should not fail");

        assert_eq!(*handler.seen.lock().await, vec!["m-1"]);
    }

    #[tokio::test]
    async fn sessions_that_deliver_nothing_count_toward_retries() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(()), Ok(()), Ok(())],
            vec![Ok(None), Ok(None), Ok(None), Ok(Some(envelope("late")))],
        ));
        let handler = Arc::new(RecordingHandler::default());

        let runner = StreamRunner::new(transport.clone(), handler.clone(), immediate_policy());
        runner.start().await.expect("runner should degrade gracefully");

        assert_eq!(transport.connect_attempts().await, 3);
        assert!(handler.seen.lock().await.is_empty());
    }

    #[tokio::test]
    async fn handler_failures_do_not_stop_the_stream() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![Ok(Some(envelope("boom"))), Ok(Some(envelope("m-2"))), Ok(None)],
        ));
        let handler = Arc::new(RecordingHandler::default());

        let runner = StreamRunner::new(transport.clone(), handler.clone(), immediate_policy());
        runner.start().await.expect("runner should not fail");

        assert_eq!(sorted_seen(&handler).await, vec!["boom", "m-2"]);
    }

    #[tokio::test]
    async fn panicking_handlers_do_not_stop_the_stream() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![
                Ok(Some(envelope("crash"))),
                Ok(Some(envelope("m-2"))),
                Ok(Some(envelope("m-3"))),
                Ok(None),
            ],
        ));
        let handler = Arc::new(RecordingHandler::default());

        let runner = StreamRunner::new(transport.clone(), handler.clone(), immediate_policy());
        tokio::time::timeout(Duration::from_secs(5), runner.start())
            .await
            .expect("a panicked task should not wedge the runner")
            .expect("runner should not fail");

        assert_eq!(sorted_seen(&handler).await, vec!["crash", "m-2", "m-3"]);
        assert_eq!(transport.disconnect_calls().await, 1);
    }

    #[tokio::test]
    async fn receive_errors_trigger_reconnect() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(()), Ok(())],
            vec![Ok(Some(envelope("m-1"))), reset(), Ok(Some(envelope("m-2"))), Ok(None)],
        ));
        let handler = Arc::new(RecordingHandler::default());

        let runner = StreamRunner::new(transport.clone(), handler.clone(), immediate_policy());
        runner.start().await.expect("runner should not fail");

        assert_eq!(sorted_seen(&handler).await, vec!["m-1", "m-2"]);
    }

    #[tokio::test]
    async fn mentions_are_handled_concurrently() {
        let transport = Arc::new(ScriptedTransport::with_script(
            vec![Ok(())],
            vec![Ok(Some(envelope("m-1"))), Ok(Some(envelope("m-2"))), Ok(None)],
        ));
        let handler = Arc::new(RendezvousHandler { barrier: Barrier::new(2) });

        let runner = StreamRunner::new(transport, handler, immediate_policy());
        tokio::time::timeout(Duration::from_secs(5), runner.start())
            .await
            .expect("handlers should overlap instead of running one at a time")
            .expect("runner should not fail");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = ReconnectPolicy { max_retries: 5, base_delay_ms: 100, max_delay_ms: 500 };

        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
    }
}
