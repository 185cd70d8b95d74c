//! Push-stream client: follows `/deploy/stream` and survives network blips.
//!
//! The connection lifecycle is an explicit state machine:
//! `Connecting → Open → (Reconnecting → Connecting)* → Open | GaveUp`.
//! Transient failures are retried on a fixed delay with an attempt counter
//! that resets whenever a connection opens; once the counter exceeds
//! `max_retries` the client gives up and reports `StreamLost`, leaving the
//! full resynchronization to the controller. A `GaveUp` client is done for
//! good — only the controller creates a fresh one.

pub mod sse;
pub mod transport;

use crate::model::{ConsoleConfig, ConsoleEvent};
use crate::stream::sse::SseFrame;
use crate::stream::transport::{StreamConnection, StreamTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

/// Event names agreed with the server. The wire protocol also allows a
/// single unnamed message variant; this client speaks only the named one and
/// ignores everything else.
pub const OUTPUT_EVENT: &str = "mr_deploy_output";
pub const STATUS_EVENT: &str = "mr_deploy_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Connecting,
    Open,
    Reconnecting,
    GaveUp,
}

/// Receivers dropped; nothing left to deliver to.
struct ChannelClosed;

pub struct StreamClient {
    transport: Arc<dyn StreamTransport>,
    reconnect_delay: Duration,
    max_retries: u32,
    events: UnboundedSender<ConsoleEvent>,
    state: StreamState,
    attempts: u32,
}

impl StreamClient {
    pub fn new(
        transport: Arc<dyn StreamTransport>,
        cfg: &ConsoleConfig,
        events: UnboundedSender<ConsoleEvent>,
    ) -> Self {
        Self {
            transport,
            reconnect_delay: cfg.reconnect_delay,
            max_retries: cfg.max_retries,
            events,
            state: StreamState::Connecting,
            attempts: 0,
        }
    }

    /// Drive the connection until the retry budget is exhausted or the
    /// controller goes away. Returns the final state.
    pub async fn run(mut self) -> StreamState {
        loop {
            self.state = StreamState::Connecting;
            match self.transport.connect().await {
                Ok(mut conn) => {
                    self.state = StreamState::Open;
                    self.attempts = 0;
                    if self.pump(conn.as_mut()).await.is_err() {
                        return self.state;
                    }
                }
                Err(e) => {
                    if self
                        .emit(ConsoleEvent::Info(format!("stream connect failed: {e:#}")))
                        .is_err()
                    {
                        return self.state;
                    }
                }
            }

            self.attempts += 1;
            if self.attempts > self.max_retries {
                self.state = StreamState::GaveUp;
                let _ = self.events.send(ConsoleEvent::StreamLost);
                return self.state;
            }
            self.state = StreamState::Reconnecting;
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// Deliver frames until the connection drops. A dropped connection is
    /// not an error here; it sends the caller back through the retry policy.
    async fn pump(&mut self, conn: &mut dyn StreamConnection) -> Result<(), ChannelClosed> {
        loop {
            match conn.next_frame().await {
                Ok(Some(frame)) => self.handle_frame(frame)?,
                Ok(None) => {
                    self.emit(ConsoleEvent::Info("stream closed by server".into()))?;
                    return Ok(());
                }
                Err(e) => {
                    self.emit(ConsoleEvent::Info(format!("stream error: {e:#}")))?;
                    return Ok(());
                }
            }
        }
    }

    fn handle_frame(&self, frame: SseFrame) -> Result<(), ChannelClosed> {
        match frame.event.as_deref() {
            Some(OUTPUT_EVENT) => self.emit(ConsoleEvent::OutputLine(frame.data)),
            Some(STATUS_EVENT) => match serde_json::from_str::<bool>(&frame.data) {
                Ok(running) => self.emit(ConsoleEvent::StatusObserved(running)),
                // A bad payload drops that one observation, nothing more.
                Err(e) => self.emit(ConsoleEvent::Info(format!(
                    "malformed status payload {:?}: {e}",
                    frame.data
                ))),
            },
            _ => Ok(()),
        }
    }

    fn emit(&self, event: ConsoleEvent) -> Result<(), ChannelClosed> {
        self.events.send(event).map_err(|_| ChannelClosed)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{FakeTransport, Script};
    use super::*;
    use tokio::sync::mpsc;

    fn config(max_retries: u32) -> ConsoleConfig {
        ConsoleConfig {
            base_url: "http://localhost:5000".into(),
            poll_interval: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(3),
            max_retries,
            refresh_after_action: false,
            user_agent: "deploy-console/test".into(),
        }
    }

    fn data_events(events: &[ConsoleEvent]) -> Vec<ConsoleEvent> {
        events
            .iter()
            .filter(|e| !matches!(e, ConsoleEvent::Info(_)))
            .cloned()
            .collect()
    }

    async fn run_to_completion(
        scripts: Vec<Script>,
        max_retries: u32,
    ) -> (Arc<FakeTransport>, Vec<ConsoleEvent>, StreamState) {
        let transport = Arc::new(FakeTransport::new(scripts));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let client = StreamClient::new(transport.clone(), &config(max_retries), tx);
        let final_state = client.run().await;
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        (transport, events, final_state)
    }

    #[tokio::test(start_paused = true)]
    async fn maps_named_events_in_arrival_order() {
        let frames = vec![
            SseFrame::named(STATUS_EVENT, "true"),
            SseFrame::named(OUTPUT_EVENT, "Building..."),
            SseFrame::named(OUTPUT_EVENT, "Deploying..."),
            SseFrame::named(STATUS_EVENT, "false"),
        ];
        let (_, events, _) = run_to_completion(vec![Script::Frames(frames)], 0).await;
        assert_eq!(
            data_events(&events),
            vec![
                ConsoleEvent::StatusObserved(true),
                ConsoleEvent::OutputLine("Building...".into()),
                ConsoleEvent::OutputLine("Deploying...".into()),
                ConsoleEvent::StatusObserved(false),
                ConsoleEvent::StreamLost,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unnamed_and_unknown_events_are_ignored() {
        let frames = vec![
            SseFrame {
                event: None,
                data: "loose line".into(),
            },
            SseFrame::named("mr_deploy_heartbeat", "{}"),
            SseFrame::named(OUTPUT_EVENT, "kept"),
        ];
        let (_, events, _) = run_to_completion(vec![Script::Frames(frames)], 0).await;
        assert_eq!(
            data_events(&events),
            vec![
                ConsoleEvent::OutputLine("kept".into()),
                ConsoleEvent::StreamLost,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_status_drops_that_observation_only() {
        let frames = vec![
            SseFrame::named(STATUS_EVENT, "not-json"),
            SseFrame::named(OUTPUT_EVENT, "still here"),
        ];
        let (_, events, _) = run_to_completion(vec![Script::Frames(frames)], 0).await;
        assert!(events
            .iter()
            .any(|e| matches!(e, ConsoleEvent::Info(msg) if msg.contains("malformed status"))));
        assert!(!events
            .iter()
            .any(|e| matches!(e, ConsoleEvent::StatusObserved(_))));
        assert!(events
            .iter()
            .any(|e| *e == ConsoleEvent::OutputLine("still here".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries_plus_one_consecutive_failures() {
        let (transport, events, final_state) = run_to_completion(Vec::new(), 3).await;
        assert_eq!(final_state, StreamState::GaveUp);
        assert_eq!(transport.connect_count(), 4);
        let lost = events
            .iter()
            .filter(|e| **e == ConsoleEvent::StreamLost)
            .count();
        assert_eq!(lost, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn successful_open_resets_the_attempt_counter() {
        let scripts = vec![
            Script::Fail,
            Script::Fail,
            Script::Fail,
            Script::Frames(vec![SseFrame::named(OUTPUT_EVENT, "made it")]),
        ];
        let (transport, events, final_state) = run_to_completion(scripts, 3).await;

        // Three failures did not exhaust the budget; the fourth attempt
        // opened and delivered.
        assert!(events
            .iter()
            .any(|e| *e == ConsoleEvent::OutputLine("made it".into())));
        // After the open, a fresh budget: the drop plus three more failures
        // before giving up, exactly once.
        assert_eq!(final_state, StreamState::GaveUp);
        assert_eq!(transport.connect_count(), 7);
        let lost = events
            .iter()
            .filter(|e| **e == ConsoleEvent::StreamLost)
            .count();
        assert_eq!(lost, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_quietly_when_the_controller_is_gone() {
        let transport = Arc::new(FakeTransport::new(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let client = StreamClient::new(transport, &config(3), tx);
        let final_state = client.run().await;
        assert_ne!(final_state, StreamState::GaveUp);
    }
}
