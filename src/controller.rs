//! Session orchestrator.
//!
//! Owns the status model, spawns the poller and stream client, and routes
//! their observations to whichever frontend is attached. Also the place
//! where "the stream is gone for good" turns into a full resynchronization,
//! the terminal-app analog of a forced page reload.

use crate::api::DeployBackend;
use crate::dispatch::ActionDispatcher;
use crate::model::{ActionKind, ConsoleConfig, ConsoleEvent, UiEvent};
use crate::poller::Poller;
use crate::status::StatusModel;
use crate::stream::transport::StreamTransport;
use crate::stream::StreamClient;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Commands emitted by frontends.
#[derive(Debug, Clone)]
pub enum UiCommand {
    Dispatch(ActionKind),
    Quit,
}

fn spawn_stream(
    cfg: &ConsoleConfig,
    transport: Arc<dyn StreamTransport>,
    events: UnboundedSender<ConsoleEvent>,
) -> JoinHandle<crate::stream::StreamState> {
    let client = StreamClient::new(transport, cfg, events);
    tokio::spawn(client.run())
}

/// Spawn a one-shot status fetch feeding the event loop, used to seed the
/// view right after a resynchronization.
fn spawn_bootstrap_fetch(backend: Arc<dyn DeployBackend>, events: UnboundedSender<ConsoleEvent>) {
    tokio::spawn(async move {
        let event = match backend.fetch_status().await {
            Ok(running) => ConsoleEvent::StatusObserved(running),
            Err(e) => ConsoleEvent::Info(format!("resync status fetch failed: {e:#}")),
        };
        let _ = events.send(event);
    });
}

pub async fn run_controller(
    cfg: ConsoleConfig,
    backend: Arc<dyn DeployBackend>,
    transport: Arc<dyn StreamTransport>,
    ui_tx: UnboundedSender<UiEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ConsoleEvent>();
    let mut model = StatusModel::new();

    let poll_handle = tokio::spawn(
        Poller::new(backend.clone(), cfg.poll_interval, event_tx.clone()).run(),
    );
    let mut stream_handle = spawn_stream(&cfg, transport.clone(), event_tx.clone());
    let dispatcher = ActionDispatcher::new(backend.clone(), cfg.refresh_after_action, event_tx.clone());

    let res = loop {
        tokio::select! {
            ev = event_rx.recv() => {
                // event_tx is held here too, so recv() cannot return None.
                let Some(ev) = ev else { break Ok(()) };
                match ev {
                    ConsoleEvent::StatusObserved(running) => {
                        // Every observation unlocks controls; only a change
                        // repaints the indicator.
                        let _ = ui_tx.send(UiEvent::ObservationArrived);
                        if let Some(changed) = model.observe(running) {
                            let _ = ui_tx.send(UiEvent::StatusChanged(changed));
                        }
                    }
                    ConsoleEvent::OutputLine(line) => {
                        let _ = ui_tx.send(UiEvent::OutputLine(line));
                    }
                    ConsoleEvent::Info(msg) => {
                        let _ = ui_tx.send(UiEvent::Info(msg));
                    }
                    ConsoleEvent::StreamLost => {
                        // Reload analog: drop session state, re-seed the
                        // status, and stand up a fresh stream client. The
                        // poller keeps running untouched throughout.
                        model.reset();
                        let _ = ui_tx.send(UiEvent::Resync);
                        spawn_bootstrap_fetch(backend.clone(), event_tx.clone());
                        stream_handle.abort();
                        stream_handle = spawn_stream(&cfg, transport.clone(), event_tx.clone());
                    }
                }
            }
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Dispatch(action)) => {
                        let dispatcher = dispatcher.clone();
                        tokio::spawn(async move { dispatcher.dispatch(action).await });
                    }
                    Some(UiCommand::Quit) | None => break Ok(()),
                }
            }
        }
    };

    // Aborting clears the poll interval and any pending reconnect timer, so
    // no observation outlives the session.
    poll_handle.abort();
    stream_handle.abort();
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::FakeBackend;
    use crate::stream::sse::SseFrame;
    use crate::stream::test_support::{FakeTransport, Script};
    use crate::stream::{OUTPUT_EVENT, STATUS_EVENT};
    use std::time::Duration;

    fn config() -> ConsoleConfig {
        ConsoleConfig {
            base_url: "http://localhost:5000".into(),
            poll_interval: Duration::from_secs(3),
            reconnect_delay: Duration::from_secs(3),
            max_retries: 3,
            refresh_after_action: false,
            user_agent: "deploy-console/test".into(),
        }
    }

    /// Skip interleaved poller noise (repeat observations, info lines) and
    /// return the next event of interest.
    async fn next_data_event(rx: &mut UnboundedReceiver<UiEvent>) -> UiEvent {
        loop {
            match rx.recv().await.expect("ui channel open") {
                UiEvent::ObservationArrived | UiEvent::Info(_) => continue,
                other => return other,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_session_scenario() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_status(Ok(false));

        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(FakeTransport::new(vec![Script::Feed(feed_rx)]));

        let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let controller = tokio::spawn(run_controller(
            config(),
            backend.clone(),
            transport,
            ui_tx,
            cmd_rx,
        ));

        // Bootstrap poll: idle.
        assert_eq!(next_data_event(&mut ui_rx).await, UiEvent::StatusChanged(false));

        // Operator hits start; the command reaches the action endpoint.
        cmd_tx.send(UiCommand::Dispatch(ActionKind::Start)).unwrap();
        while backend.recorded_actions().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(backend.recorded_actions(), vec![ActionKind::Start]);

        // The stream reports the new state, then output in order.
        feed_tx.send(SseFrame::named(STATUS_EVENT, "true")).unwrap();
        assert_eq!(next_data_event(&mut ui_rx).await, UiEvent::StatusChanged(true));

        for line in ["Building...", "Deploying...", "Done."] {
            feed_tx.send(SseFrame::named(OUTPUT_EVENT, line)).unwrap();
        }
        for line in ["Building...", "Deploying...", "Done."] {
            assert_eq!(
                next_data_event(&mut ui_rx).await,
                UiEvent::OutputLine(line.into())
            );
        }

        cmd_tx.send(UiCommand::Quit).unwrap();
        controller.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn repeat_observations_do_not_repaint() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_status(Ok(false));
        // Stream stays open but silent; every later poll repeats the last
        // scripted value.
        let (_feed_tx, feed_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(FakeTransport::new(vec![Script::Feed(feed_rx)]));

        let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let controller = tokio::spawn(run_controller(
            config(),
            backend,
            transport,
            ui_tx,
            cmd_rx,
        ));

        assert_eq!(next_data_event(&mut ui_rx).await, UiEvent::StatusChanged(false));

        // Let several poll ticks pass; each arrives but none repaint.
        let mut observations = 0;
        let mut repaints = 0;
        tokio::time::sleep(Duration::from_secs(10)).await;
        while let Ok(ev) = ui_rx.try_recv() {
            match ev {
                UiEvent::ObservationArrived => observations += 1,
                UiEvent::StatusChanged(_) => repaints += 1,
                _ => {}
            }
        }
        assert!(observations >= 2);
        assert_eq!(repaints, 0);

        cmd_tx.send(UiCommand::Quit).unwrap();
        controller.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stream_exhaustion_resynchronizes_and_recovers() {
        let backend = Arc::new(FakeBackend::new());
        backend.push_status(Ok(true));

        // First stream client burns through its whole budget, the fresh one
        // (created by the resync) connects and delivers.
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();
        let transport = Arc::new(FakeTransport::new(vec![
            Script::Fail,
            Script::Fail,
            Script::Fail,
            Script::Fail,
            Script::Feed(feed_rx),
        ]));

        let (ui_tx, mut ui_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let controller = tokio::spawn(run_controller(
            config(),
            backend.clone(),
            transport.clone(),
            ui_tx,
            cmd_rx,
        ));

        assert_eq!(next_data_event(&mut ui_rx).await, UiEvent::StatusChanged(true));
        assert_eq!(next_data_event(&mut ui_rx).await, UiEvent::Resync);
        // Model was reset, so the bootstrap fetch repaints even though the
        // value never changed.
        assert_eq!(next_data_event(&mut ui_rx).await, UiEvent::StatusChanged(true));

        feed_tx
            .send(SseFrame::named(OUTPUT_EVENT, "back online"))
            .unwrap();
        assert_eq!(
            next_data_event(&mut ui_rx).await,
            UiEvent::OutputLine("back online".into())
        );
        assert_eq!(transport.connect_count(), 5);

        cmd_tx.send(UiCommand::Quit).unwrap();
        controller.await.unwrap().unwrap();
    }
}
