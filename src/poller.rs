//! Interval status polling: the bootstrap and fallback observation channel.

use crate::api::DeployBackend;
use crate::model::ConsoleEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::MissedTickBehavior;

/// Fetches `/deploy/status` immediately on start and then on a fixed
/// interval, for the whole lifetime of the session. A failed fetch is
/// reported as an info line and skipped; the next tick is unaffected. The
/// poller never backs off — the stream is the primary channel and this is
/// the guarantee that a status change is eventually observed without it.
pub struct Poller {
    backend: Arc<dyn DeployBackend>,
    interval: Duration,
    events: UnboundedSender<ConsoleEvent>,
}

impl Poller {
    pub fn new(
        backend: Arc<dyn DeployBackend>,
        interval: Duration,
        events: UnboundedSender<ConsoleEvent>,
    ) -> Self {
        Self {
            backend,
            interval,
            events,
        }
    }

    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let event = match self.backend.fetch_status().await {
                Ok(running) => ConsoleEvent::StatusObserved(running),
                Err(e) => ConsoleEvent::Info(format!("status poll failed: {e:#}")),
            };
            if self.events.send(event).is_err() {
                // Controller gone; stop ticking.
                break;
            }
        }
    }
}
