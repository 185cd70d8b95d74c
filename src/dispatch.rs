//! Sends start/stop/restart commands to the controller.

use crate::api::DeployBackend;
use crate::model::{ActionKind, ConsoleEvent};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// Fire-and-forget command dispatch. The frontend locks its controls before
/// the command is sent; re-enabling is driven by the next status observation,
/// not by this component. With `refresh_after_action` set, one extra status
/// fetch follows a successful POST to shorten the window before the UI
/// reflects the new state.
#[derive(Clone)]
pub struct ActionDispatcher {
    backend: Arc<dyn DeployBackend>,
    refresh_after_action: bool,
    events: UnboundedSender<ConsoleEvent>,
}

impl ActionDispatcher {
    pub fn new(
        backend: Arc<dyn DeployBackend>,
        refresh_after_action: bool,
        events: UnboundedSender<ConsoleEvent>,
    ) -> Self {
        Self {
            backend,
            refresh_after_action,
            events,
        }
    }

    pub async fn dispatch(&self, action: ActionKind) {
        if let Err(e) = self.backend.send_action(action).await {
            let _ = self.events.send(ConsoleEvent::Info(format!(
                "{} request failed: {e:#}",
                action.as_str()
            )));
            return;
        }
        if self.refresh_after_action {
            match self.backend.fetch_status().await {
                Ok(running) => {
                    let _ = self.events.send(ConsoleEvent::StatusObserved(running));
                }
                Err(e) => {
                    let _ = self
                        .events
                        .send(ConsoleEvent::Info(format!("post-action status fetch failed: {e:#}")));
                }
            }
        }
    }
}
