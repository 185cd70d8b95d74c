use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsoleConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub reconnect_delay: Duration,
    pub max_retries: u32,
    pub refresh_after_action: bool,
    pub user_agent: String,
}

/// Control commands accepted by the deploy controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Start,
    Stop,
    Restart,
}

impl ActionKind {
    /// Path segment for the action endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Start => "start",
            ActionKind::Stop => "stop",
            ActionKind::Restart => "restart",
        }
    }
}

/// Body of `GET /deploy/status`. The server reports `null` until the
/// controller has written its running flag at least once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub running: Option<bool>,
}

impl StatusResponse {
    pub fn is_running(&self) -> bool {
        self.running.unwrap_or(false)
    }
}

/// Events emitted by the poller, stream client, and dispatcher into the
/// controller loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEvent {
    /// A fresh running/idle observation from any source.
    StatusObserved(bool),
    /// One line of process output from the stream.
    OutputLine(String),
    /// Diagnostic line; never fatal.
    Info(String),
    /// The stream client exhausted its reconnection budget.
    StreamLost,
}

/// Events the controller hands to a frontend (TUI or text follow mode).
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// The running flag actually changed. Deduplicated by the status model.
    StatusChanged(bool),
    /// Some observation arrived, changed or not. Unlocks action controls.
    ObservationArrived,
    OutputLine(String),
    Info(String),
    /// Full resynchronization: drop session state and start over.
    Resync,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response_null_means_not_running() {
        let body: StatusResponse = serde_json::from_str(r#"{"running": null}"#).unwrap();
        assert!(!body.is_running());
        let body: StatusResponse = serde_json::from_str("{}").unwrap();
        assert!(!body.is_running());
        let body: StatusResponse = serde_json::from_str(r#"{"running": true}"#).unwrap();
        assert!(body.is_running());
    }

    #[test]
    fn action_kind_path_segments() {
        assert_eq!(ActionKind::Start.as_str(), "start");
        assert_eq!(ActionKind::Stop.as_str(), "stop");
        assert_eq!(ActionKind::Restart.as_str(), "restart");
    }
}
