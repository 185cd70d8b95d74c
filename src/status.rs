//! Single source of truth for the controller's running flag.

use tokio::sync::mpsc;

/// Holds the last-known running flag and fans out changes to subscribers.
/// `None` until the first observation arrives, so frontends can render an
/// explicit "not yet determined" state instead of a guessed one.
pub struct StatusModel {
    current: Option<bool>,
    subscribers: Vec<mpsc::UnboundedSender<bool>>,
}

impl StatusModel {
    pub fn new() -> Self {
        Self {
            current: None,
            subscribers: Vec::new(),
        }
    }

    pub fn current(&self) -> Option<bool> {
        self.current
    }

    /// Register a renderer; it receives every value change, nothing else.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<bool> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Record an observation. Updates and notifies subscribers only when the
    /// value differs from the current one; returns the new value on change.
    pub fn observe(&mut self, running: bool) -> Option<bool> {
        if self.current == Some(running) {
            return None;
        }
        self.current = Some(running);
        self.subscribers.retain(|tx| tx.send(running).is_ok());
        Some(running)
    }

    /// Back to uninitialized, used when the session resynchronizes.
    pub fn reset(&mut self) {
        self.current = None;
    }
}

impl Default for StatusModel {
    fn default() -> Self {
        Self::new()
    }
}
