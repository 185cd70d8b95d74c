//! Pure mapping from observed state to indicator and control enablement.

use crate::model::ActionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// No observation has arrived yet.
    Unknown,
    Working,
    Napping,
}

impl Indicator {
    pub fn from_state(running: Option<bool>) -> Self {
        match running {
            None => Indicator::Unknown,
            Some(true) => Indicator::Working,
            Some(false) => Indicator::Napping,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Indicator::Unknown => "Status unknown…",
            Indicator::Working => "I'm working!",
            Indicator::Napping => "I'm napping… zed zed zed…",
        }
    }
}

/// Derived enablement of the three action controls. Never mutated directly;
/// always recomputed from `(running, action_in_flight)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPanel {
    pub indicator: Indicator,
    pub start: bool,
    pub stop: bool,
    pub restart: bool,
}

impl ControlPanel {
    pub fn derive(running: Option<bool>, action_in_flight: bool) -> Self {
        let indicator = Indicator::from_state(running);
        // Nothing is clickable until the first observation, and nothing while
        // a command is in flight.
        let (start, stop, restart) = match running {
            _ if action_in_flight => (false, false, false),
            None => (false, false, false),
            Some(true) => (false, true, true),
            Some(false) => (true, false, false),
        };
        Self {
            indicator,
            start,
            stop,
            restart,
        }
    }

    pub fn allows(&self, action: ActionKind) -> bool {
        match action {
            ActionKind::Start => self.start,
            ActionKind::Stop => self.stop,
            ActionKind::Restart => self.restart,
        }
    }
}
