use crate::console::Console;
use crate::controls::ControlPanel;
use crate::model::{ActionKind, UiEvent};

/// Everything the TUI renders. Owned by the UI thread only. Indicator and
/// button enablement are always derived from `(running, action_in_flight)`,
/// never stored.
pub struct UiState {
    pub running: Option<bool>,
    pub action_in_flight: bool,
    pub console: Console,
    pub info: String,
    pub resyncs: u64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            running: None,
            action_in_flight: false,
            console: Console::new(),
            info: String::new(),
            resyncs: 0,
        }
    }
}

impl UiState {
    pub fn apply(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::StatusChanged(running) => self.running = Some(running),
            UiEvent::ObservationArrived => self.action_in_flight = false,
            UiEvent::OutputLine(line) => self.console.append(&line),
            UiEvent::Info(msg) => self.info = msg,
            UiEvent::Resync => {
                // Start the session over, same as a page reload would.
                self.console.clear();
                self.running = None;
                self.action_in_flight = false;
                self.resyncs += 1;
                self.info = "stream lost; resynchronizing".into();
            }
        }
    }

    pub fn panel(&self) -> ControlPanel {
        ControlPanel::derive(self.running, self.action_in_flight)
    }

    /// Lock the controls for an action about to be dispatched. Returns
    /// false (and sends nothing) when the control is currently disabled.
    pub fn request(&mut self, action: ActionKind) -> bool {
        if !self.panel().allows(action) {
            return false;
        }
        self.action_in_flight = true;
        true
    }
}
