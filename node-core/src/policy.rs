//! Decides whether the node should be polling the modem or entering sleep.
//!
//! The node only acts in response to incoming acoustic messages; outside the
//! activity window it sits in light sleep with the modem still powered. The
//! window is anchored to the wall-clock second of the last frame-sync edge.

/// Seconds of polling granted after the last frame-sync edge.
pub const ACTIVE_WINDOW_SECS: u32 = 30;

/// Coarse operating state tracked across iterations.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NodeState {
    Active,
    Asleep,
}

impl NodeState {
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, NodeState::Active)
    }
}

/// Outcome of assessing one iteration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Assessment {
    /// Pending edge or inside the activity window: poll for messages.
    Poll,
    /// Exactly at the window boundary: neither poll nor sleep this cycle.
    Hold,
    /// Past the window with nothing pending: eligible to sleep.
    Doze,
}

/// Activity window state machine.
///
/// Starts `Active` because the startup sequence ends with a broadcast
/// announcement, which counts as activity. There is no terminal state; the
/// only exits from the loop are a forced hardware reset or hardware failure.
pub struct ActivityPolicy {
    state: NodeState,
    window_secs: u32,
}

impl ActivityPolicy {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: NodeState::Active,
            window_secs: ACTIVE_WINDOW_SECS,
        }
    }

    #[must_use]
    pub const fn state(&self) -> NodeState {
        self.state
    }

    /// `true` while `now` is strictly inside the window after `last_wake`.
    #[must_use]
    pub fn within_window(&self, now_secs: u32, last_wake_secs: u32) -> bool {
        now_secs < last_wake_secs.saturating_add(self.window_secs)
    }

    /// `true` once `now` is strictly past the window end.
    #[must_use]
    pub fn window_elapsed(&self, now_secs: u32, last_wake_secs: u32) -> bool {
        now_secs > last_wake_secs.saturating_add(self.window_secs)
    }

    /// Classifies the current instant. The boundary second maps to
    /// [`Assessment::Hold`]: the poll window has closed but the sleep
    /// condition is not yet strictly satisfied.
    #[must_use]
    pub fn assess(&self, pending: bool, now_secs: u32, last_wake_secs: u32) -> Assessment {
        if pending || self.within_window(now_secs, last_wake_secs) {
            Assessment::Poll
        } else if self.window_elapsed(now_secs, last_wake_secs) {
            Assessment::Doze
        } else {
            Assessment::Hold
        }
    }

    /// Records that the sleep half of the power sequence has run.
    pub fn note_sleep(&mut self) {
        self.state = NodeState::Asleep;
    }

    /// Records that the wake half of the power sequence has run.
    pub fn note_wake(&mut self) {
        self.state = NodeState::Active;
    }
}

impl Default for ActivityPolicy {
    fn default() -> Self {
        Self::new()
    }
}
