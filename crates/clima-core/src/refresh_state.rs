//! Refresh state machine for weather loads.
//!
//! Only one load runs at a time: a timer tick or manual refresh that arrives
//! while a load is in flight is dropped, not queued.

/// Whether a weather load is currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshState {
    #[default]
    Idle,
    Refreshing,
}

/// What caused a refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Tick,
    Manual,
}

impl RefreshState {
    /// True if a new load can be started.
    pub fn can_start(self) -> bool {
        matches!(self, RefreshState::Idle)
    }

    /// State after a trigger arrives. Busy stays busy.
    pub fn on_trigger(self, _trigger: RefreshTrigger) -> Self {
        RefreshState::Refreshing
    }

    /// State after the in-flight load completes.
    pub fn on_load_done(self) -> Self {
        RefreshState::Idle
    }
}

impl std::fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshTrigger::Tick => write!(f, "tick"),
            RefreshTrigger::Manual => write!(f, "manual"),
        }
    }
}
