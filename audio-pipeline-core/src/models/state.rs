use serde::{Deserialize, Serialize};

use crate::session::signals::Signals;

/// Externally visible pipeline state.
///
/// Derived from the level-triggered [`Signals`]. When flags overlap during a
/// handoff (for example `WRITING` while a new session is already refused),
/// the most specific activity wins:
/// ```text
/// Recording > Playing > Writing > Error > Idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Idle,
    Recording,
    Playing,
    Writing,
    Error,
}

impl ControllerState {
    pub fn from_signals(signals: Signals) -> Self {
        if signals.contains(Signals::RECORDING) {
            Self::Recording
        } else if signals.contains(Signals::PLAYING) {
            Self::Playing
        } else if signals.contains(Signals::WRITING) {
            Self::Writing
        } else if signals.contains(Signals::ERROR) {
            Self::Error
        } else {
            Self::Idle
        }
    }

    /// Idle or Error: both accept new sessions.
    pub fn accepts_sessions(&self) -> bool {
        matches!(self, Self::Idle | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Playing => "playing",
            Self::Writing => "writing",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recording supervisor state machine.
///
/// ```text
/// idle → armed → capturing → flushing → idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SupervisorState {
    #[default]
    Idle,
    Armed,
    Capturing,
    Flushing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_wins_over_writing() {
        let signals = Signals::RECORDING | Signals::WRITING;
        assert_eq!(ControllerState::from_signals(signals), ControllerState::Recording);
    }

    #[test]
    fn error_only_when_nothing_active() {
        assert_eq!(
            ControllerState::from_signals(Signals::ERROR | Signals::IDLE),
            ControllerState::Error
        );
        assert_eq!(
            ControllerState::from_signals(Signals::ERROR | Signals::PLAYING),
            ControllerState::Playing
        );
        assert_eq!(ControllerState::from_signals(Signals::IDLE), ControllerState::Idle);
    }

    #[test]
    fn error_still_accepts_sessions() {
        assert!(ControllerState::Error.accepts_sessions());
        assert!(!ControllerState::Writing.accepts_sessions());
    }
}
