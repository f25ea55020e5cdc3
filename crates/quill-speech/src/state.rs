//! Capture state machine with thread-safe transitions.
//!
//! Valid transitions:
//! - Idle -> Listening (start a turn)
//! - Listening -> Idle (stop the turn)

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use quill_core::QuillError;

/// Operational state of a speech capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    /// Not capturing. Ready to start a turn.
    Idle,
    /// The recognizer is running and segments are being collected.
    Listening,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureState::Idle => write!(f, "Idle"),
            CaptureState::Listening => write!(f, "Listening"),
        }
    }
}

impl CaptureState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &CaptureState) -> bool {
        matches!(
            (self, target),
            (CaptureState::Idle, CaptureState::Listening)
                | (CaptureState::Listening, CaptureState::Idle)
        )
    }
}

/// Shared capture state.
///
/// Clones observe the same state, so a display task can poll whether the
/// session is currently listening.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: Arc<Mutex<CaptureState>>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState::Idle)),
        }
    }

    /// Returns the current state.
    pub fn current(&self) -> CaptureState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attempt to transition to the target state.
    pub fn transition(&self, target: CaptureState) -> Result<(), QuillError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.can_transition_to(&target) {
            tracing::debug!("Capture state: {} -> {}", *state, target);
            *state = target;
            Ok(())
        } else {
            Err(QuillError::Speech(format!(
                "Invalid state transition: {} -> {}",
                *state, target
            )))
        }
    }

    /// Force the state machine back to Idle after a failed start or stop.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != CaptureState::Idle {
            tracing::warn!("Capture state machine reset to Idle from {}", *state);
        }
        *state = CaptureState::Idle;
    }
}
