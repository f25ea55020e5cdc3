//! Hooks for surfacing dialogue progress to a display.

use std::path::Path;

/// Receives dialogue progress as it happens.
///
/// Every method has a no-op default so displays implement only what they show.
pub trait DialogueObserver: Send + Sync {
    /// A user turn is about to start listening.
    fn on_listening(&self, _turn: u64) {}

    /// The opening request was captured.
    fn on_opening_request(&self, _utterance: &str) {}

    /// A user turn produced no speech and was skipped.
    fn on_empty_turn(&self, _turn: u64) {}

    /// One assistant text delta, in arrival order.
    fn on_delta(&self, _delta: &str) {}

    /// The assistant finished its reply.
    fn on_reply_complete(&self, _reply: &str) {}

    /// The session ended because the opening request was empty.
    fn on_aborted(&self) {}

    /// The finished letter was rendered.
    fn on_letter_emitted(&self, _path: &Path) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl DialogueObserver for NullObserver {}
