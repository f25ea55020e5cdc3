//! Capability interface for continuous speech recognition engines.

use std::fmt;

use async_trait::async_trait;
use quill_core::Result;
use tokio::sync::mpsc::UnboundedSender;

/// Why the engine cancelled recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// The engine hit an error; code and details are usually attached.
    Error,
    /// The audio source ran out (device unplugged, file ended).
    EndOfStream,
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationReason::Error => write!(f, "Error"),
            CancellationReason::EndOfStream => write!(f, "EndOfStream"),
        }
    }
}

/// Events pushed by a recognizer while it is listening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// A final recognition result for one stretch of speech.
    Recognized(String),
    /// Recognition was cancelled. No further segments follow in this turn.
    Canceled {
        reason: CancellationReason,
        error_code: Option<String>,
        error_details: Option<String>,
    },
    /// The engine ended its session.
    SessionStopped,
}

/// Channel the recognizer pushes events into.
pub type EventSender = UnboundedSender<RecognitionEvent>;

/// A continuous recognition engine.
///
/// Implementations push [`RecognitionEvent`]s from whatever context their
/// engine delivers them on. Locale and credentials are fixed at construction.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Begin continuous recognition, delivering events to `events`.
    async fn start(&self, events: EventSender) -> Result<()>;

    /// Stop recognition.
    ///
    /// Every segment recognized before this call returns must already have
    /// been sent on the channel handed to [`start`](Self::start).
    async fn stop(&self) -> Result<()>;
}
