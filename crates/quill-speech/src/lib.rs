//! Quill speech crate - turn-scoped speech capture on top of a continuous
//! recognition engine.
//!
//! A [`SpeechCaptureSession`] opens the recognizer for one user turn
//! (Idle -> Listening -> Idle), collects recognized segments through a channel,
//! suppresses consecutive duplicates, and joins what it heard into a single
//! utterance once the [`TurnGate`] reports the turn complete.

pub mod console;
pub mod gate;
#[cfg(feature = "microphone")]
pub mod microphone;
pub mod recognizer;
pub mod scripted;
pub mod session;
pub mod state;
pub mod transcript;

pub use console::{ConsoleInput, ConsoleRecognizer};
pub use gate::{ChannelGate, EnterGate, GateTrigger, ImmediateGate, TurnGate};
#[cfg(feature = "microphone")]
pub use microphone::{MicrophoneConfig, MicrophoneRecognizer};
pub use recognizer::{CancellationReason, EventSender, RecognitionEvent, Recognizer};
pub use scripted::ScriptedRecognizer;
pub use session::{SegmentObserver, SpeechCaptureSession};
pub use state::CaptureState;
pub use transcript::{build_utterance, SpeechTurnState};
