//! Quill dialogue crate - the template-guided letter conversation.
//!
//! The [`DialogueEngine`] alternates assistant turns (streamed from a
//! [`CompletionService`]) with spoken user turns (from a
//! [`quill_speech::SpeechCaptureSession`]) until the assistant emits the
//! end-of-letter marker, then hands the letter to a
//! [`quill_document::DocumentEmitter`].

pub mod completion;
pub mod engine;
pub mod history;
pub mod observer;
pub mod openai;
pub mod prompt;
pub mod templates;
pub mod termination;

pub use completion::{CompletionService, DeltaStream, ScriptedCompletion};
pub use engine::{DialogueEngine, EngineOptions, SessionOutcome};
pub use history::Conversation;
pub use observer::{DialogueObserver, NullObserver};
pub use openai::{OpenAiCompletionClient, SseDecoder, SseEvent};
pub use prompt::build_system_prompt;
pub use templates::TemplateRegistry;
pub use termination::{detect_letter, Letter, END_OF_LETTER};
