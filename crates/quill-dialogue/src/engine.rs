//! Dialogue engine driving the letter conversation.
//!
//! The engine runs a strictly serialized turn loop: one opening user turn,
//! then alternating assistant and user turns until the assistant's reply
//! carries [`END_OF_LETTER`]. History is only appended once a turn has fully
//! succeeded, so a failed completion never leaves a partial reply behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use quill_core::config::{CompletionConfig, DocumentConfig};
use quill_core::{QuillError, Result};
use quill_document::{Artifact, DocumentEmitter};
use quill_speech::{SpeechCaptureSession, TurnGate};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::completion::{CompletionService, DeltaStream};
use crate::history::Conversation;
use crate::observer::{DialogueObserver, NullObserver};
use crate::termination::{detect_letter, Letter, END_OF_LETTER};

/// Tuning for the assistant side of the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOptions {
    /// Longest wait for the next delta before the reply fails.
    pub stream_timeout: Option<Duration>,
    /// Extra attempts when the completion stream cannot be opened.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each later one.
    pub retry_backoff: Duration,
    /// Render the letter with the end-of-letter marker kept.
    pub keep_marker: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            stream_timeout: None,
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
            keep_marker: false,
        }
    }
}

impl EngineOptions {
    pub fn from_config(completion: &CompletionConfig, document: &DocumentConfig) -> Self {
        Self {
            stream_timeout: completion.stream_timeout(),
            max_retries: completion.max_retries,
            retry_backoff: Duration::from_millis(completion.retry_backoff_ms),
            keep_marker: document.keep_marker,
        }
    }

    /// Delay before retry number `attempt` (1-based).
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(factor)
    }
}

/// How a dialogue session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// The opening turn captured no speech; the completion service was never called.
    Aborted,
    /// A letter was produced and handed to the emitter.
    Completed {
        letter: Letter,
        artifact: Artifact,
        assistant_turns: u64,
    },
}

/// Single-conversation turn loop.
pub struct DialogueEngine {
    id: Uuid,
    started_at: DateTime<Utc>,
    conversation: Conversation,
    completion: Arc<dyn CompletionService>,
    speech: SpeechCaptureSession,
    gate: Arc<dyn TurnGate>,
    emitter: Arc<dyn DocumentEmitter>,
    observer: Arc<dyn DialogueObserver>,
    options: EngineOptions,
    user_turns: u64,
    assistant_turns: u64,
    ran: bool,
}

impl DialogueEngine {
    pub fn new(
        system_prompt: impl Into<String>,
        completion: Arc<dyn CompletionService>,
        speech: SpeechCaptureSession,
        gate: Arc<dyn TurnGate>,
        emitter: Arc<dyn DocumentEmitter>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            conversation: Conversation::new(system_prompt),
            completion,
            speech,
            gate,
            emitter,
            observer: Arc::new(NullObserver),
            options: EngineOptions::default(),
            user_turns: 0,
            assistant_turns: 0,
            ran: false,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DialogueObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Run the session to completion.
    ///
    /// Returns [`SessionOutcome::Aborted`] when the opening turn is empty.
    /// Completion, renderer and viewer failures end the run with an error.
    pub async fn run(&mut self) -> Result<SessionOutcome> {
        if self.ran {
            return Err(QuillError::Config(
                "a dialogue session can only run once".to_string(),
            ));
        }
        self.ran = true;

        info!(session_id = %self.id, "Dialogue session started");

        let opening = self.user_turn().await?;
        if opening.is_empty() {
            info!(session_id = %self.id, "No opening request captured, aborting session");
            self.observer.on_aborted();
            return Ok(SessionOutcome::Aborted);
        }
        self.observer.on_opening_request(&opening);
        self.conversation.push_user(opening);

        loop {
            let reply = self.assistant_turn().await?;
            self.conversation.push_assistant(reply.as_str());

            if let Some(letter) = detect_letter(&reply) {
                return self.finish(letter).await;
            }

            let utterance = self.user_turn().await?;
            if utterance.is_empty() {
                info!(
                    session_id = %self.id,
                    turn = self.user_turns,
                    "Empty user turn, asking the assistant again"
                );
                self.observer.on_empty_turn(self.user_turns);
                continue;
            }
            self.conversation.push_user(utterance);
        }
    }

    async fn user_turn(&mut self) -> Result<String> {
        self.user_turns += 1;
        self.observer.on_listening(self.user_turns);
        let utterance = self.speech.capture_turn(self.gate.as_ref()).await?;
        debug!(
            session_id = %self.id,
            turn = self.user_turns,
            chars = utterance.chars().count(),
            "User turn captured"
        );
        Ok(utterance)
    }

    async fn assistant_turn(&mut self) -> Result<String> {
        self.assistant_turns += 1;
        let mut stream = self.open_stream().await?;
        let mut reply = String::new();

        while let Some(delta) = self.next_delta(&mut stream).await? {
            if delta.is_empty() {
                continue;
            }
            self.observer.on_delta(&delta);
            reply.push_str(&delta);
        }

        debug!(
            session_id = %self.id,
            turn = self.assistant_turns,
            chars = reply.chars().count(),
            "Assistant reply complete"
        );
        self.observer.on_reply_complete(&reply);
        Ok(reply)
    }

    async fn open_stream(&self) -> Result<DeltaStream> {
        let mut attempt = 0;
        loop {
            match self
                .completion
                .stream_complete(self.conversation.messages())
                .await
            {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < self.options.max_retries => {
                    attempt += 1;
                    let delay = self.options.backoff_for(attempt);
                    warn!(
                        session_id = %self.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Completion request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn next_delta(&self, stream: &mut DeltaStream) -> Result<Option<String>> {
        let next = match self.options.stream_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| QuillError::Timeout {
                    what: "the next completion delta".to_string(),
                    secs: limit.as_secs(),
                })?,
            None => stream.next().await,
        };
        next.transpose()
    }

    async fn finish(&mut self, letter: Letter) -> Result<SessionOutcome> {
        info!(
            session_id = %self.id,
            marker = END_OF_LETTER,
            chars = letter.body().chars().count(),
            "Letter complete"
        );
        let text = letter.render_text(self.options.keep_marker);
        // Rendering and the viewer launch block, so they run off the executor.
        let emitter = Arc::clone(&self.emitter);
        let artifact = tokio::task::spawn_blocking(move || emitter.emit(&text))
            .await
            .map_err(|e| QuillError::Document(format!("Emitter task failed: {}", e)))??;
        info!(
            session_id = %self.id,
            path = %artifact.path.display(),
            pages = artifact.pages,
            elapsed_ms = (Utc::now() - self.started_at).num_milliseconds(),
            "Letter emitted"
        );
        self.observer.on_letter_emitted(&artifact.path);
        Ok(SessionOutcome::Completed {
            letter,
            artifact,
            assistant_turns: self.assistant_turns,
        })
    }
}
