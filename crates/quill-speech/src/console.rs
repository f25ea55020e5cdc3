//! Console stand-in for a speech engine.
//!
//! Each non-empty line typed while the session is listening is treated as a
//! recognized segment; an empty line completes the turn. A single stdin reader
//! feeds both roles so typed text and the turn-complete signal stay ordered.

use std::io::BufRead;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use quill_core::Result;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

use crate::gate::{ChannelGate, GateTrigger};
use crate::recognizer::{EventSender, RecognitionEvent, Recognizer};

type Listener = Arc<Mutex<Option<EventSender>>>;

/// Recognizer fed by typed lines.
#[derive(Debug, Clone)]
pub struct ConsoleRecognizer {
    listener: Listener,
}

/// Wiring for console input: a recognizer and its turn gate.
pub struct ConsoleInput {
    pub recognizer: ConsoleRecognizer,
    pub gate: ChannelGate,
}

impl ConsoleInput {
    /// Start reading stdin on a background thread.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn() -> Self {
        let (line_tx, line_rx) = unbounded_channel();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if line_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to read standard input");
                        break;
                    }
                }
            }
            tracing::debug!("Standard input closed");
        });
        Self::from_lines(line_rx)
    }

    /// Build console input over an arbitrary line source.
    pub fn from_lines(lines: UnboundedReceiver<String>) -> Self {
        let listener: Listener = Arc::new(Mutex::new(None));
        let (gate, trigger) = ChannelGate::new();
        tokio::spawn(dispatch_lines(lines, listener.clone(), trigger));
        Self {
            recognizer: ConsoleRecognizer { listener },
            gate,
        }
    }
}

async fn dispatch_lines(
    mut lines: UnboundedReceiver<String>,
    listener: Listener,
    trigger: GateTrigger,
) {
    while let Some(line) = lines.recv().await {
        let listening = listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(events) = listening else {
            tracing::debug!("Ignoring input typed while not listening");
            continue;
        };
        if line.trim().is_empty() {
            if trigger.complete_turn().is_err() {
                break;
            }
            continue;
        }
        let _ = events.send(RecognitionEvent::Recognized(line));
    }
    // Input is gone: dropping the trigger makes the next gate wait fail.
}

#[async_trait]
impl Recognizer for ConsoleRecognizer {
    fn name(&self) -> &str {
        "console"
    }

    async fn start(&self, events: EventSender) -> Result<()> {
        *self.listener.lock().unwrap_or_else(PoisonError::into_inner) = Some(events);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let previous = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(events) = previous {
            let _ = events.send(RecognitionEvent::SessionStopped);
        }
        Ok(())
    }
}
