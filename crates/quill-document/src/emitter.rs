//! Document emitter contract.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use quill_core::Result;

/// Handle to a rendered letter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub pages: usize,
}

/// Renders finished letter text into an artifact.
///
/// Failures are final for the session: the conversation is already over, so
/// nothing is rolled back.
pub trait DocumentEmitter: Send + Sync {
    fn emit(&self, letter_text: &str) -> Result<Artifact>;
}

/// Emitter that keeps the texts it was given instead of rendering them.
#[derive(Debug, Default)]
pub struct RecordingEmitter {
    emitted: Mutex<Vec<String>>,
}

impl RecordingEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn emitted(&self) -> Vec<String> {
        self.emitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DocumentEmitter for RecordingEmitter {
    fn emit(&self, letter_text: &str) -> Result<Artifact> {
        let mut emitted = self.emitted.lock().unwrap_or_else(PoisonError::into_inner);
        emitted.push(letter_text.to_string());
        Ok(Artifact {
            path: PathBuf::from(format!("recorded-{}.pdf", emitted.len())),
            pages: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_emitter_keeps_texts_in_order() {
        let emitter = RecordingEmitter::new();
        let first = emitter.emit("Dear Sir,").unwrap();
        let second = emitter.emit("To the Manager,").unwrap();
        assert_eq!(emitter.emitted(), vec!["Dear Sir,", "To the Manager,"]);
        assert_ne!(first.path, second.path);
    }
}
