//! Recognizer that replays a fixed script, one entry per turn.
//!
//! Lets the dialogue loop run end to end without an audio device or network.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use quill_core::Result;

use crate::recognizer::{EventSender, RecognitionEvent, Recognizer};

/// Replays scripted recognition events.
///
/// Each call to `start` consumes the next turn and pushes its events at once.
/// When the script runs out, turns produce no events.
#[derive(Debug, Default)]
pub struct ScriptedRecognizer {
    turns: Mutex<VecDeque<Vec<RecognitionEvent>>>,
    active: Mutex<Option<EventSender>>,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a script where every turn only recognizes the given texts.
    pub fn from_segments<T, S>(turns: T) -> Self
    where
        T: IntoIterator,
        T::Item: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let script = Self::new();
        for turn in turns {
            script.push_segments(turn);
        }
        script
    }

    /// Append a turn of recognized texts.
    pub fn push_segments<I, S>(&self, segments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push_events(
            segments
                .into_iter()
                .map(|s| RecognitionEvent::Recognized(s.into()))
                .collect(),
        );
    }

    /// Append a turn of raw events.
    pub fn push_events(&self, events: Vec<RecognitionEvent>) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(events);
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn remaining_turns(&self) -> usize {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn start(&self, events: EventSender) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let turn = self
            .turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_default();
        for event in turn {
            // The receiver only goes away if the session was dropped mid-turn.
            if events.send(event).is_err() {
                break;
            }
        }
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(events);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn test_replays_one_turn_per_start() {
        let recognizer = ScriptedRecognizer::from_segments([vec!["hello"], vec!["a", "b"]]);
        assert_eq!(recognizer.remaining_turns(), 2);

        let (tx, mut rx) = unbounded_channel();
        recognizer.start(tx).await.unwrap();
        recognizer.stop().await.unwrap();
        assert_eq!(
            rx.recv().await,
            Some(RecognitionEvent::Recognized("hello".into()))
        );
        assert_eq!(rx.recv().await, None);

        let (tx, mut rx) = unbounded_channel();
        recognizer.start(tx).await.unwrap();
        recognizer.stop().await.unwrap();
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Recognized("a".into())));
        assert_eq!(rx.recv().await, Some(RecognitionEvent::Recognized("b".into())));
        assert_eq!(recognizer.starts(), 2);
        assert_eq!(recognizer.stops(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_script_yields_nothing() {
        let recognizer = ScriptedRecognizer::new();
        let (tx, mut rx) = unbounded_channel();
        recognizer.start(tx).await.unwrap();
        recognizer.stop().await.unwrap();
        assert_eq!(rx.recv().await, None);
    }
}
