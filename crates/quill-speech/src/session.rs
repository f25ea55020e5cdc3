//! Speech capture session: one recognizer, many turns.
//!
//! Recognition events arrive on the recognizer's own schedule. A collector
//! task owns the turn's [`SpeechTurnState`] and is the only writer; `stop`
//! waits for it to drain the channel, so a segment delivered while stopping is
//! neither lost nor counted twice.

use std::sync::Arc;
use std::time::Duration;

use quill_core::{QuillError, Result};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::gate::TurnGate;
use crate::recognizer::{RecognitionEvent, Recognizer};
use crate::state::{CaptureState, StateMachine};
use crate::transcript::{build_utterance, SpeechTurnState};

/// Callback invoked with each accepted segment as it arrives.
pub type SegmentObserver = Arc<dyn Fn(&str) + Send + Sync>;

struct ActiveTurn {
    finish: oneshot::Sender<()>,
    collector: JoinHandle<SpeechTurnState>,
}

/// Turn-scoped wrapper around a [`Recognizer`].
pub struct SpeechCaptureSession {
    recognizer: Arc<dyn Recognizer>,
    state: StateMachine,
    active: Option<ActiveTurn>,
    observer: Option<SegmentObserver>,
    turn_timeout: Option<Duration>,
    turns: u64,
}

impl std::fmt::Debug for SpeechCaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechCaptureSession")
            .field("recognizer", &self.recognizer.name())
            .field("state", &self.state.current())
            .field("has_observer", &self.observer.is_some())
            .field("turn_timeout", &self.turn_timeout)
            .field("turns", &self.turns)
            .finish()
    }
}

impl SpeechCaptureSession {
    pub fn new(recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            recognizer,
            state: StateMachine::new(),
            active: None,
            observer: None,
            turn_timeout: None,
            turns: 0,
        }
    }

    /// Report each accepted segment to `observer` while listening.
    pub fn with_observer(mut self, observer: SegmentObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Give up on a turn after `timeout` without a turn-complete signal.
    ///
    /// A timed-out turn yields an empty utterance.
    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state.current()
    }

    /// Number of turns started so far.
    pub fn turns(&self) -> u64 {
        self.turns
    }

    /// Begin listening for a new turn. Segment state starts empty.
    ///
    /// Fails if the session is already listening.
    pub async fn start(&mut self) -> Result<()> {
        if self.active.is_some() {
            return Err(QuillError::Speech(
                "capture session is already listening".to_string(),
            ));
        }

        let (tx, rx) = unbounded_channel();
        let (finish_tx, finish_rx) = oneshot::channel();
        let collector = tokio::spawn(collect_segments(rx, finish_rx, self.observer.clone()));

        if let Err(e) = self.recognizer.start(tx).await {
            collector.abort();
            return Err(e);
        }

        self.state.transition(CaptureState::Listening)?;
        self.turns += 1;
        tracing::info!(
            turn = self.turns,
            recognizer = self.recognizer.name(),
            "Listening"
        );
        self.active = Some(ActiveTurn {
            finish: finish_tx,
            collector,
        });
        Ok(())
    }

    /// Stop listening and return the segments accepted during the turn.
    ///
    /// A recognizer that fails to stop cleanly is logged; whatever was
    /// collected up to that point is still returned.
    pub async fn stop(&mut self) -> Result<Vec<String>> {
        let active = self
            .active
            .take()
            .ok_or_else(|| QuillError::Speech("capture session is not listening".to_string()))?;

        if let Err(e) = self.recognizer.stop().await {
            tracing::warn!(error = %e, "Recognizer did not stop cleanly");
        }

        // The collector may already have finished if the recognizer closed the channel.
        let _ = active.finish.send(());
        let collected = active.collector.await;
        if self.state.transition(CaptureState::Idle).is_err() {
            self.state.reset();
        }

        let turn_state = collected
            .map_err(|e| QuillError::Speech(format!("segment collector failed: {}", e)))?;
        tracing::debug!(
            turn = self.turns,
            segments = turn_state.segments().len(),
            "Stopped listening"
        );
        Ok(turn_state.into_segments())
    }

    /// Run one full user turn: start, wait for the gate, stop, join.
    ///
    /// Returns the turn's utterance, or an empty string if nothing was heard
    /// or the turn timed out.
    pub async fn capture_turn(&mut self, gate: &dyn TurnGate) -> Result<String> {
        self.start().await?;

        let waited = match self.turn_timeout {
            Some(limit) => match tokio::time::timeout(limit, gate.wait()).await {
                Ok(result) => result.map(|_| true),
                Err(_) => {
                    tracing::warn!(
                        turn = self.turns,
                        timeout_secs = limit.as_secs(),
                        "Turn timed out; skipping"
                    );
                    Ok(false)
                }
            },
            None => gate.wait().await.map(|_| true),
        };

        // Always release the recognizer, even if the gate failed.
        let segments = self.stop().await?;

        if waited? {
            Ok(build_utterance(&segments))
        } else {
            Ok(String::new())
        }
    }
}

async fn collect_segments(
    mut rx: UnboundedReceiver<RecognitionEvent>,
    mut finish: oneshot::Receiver<()>,
    observer: Option<SegmentObserver>,
) -> SpeechTurnState {
    let mut state = SpeechTurnState::new();
    loop {
        tokio::select! {
            biased;
            event = rx.recv() => match event {
                Some(event) => handle_event(&mut state, event, observer.as_ref()),
                None => break,
            },
            _ = &mut finish => {
                while let Ok(event) = rx.try_recv() {
                    handle_event(&mut state, event, observer.as_ref());
                }
                break;
            }
        }
    }
    state
}

fn handle_event(
    state: &mut SpeechTurnState,
    event: RecognitionEvent,
    observer: Option<&SegmentObserver>,
) {
    match event {
        RecognitionEvent::Recognized(text) if state.is_canceled() => {
            tracing::debug!(
                chars = text.trim().chars().count(),
                "Dropping segment delivered after cancellation"
            );
        }
        RecognitionEvent::Recognized(text) => {
            if state.accept(&text) {
                tracing::debug!(chars = text.trim().chars().count(), "Segment recognized");
                if let Some(observer) = observer {
                    observer(text.trim());
                }
            }
        }
        RecognitionEvent::Canceled {
            reason,
            error_code,
            error_details,
        } => {
            state.cancel();
            tracing::warn!(
                %reason,
                error_code = error_code.as_deref().unwrap_or("-"),
                error_details = error_details.as_deref().unwrap_or("-"),
                "Recognition canceled"
            );
        }
        RecognitionEvent::SessionStopped => {
            tracing::info!("Speech session stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{ChannelGate, ImmediateGate};
    use crate::recognizer::{CancellationReason, EventSender};
    use crate::scripted::ScriptedRecognizer;
    use async_trait::async_trait;
    use std::sync::Mutex;

    fn session_with(script: ScriptedRecognizer) -> (SpeechCaptureSession, Arc<ScriptedRecognizer>) {
        let recognizer = Arc::new(script);
        let session = SpeechCaptureSession::new(recognizer.clone());
        (session, recognizer)
    }

    #[tokio::test]
    async fn test_capture_turn_dedups_and_joins() {
        let (mut session, _) =
            session_with(ScriptedRecognizer::from_segments([vec!["hi", "hi", "there"]]));
        let utterance = session.capture_turn(&ImmediateGate).await.unwrap();
        assert_eq!(utterance, "hi there");
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_segments_reset_between_turns() {
        let (mut session, recognizer) = session_with(ScriptedRecognizer::from_segments([
            vec!["close my account"],
            vec!["close my account"],
        ]));
        assert_eq!(
            session.capture_turn(&ImmediateGate).await.unwrap(),
            "close my account"
        );
        // Same text in the next turn is not a consecutive duplicate.
        assert_eq!(
            session.capture_turn(&ImmediateGate).await.unwrap(),
            "close my account"
        );
        assert_eq!(recognizer.starts(), 2);
        assert_eq!(recognizer.stops(), 2);
        assert_eq!(session.turns(), 2);
    }

    #[tokio::test]
    async fn test_start_twice_is_an_error() {
        let (mut session, _) = session_with(ScriptedRecognizer::new());
        session.start().await.unwrap();
        let err = session.start().await.unwrap_err();
        assert!(err.to_string().contains("already listening"));
        assert_eq!(session.state(), CaptureState::Listening);
        session.stop().await.unwrap();
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_stop_without_start_is_an_error() {
        let (mut session, _) = session_with(ScriptedRecognizer::new());
        assert!(session.stop().await.is_err());
    }

    #[tokio::test]
    async fn test_cancel_event_keeps_collected_segments() {
        let script = ScriptedRecognizer::new();
        script.push_events(vec![
            RecognitionEvent::Recognized("Name is Asha".into()),
            RecognitionEvent::Canceled {
                reason: CancellationReason::Error,
                error_code: Some("ConnectionFailure".into()),
                error_details: Some("socket closed".into()),
            },
            RecognitionEvent::SessionStopped,
        ]);
        let (mut session, _) = session_with(script);
        let utterance = session.capture_turn(&ImmediateGate).await.unwrap();
        assert_eq!(utterance, "Name is Asha");
    }

    #[tokio::test]
    async fn test_segments_after_cancel_are_dropped() {
        let script = ScriptedRecognizer::new();
        script.push_events(vec![
            RecognitionEvent::Recognized("a".into()),
            RecognitionEvent::Canceled {
                reason: CancellationReason::EndOfStream,
                error_code: None,
                error_details: None,
            },
            RecognitionEvent::Recognized("b".into()),
        ]);
        script.push_segments(["c"]);
        let (mut session, _) = session_with(script);

        assert_eq!(session.capture_turn(&ImmediateGate).await.unwrap(), "a");
        // The next turn starts open again.
        assert_eq!(session.capture_turn(&ImmediateGate).await.unwrap(), "c");
    }

    #[tokio::test]
    async fn test_observer_sees_accepted_segments_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let recognizer = Arc::new(ScriptedRecognizer::from_segments([vec![
            "one", "one", "two", " ", "three",
        ]]));
        let mut session = SpeechCaptureSession::new(recognizer).with_observer(Arc::new(
            move |text: &str| sink.lock().unwrap().push(text.to_string()),
        ));
        session.capture_turn(&ImmediateGate).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_turn_timeout_yields_empty_utterance() {
        let (gate, _trigger) = ChannelGate::new();
        let recognizer = Arc::new(ScriptedRecognizer::from_segments([vec!["half a sentence"]]));
        let mut session = SpeechCaptureSession::new(recognizer.clone())
            .with_turn_timeout(Some(Duration::from_millis(20)));
        let utterance = session.capture_turn(&gate).await.unwrap();
        assert_eq!(utterance, "");
        assert_eq!(recognizer.stops(), 1);
        assert_eq!(session.state(), CaptureState::Idle);
    }

    #[tokio::test]
    async fn test_gate_error_still_stops_recognizer() {
        let (gate, trigger) = ChannelGate::new();
        drop(trigger);
        let (mut session, recognizer) =
            session_with(ScriptedRecognizer::from_segments([vec!["x"]]));
        assert!(session.capture_turn(&gate).await.is_err());
        assert_eq!(recognizer.stops(), 1);
        assert_eq!(session.state(), CaptureState::Idle);
    }

    /// Emits its segments from a background task, the last one only when
    /// `stop` is called, the way a real engine flushes pending results.
    struct LateFlushRecognizer {
        sender: Mutex<Option<EventSender>>,
    }

    #[async_trait]
    impl Recognizer for LateFlushRecognizer {
        fn name(&self) -> &str {
            "late-flush"
        }

        async fn start(&self, events: EventSender) -> Result<()> {
            let early = events.clone();
            tokio::spawn(async move {
                let _ = early.send(RecognitionEvent::Recognized("Account".into()));
            })
            .await
            .map_err(|e| QuillError::Recognition(e.to_string()))?;
            *self.sender.lock().unwrap() = Some(events);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            if let Some(tx) = self.sender.lock().unwrap().take() {
                let _ = tx.send(RecognitionEvent::Recognized("123".into()));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_segments_flushed_during_stop_are_kept() {
        let recognizer = Arc::new(LateFlushRecognizer {
            sender: Mutex::new(None),
        });
        let mut session = SpeechCaptureSession::new(recognizer);
        let utterance = session.capture_turn(&ImmediateGate).await.unwrap();
        assert_eq!(utterance, "Account 123");
    }

    struct FailingRecognizer;

    #[async_trait]
    impl Recognizer for FailingRecognizer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn start(&self, _events: EventSender) -> Result<()> {
            Err(QuillError::Recognition("no input device".into()))
        }

        async fn stop(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failed_start_leaves_session_idle() {
        let mut session = SpeechCaptureSession::new(Arc::new(FailingRecognizer));
        let err = session.start().await.unwrap_err();
        assert!(matches!(err, QuillError::Recognition(_)));
        assert_eq!(session.state(), CaptureState::Idle);
        assert!(session.start().await.is_err());
    }
}
