//! Per-turn segment accumulation and utterance assembly.

/// Segments recognized during the current turn.
///
/// Consecutive duplicates and blank results are dropped on the way in; this
/// is the only noise filter applied to recognizer output. Once the engine
/// cancels recognition the turn is closed to further segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechTurnState {
    segments: Vec<String>,
    last_segment: Option<String>,
    canceled: bool,
}

impl SpeechTurnState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a recognized text. Returns `true` if it was kept.
    pub fn accept(&mut self, text: &str) -> bool {
        let text = text.trim();
        if self.canceled || text.is_empty() || self.last_segment.as_deref() == Some(text) {
            return false;
        }
        self.segments.push(text.to_string());
        self.last_segment = Some(text.to_string());
        true
    }

    /// Close the turn. Segments kept so far stay; later ones are refused.
    pub fn cancel(&mut self) {
        self.canceled = true;
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn into_segments(self) -> Vec<String> {
        self.segments
    }
}

/// Join a turn's segments into one utterance.
///
/// Segments are separated by a single space and surrounding whitespace is
/// trimmed. Returns an empty string when nothing usable was recognized.
pub fn build_utterance<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
