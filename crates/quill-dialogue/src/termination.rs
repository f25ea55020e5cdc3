//! End-of-letter detection.

/// Sentinel the assistant appends once the letter is finished.
pub const END_OF_LETTER: &str = "[END_OF_LETTER]";

/// A finished letter extracted from an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Letter {
    body: String,
    through_marker: String,
}

impl Letter {
    /// Letter text before the marker, trailing whitespace removed.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Reply text up to and including the marker, exactly as received.
    pub fn with_marker(&self) -> &str {
        &self.through_marker
    }

    /// Text handed to the renderer.
    pub fn render_text(&self, keep_marker: bool) -> String {
        if keep_marker {
            self.through_marker.clone()
        } else {
            self.body.clone()
        }
    }
}

/// Look for the marker in `reply` (case-sensitive, first occurrence).
///
/// Anything after the marker is dropped.
pub fn detect_letter(reply: &str) -> Option<Letter> {
    let end = reply.find(END_OF_LETTER)?;
    Some(Letter {
        body: reply[..end].trim_end().to_string(),
        through_marker: reply[..end + END_OF_LETTER.len()].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_marker() {
        assert!(detect_letter("Please tell me your account number.").is_none());
    }

    #[test]
    fn test_marker_is_case_sensitive() {
        assert!(detect_letter("Dear Sir, ... [end_of_letter]").is_none());
        assert!(detect_letter("Dear Sir, ... [End_Of_Letter]").is_none());
    }

    #[test]
    fn test_text_after_marker_is_dropped() {
        let letter = detect_letter("Dear Sir,...[END_OF_LETTER]\nignored").unwrap();
        assert_eq!(letter.body(), "Dear Sir,...");
        assert!(!letter.render_text(false).contains("ignored"));
        assert!(!letter.render_text(true).contains("ignored"));
        assert_eq!(letter.render_text(true), "Dear Sir,...[END_OF_LETTER]");
    }

    #[test]
    fn test_first_marker_wins() {
        let letter = detect_letter("A[END_OF_LETTER]B[END_OF_LETTER]").unwrap();
        assert_eq!(letter.body(), "A");
    }

    #[test]
    fn test_trailing_whitespace_before_marker_is_trimmed() {
        let letter = detect_letter("Yours faithfully,\nAsha\n\n[END_OF_LETTER]").unwrap();
        assert_eq!(letter.body(), "Yours faithfully,\nAsha");
        assert_eq!(
            letter.with_marker(),
            "Yours faithfully,\nAsha\n\n[END_OF_LETTER]"
        );
    }

    #[test]
    fn test_marker_only() {
        let letter = detect_letter("[END_OF_LETTER]").unwrap();
        assert_eq!(letter.body(), "");
        assert_eq!(letter.with_marker(), "[END_OF_LETTER]");
    }
}
