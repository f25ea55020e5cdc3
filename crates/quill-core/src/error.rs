use thiserror::Error;

/// Top-level error type for the Quill system.
///
/// Variants are grouped by subsystem. Recognition problems reported by the
/// speech engine itself are logged rather than returned; the variants here
/// cover failures that end a session or a command.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuillError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech capture error: {0}")]
    Speech(String),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Completion error: {0}")]
    Completion(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("Viewer error: {0}")]
    Viewer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },
}

impl From<toml::de::Error> for QuillError {
    fn from(err: toml::de::Error) -> Self {
        QuillError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for QuillError {
    fn from(err: toml::ser::Error) -> Self {
        QuillError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for QuillError {
    fn from(err: serde_json::Error) -> Self {
        QuillError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Quill operations.
pub type Result<T> = std::result::Result<T, QuillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuillError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuillError = io_err.into();
        assert!(matches!(err, QuillError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(QuillError, &str)> = vec![
            (
                QuillError::Speech("already listening".into()),
                "Speech capture error: already listening",
            ),
            (
                QuillError::Recognition("no device".into()),
                "Recognition error: no device",
            ),
            (
                QuillError::Completion("HTTP 500".into()),
                "Completion error: HTTP 500",
            ),
            (
                QuillError::Template("duplicate name".into()),
                "Template error: duplicate name",
            ),
            (
                QuillError::Document("font missing".into()),
                "Document error: font missing",
            ),
            (
                QuillError::Viewer("no opener".into()),
                "Viewer error: no opener",
            ),
            (
                QuillError::Serialization("bad json".into()),
                "Serialization error: bad json",
            ),
            (
                QuillError::Timeout {
                    what: "completion delta".into(),
                    secs: 30,
                },
                "Timed out after 30s waiting for completion delta",
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn test_toml_error_conversion() {
        let parse_err = toml::from_str::<toml::Value>("not = [valid").unwrap_err();
        let err: QuillError = parse_err.into();
        assert!(matches!(err, QuillError::Config(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: QuillError = parse_err.into();
        assert!(matches!(err, QuillError::Serialization(_)));
    }
}
