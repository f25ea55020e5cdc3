use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{QuillError, Result};
use crate::types::Template;

/// Top-level configuration for the Quill application.
///
/// Loaded from `~/.quill/config.toml` by default. Each section corresponds
/// to one collaborator of the dialogue loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    /// Letter templates overriding the built-in catalog. Empty means built-in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<Template>,
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub document: DocumentConfig,
}

impl QuillConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: QuillConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.completion.endpoint.trim().is_empty() {
            return Err(QuillError::Config(
                "completion.endpoint must not be empty".to_string(),
            ));
        }
        if self.completion.model.trim().is_empty() {
            return Err(QuillError::Config(
                "completion.model must not be empty".to_string(),
            ));
        }
        if self.document.font_size_pt.is_nan() || self.document.font_size_pt <= 0.0 {
            return Err(QuillError::Config(format!(
                "document.font_size_pt must be positive, got {}",
                self.document.font_size_pt
            )));
        }
        // A4 is 21cm wide; margins must leave room for text.
        if !(0.0..10.0).contains(&self.document.margin_cm) {
            return Err(QuillError::Config(format!(
                "document.margin_cm must be in [0, 10), got {}",
                self.document.margin_cm
            )));
        }
        if self.speech.chunk_duration_secs == 0 {
            return Err(QuillError::Config(
                "speech.chunk_duration_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Directory the rendered letters are written to.
    pub output_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            output_dir: ".".to_string(),
        }
    }
}

/// Which recognizer adapter feeds the speech capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechBackend {
    /// Typed lines on stdin stand in for recognized speech.
    Console,
    /// Default input device plus a remote transcription endpoint.
    Microphone,
}

/// Speech capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Recognition locale, fixed for the whole run.
    pub language: String,
    pub backend: SpeechBackend,
    /// OpenAI-compatible audio transcription URL (microphone backend).
    pub transcription_endpoint: String,
    /// Transcription model name (microphone backend).
    pub transcription_model: String,
    /// Audio chunk length sent per transcription request.
    pub chunk_duration_secs: u32,
    /// Maximum wait for the turn-complete signal. 0 disables the timeout.
    pub turn_timeout_secs: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            backend: SpeechBackend::Console,
            transcription_endpoint: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            transcription_model: "whisper-1".to_string(),
            chunk_duration_secs: 5,
            turn_timeout_secs: 0,
        }
    }
}

impl SpeechConfig {
    pub fn turn_timeout(&self) -> Option<Duration> {
        (self.turn_timeout_secs > 0).then(|| Duration::from_secs(self.turn_timeout_secs))
    }
}

/// How the API key is presented to the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>` (OpenAI and compatible servers).
    Bearer,
    /// `api-key: <key>` (Azure OpenAI deployments).
    ApiKey,
}

/// Completion service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Chat-completions URL.
    pub endpoint: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub auth_style: AuthStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Extra attempts to open the stream after a failed request.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each further attempt.
    pub retry_backoff_ms: u64,
    /// Maximum wait for the next delta. 0 disables the timeout.
    pub stream_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            auth_style: AuthStyle::Bearer,
            temperature: None,
            max_retries: 2,
            retry_backoff_ms: 500,
            stream_timeout_secs: 0,
        }
    }
}

impl CompletionConfig {
    pub fn stream_timeout(&self) -> Option<Duration> {
        (self.stream_timeout_secs > 0).then(|| Duration::from_secs(self.stream_timeout_secs))
    }
}

/// Rendered letter configuration. Page size is always A4.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub margin_cm: f32,
    pub font_size_pt: f32,
    /// TrueType font covering the output script. When unset, Latin letters use
    /// built-in Helvetica and other scripts use an installed font that covers them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<String>,
    /// Open the rendered file with the system's default viewer.
    pub open_after_render: bool,
    /// Keep the `[END_OF_LETTER]` marker in the rendered text.
    pub keep_marker: bool,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            margin_cm: 2.0,
            font_size_pt: 12.0,
            font_path: None,
            open_after_render: true,
            keep_marker: false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = QuillConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.speech.language, "en-US");
        assert_eq!(config.speech.backend, SpeechBackend::Console);
        assert_eq!(config.completion.model, "gpt-4o");
        assert_eq!(config.completion.max_retries, 2);
        assert_eq!(config.document.margin_cm, 2.0);
        assert_eq!(config.document.font_size_pt, 12.0);
        assert!(config.document.open_after_render);
        assert!(!config.document.keep_marker);
        assert!(config.templates.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "debug"

[completion]
model = "gpt-4o-mini"
auth_style = "api-key"
"#;
        let file = create_temp_config(content);
        let config = QuillConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.completion.auth_style, AuthStyle::ApiKey);
        assert_eq!(config.completion.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.general.output_dir, ".");
    }

    #[test]
    fn test_load_templates_section() {
        let content = r#"
[[templates]]
name = "cheque_book_request"
required_fields = ["Name", "Account Number", "Leaves"]

[[templates]]
name = "address_change"
required_fields = ["Name", "New Address"]

[speech]
backend = "microphone"
turn_timeout_secs = 45
"#;
        let file = create_temp_config(content);
        let config = QuillConfig::load(file.path()).unwrap();
        assert_eq!(config.templates.len(), 2);
        assert_eq!(config.templates[0].name, "cheque_book_request");
        assert_eq!(
            config.templates[0].required_fields,
            vec!["Name", "Account Number", "Leaves"]
        );
        assert_eq!(config.speech.backend, SpeechBackend::Microphone);
        assert_eq!(config.speech.turn_timeout(), Some(Duration::from_secs(45)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = QuillConfig::load_or_default(Path::new("/nonexistent/quill.toml"));
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml_is_config_error() {
        let file = create_temp_config("[general\nlog_level = ");
        let err = QuillConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, QuillError::Config(_)));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = QuillConfig::default();
        config.document.font_path = Some("/usr/share/fonts/NotoSansKannada.ttf".to_string());
        config.templates.push(Template::new("noc", ["Name", "Purpose"]));
        config.save(&path).unwrap();

        let reloaded = QuillConfig::load(&path).unwrap();
        assert_eq!(reloaded.document.font_path, config.document.font_path);
        assert_eq!(reloaded.templates, config.templates);
        assert_eq!(reloaded.completion.endpoint, config.completion.endpoint);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = QuillConfig::default();
        config.document.font_size_pt = 0.0;
        assert!(config.validate().is_err());

        let mut config = QuillConfig::default();
        config.document.margin_cm = 12.0;
        assert!(config.validate().is_err());

        let mut config = QuillConfig::default();
        config.completion.endpoint = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = QuillConfig::default();
        config.speech.chunk_duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeouts_disabled_by_zero() {
        let config = QuillConfig::default();
        assert_eq!(config.speech.turn_timeout(), None);
        assert_eq!(config.completion.stream_timeout(), None);
    }
}
