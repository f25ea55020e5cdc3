//! Quill application binary - composition root.
//!
//! 1. Resolve and load configuration from TOML
//! 2. Initialize logging (stderr)
//! 3. Build the speech input for the configured backend
//! 4. Build the completion client and the PDF emitter
//! 5. Run one dialogue session to completion

mod cli;
mod display;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use quill_core::config::{QuillConfig, SpeechBackend};
use quill_dialogue::{
    build_system_prompt, DialogueEngine, EngineOptions, OpenAiCompletionClient, SessionOutcome,
    TemplateRegistry,
};
use quill_document::{NoViewer, PdfEmitter, SystemViewer, Viewer};
use quill_speech::{ConsoleInput, Recognizer, SpeechCaptureSession, TurnGate};

use cli::{CliArgs, Command};
use display::ConsoleDisplay;

type SpeechInput = (Arc<dyn Recognizer>, Arc<dyn TurnGate>, &'static str);

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Load the config file if present; a missing file means defaults.
fn load_config(path: &Path) -> Result<QuillConfig, Box<dyn std::error::Error>> {
    if path.exists() {
        Ok(QuillConfig::load(path)?)
    } else {
        Ok(QuillConfig::default())
    }
}

fn init_config(path: &Path, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )
        .into());
    }
    QuillConfig::default().save(path)?;
    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

fn speech_input(config: &QuillConfig) -> Result<SpeechInput, Box<dyn std::error::Error>> {
    match config.speech.backend {
        SpeechBackend::Console => {
            let input = ConsoleInput::spawn();
            let recognizer: Arc<dyn Recognizer> = Arc::new(input.recognizer);
            let gate: Arc<dyn TurnGate> = Arc::new(input.gate);
            tracing::info!("Console speech input ready (one segment per line)");
            Ok((recognizer, gate, "Press Enter on an empty line"))
        }
        #[cfg(feature = "microphone")]
        SpeechBackend::Microphone => {
            use quill_speech::{EnterGate, MicrophoneConfig, MicrophoneRecognizer};

            let recognizer: Arc<dyn Recognizer> = Arc::new(MicrophoneRecognizer::new(MicrophoneConfig {
                endpoint: config.speech.transcription_endpoint.clone(),
                model: config.speech.transcription_model.clone(),
                language: config.speech.language.clone(),
                chunk_duration_secs: config.speech.chunk_duration_secs,
                api_key: std::env::var(&config.completion.api_key_env).ok(),
            }));
            let gate: Arc<dyn TurnGate> = Arc::new(EnterGate::new());
            tracing::info!(
                language = %config.speech.language,
                chunk_duration_secs = config.speech.chunk_duration_secs,
                "Microphone speech input ready"
            );
            Ok((recognizer, gate, "Press Enter"))
        }
        #[cfg(not(feature = "microphone"))]
        SpeechBackend::Microphone => {
            Err("the microphone backend requires building with --features microphone".into())
        }
    }
}

async fn run_session(
    config: QuillConfig,
    registry: TemplateRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    let completion = Arc::new(OpenAiCompletionClient::from_env(&config.completion)?);
    tracing::info!(
        endpoint = %config.completion.endpoint,
        model = %config.completion.model,
        "Completion client ready"
    );

    let (recognizer, gate, done_hint) = speech_input(&config)?;
    let speech = SpeechCaptureSession::new(recognizer)
        .with_turn_timeout(config.speech.turn_timeout())
        .with_observer(Arc::new(|segment: &str| println!("[Final] {segment}")));

    let viewer: Box<dyn Viewer> = if config.document.open_after_render {
        Box::new(SystemViewer)
    } else {
        Box::new(NoViewer)
    };
    let output_dir = PathBuf::from(&config.general.output_dir);
    let emitter = Arc::new(PdfEmitter::from_config(
        output_dir.clone(),
        &config.document,
        viewer,
    ));
    tracing::info!(output_dir = %output_dir.display(), "PDF emitter ready");

    let mut engine = DialogueEngine::new(
        build_system_prompt(&registry)?,
        completion,
        speech,
        gate,
        emitter,
    )
    .with_observer(Arc::new(ConsoleDisplay::new(done_hint)))
    .with_options(EngineOptions::from_config(&config.completion, &config.document));

    match engine.run().await? {
        SessionOutcome::Aborted => tracing::info!("Session ended without a request"),
        SessionOutcome::Completed {
            artifact,
            assistant_turns,
            ..
        } => tracing::info!(
            path = %artifact.path.display(),
            assistant_turns,
            "Session complete"
        ),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();
    let config_file = args.resolve_config_path();

    if let Command::InitConfig { force } = args.command() {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return init_config(&config_file, force);
    }

    let mut config = load_config(&config_file)?;
    args.apply_overrides(&mut config);
    init_logging(&config.general.log_level);

    tracing::info!("Starting Quill v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    let registry = TemplateRegistry::from_config(&config.templates)?;
    tracing::info!(templates = registry.len(), "Template catalog ready");

    match args.command() {
        Command::Templates => {
            println!("{}", registry.serialize_all()?);
            Ok(())
        }
        _ => run_session(config, registry).await,
    }
}
