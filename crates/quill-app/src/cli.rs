//! CLI argument definitions for the Quill application.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use quill_core::config::{QuillConfig, SpeechBackend};

/// Quill - dictate a formal letter, one spoken turn at a time.
#[derive(Parser, Debug)]
#[command(name = "quill", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Directory the rendered letter is written to.
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Speech input backend.
    #[arg(short = 'b', long = "backend", value_enum)]
    pub backend: Option<BackendArg>,

    /// Do not open the rendered letter in the default viewer.
    #[arg(long = "no-open")]
    pub no_open: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run one dictation session (default).
    Run,
    /// Print the template catalog as it is given to the assistant.
    Templates,
    /// Write a default configuration file.
    InitConfig {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendArg {
    Console,
    Microphone,
}

impl From<BackendArg> for SpeechBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Console => SpeechBackend::Console,
            BackendArg::Microphone => SpeechBackend::Microphone,
        }
    }
}

impl CliArgs {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > QUILL_CONFIG env var > platform default (~/.quill/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        config_path_from(
            self.config.as_deref(),
            std::env::var("QUILL_CONFIG").ok(),
            home_dir(),
        )
    }

    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut QuillConfig) {
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(ref dir) = self.output_dir {
            config.general.output_dir = dir.to_string_lossy().to_string();
        }
        if let Some(backend) = self.backend {
            config.speech.backend = backend.into();
        }
        if self.no_open {
            config.document.open_after_render = false;
        }
    }
}

fn config_path_from(flag: Option<&Path>, env: Option<String>, home: Option<PathBuf>) -> PathBuf {
    if let Some(p) = flag {
        return p.to_path_buf();
    }
    if let Some(p) = env.filter(|p| !p.is_empty()) {
        return PathBuf::from(p);
    }
    match home {
        Some(home) => home.join(".quill").join("config.toml"),
        None => PathBuf::from("config.toml"),
    }
}

fn home_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    let home = std::env::var("USERPROFILE");
    #[cfg(not(target_os = "windows"))]
    let home = std::env::var("HOME");
    home.ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_run() {
        let args = CliArgs::try_parse_from(["quill"]).unwrap();
        assert_eq!(args.command(), Command::Run);
        assert!(!args.no_open);
    }

    #[test]
    fn test_subcommands() {
        let args = CliArgs::try_parse_from(["quill", "templates"]).unwrap();
        assert_eq!(args.command(), Command::Templates);

        let args = CliArgs::try_parse_from(["quill", "init-config", "--force"]).unwrap();
        assert_eq!(args.command(), Command::InitConfig { force: true });
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(CliArgs::try_parse_from(["quill", "--backend", "carrier-pigeon"]).is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let args = CliArgs::try_parse_from([
            "quill",
            "--log-level",
            "debug",
            "--output-dir",
            "/tmp/letters",
            "--backend",
            "microphone",
            "--no-open",
        ])
        .unwrap();
        let mut config = QuillConfig::default();
        args.apply_overrides(&mut config);

        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.output_dir, "/tmp/letters");
        assert_eq!(config.speech.backend, SpeechBackend::Microphone);
        assert!(!config.document.open_after_render);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let args = CliArgs::try_parse_from(["quill"]).unwrap();
        let mut config = QuillConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.general.log_level, "info");
        assert!(config.document.open_after_render);
    }

    #[test]
    fn test_config_path_priority() {
        let home = Some(PathBuf::from("/home/asha"));

        let flag = config_path_from(
            Some(Path::new("/etc/quill.toml")),
            Some("/env/quill.toml".into()),
            home.clone(),
        );
        assert_eq!(flag, PathBuf::from("/etc/quill.toml"));

        let env = config_path_from(None, Some("/env/quill.toml".into()), home.clone());
        assert_eq!(env, PathBuf::from("/env/quill.toml"));

        let default = config_path_from(None, None, home);
        assert_eq!(default, PathBuf::from("/home/asha/.quill/config.toml"));

        assert_eq!(config_path_from(None, None, None), PathBuf::from("config.toml"));
    }
}
