//! Hands a rendered file to the host's default application.

use std::path::Path;
use std::process::Command;

use quill_core::{QuillError, Result};

/// Opens an artifact for the user.
pub trait Viewer: Send + Sync {
    fn open(&self, path: &Path) -> Result<()>;
}

/// Launches the platform's default opener without waiting for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemViewer;

impl SystemViewer {
    fn command(path: &Path) -> Command {
        #[cfg(target_os = "macos")]
        {
            let mut cmd = Command::new("open");
            cmd.arg(path);
            cmd
        }
        #[cfg(target_os = "windows")]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]).arg(path);
            cmd
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(path);
            cmd
        }
    }
}

impl Viewer for SystemViewer {
    fn open(&self, path: &Path) -> Result<()> {
        let mut command = Self::command(path);
        let program = command.get_program().to_string_lossy().into_owned();
        command.spawn().map_err(|e| {
            QuillError::Viewer(format!(
                "failed to open {} with {}: {}",
                path.display(),
                program,
                e
            ))
        })?;
        tracing::info!(path = %path.display(), opener = %program, "Opened artifact");
        Ok(())
    }
}

/// Leaves the file alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoViewer;

impl Viewer for NoViewer {
    fn open(&self, path: &Path) -> Result<()> {
        tracing::debug!(path = %path.display(), "Viewer disabled; not opening artifact");
        Ok(())
    }
}
