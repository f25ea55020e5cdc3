//! Output file naming.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use quill_core::{QuillError, Result};

const MAX_NAME_ATTEMPTS: usize = 16;

/// Create a new `<random integer>.pdf` file in `dir`.
///
/// The file is created exclusively; an existing name is never overwritten,
/// a fresh number is drawn instead.
pub fn create_artifact_file(dir: &Path) -> Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)?;
    for attempt in 1..=MAX_NAME_ATTEMPTS {
        let path = dir.join(format!("{}.pdf", rand::random::<u32>()));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::debug!(attempt, path = %path.display(), "Artifact name taken");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Err(QuillError::Document(format!(
        "could not find a free file name in {} after {} attempts",
        dir.display(),
        MAX_NAME_ATTEMPTS
    )))
}
