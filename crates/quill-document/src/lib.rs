//! Quill document crate - turns a finished letter into a rendered file and
//! hands it to the host's viewer.

pub mod artifact;
pub mod emitter;
pub mod font;
pub mod layout;
pub mod pdf;
pub mod viewer;

pub use artifact::create_artifact_file;
pub use emitter::{Artifact, DocumentEmitter, RecordingEmitter};
pub use font::{default_font_dirs, find_system_font};
pub use layout::PageLayout;
pub use pdf::{FontSource, PdfEmitter};
pub use viewer::{NoViewer, SystemViewer, Viewer};
