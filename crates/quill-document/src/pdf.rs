//! PDF rendering with `printpdf`.

use std::io::Write;
use std::path::{Path, PathBuf};

use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference};
use quill_core::config::DocumentConfig;
use quill_core::{QuillError, Result};

use crate::artifact::create_artifact_file;
use crate::emitter::{Artifact, DocumentEmitter};
use crate::font::{builtin_missing, default_font_dirs, find_system_font, missing_glyph};
use crate::layout::{paginate, wrap_text, PageLayout};
use crate::viewer::Viewer;

const LAYER_NAME: &str = "Letter";

/// Font used for the letter body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FontSource {
    /// Built-in Helvetica for WinAnsi text. Other scripts fall back to an
    /// installed font that covers them.
    Builtin,
    /// A TrueType/OpenType file that covers the output script.
    File(PathBuf),
}

impl FontSource {
    pub fn from_config(config: &DocumentConfig) -> Self {
        match config.font_path.as_deref() {
            Some(path) if !path.trim().is_empty() => FontSource::File(PathBuf::from(path)),
            _ => FontSource::Builtin,
        }
    }
}

/// Font chosen for one letter.
enum ResolvedFont {
    Helvetica,
    Embedded { path: PathBuf, bytes: Vec<u8> },
}

/// Renders letters to A4 PDF files and opens them.
pub struct PdfEmitter {
    output_dir: PathBuf,
    layout: PageLayout,
    font: FontSource,
    font_dirs: Vec<PathBuf>,
    viewer: Box<dyn Viewer>,
}

impl std::fmt::Debug for PdfEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfEmitter")
            .field("output_dir", &self.output_dir)
            .field("layout", &self.layout)
            .field("font", &self.font)
            .field("font_dirs", &self.font_dirs)
            .finish()
    }
}

impl PdfEmitter {
    pub fn new(
        output_dir: PathBuf,
        layout: PageLayout,
        font: FontSource,
        viewer: Box<dyn Viewer>,
    ) -> Self {
        Self {
            output_dir,
            layout,
            font,
            font_dirs: default_font_dirs(),
            viewer,
        }
    }

    /// Directories searched for a fallback font when the built-in one
    /// cannot draw the letter.
    pub fn with_font_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.font_dirs = dirs;
        self
    }

    pub fn from_config(output_dir: PathBuf, config: &DocumentConfig, viewer: Box<dyn Viewer>) -> Self {
        Self::new(
            output_dir,
            PageLayout::from_config(config),
            FontSource::from_config(config),
            viewer,
        )
    }

    /// Render `text` to PDF bytes. Returns the bytes and the page count.
    pub fn render(&self, text: &str) -> Result<(Vec<u8>, usize)> {
        let layout = self.layout;
        let (doc, first_page, first_layer) = PdfDocument::new(
            "Letter",
            Mm(layout.width_mm),
            Mm(layout.height_mm),
            LAYER_NAME,
        );
        let font = self.load_font(&doc, self.resolve_font(text)?)?;

        let lines = wrap_text(text, layout.chars_per_line());
        let pages = paginate(&lines, layout.lines_per_page());
        let page_count = pages.len();

        for (index, page_lines) in pages.into_iter().enumerate() {
            let layer = if index == 0 {
                doc.get_page(first_page).get_layer(first_layer)
            } else {
                let (page, layer) =
                    doc.add_page(Mm(layout.width_mm), Mm(layout.height_mm), LAYER_NAME);
                doc.get_page(page).get_layer(layer)
            };

            let mut baseline = layout.first_baseline_mm();
            for line in page_lines {
                if !line.is_empty() {
                    layer.use_text(
                        line.as_str(),
                        layout.font_size_pt,
                        Mm(layout.margin_mm),
                        Mm(baseline),
                        &font,
                    );
                }
                baseline -= layout.line_height_mm();
            }
        }

        if page_count > 1 {
            tracing::warn!(pages = page_count, "Letter did not fit on one page");
        }

        let bytes = doc
            .save_to_bytes()
            .map_err(|e| QuillError::Document(format!("failed to serialize PDF: {}", e)))?;
        Ok((bytes, page_count))
    }

    /// Pick a font with a glyph for every visible character of `text`.
    fn resolve_font(&self, text: &str) -> Result<ResolvedFont> {
        match &self.font {
            FontSource::Builtin => {
                let Some(c) = builtin_missing(text) else {
                    return Ok(ResolvedFont::Helvetica);
                };
                let Some(path) = find_system_font(text, &self.font_dirs) else {
                    return Err(QuillError::Document(format!(
                        "the built-in font cannot draw '{}' (U+{:04X}) and no installed font \
                         covers the letter; set document.font_path to a font for this script",
                        c, c as u32
                    )));
                };
                tracing::info!(font = %path.display(), "Using installed font for non-Latin letter");
                let bytes = read_font(&path)?;
                Ok(ResolvedFont::Embedded { path, bytes })
            }
            FontSource::File(path) => {
                let bytes = read_font(path)?;
                if let Some(c) = missing_glyph(&bytes, text)? {
                    return Err(QuillError::Document(format!(
                        "font {} has no glyph for '{}' (U+{:04X})",
                        path.display(),
                        c,
                        c as u32
                    )));
                }
                Ok(ResolvedFont::Embedded {
                    path: path.clone(),
                    bytes,
                })
            }
        }
    }

    fn load_font(&self, doc: &PdfDocumentReference, font: ResolvedFont) -> Result<IndirectFontRef> {
        match font {
            ResolvedFont::Helvetica => doc
                .add_builtin_font(BuiltinFont::Helvetica)
                .map_err(|e| QuillError::Document(format!("failed to load built-in font: {}", e))),
            ResolvedFont::Embedded { path, bytes } => {
                doc.add_external_font(bytes.as_slice()).map_err(|e| {
                    QuillError::Document(format!("failed to load font {}: {}", path.display(), e))
                })
            }
        }
    }
}

fn read_font(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        QuillError::Document(format!("failed to open font {}: {}", path.display(), e))
    })
}

impl DocumentEmitter for PdfEmitter {
    fn emit(&self, letter_text: &str) -> Result<Artifact> {
        let (bytes, pages) = self.render(letter_text)?;
        let (path, mut file) = create_artifact_file(&self.output_dir)?;
        file.write_all(&bytes)?;
        file.flush()?;
        tracing::info!(
            path = %path.display(),
            pages,
            bytes = bytes.len(),
            "Letter rendered"
        );

        self.viewer.open(&path)?;
        Ok(Artifact { path, pages })
    }
}
