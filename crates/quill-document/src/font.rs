//! Glyph coverage checks and system font discovery.
//!
//! The built-in PDF fonts only carry WinAnsi glyphs. Letters in Indic
//! scripts need an embedded TrueType/OpenType font, either configured with
//! `document.font_path` or found in the platform font directories.

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontRef};
use quill_core::{QuillError, Result};

/// Directory depth searched below each font root.
const MAX_SEARCH_DEPTH: usize = 4;

/// Upper bound on font files parsed during one discovery.
const MAX_FONTS_CHECKED: usize = 256;

/// Characters Windows-1252 adds in the 0x80-0x9F range.
const CP1252_EXTRAS: &str = "€‚ƒ„…†‡ˆ‰Š‹ŒŽ‘’“”•–—˜™š›œžŸ";

/// Whether the built-in Helvetica can draw `c`.
pub fn builtin_supports(c: char) -> bool {
    matches!(c, ' '..='~' | '\u{A0}'..='\u{FF}') || c.is_whitespace() || CP1252_EXTRAS.contains(c)
}

/// First character of `text` the built-in font cannot draw.
pub fn builtin_missing(text: &str) -> Option<char> {
    text.chars().find(|&c| !builtin_supports(c))
}

/// First visible character of `text` that the font in `bytes` has no glyph for.
pub fn missing_glyph(bytes: &[u8], text: &str) -> Result<Option<char>> {
    let font = FontRef::try_from_slice(bytes)
        .map_err(|e| QuillError::Document(format!("unreadable font data: {}", e)))?;
    Ok(text
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .find(|&c| font.glyph_id(c).0 == 0))
}

/// Font name fragments worth trying first for the script of `c`.
fn script_hints(c: char) -> &'static [&'static str] {
    match c {
        '\u{0900}'..='\u{097F}' => &["devanagari", "mangal", "nirmala"],
        '\u{0980}'..='\u{09FF}' => &["bengali", "vrinda", "nirmala"],
        '\u{0A00}'..='\u{0A7F}' => &["gurmukhi", "raavi", "nirmala"],
        '\u{0A80}'..='\u{0AFF}' => &["gujarati", "shruti", "nirmala"],
        '\u{0B00}'..='\u{0B7F}' => &["oriya", "odia", "kalinga", "nirmala"],
        '\u{0B80}'..='\u{0BFF}' => &["tamil", "latha", "nirmala"],
        '\u{0C00}'..='\u{0C7F}' => &["telugu", "gautami", "nirmala"],
        '\u{0C80}'..='\u{0CFF}' => &["kannada", "tunga", "nirmala"],
        '\u{0D00}'..='\u{0D7F}' => &["malayalam", "kartika", "nirmala"],
        _ => &[],
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
        .unwrap_or(false)
}

fn collect_font_files(dir: &Path, depth: usize, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth < MAX_SEARCH_DEPTH {
                collect_font_files(&path, depth + 1, found);
            }
        } else if is_font_file(&path) {
            found.push(path);
        }
    }
}

/// Find an installed font that has a glyph for every visible char of `text`.
///
/// Files whose names match the text's script are tried first. Returns `None`
/// when nothing under `dirs` covers the text.
pub fn find_system_font(text: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    let mut hints: Vec<&str> = Vec::new();
    for c in text.chars() {
        for &hint in script_hints(c) {
            if !hints.contains(&hint) {
                hints.push(hint);
            }
        }
    }

    let mut files = Vec::new();
    for dir in dirs {
        collect_font_files(dir, 0, &mut files);
    }
    files.sort();
    let rank = |path: &PathBuf| {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let hinted = hints.iter().position(|h| name.contains(h)).unwrap_or(hints.len());
        // Regular weights before bold/italic variants of the same family.
        (hinted, !name.contains("regular"))
    };
    files.sort_by_key(|path| rank(path));

    for path in files.into_iter().take(MAX_FONTS_CHECKED) {
        let Ok(bytes) = std::fs::read(&path) else {
            continue;
        };
        match missing_glyph(&bytes, text) {
            Ok(None) => {
                tracing::debug!(font = %path.display(), "Found font covering the letter");
                return Some(path);
            }
            Ok(Some(_)) => {}
            Err(e) => tracing::trace!(font = %path.display(), error = %e, "Skipping font"),
        }
    }
    None
}

/// Platform font directories searched when no font is configured.
pub fn default_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    #[cfg(target_os = "windows")]
    {
        let windir = std::env::var_os("WINDIR").unwrap_or_else(|| "C:\\Windows".into());
        dirs.push(PathBuf::from(windir).join("Fonts"));
        if let Some(local) = std::env::var_os("LOCALAPPDATA") {
            dirs.push(PathBuf::from(local).join("Microsoft").join("Windows").join("Fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Some(home) = home_dir() {
            dirs.push(home.join("Library").join("Fonts"));
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Some(home) = home_dir() {
            dirs.push(home.join(".local").join("share").join("fonts"));
            dirs.push(home.join(".fonts"));
        }
    }

    dirs
}

#[cfg(not(target_os = "windows"))]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
