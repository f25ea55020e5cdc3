//! Page geometry and plain-text line layout.
//!
//! Without glyph metrics the layout assumes an average advance of half an em
//! per character, which is close enough for proportional Latin fonts and
//! conservative for most Indic fonts.

use quill_core::config::DocumentConfig;

/// A4 width in millimetres.
pub const A4_WIDTH_MM: f32 = 210.0;
/// A4 height in millimetres.
pub const A4_HEIGHT_MM: f32 = 297.0;

const MM_PER_PT: f32 = 25.4 / 72.0;
const AVG_ADVANCE_EM: f32 = 0.5;
const LINE_SPACING: f32 = 1.4;

/// Fixed page geometry for a rendered letter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_mm: f32,
    pub font_size_pt: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self::a4(20.0, 12.0)
    }
}

impl PageLayout {
    pub fn a4(margin_mm: f32, font_size_pt: f32) -> Self {
        Self {
            width_mm: A4_WIDTH_MM,
            height_mm: A4_HEIGHT_MM,
            margin_mm,
            font_size_pt,
        }
    }

    pub fn from_config(config: &DocumentConfig) -> Self {
        Self::a4(config.margin_cm * 10.0, config.font_size_pt)
    }

    pub fn line_height_mm(&self) -> f32 {
        self.font_size_pt * LINE_SPACING * MM_PER_PT
    }

    pub fn chars_per_line(&self) -> usize {
        let usable = (self.width_mm - 2.0 * self.margin_mm).max(0.0);
        let advance = self.font_size_pt * AVG_ADVANCE_EM * MM_PER_PT;
        ((usable / advance) as usize).max(1)
    }

    pub fn lines_per_page(&self) -> usize {
        let usable = (self.height_mm - 2.0 * self.margin_mm).max(0.0);
        ((usable / self.line_height_mm()) as usize).max(1)
    }

    /// Baseline of the first line, measured from the bottom edge.
    pub fn first_baseline_mm(&self) -> f32 {
        self.height_mm - self.margin_mm - self.font_size_pt * MM_PER_PT
    }
}

/// Greedy word wrap. Explicit newlines are kept and blank lines survive as
/// empty entries. Words longer than a line are split.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        let mut current_len = 0usize;

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > max_chars {
                if current_len > 0 {
                    lines.push(std::mem::take(&mut current));
                    current_len = 0;
                }
                let rest = word.split_off(max_chars);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let needed = if current_len == 0 { word.len() } else { word.len() + 1 };
            if current_len + needed > max_chars && current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if current_len > 0 {
                current.push(' ');
                current_len += 1;
            }
            current.extend(word.iter());
            current_len += word.len();
        }

        lines.push(current);
    }

    lines
}

/// Split laid-out lines into pages. Always yields at least one page.
pub fn paginate(lines: &[String], lines_per_page: usize) -> Vec<&[String]> {
    if lines.is_empty() {
        return vec![lines];
    }
    lines.chunks(lines_per_page.max(1)).collect()
}
