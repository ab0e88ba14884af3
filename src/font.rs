//! Base-14 Times metrics.
//!
//! The report only uses the three Times faces a PDF viewer ships with, so the
//! advance widths are compiled in (AFM units per 1000 em, WinAnsi codes 32..=126).
//! Every measurement and every line break goes through this table; the canvas
//! resolves alignment with it too, so what is measured is what is drawn.

use crate::types::Mm;

const FIRST_CHAR: u32 = 32;
const LAST_CHAR: u32 = 126;
const BULLET_WIDTH: u16 = 350;

#[rustfmt::skip]
const TIMES_ROMAN_WIDTHS: [u16; 95] = [
    250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
    921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
    556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
    333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
    500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541,
];

#[rustfmt::skip]
const TIMES_BOLD_WIDTHS: [u16; 95] = [
    250, 333, 555, 500, 500, 1000, 833, 278, 333, 333, 500, 570, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 570, 570, 570, 500,
    930, 722, 667, 722, 722, 667, 611, 778, 778, 389, 500, 778, 667, 944, 722, 778,
    611, 778, 722, 556, 667, 722, 722, 1000, 722, 722, 667, 333, 278, 333, 581, 500,
    333, 500, 556, 444, 556, 444, 333, 500, 556, 278, 333, 556, 278, 833, 556, 500,
    556, 556, 444, 389, 333, 556, 500, 722, 500, 500, 444, 394, 220, 394, 520,
];

#[rustfmt::skip]
const TIMES_ITALIC_WIDTHS: [u16; 95] = [
    250, 333, 420, 500, 500, 833, 778, 214, 333, 333, 500, 675, 250, 333, 250, 278,
    500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 333, 333, 675, 675, 675, 500,
    920, 611, 611, 667, 722, 611, 611, 722, 722, 333, 444, 667, 556, 833, 667, 722,
    611, 722, 611, 500, 556, 722, 611, 833, 611, 556, 556, 389, 278, 389, 422, 500,
    333, 500, 500, 444, 500, 444, 278, 500, 500, 278, 278, 444, 278, 722, 500, 500,
    500, 500, 389, 389, 278, 500, 444, 667, 444, 444, 389, 400, 275, 400, 541,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FontFace {
    Regular,
    Bold,
    Italic,
}

impl FontFace {
    pub const ALL: [FontFace; 3] = [FontFace::Regular, FontFace::Bold, FontFace::Italic];

    pub fn base_font(self) -> &'static str {
        match self {
            FontFace::Regular => "Times-Roman",
            FontFace::Bold => "Times-Bold",
            FontFace::Italic => "Times-Italic",
        }
    }

    pub fn resource_name(self) -> &'static str {
        match self {
            FontFace::Regular => "F1",
            FontFace::Bold => "F2",
            FontFace::Italic => "F3",
        }
    }

    fn widths(self) -> &'static [u16; 95] {
        match self {
            FontFace::Regular => &TIMES_ROMAN_WIDTHS,
            FontFace::Bold => &TIMES_BOLD_WIDTHS,
            FontFace::Italic => &TIMES_ITALIC_WIDTHS,
        }
    }

    fn missing_width(self) -> u16 {
        500
    }

    fn advance_for_char(self, ch: char) -> u16 {
        let code = ch as u32;
        if ch == '\u{2022}' {
            return BULLET_WIDTH;
        }
        if !(FIRST_CHAR..=LAST_CHAR).contains(&code) {
            return self.missing_width();
        }
        self.widths()[(code - FIRST_CHAR) as usize]
    }
}

/// Width of `text` set in `face` at `size_pt` points.
pub fn text_width(face: FontFace, size_pt: f32, text: &str) -> Mm {
    let units: u32 = text.chars().map(|ch| face.advance_for_char(ch) as u32).sum();
    if units == 0 {
        return Mm::ZERO;
    }
    Mm::from_pt(size_pt * units as f32 / 1000.0)
}

/// Greedy word wrap. Explicit newlines always break; a word wider than
/// `max_width` on its own is broken between characters.
pub fn wrap_text(face: FontFace, size_pt: f32, text: &str, max_width: Mm) -> Vec<String> {
    let max_width = max_width.max(Mm::from_f32(1.0));
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width(face, size_pt, &candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if text_width(face, size_pt, word) <= max_width {
                current = word.to_string();
            } else {
                let mut pieces = break_word(face, size_pt, word, max_width);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

fn break_word(face: FontFace, size_pt: f32, word: &str, max_width: Mm) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in word.chars() {
        current.push(ch);
        if current.chars().count() > 1 && text_width(face, size_pt, &current) > max_width {
            current.pop();
            pieces.push(std::mem::take(&mut current));
            current.push(ch);
        }
    }
    pieces.push(current);
    pieces
}
