//! Immutable style context threaded through every block and chrome call.

use crate::canvas::TextStyle;
use crate::font::FontFace;
use crate::types::{Color, Margins, Mm, Size};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    /// Headings, labels, highlight values, filled accents.
    pub primary: Color,
    /// Rules, card borders, ticks, italic call-outs.
    pub accent: Color,
    pub text: Color,
    pub muted: Color,
    /// Wordmark watermark tint.
    pub watermark: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            primary: Color::rgb8(0, 60, 50),
            accent: Color::rgb8(180, 130, 50),
            text: Color::rgb8(40, 40, 40),
            muted: Color::rgb8(100, 100, 100),
            watermark: Color::rgb8(232, 238, 236),
        }
    }
}

/// Brand strings printed by the chrome, cover and closing seal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Brand {
    pub wordmark: String,
    pub header_tagline: String,
    pub cover_tagline: String,
    pub prepared_for: String,
    pub closing_line: String,
    pub document_title: String,
}

impl Default for Brand {
    fn default() -> Self {
        Self {
            wordmark: "KALPVRIKSHA".to_string(),
            header_tagline: "Astrological Analysis".to_string(),
            cover_tagline: "Professional Astrological Services".to_string(),
            prepared_for: "Astrological Consultation For".to_string(),
            closing_line: "May the stars guide you.".to_string(),
            document_title: "Astrological Consultation".to_string(),
        }
    }
}

/// Geometry shared by the layout engine, chrome and blocks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub page: Size,
    pub margins: Margins,
    /// Cursor after a page break: the top margin plus the header clearance.
    pub interior_top: Mm,
    /// Cursor on the first content page, one clearance below `interior_top`.
    pub profile_top: Mm,
}

/// Space kept below the top margin for the header band.
const HEADER_CLEARANCE: i32 = 10;

impl PageGeometry {
    pub fn new(page: Size, margins: Margins) -> Self {
        let interior_top = margins.top + Mm::from_i32(HEADER_CLEARANCE);
        Self {
            page,
            margins,
            interior_top,
            profile_top: interior_top + Mm::from_i32(HEADER_CLEARANCE),
        }
    }

    pub fn content_left(&self) -> Mm {
        self.margins.left
    }

    pub fn content_right(&self) -> Mm {
        self.page.width - self.margins.right
    }

    pub fn content_width(&self) -> Mm {
        self.content_right() - self.content_left()
    }

    /// Lowest y a block may reach.
    pub fn bottom_limit(&self) -> Mm {
        self.page.height - self.margins.bottom
    }

    pub fn center_x(&self) -> Mm {
        self.page.width.mul_ratio(1, 2)
    }

    pub fn interior_height(&self) -> Mm {
        self.bottom_limit() - self.interior_top
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.page.is_positive() {
            return Err("page size must be positive".to_string());
        }
        let m = self.margins;
        if m.top < Mm::ZERO || m.right < Mm::ZERO || m.bottom < Mm::ZERO || m.left < Mm::ZERO {
            return Err("margins must not be negative".to_string());
        }
        if self.content_width() <= Mm::ZERO {
            return Err("horizontal margins leave no content width".to_string());
        }
        if self.interior_top >= self.bottom_limit() || self.profile_top >= self.bottom_limit() {
            return Err("vertical margins leave no content height".to_string());
        }
        Ok(())
    }
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::new(Size::a4(), Margins::all(20.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportStyle {
    pub geometry: PageGeometry,
    pub palette: Palette,
    pub brand: Brand,
}

impl ReportStyle {
    pub const LINE_HEIGHT: f32 = 5.0;
    pub const BLOCK_SPACING: f32 = 4.0;
    pub const LABEL_COLUMN: f32 = 45.0;

    pub fn new(geometry: PageGeometry, palette: Palette, brand: Brand) -> Self {
        Self {
            geometry,
            palette,
            brand,
        }
    }

    pub fn line_height(&self) -> Mm {
        Mm::from_f32(Self::LINE_HEIGHT)
    }

    pub fn block_spacing(&self) -> Mm {
        Mm::from_f32(Self::BLOCK_SPACING)
    }

    pub fn label_column(&self) -> Mm {
        Mm::from_f32(Self::LABEL_COLUMN)
    }

    pub fn section_title(&self) -> TextStyle {
        TextStyle::new(FontFace::Bold, 14.0, self.palette.primary)
    }

    pub fn label(&self) -> TextStyle {
        TextStyle::new(FontFace::Bold, 10.0, self.palette.primary)
    }

    pub fn body(&self) -> TextStyle {
        TextStyle::new(FontFace::Regular, 10.0, self.palette.text)
    }

    pub fn card_title(&self) -> TextStyle {
        TextStyle::new(FontFace::Bold, 10.0, self.palette.primary)
    }

    pub fn highlight_label(&self) -> TextStyle {
        TextStyle::new(FontFace::Bold, 7.0, self.palette.muted)
    }

    pub fn highlight_value(&self) -> TextStyle {
        TextStyle::new(FontFace::Bold, 10.0, self.palette.primary)
    }

    pub fn wordmark(&self) -> TextStyle {
        TextStyle::new(FontFace::Bold, 8.0, self.palette.primary)
    }

    pub fn tagline(&self) -> TextStyle {
        TextStyle::new(FontFace::Regular, 8.0, self.palette.muted)
    }

    pub fn footer(&self) -> TextStyle {
        TextStyle::new(FontFace::Regular, 8.0, self.palette.muted)
    }

    pub fn closing_line(&self) -> TextStyle {
        TextStyle::new(FontFace::Italic, 8.0, self.palette.accent)
    }
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self::new(PageGeometry::default(), Palette::default(), Brand::default())
    }
}
