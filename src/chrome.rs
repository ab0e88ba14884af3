//! Repeating per-page decoration: watermark, header band, footer number.

use crate::canvas::{Canvas, TextAlign, TextStyle};
use crate::error::ReportError;
use crate::font::FontFace;
use crate::style::ReportStyle;
use crate::types::{Mm, Rect};

pub const LOGO_RESOURCE_ID: &str = "logo";

pub const HEADER_LOGO_BOX: f32 = 6.0;
pub const COVER_LOGO_BOX: f32 = 45.0;
pub const WATERMARK_LOGO_BOX: f32 = 120.0;
pub const SEAL_LOGO_BOX: f32 = 25.0;

const HEADER_RULE_Y: f32 = 15.0;
const HEADER_LOGO_Y: f32 = 6.0;
const HEADER_BASELINE: f32 = 11.0;
const FOOTER_FROM_BOTTOM: f32 = 10.0;
const WATERMARK_LOGO_OPACITY: f32 = 0.05;
const WATERMARK_TEXT_PT: f32 = 60.0;
const WATERMARK_ANGLE: f32 = 45.0;

/// A registered, drawable brand logo.
#[derive(Debug, Clone, PartialEq)]
pub struct BrandMark {
    pub resource_id: String,
    pub aspect_ratio: f32,
}

/// Scales a `ratio` (width / height) image into a `max` square box:
/// landscape fixes the width, portrait and square fix the height.
pub fn fit_within(ratio: f32, max: Mm) -> (Mm, Mm) {
    let ratio = if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        1.0
    };
    if ratio > 1.0 {
        (max, max / ratio)
    } else {
        (max * ratio, max)
    }
}

impl BrandMark {
    pub fn fit(&self, max: Mm) -> (Mm, Mm) {
        fit_within(self.aspect_ratio, max)
    }
}

pub struct PageChrome<'a> {
    style: &'a ReportStyle,
    logo: Option<&'a BrandMark>,
}

impl<'a> PageChrome<'a> {
    pub fn new(style: &'a ReportStyle, logo: Option<&'a BrandMark>) -> Self {
        Self { style, logo }
    }

    /// Drawn first on every page, beneath all content.
    pub fn draw_watermark(&self, canvas: &mut Canvas) -> Result<(), ReportError> {
        let geometry = &self.style.geometry;
        let center_x = geometry.center_x();
        let center_y = geometry.page.height.mul_ratio(1, 2);

        if let Some(logo) = self.logo {
            let (width, height) = logo.fit(Mm::from_f32(WATERMARK_LOGO_BOX));
            let rect = Rect::new(
                center_x - width.mul_ratio(1, 2),
                center_y - height.mul_ratio(1, 2),
                width,
                height,
            );
            canvas.save_state();
            canvas.set_opacity(WATERMARK_LOGO_OPACITY);
            let drawn = canvas.draw_image(rect, &logo.resource_id);
            canvas.restore_state();
            drawn?;
        }

        let text = TextStyle::new(FontFace::Bold, WATERMARK_TEXT_PT, self.style.palette.watermark);
        // Drop the baseline so the glyphs' optical center sits on the pivot.
        let baseline = Mm::from_pt(WATERMARK_TEXT_PT * 0.33);
        canvas.save_state();
        canvas.translate(center_x, center_y);
        canvas.rotate(WATERMARK_ANGLE);
        canvas.draw_text(&self.style.brand.wordmark, Mm::ZERO, baseline, &text, TextAlign::Center);
        canvas.restore_state();
        Ok(())
    }

    /// Header band for interior pages; never drawn on the cover.
    pub fn draw_header(&self, canvas: &mut Canvas) -> Result<(), ReportError> {
        let geometry = &self.style.geometry;
        let palette = &self.style.palette;
        let left = geometry.content_left();
        let right = geometry.content_right();
        let rule_y = Mm::from_f32(HEADER_RULE_Y);
        canvas.draw_line(left, rule_y, right, rule_y, palette.accent, Mm::from_f32(0.5));

        let baseline = Mm::from_f32(HEADER_BASELINE);
        let mut wordmark_x = left;
        if let Some(logo) = self.logo {
            let (width, height) = logo.fit(Mm::from_f32(HEADER_LOGO_BOX));
            canvas.draw_image(
                Rect::new(left, Mm::from_f32(HEADER_LOGO_Y), width, height),
                &logo.resource_id,
            )?;
            wordmark_x = left + width + Mm::from_i32(2);
        }
        canvas.draw_text(
            &self.style.brand.wordmark,
            wordmark_x,
            baseline,
            &self.style.wordmark(),
            TextAlign::Left,
        );
        canvas.draw_text(
            &self.style.brand.header_tagline,
            right,
            baseline,
            &self.style.tagline(),
            TextAlign::Right,
        );
        Ok(())
    }

    pub fn draw_footer(&self, canvas: &mut Canvas, page_number: usize) {
        let geometry = &self.style.geometry;
        let y = geometry.page.height - Mm::from_f32(FOOTER_FROM_BOTTOM);
        canvas.draw_text(
            &page_number.to_string(),
            geometry.center_x(),
            y,
            &self.style.footer(),
            TextAlign::Center,
        );
        canvas.meta(crate::META_FOOTER_KEY, page_number.to_string());
    }
}
