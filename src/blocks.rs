//! Content blocks. Each block measures its own height before the layout engine
//! reserves space for it, then draws entirely inside `[top, top + height)`.

use crate::accent::AccentSource;
use crate::canvas::{Canvas, PaintMode, TextAlign, TextStyle};
use crate::chrome::{BrandMark, COVER_LOGO_BOX, SEAL_LOGO_BOX};
use crate::error::ReportError;
use crate::font::FontFace;
use crate::record::{EncodedImage, LabeledValue};
use crate::style::ReportStyle;
use crate::types::{Mm, Rect};
use chrono::NaiveDate;

pub const HIGHLIGHT_COLUMNS: usize = 3;
const HIGHLIGHT_CARD_HEIGHT: f32 = 22.0;
const HIGHLIGHT_GAP: f32 = 5.0;
const TITLE_GAP: f32 = 5.0;
const TITLE_HEIGHT: f32 = 13.0;
const TITLE_KEEP: f32 = 8.0;
const MARKER_RADIUS: f32 = 1.2;
const ART_RATIO_W: i32 = 16;
const ART_RATIO_H: i32 = 9;
const INLINE_ART_MAX_WIDTH: f32 = 110.0;
const SEAL_GAP: f32 = 20.0;

pub const META_HIGHLIGHT_CARD_KEY: &str = "highlight.card";

/// Shared, read-only inputs for measuring and drawing.
pub struct BlockEnv<'a> {
    pub style: &'a ReportStyle,
    pub logo: Option<&'a BrandMark>,
}

pub trait Block {
    fn name(&self) -> String;

    /// Registers resources the block needs. Runs before any space is reserved,
    /// so a failure here skips the block without touching the page.
    fn prepare(&self, _canvas: &mut Canvas) -> Result<(), ReportError> {
        Ok(())
    }

    /// Height the block occupies, excluding inter-block spacing.
    fn measure(&self, canvas: &Canvas, env: &BlockEnv<'_>) -> Mm;

    /// Extra space that must follow on the same page (titles keep with content).
    fn keep_with_next(&self, _env: &BlockEnv<'_>) -> Mm {
        Mm::ZERO
    }

    fn draw(
        &self,
        canvas: &mut Canvas,
        env: &BlockEnv<'_>,
        accent: &mut dyn AccentSource,
        top: Mm,
    ) -> Result<(), ReportError>;
}

pub struct SectionTitle {
    text: String,
    keep: Option<Mm>,
}

impl SectionTitle {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keep: None,
        }
    }

    pub fn keep_with(mut self, height: Mm) -> Self {
        self.keep = Some(height);
        self
    }
}

impl Block for SectionTitle {
    fn name(&self) -> String {
        format!("section-title:{}", self.text)
    }

    fn measure(&self, _canvas: &Canvas, _env: &BlockEnv<'_>) -> Mm {
        Mm::from_f32(TITLE_HEIGHT)
    }

    fn keep_with_next(&self, _env: &BlockEnv<'_>) -> Mm {
        self.keep.unwrap_or_else(|| Mm::from_f32(TITLE_KEEP))
    }

    fn draw(
        &self,
        canvas: &mut Canvas,
        env: &BlockEnv<'_>,
        _accent: &mut dyn AccentSource,
        top: Mm,
    ) -> Result<(), ReportError> {
        let left = env.style.geometry.content_left();
        let tick_top = top + Mm::from_f32(TITLE_GAP);
        canvas.draw_line(
            left,
            tick_top,
            left,
            tick_top + Mm::from_i32(6),
            env.style.palette.accent,
            Mm::from_i32(1),
        );
        canvas.draw_text(
            &self.text.to_uppercase(),
            left + Mm::from_i32(4),
            tick_top + Mm::from_i32(5),
            &env.style.section_title(),
            TextAlign::Left,
        );
        Ok(())
    }
}

/// Label in a fixed left column, value wrapped in the remaining width.
pub struct LabelValue {
    label: String,
    value: String,
}

impl LabelValue {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        let value = if value.trim().is_empty() {
            "-".to_string()
        } else {
            value
        };
        Self {
            label: label.into(),
            value,
        }
    }

    fn columns(&self, canvas: &Canvas, style: &ReportStyle) -> (Vec<String>, Vec<String>) {
        let label_width = style.label_column() - Mm::from_i32(2);
        let value_width = style.geometry.content_width() - style.label_column();
        (
            canvas.wrap_text(&self.label, &style.label(), label_width),
            canvas.wrap_text(&self.value, &style.body(), value_width),
        )
    }
}

impl Block for LabelValue {
    fn name(&self) -> String {
        format!("label-value:{}", self.label)
    }

    fn measure(&self, canvas: &Canvas, env: &BlockEnv<'_>) -> Mm {
        let label_lines = canvas.measure_wrapped_lines(
            &self.label,
            &env.style.label(),
            env.style.label_column() - Mm::from_i32(2),
        );
        let value_lines = canvas.measure_wrapped_lines(
            &self.value,
            &env.style.body(),
            env.style.geometry.content_width() - env.style.label_column(),
        );
        env.style.line_height() * label_lines.max(value_lines) as i32
    }

    fn draw(
        &self,
        canvas: &mut Canvas,
        env: &BlockEnv<'_>,
        _accent: &mut dyn AccentSource,
        top: Mm,
    ) -> Result<(), ReportError> {
        let style = env.style;
        let (label_lines, value_lines) = self.columns(canvas, style);
        let left = style.geometry.content_left();
        let baseline = top + Mm::from_i32(4);
        canvas.draw_lines(
            &label_lines,
            left,
            baseline,
            style.line_height(),
            &style.label(),
            TextAlign::Left,
        );
        canvas.draw_lines(
            &value_lines,
            left + style.label_column(),
            baseline,
            style.line_height(),
            &style.body(),
            TextAlign::Left,
        );
        Ok(())
    }
}

/// Up to six highlight cards, three per row.
pub struct HighlightGrid {
    items: Vec<LabeledValue>,
}

impl HighlightGrid {
    pub fn new(items: &[LabeledValue]) -> Self {
        let end = items.len().min(crate::record::MAX_HIGHLIGHTS);
        Self {
            items: items[..end].to_vec(),
        }
    }

    pub fn rows(&self) -> usize {
        self.items.len().div_ceil(HIGHLIGHT_COLUMNS)
    }

    pub fn height(&self) -> Mm {
        Mm::from_f32(HIGHLIGHT_CARD_HEIGHT + HIGHLIGHT_GAP) * self.rows() as i32
    }

    fn card_width(style: &ReportStyle) -> Mm {
        let gaps = Mm::from_f32(HIGHLIGHT_GAP) * (HIGHLIGHT_COLUMNS as i32 - 1);
        (style.geometry.content_width() - gaps) / HIGHLIGHT_COLUMNS as i32
    }
}

impl Block for HighlightGrid {
    fn name(&self) -> String {
        format!("highlight-grid:{}", self.items.len())
    }

    fn measure(&self, _canvas: &Canvas, _env: &BlockEnv<'_>) -> Mm {
        self.height()
    }

    fn draw(
        &self,
        canvas: &mut Canvas,
        env: &BlockEnv<'_>,
        accent: &mut dyn AccentSource,
        top: Mm,
    ) -> Result<(), ReportError> {
        let style = env.style;
        let palette = &style.palette;
        let card_width = Self::card_width(style);
        let card_height = Mm::from_f32(HIGHLIGHT_CARD_HEIGHT);
        let gap = Mm::from_f32(HIGHLIGHT_GAP);
        let bar_inset = Mm::from_i32(6);
        let bar_width = card_width - bar_inset * 2;

        for (index, item) in self.items.iter().enumerate() {
            let col = (index % HIGHLIGHT_COLUMNS) as i32;
            let row = (index / HIGHLIGHT_COLUMNS) as i32;
            let x = style.geometry.content_left() + (card_width + gap) * col;
            let y = top + (card_height + gap) * row;
            let card = Rect::new(x, y, card_width, card_height);
            let center = card.center_x();

            canvas.set_stroke_color(palette.accent);
            canvas.set_line_width(Mm::from_f32(0.2));
            canvas.rounded_rect(card, Mm::from_i32(1), PaintMode::Stroke);

            canvas.draw_text(
                &item.label.to_uppercase(),
                center,
                y + Mm::from_i32(6),
                &style.highlight_label(),
                TextAlign::Center,
            );
            let value_lines =
                canvas.wrap_text(&item.value, &style.highlight_value(), card_width - Mm::from_i32(4));
            canvas.draw_lines(
                &value_lines,
                center,
                y + Mm::from_i32(14),
                Mm::from_f32(4.0),
                &style.highlight_value(),
                TextAlign::Center,
            );

            let bar_y = y + card_height - Mm::from_i32(3);
            canvas.fill_rect(Rect::new(x + bar_inset, bar_y, bar_width, Mm::from_i32(1)), palette.accent);
            let filled = bar_width * accent.next_fill();
            canvas.fill_rect(Rect::new(x + bar_inset, bar_y, filled, Mm::from_i32(1)), palette.primary);

            canvas.meta(
                META_HIGHLIGHT_CARD_KEY,
                format!("{row},{col},{}", item.label),
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Diamond,
    Circle,
    Triangle,
    Square,
}

impl Marker {
    fn draw(self, canvas: &mut Canvas, x: Mm, cy: Mm, env: &BlockEnv<'_>) {
        let r = Mm::from_f32(MARKER_RADIUS);
        canvas.set_fill_color(env.style.palette.accent);
        match self {
            Marker::Diamond => {
                canvas.triangle([(x, cy - r), (x + r, cy), (x - r, cy)], PaintMode::Fill);
                canvas.triangle([(x, cy + r), (x + r, cy), (x - r, cy)], PaintMode::Fill);
            }
            Marker::Circle => canvas.circle(x, cy, r, PaintMode::Fill),
            Marker::Triangle => {
                canvas.triangle([(x, cy - r), (x + r, cy + r), (x - r, cy + r)], PaintMode::Fill);
            }
            Marker::Square => {
                canvas.fill_rect(Rect::new(x - r, cy - r, r * 2, r * 2), env.style.palette.accent);
            }
        }
    }
}

/// Titled card with a vertical accent bar and an optional marker glyph.
pub struct Card {
    title: String,
    body: String,
    marker: Option<Marker>,
}

impl Card {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            marker: None,
        }
    }

    /// One bullet line per item.
    pub fn bulleted<S: AsRef<str>>(title: impl Into<String>, items: &[S]) -> Self {
        let body = items
            .iter()
            .map(|item| format!("\u{2022} {}", item.as_ref()))
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(title, body)
    }

    /// One numbered line per item, starting at 1.
    pub fn numbered<S: AsRef<str>>(title: impl Into<String>, items: &[S]) -> Self {
        let body = items
            .iter()
            .enumerate()
            .map(|(index, item)| format!("{}. {}", index + 1, item.as_ref()))
            .collect::<Vec<_>>()
            .join("\n");
        Self::new(title, body)
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    fn body_width(style: &ReportStyle) -> Mm {
        style.geometry.content_width() - Mm::from_i32(8)
    }
}

impl Block for Card {
    fn name(&self) -> String {
        format!("card:{}", self.title)
    }

    fn measure(&self, canvas: &Canvas, env: &BlockEnv<'_>) -> Mm {
        let lines = canvas.measure_wrapped_lines(&self.body, &env.style.body(), Self::body_width(env.style));
        env.style.line_height() * lines as i32 + Mm::from_i32(8)
    }

    fn draw(
        &self,
        canvas: &mut Canvas,
        env: &BlockEnv<'_>,
        _accent: &mut dyn AccentSource,
        top: Mm,
    ) -> Result<(), ReportError> {
        let style = env.style;
        let left = style.geometry.content_left();
        let height = self.measure(canvas, env);
        canvas.draw_line(
            left,
            top,
            left,
            top + height - Mm::from_i32(1),
            style.palette.accent,
            Mm::from_f32(0.8),
        );

        let mut title_x = left + Mm::from_i32(5);
        if let Some(marker) = self.marker {
            marker.draw(canvas, left + Mm::from_i32(5), top + Mm::from_i32(3), env);
            title_x = left + Mm::from_i32(12);
        }
        canvas.draw_text(
            &self.title,
            title_x,
            top + Mm::from_i32(4),
            &style.card_title(),
            TextAlign::Left,
        );

        let lines = canvas.wrap_text(&self.body, &style.body(), Self::body_width(style));
        canvas.draw_lines(
            &lines,
            left + Mm::from_i32(5),
            top + Mm::from_i32(10),
            style.line_height(),
            &style.body(),
            TextAlign::Left,
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllustrationWidth {
    /// Centered in the full content width.
    Full,
    /// Centered, limited to a narrower box.
    Inline,
}

#[derive(Debug, Clone, Copy)]
enum Artwork<'a> {
    Bytes(&'a [u8]),
    Encoded(&'a EncodedImage),
}

/// Generated artwork, assumed 16:9 and scaled to a target height.
pub struct Illustration<'a> {
    resource_id: &'static str,
    artwork: Artwork<'a>,
    target_height: Mm,
    width_mode: IllustrationWidth,
}

impl<'a> Illustration<'a> {
    pub fn new(
        resource_id: &'static str,
        bytes: &'a [u8],
        target_height: Mm,
        width_mode: IllustrationWidth,
    ) -> Self {
        Self {
            resource_id,
            artwork: Artwork::Bytes(bytes),
            target_height,
            width_mode,
        }
    }

    /// Artwork still in its wire encoding; decoded when the block is prepared.
    pub fn encoded(
        resource_id: &'static str,
        image: &'a EncodedImage,
        target_height: Mm,
        width_mode: IllustrationWidth,
    ) -> Self {
        Self {
            resource_id,
            artwork: Artwork::Encoded(image),
            target_height,
            width_mode,
        }
    }

    fn max_width(&self, style: &ReportStyle) -> Mm {
        let content = style.geometry.content_width();
        match self.width_mode {
            IllustrationWidth::Full => content,
            IllustrationWidth::Inline => content.min(Mm::from_f32(INLINE_ART_MAX_WIDTH)),
        }
    }

    /// Width and height after clamping the 16:9 box to the available width.
    pub fn size(&self, style: &ReportStyle) -> (Mm, Mm) {
        let width = self.target_height.mul_ratio(ART_RATIO_W, ART_RATIO_H);
        let max_width = self.max_width(style);
        if width > max_width {
            (max_width, max_width.mul_ratio(ART_RATIO_H, ART_RATIO_W))
        } else {
            (width, self.target_height)
        }
    }
}

impl Block for Illustration<'_> {
    fn name(&self) -> String {
        format!("illustration:{}", self.resource_id)
    }

    fn prepare(&self, canvas: &mut Canvas) -> Result<(), ReportError> {
        match self.artwork {
            Artwork::Bytes(bytes) => canvas.register_image(self.resource_id, bytes),
            Artwork::Encoded(image) => canvas.register_image(self.resource_id, &image.decode()?),
        }
        .map(|_| ())
    }

    fn measure(&self, _canvas: &Canvas, env: &BlockEnv<'_>) -> Mm {
        self.size(env.style).1
    }

    fn draw(
        &self,
        canvas: &mut Canvas,
        env: &BlockEnv<'_>,
        _accent: &mut dyn AccentSource,
        top: Mm,
    ) -> Result<(), ReportError> {
        let (width, height) = self.size(env.style);
        let geometry = &env.style.geometry;
        let x = geometry.content_left() + (geometry.content_width() - width).mul_ratio(1, 2);
        canvas.draw_image(Rect::new(x, top, width, height), self.resource_id)
    }
}

/// Centered logo and closing line after the last section.
pub struct ClosingSeal;

impl ClosingSeal {
    fn logo_size(env: &BlockEnv<'_>) -> Option<(Mm, Mm)> {
        env.logo.map(|logo| logo.fit(Mm::from_f32(SEAL_LOGO_BOX)))
    }
}

impl Block for ClosingSeal {
    fn name(&self) -> String {
        "closing-seal".to_string()
    }

    fn measure(&self, _canvas: &Canvas, env: &BlockEnv<'_>) -> Mm {
        let logo_height = Self::logo_size(env).map(|(_, h)| h).unwrap_or(Mm::ZERO);
        Mm::from_f32(SEAL_GAP) + logo_height + Mm::from_i32(8)
    }

    fn draw(
        &self,
        canvas: &mut Canvas,
        env: &BlockEnv<'_>,
        _accent: &mut dyn AccentSource,
        top: Mm,
    ) -> Result<(), ReportError> {
        let center = env.style.geometry.center_x();
        let mut y = top + Mm::from_f32(SEAL_GAP);
        if let (Some(logo), Some((width, height))) = (env.logo, Self::logo_size(env)) {
            canvas.draw_image(
                Rect::new(center - width.mul_ratio(1, 2), y, width, height),
                &logo.resource_id,
            )?;
            y += height;
        }
        canvas.draw_text(
            &env.style.brand.closing_line,
            center,
            y + Mm::from_i32(5),
            &env.style.closing_line(),
            TextAlign::Center,
        );
        Ok(())
    }
}

/// One-shot cover composition on the first page.
pub struct Cover<'a> {
    pub client_name: &'a str,
    pub date: NaiveDate,
}

impl Cover<'_> {
    pub fn draw(&self, canvas: &mut Canvas, env: &BlockEnv<'_>) -> Result<(), ReportError> {
        let style = env.style;
        let geometry = &style.geometry;
        let palette = &style.palette;
        let left = geometry.content_left();
        let page_height = geometry.page.height;

        canvas.draw_text(
            &format_cover_date(self.date),
            geometry.content_right(),
            Mm::from_i32(30),
            &TextStyle::new(FontFace::Regular, 10.0, palette.muted),
            TextAlign::Right,
        );

        let center_y = page_height.mul_ratio(1, 2) - Mm::from_i32(20);
        if let Some(logo) = env.logo {
            let (width, height) = logo.fit(Mm::from_f32(COVER_LOGO_BOX));
            let logo_rect = Rect::new(
                geometry.center_x() - width.mul_ratio(1, 2),
                center_y - Mm::from_i32(55),
                width,
                height,
            );
            if let Err(err) = canvas.draw_image(logo_rect, &logo.resource_id) {
                log::warn!("cover logo skipped: {err}");
            }
        }

        canvas.draw_text(
            &style.brand.prepared_for,
            left,
            center_y,
            &TextStyle::new(FontFace::Italic, 12.0, palette.accent),
            TextAlign::Left,
        );

        let name_style = TextStyle::new(FontFace::Bold, 32.0, palette.primary);
        let name_lines = canvas.wrap_text(self.client_name, &name_style, geometry.content_width());
        canvas.draw_lines(
            &name_lines,
            left,
            center_y + Mm::from_i32(15),
            Mm::from_i32(13),
            &name_style,
            TextAlign::Left,
        );

        let extra = Mm::from_i32(13) * (name_lines.len().max(1) as i32 - 1);
        let rule_y = center_y + Mm::from_i32(30) + extra;
        canvas.draw_line(left, rule_y, left + Mm::from_i32(40), rule_y, palette.primary, Mm::from_f32(0.5));

        canvas.draw_text(
            &style.brand.wordmark,
            left,
            page_height - Mm::from_i32(30),
            &TextStyle::new(FontFace::Bold, 10.0, palette.text),
            TextAlign::Left,
        );
        canvas.draw_text(
            &style.brand.cover_tagline,
            left,
            page_height - Mm::from_i32(25),
            &TextStyle::new(FontFace::Regular, 9.0, palette.muted),
            TextAlign::Left,
        );
        canvas.meta(crate::META_BLOCK_KEY, "cover");
        Ok(())
    }
}

/// "Month D, YYYY".
pub fn format_cover_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accent::FixedAccent;
    use crate::canvas::Command;
    use crate::types::Size;

    fn env(style: &ReportStyle) -> BlockEnv<'_> {
        BlockEnv { style, logo: None }
    }

    fn canvas() -> Canvas {
        Canvas::new(Size::a4()).expect("canvas")
    }

    fn highlights(n: usize) -> Vec<LabeledValue> {
        (0..n)
            .map(|i| LabeledValue::new(format!("Label {i}"), format!("Value {i}")))
            .collect()
    }

    #[test]
    fn grid_rows_and_cards_follow_item_count() {
        let style = ReportStyle::default();
        for n in 0..=6 {
            let grid = HighlightGrid::new(&highlights(n));
            let mut canvas = canvas();
            grid.draw(&mut canvas, &env(&style), &mut FixedAccent(0.5), Mm::from_i32(40))
                .expect("draw");
            let cards: Vec<String> = canvas
                .page(0)
                .expect("page")
                .meta_values(META_HIGHLIGHT_CARD_KEY)
                .map(str::to_string)
                .collect();
            assert_eq!(cards.len(), n);
            assert_eq!(grid.rows(), n.div_ceil(3));
            assert_eq!(grid.height(), Mm::from_i32(27) * grid.rows() as i32);
            for (index, card) in cards.iter().enumerate() {
                let col: usize = card.split(',').nth(1).expect("col").parse().expect("num");
                assert_eq!(col, index % 3);
            }
        }
    }

    #[test]
    fn grid_truncates_to_six_cards() {
        let grid = HighlightGrid::new(&highlights(9));
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.name(), "highlight-grid:6");
    }

    #[test]
    fn accent_bar_uses_injected_fill() {
        let style = ReportStyle::default();
        let grid = HighlightGrid::new(&highlights(1));
        let mut canvas = canvas();
        grid.draw(&mut canvas, &env(&style), &mut FixedAccent(0.5), Mm::from_i32(40))
            .expect("draw");
        let widths: Vec<Mm> = canvas
            .page(0)
            .expect("page")
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawRect { width, .. } => Some(*width),
                _ => None,
            })
            .collect();
        assert_eq!(widths.len(), 2);
        assert_eq!(widths[1], widths[0] * 0.5);
    }

    #[test]
    fn label_value_height_tracks_wrapped_lines() {
        let style = ReportStyle::default();
        let canvas = canvas();
        let short = LabelValue::new("Ascendant", "Leo");
        assert_eq!(short.measure(&canvas, &env(&style)), Mm::from_i32(5));
        let blank = LabelValue::new("Moon Sign", "  ");
        assert_eq!(blank.value, "-");
        let long = LabelValue::new("Key Observations", "one\ntwo\nthree");
        assert_eq!(long.measure(&canvas, &env(&style)), Mm::from_i32(15));
    }

    #[test]
    fn card_height_includes_padding() {
        let style = ReportStyle::default();
        let canvas = canvas();
        let card = Card::bulleted("Rituals", &["Surya namaskar", "Fast on Saturdays"]);
        assert_eq!(card.body, "\u{2022} Surya namaskar\n\u{2022} Fast on Saturdays");
        assert_eq!(card.measure(&canvas, &env(&style)), Mm::from_i32(18));
        let numbered = Card::numbered("Recommended Pilgrimage", &["Kashi", "Rameswaram"]);
        assert_eq!(numbered.body, "1. Kashi\n2. Rameswaram");
    }

    #[test]
    fn markers_draw_distinct_shapes() {
        let style = ReportStyle::default();
        for (marker, expected) in [
            (Marker::Diamond, 2usize),
            (Marker::Triangle, 1),
        ] {
            let mut canvas = canvas();
            Card::new("Gemstones", "Ruby")
                .with_marker(marker)
                .draw(&mut canvas, &env(&style), &mut FixedAccent(0.5), Mm::from_i32(40))
                .expect("draw");
            let fills = canvas.page(0).expect("page").commands.iter()
                .filter(|cmd| matches!(cmd, Command::Fill))
                .count();
            assert_eq!(fills, expected);
        }
    }

    #[test]
    fn illustration_keeps_16_by_9_and_clamps_to_width() {
        let style = ReportStyle::default();
        let inline = Illustration::new("visual-career", &[], Mm::from_i32(45), IllustrationWidth::Inline);
        assert_eq!(inline.size(&style), (Mm::from_i32(80), Mm::from_i32(45)));
        let clamped = Illustration::new("visual-career", &[], Mm::from_i32(70), IllustrationWidth::Inline);
        assert_eq!(clamped.size(&style), (Mm::from_i32(110), Mm::from_f32(61.875)));
        let full = Illustration::new("visual-planetary", &[], Mm::from_i32(70), IllustrationWidth::Full);
        assert_eq!(full.size(&style).1, Mm::from_i32(70));
    }

    #[test]
    fn malformed_illustration_fails_to_draw() {
        let style = ReportStyle::default();
        let mut canvas = canvas();
        let art = Illustration::new("visual-gemstone", b"not an image", Mm::from_i32(45), IllustrationWidth::Inline);
        let err = art.prepare(&mut canvas).expect_err("must fail");
        assert!(matches!(err, ReportError::Image(_)));
        let err = art
            .draw(&mut canvas, &env(&style), &mut FixedAccent(0.5), Mm::from_i32(40))
            .expect_err("unregistered");
        assert!(matches!(err, ReportError::Image(_)));
    }

    #[test]
    fn seal_without_logo_draws_only_closing_line() {
        let style = ReportStyle::default();
        let mut canvas = canvas();
        assert_eq!(ClosingSeal.measure(&canvas, &env(&style)), Mm::from_i32(28));
        ClosingSeal
            .draw(&mut canvas, &env(&style), &mut FixedAccent(0.5), Mm::from_i32(100))
            .expect("draw");
        let page = canvas.page(0).expect("page");
        assert!(page.contains_text("May the stars guide you."));
        assert!(!page.commands.iter().any(|cmd| matches!(cmd, Command::DrawImage { .. })));
    }

    #[test]
    fn cover_prints_date_and_name() {
        let style = ReportStyle::default();
        let mut canvas = canvas();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).expect("date");
        Cover { client_name: "Asha Rao", date }
            .draw(&mut canvas, &env(&style))
            .expect("cover");
        let page = canvas.page(0).expect("page");
        assert!(page.contains_text("March 7, 2024"));
        assert!(page.contains_text("Asha Rao"));
        assert!(page.contains_text("Astrological Consultation For"));
    }
}
