use crate::error::ReportError;
use crate::font::{self, FontFace};
use crate::types::{Color, Mm, Rect, Size};
use image::{GenericImageView, RgbaImage};
use std::collections::BTreeMap;

/// Kappa for approximating a quarter circle with one cubic Bézier.
const KAPPA: f32 = 0.552_284_8;

#[derive(Debug, Clone)]
pub enum Command {
    SaveState,
    RestoreState,
    Translate(Mm, Mm),
    // Degrees, counter-clockwise as seen on the page.
    Rotate(f32),
    // Non-rendered metadata used for placement reporting. Ignored by the PDF writer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Mm),
    // Applies both fill and stroke alpha. Values outside 0..1 are clamped.
    SetOpacity(f32),
    SetFont {
        face: FontFace,
        size_pt: f32,
    },
    MoveTo {
        x: Mm,
        y: Mm,
    },
    LineTo {
        x: Mm,
        y: Mm,
    },
    CurveTo {
        x1: Mm,
        y1: Mm,
        x2: Mm,
        y2: Mm,
        x: Mm,
        y: Mm,
    },
    ClosePath,
    Fill,
    Stroke,
    FillStroke,
    // `y` is the baseline; `x` is the already-aligned left edge.
    DrawString {
        x: Mm,
        y: Mm,
        text: String,
    },
    DrawRect {
        x: Mm,
        y: Mm,
        width: Mm,
        height: Mm,
    },
    DrawImage {
        x: Mm,
        y: Mm,
        width: Mm,
        height: Mm,
        resource_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaintMode {
    Fill,
    Stroke,
    FillStroke,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Explicit text style passed with every text call; the canvas keeps no
/// ambient font or color that a caller could forget to reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub face: FontFace,
    pub size_pt: f32,
    pub color: Color,
}

impl TextStyle {
    pub fn new(face: FontFace, size_pt: f32, color: Color) -> Self {
        Self {
            face,
            size_pt,
            color,
        }
    }

    pub fn measure(&self, text: &str) -> Mm {
        font::text_width(self.face, self.size_pt, text)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct GraphicsState {
    fill_color: Option<Color>,
    stroke_color: Option<Color>,
    line_width: Option<Mm>,
    font: Option<(FontFace, u32)>,
}

impl GraphicsState {
    fn initial() -> Self {
        Self {
            fill_color: None,
            stroke_color: None,
            line_width: None,
            font: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub commands: Vec<Command>,
    state: GraphicsState,
    state_stack: Vec<GraphicsState>,
}

impl Page {
    fn new() -> Self {
        Self {
            commands: Vec::new(),
            state: GraphicsState::initial(),
            state_stack: Vec::new(),
        }
    }

    pub fn with_commands(commands: Vec<Command>) -> Self {
        Self {
            commands,
            state: GraphicsState::initial(),
            state_stack: Vec::new(),
        }
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DrawString { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn contains_text(&self, needle: &str) -> bool {
        self.texts().any(|text| text.contains(needle))
    }

    /// Values of every `Meta` command recorded under `key`, in order.
    pub fn meta_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.commands.iter().filter_map(move |cmd| match cmd {
            Command::Meta { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }
}

/// Decoded raster registered once and referenced by id from `DrawImage`.
#[derive(Debug, Clone)]
pub struct ImageResource {
    pub pixels: RgbaImage,
    /// Original bytes when the source was an opaque JPEG that can be embedded as-is.
    pub jpeg_passthrough: Option<Vec<u8>>,
}

impl ImageResource {
    pub fn decode(bytes: &[u8]) -> Result<Self, ReportError> {
        let format = image::guess_format(bytes).ok();
        let decoded = image::load_from_memory(bytes)
            .map_err(|err| ReportError::Image(format!("failed to decode image: {err}")))?;
        let (width, height) = decoded.dimensions();
        if width == 0 || height == 0 {
            return Err(ReportError::Image("image has no pixels".to_string()));
        }
        let jpeg_passthrough = match (format, decoded.color()) {
            (Some(image::ImageFormat::Jpeg), image::ColorType::Rgb8) => Some(bytes.to_vec()),
            _ => None,
        };
        Ok(Self {
            pixels: decoded.to_rgba8(),
            jpeg_passthrough,
        })
    }

    pub fn from_rgba(pixels: RgbaImage) -> Result<Self, ReportError> {
        if pixels.width() == 0 || pixels.height() == 0 {
            return Err(ReportError::Image("image has no pixels".to_string()));
        }
        Ok(Self {
            pixels,
            jpeg_passthrough: None,
        })
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.pixels.width() as f32 / self.pixels.height() as f32
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
    pub images: BTreeMap<String, ImageResource>,
    pub title: Option<String>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Position in the active page's command list, used to discard a failed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    page: usize,
    commands: usize,
}

/// Drawing surface with a fixed page size. Coordinates are millimetres from
/// the top-left corner of the active page.
pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    active: usize,
    images: BTreeMap<String, ImageResource>,
}

impl Canvas {
    /// Opens a canvas with its first page active.
    pub fn new(page_size: Size) -> Result<Self, ReportError> {
        if !page_size.is_positive() {
            return Err(ReportError::Canvas(format!(
                "page size must be positive, got {} x {}",
                page_size.width, page_size.height
            )));
        }
        Ok(Self {
            page_size,
            pages: vec![Page::new()],
            active: 0,
            images: BTreeMap::new(),
        })
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Zero-based index of the page receiving commands.
    pub fn active_page(&self) -> usize {
        self.active
    }

    /// Appends a page and makes it active.
    pub fn new_page(&mut self) -> usize {
        self.pages.push(Page::new());
        self.active = self.pages.len() - 1;
        self.active
    }

    /// Re-activates an existing page so late decorations can be retrofitted.
    pub fn select_page(&mut self, index: usize) -> Result<(), ReportError> {
        if index >= self.pages.len() {
            return Err(ReportError::Invariant(format!(
                "page {} selected but only {} exist",
                index + 1,
                self.pages.len()
            )));
        }
        self.active = index;
        Ok(())
    }

    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    fn current(&mut self) -> &mut Page {
        &mut self.pages[self.active]
    }

    fn push(&mut self, command: Command) {
        self.current().commands.push(command);
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            page: self.active,
            commands: self.pages[self.active].commands.len(),
        }
    }

    /// Drops every command recorded on the checkpoint's page after it was taken.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        if let Some(page) = self.pages.get_mut(checkpoint.page) {
            page.commands.truncate(checkpoint.commands);
            page.state = GraphicsState::initial();
            page.state_stack.clear();
        }
        self.active = checkpoint.page.min(self.pages.len() - 1);
    }

    pub fn has_image(&self, resource_id: &str) -> bool {
        self.images.contains_key(resource_id)
    }

    pub fn register_image(
        &mut self,
        resource_id: impl Into<String>,
        bytes: &[u8],
    ) -> Result<f32, ReportError> {
        let resource_id = resource_id.into();
        if let Some(existing) = self.images.get(&resource_id) {
            return Ok(existing.aspect_ratio());
        }
        let resource = ImageResource::decode(bytes)?;
        let ratio = resource.aspect_ratio();
        self.images.insert(resource_id, resource);
        Ok(ratio)
    }

    pub fn register_pixels(
        &mut self,
        resource_id: impl Into<String>,
        pixels: RgbaImage,
    ) -> Result<f32, ReportError> {
        let resource = ImageResource::from_rgba(pixels)?;
        let ratio = resource.aspect_ratio();
        self.images.insert(resource_id.into(), resource);
        Ok(ratio)
    }

    pub fn save_state(&mut self) {
        let page = self.current();
        page.state_stack.push(page.state.clone());
        page.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        let page = self.current();
        if let Some(state) = page.state_stack.pop() {
            page.state = state;
            page.commands.push(Command::RestoreState);
        }
    }

    pub fn translate(&mut self, x: Mm, y: Mm) {
        self.push(Command::Translate(x, y));
    }

    pub fn rotate(&mut self, degrees: f32) {
        self.push(Command::Rotate(degrees));
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn record_block_bounds(&mut self, name: &str, rect: Rect) {
        let value = format!(
            "{name}@{},{},{},{}",
            rect.x.to_milli_i64(),
            rect.y.to_milli_i64(),
            rect.width.to_milli_i64(),
            rect.height.to_milli_i64()
        );
        self.meta(crate::META_BLOCK_KEY, value);
    }

    pub fn set_fill_color(&mut self, color: Color) {
        let page = self.current();
        if page.state.fill_color == Some(color) {
            return;
        }
        page.state.fill_color = Some(color);
        page.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        let page = self.current();
        if page.state.stroke_color == Some(color) {
            return;
        }
        page.state.stroke_color = Some(color);
        page.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Mm) {
        let width = width.max(Mm::ZERO);
        let page = self.current();
        if page.state.line_width == Some(width) {
            return;
        }
        page.state.line_width = Some(width);
        page.commands.push(Command::SetLineWidth(width));
    }

    pub fn set_opacity(&mut self, alpha: f32) {
        self.push(Command::SetOpacity(alpha.clamp(0.0, 1.0)));
    }

    fn set_font(&mut self, face: FontFace, size_pt: f32) {
        let key = (face, (size_pt * 1000.0).round() as u32);
        let page = self.current();
        if page.state.font == Some(key) {
            return;
        }
        page.state.font = Some(key);
        page.commands.push(Command::SetFont { face, size_pt });
    }

    /// Number of lines `text` occupies when wrapped to `max_width` in `style`.
    pub fn measure_wrapped_lines(&self, text: &str, style: &TextStyle, max_width: Mm) -> usize {
        self.wrap_text(text, style, max_width).len()
    }

    pub fn wrap_text(&self, text: &str, style: &TextStyle, max_width: Mm) -> Vec<String> {
        font::wrap_text(style.face, style.size_pt, text, max_width)
    }

    /// Draws one line with its baseline at `y`; `x` is the anchor for `align`.
    pub fn draw_text(&mut self, text: &str, x: Mm, y: Mm, style: &TextStyle, align: TextAlign) {
        let width = style.measure(text);
        let left = match align {
            TextAlign::Left => x,
            TextAlign::Center => x - width.mul_ratio(1, 2),
            TextAlign::Right => x - width,
        };
        self.set_fill_color(style.color);
        self.set_font(style.face, style.size_pt);
        self.push(Command::DrawString {
            x: left,
            y,
            text: text.to_string(),
        });
    }

    /// Draws pre-wrapped lines, the first baseline at `y`.
    pub fn draw_lines(
        &mut self,
        lines: &[String],
        x: Mm,
        y: Mm,
        line_height: Mm,
        style: &TextStyle,
        align: TextAlign,
    ) {
        let mut baseline = y;
        for line in lines {
            if !line.is_empty() {
                self.draw_text(line, x, baseline, style, align);
            }
            baseline += line_height;
        }
    }

    pub fn draw_line(&mut self, x1: Mm, y1: Mm, x2: Mm, y2: Mm, color: Color, width: Mm) {
        self.set_stroke_color(color);
        self.set_line_width(width);
        self.push(Command::MoveTo { x: x1, y: y1 });
        self.push(Command::LineTo { x: x2, y: y2 });
        self.push(Command::Stroke);
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.set_fill_color(color);
        self.push(Command::DrawRect {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
        });
    }

    pub fn stroke_rect(&mut self, rect: Rect, color: Color, width: Mm) {
        self.set_stroke_color(color);
        self.set_line_width(width);
        self.push(Command::MoveTo {
            x: rect.x,
            y: rect.y,
        });
        self.push(Command::LineTo {
            x: rect.x + rect.width,
            y: rect.y,
        });
        self.push(Command::LineTo {
            x: rect.x + rect.width,
            y: rect.bottom(),
        });
        self.push(Command::LineTo {
            x: rect.x,
            y: rect.bottom(),
        });
        self.push(Command::ClosePath);
        self.push(Command::Stroke);
    }

    pub fn rounded_rect(&mut self, rect: Rect, radius: Mm, mode: PaintMode) {
        let radius = radius
            .min(rect.width.mul_ratio(1, 2))
            .min(rect.height.mul_ratio(1, 2))
            .max(Mm::ZERO);
        let k = radius * KAPPA;
        let (x0, y0) = (rect.x, rect.y);
        let (x1, y1) = (rect.x + rect.width, rect.bottom());
        self.push(Command::MoveTo { x: x0 + radius, y: y0 });
        self.push(Command::LineTo { x: x1 - radius, y: y0 });
        self.push(Command::CurveTo {
            x1: x1 - radius + k,
            y1: y0,
            x2: x1,
            y2: y0 + radius - k,
            x: x1,
            y: y0 + radius,
        });
        self.push(Command::LineTo { x: x1, y: y1 - radius });
        self.push(Command::CurveTo {
            x1: x1,
            y1: y1 - radius + k,
            x2: x1 - radius + k,
            y2: y1,
            x: x1 - radius,
            y: y1,
        });
        self.push(Command::LineTo { x: x0 + radius, y: y1 });
        self.push(Command::CurveTo {
            x1: x0 + radius - k,
            y1: y1,
            x2: x0,
            y2: y1 - radius + k,
            x: x0,
            y: y1 - radius,
        });
        self.push(Command::LineTo { x: x0, y: y0 + radius });
        self.push(Command::CurveTo {
            x1: x0,
            y1: y0 + radius - k,
            x2: x0 + radius - k,
            y2: y0,
            x: x0 + radius,
            y: y0,
        });
        self.push(Command::ClosePath);
        self.paint(mode);
    }

    pub fn triangle(&mut self, points: [(Mm, Mm); 3], mode: PaintMode) {
        let [(ax, ay), (bx, by), (cx, cy)] = points;
        self.push(Command::MoveTo { x: ax, y: ay });
        self.push(Command::LineTo { x: bx, y: by });
        self.push(Command::LineTo { x: cx, y: cy });
        self.push(Command::ClosePath);
        self.paint(mode);
    }

    pub fn circle(&mut self, cx: Mm, cy: Mm, radius: Mm, mode: PaintMode) {
        let k = radius * KAPPA;
        self.push(Command::MoveTo { x: cx + radius, y: cy });
        self.push(Command::CurveTo {
            x1: cx + radius,
            y1: cy + k,
            x2: cx + k,
            y2: cy + radius,
            x: cx,
            y: cy + radius,
        });
        self.push(Command::CurveTo {
            x1: cx - k,
            y1: cy + radius,
            x2: cx - radius,
            y2: cy + k,
            x: cx - radius,
            y: cy,
        });
        self.push(Command::CurveTo {
            x1: cx - radius,
            y1: cy - k,
            x2: cx - k,
            y2: cy - radius,
            x: cx,
            y: cy - radius,
        });
        self.push(Command::CurveTo {
            x1: cx + k,
            y1: cy - radius,
            x2: cx + radius,
            y2: cy - k,
            x: cx + radius,
            y: cy,
        });
        self.push(Command::ClosePath);
        self.paint(mode);
    }

    fn paint(&mut self, mode: PaintMode) {
        self.push(match mode {
            PaintMode::Fill => Command::Fill,
            PaintMode::Stroke => Command::Stroke,
            PaintMode::FillStroke => Command::FillStroke,
        });
    }

    /// Places a registered image into `rect`.
    pub fn draw_image(&mut self, rect: Rect, resource_id: &str) -> Result<(), ReportError> {
        if !self.images.contains_key(resource_id) {
            return Err(ReportError::Image(format!(
                "image resource '{resource_id}' is not registered"
            )));
        }
        self.push(Command::DrawImage {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            resource_id: resource_id.to_string(),
        });
        Ok(())
    }

    pub fn current_command_count(&self) -> usize {
        self.pages[self.active].commands.len()
    }

    pub fn finish(self, title: Option<String>) -> Document {
        Document {
            page_size: self.page_size,
            pages: self.pages,
            images: self.images,
            title,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    fn body() -> TextStyle {
        TextStyle::new(FontFace::Regular, 10.0, Color::BLACK)
    }

    #[test]
    fn rejects_non_positive_page_size() {
        let err = Canvas::new(Size::new(Mm::ZERO, Mm::from_i32(297)))
            .err()
            .expect("zero width must fail");
        assert!(matches!(err, ReportError::Canvas(_)));
    }

    #[test]
    fn new_page_appends_and_activates() {
        let mut canvas = Canvas::new(Size::a4()).expect("canvas");
        assert_eq!(canvas.page_count(), 1);
        assert_eq!(canvas.new_page(), 1);
        assert_eq!(canvas.active_page(), 1);
        canvas.select_page(0).expect("select");
        canvas.draw_text("cover", Mm::ZERO, Mm::from_i32(10), &body(), TextAlign::Left);
        assert!(canvas.page(0).expect("page").contains_text("cover"));
        assert!(!canvas.page(1).expect("page").contains_text("cover"));
        assert!(canvas.select_page(5).is_err());
    }

    #[test]
    fn alignment_uses_measured_width() {
        let mut canvas = Canvas::new(Size::a4()).expect("canvas");
        let style = body();
        let anchor = Mm::from_i32(100);
        canvas.draw_text("Centered", anchor, Mm::from_i32(20), &style, TextAlign::Center);
        canvas.draw_text("Right", anchor, Mm::from_i32(30), &style, TextAlign::Right);
        let xs: Vec<Mm> = canvas
            .page(0)
            .expect("page")
            .commands
            .iter()
            .filter_map(|cmd| match cmd {
                Command::DrawString { x, .. } => Some(*x),
                _ => None,
            })
            .collect();
        assert_eq!(xs[0], anchor - style.measure("Centered").mul_ratio(1, 2));
        assert_eq!(xs[1], anchor - style.measure("Right"));
    }

    #[test]
    fn redundant_state_changes_are_dropped() {
        let mut canvas = Canvas::new(Size::a4()).expect("canvas");
        let style = body();
        canvas.draw_text("a", Mm::ZERO, Mm::ZERO, &style, TextAlign::Left);
        canvas.draw_text("b", Mm::ZERO, Mm::ZERO, &style, TextAlign::Left);
        let fonts = canvas.page(0).expect("page").commands.iter()
            .filter(|cmd| matches!(cmd, Command::SetFont { .. }))
            .count();
        assert_eq!(fonts, 1);
    }

    #[test]
    fn rollback_discards_partial_block() {
        let mut canvas = Canvas::new(Size::a4()).expect("canvas");
        canvas.draw_text("kept", Mm::ZERO, Mm::ZERO, &body(), TextAlign::Left);
        let checkpoint = canvas.checkpoint();
        canvas.draw_text("dropped", Mm::ZERO, Mm::ZERO, &body(), TextAlign::Left);
        canvas.rollback(checkpoint);
        let page = canvas.page(0).expect("page");
        assert!(page.contains_text("kept"));
        assert!(!page.contains_text("dropped"));
        // State tracking is reset so the next draw re-emits its font.
        canvas.draw_text("again", Mm::ZERO, Mm::ZERO, &body(), TextAlign::Left);
        let fonts = canvas.page(0).expect("page").commands.iter()
            .filter(|cmd| matches!(cmd, Command::SetFont { .. }))
            .count();
        assert_eq!(fonts, 2);
    }

    #[test]
    fn images_must_be_registered_before_drawing() {
        let mut canvas = Canvas::new(Size::a4()).expect("canvas");
        let rect = Rect::new(Mm::ZERO, Mm::ZERO, Mm::from_i32(10), Mm::from_i32(10));
        assert!(canvas.draw_image(rect, "missing").is_err());
        let ratio = canvas.register_image("wide", &png_bytes(32, 16)).expect("register");
        assert_eq!(ratio, 2.0);
        canvas.draw_image(rect, "wide").expect("draw");
        assert!(canvas.register_image("broken", b"not an image").is_err());
        assert!(!canvas.has_image("broken"));
    }

    #[test]
    fn measure_matches_wrap() {
        let canvas = Canvas::new(Size::a4()).expect("canvas");
        let text = "Rahu Mahadasha runs until the spring of the following year with mixed results";
        let width = Mm::from_i32(50);
        assert_eq!(
            canvas.measure_wrapped_lines(text, &body(), width),
            canvas.wrap_text(text, &body(), width).len()
        );
    }
}
