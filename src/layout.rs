use crate::accent::AccentSource;
use crate::blocks::{Block, BlockEnv};
use crate::canvas::{Canvas, Document};
use crate::chrome::{BrandMark, PageChrome};
use crate::error::ReportError;
use crate::style::ReportStyle;
use crate::trace::LayoutTrace;
use crate::types::{Mm, Rect};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaceOutcome {
    Placed { page: usize, top: Mm, height: Mm },
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutStats {
    pub page_breaks: usize,
    pub placed_blocks: usize,
    pub skipped_blocks: usize,
    /// Blocks placed per page, indexed like `Document::pages`.
    pub blocks_per_page: Vec<usize>,
}

/// Owns the canvas and the vertical write cursor for one render.
/// Page 0 is the cover; content starts on page 1.
pub struct LayoutEngine<'a> {
    canvas: Canvas,
    style: &'a ReportStyle,
    logo: Option<&'a BrandMark>,
    cursor: Mm,
    closed: Vec<bool>,
    stats: LayoutStats,
    trace: Option<&'a LayoutTrace>,
}

impl<'a> LayoutEngine<'a> {
    /// Takes a canvas whose only page is the cover, and draws the cover watermark.
    pub fn new(
        canvas: Canvas,
        style: &'a ReportStyle,
        logo: Option<&'a BrandMark>,
        trace: Option<&'a LayoutTrace>,
    ) -> Result<Self, ReportError> {
        style
            .geometry
            .validate()
            .map_err(ReportError::InvalidConfiguration)?;
        if canvas.page_count() != 1 {
            return Err(ReportError::Invariant(format!(
                "layout must start on a single cover page, canvas has {}",
                canvas.page_count()
            )));
        }
        let mut engine = Self {
            canvas,
            style,
            logo,
            cursor: style.geometry.interior_top,
            closed: vec![false],
            stats: LayoutStats {
                blocks_per_page: vec![0],
                ..LayoutStats::default()
            },
            trace,
        };
        engine.chrome().draw_watermark(&mut engine.canvas)?;
        Ok(engine)
    }

    fn chrome(&self) -> PageChrome<'a> {
        PageChrome::new(self.style, self.logo)
    }

    pub fn env(&self) -> BlockEnv<'a> {
        BlockEnv {
            style: self.style,
            logo: self.logo,
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    pub fn cursor(&self) -> Mm {
        self.cursor
    }

    pub fn limit(&self) -> Mm {
        self.style.geometry.bottom_limit()
    }

    pub fn stats(&self) -> &LayoutStats {
        &self.stats
    }

    fn page_is_fresh(&self) -> bool {
        self.stats.blocks_per_page[self.canvas.active_page()] == 0
    }

    /// Closes the cover and opens the first content page at the profile offset.
    pub fn start_content(&mut self) -> Result<(), ReportError> {
        self.open_page()?;
        self.cursor = self.style.geometry.profile_top;
        Ok(())
    }

    /// Breaks the page if `height` does not fit below the cursor. A fresh page
    /// never breaks again, so a block taller than a page lands at its top.
    pub fn reserve(&mut self, height: Mm, block: &str) -> Result<bool, ReportError> {
        if self.cursor + height <= self.limit() {
            return Ok(false);
        }
        if self.page_is_fresh() {
            return Ok(false);
        }
        let from = self.canvas.active_page() + 1;
        self.open_page()?;
        self.stats.page_breaks += 1;
        log::debug!("page break {from} -> {} before {block}", from + 1);
        if let Some(trace) = self.trace {
            trace.page_break(from, from + 1, "overflow", block);
        }
        Ok(true)
    }

    /// Moves the cursor past a drawn block plus the inter-block spacing.
    pub fn advance(&mut self, height: Mm) {
        let next = self.cursor + height + self.style.block_spacing();
        self.cursor = next.min(self.limit());
    }

    fn open_page(&mut self) -> Result<(), ReportError> {
        self.close_current_page();
        let index = self.canvas.new_page();
        self.closed.push(false);
        self.stats.blocks_per_page.push(0);
        debug_assert_eq!(index + 1, self.closed.len());
        let chrome = self.chrome();
        chrome.draw_watermark(&mut self.canvas)?;
        chrome.draw_header(&mut self.canvas)?;
        self.cursor = self.style.geometry.interior_top;
        Ok(())
    }

    /// Writes the active page's footer once.
    pub fn close_current_page(&mut self) {
        let index = self.canvas.active_page();
        if self.closed[index] {
            return;
        }
        self.chrome().draw_footer(&mut self.canvas, index + 1);
        self.closed[index] = true;
    }

    /// measure, reserve, draw, advance. Recoverable failures skip the block.
    pub fn place(
        &mut self,
        block: &dyn Block,
        accent: &mut dyn AccentSource,
    ) -> Result<PlaceOutcome, ReportError> {
        let name = block.name();
        if let Err(err) = block.prepare(&mut self.canvas) {
            return self.skip(&name, err);
        }
        let env = self.env();
        let height = block.measure(&self.canvas, &env);
        let keep = block.keep_with_next(&env);
        self.reserve(height + keep + self.style.block_spacing(), &name)?;
        if self.cursor + height > self.limit() {
            log::warn!("{name} is {height} tall and overflows page {}", self.canvas.active_page() + 1);
        }

        let top = self.cursor;
        let page = self.canvas.active_page();
        let checkpoint = self.canvas.checkpoint();
        if let Err(err) = block.draw(&mut self.canvas, &env, accent, top) {
            self.canvas.rollback(checkpoint);
            return self.skip(&name, err);
        }
        let geometry = &self.style.geometry;
        self.canvas.record_block_bounds(
            &name,
            Rect::new(geometry.content_left(), top, geometry.content_width(), height),
        );
        self.stats.placed_blocks += 1;
        self.stats.blocks_per_page[page] += 1;
        self.advance(height);
        log::debug!("placed {name} on page {} at {top}", page + 1);
        Ok(PlaceOutcome::Placed { page, top, height })
    }

    fn skip(&mut self, name: &str, err: ReportError) -> Result<PlaceOutcome, ReportError> {
        if !err.is_recoverable() {
            return Err(err);
        }
        let page = self.canvas.active_page() + 1;
        log::warn!("skipping {name} on page {page}: {err}");
        if let Some(trace) = self.trace {
            trace.block_skipped(page, name, &err.to_string());
        }
        self.stats.skipped_blocks += 1;
        Ok(PlaceOutcome::Skipped)
    }

    /// Writes every pending footer and hands back the finished document.
    pub fn finish(mut self, title: Option<String>) -> Result<(Document, LayoutStats), ReportError> {
        for index in 1..self.canvas.page_count() {
            if !self.closed[index] {
                self.canvas.select_page(index)?;
                self.close_current_page();
            }
        }
        if let Some(index) = self.closed.iter().position(|closed| !closed) {
            return Err(ReportError::Invariant(format!("page {} was never closed", index + 1)));
        }
        Ok((self.canvas.finish(title), self.stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accent::FixedAccent;
    use crate::blocks::{Card, Illustration, IllustrationWidth, LabelValue, SectionTitle};
    use crate::canvas::Page;

    struct Fixed(Mm);

    impl Block for Fixed {
        fn name(&self) -> String {
            format!("fixed:{}", self.0)
        }

        fn measure(&self, _canvas: &Canvas, _env: &BlockEnv<'_>) -> Mm {
            self.0
        }

        fn draw(
            &self,
            canvas: &mut Canvas,
            _env: &BlockEnv<'_>,
            _accent: &mut dyn AccentSource,
            top: Mm,
        ) -> Result<(), ReportError> {
            canvas.meta("fixed", top.to_milli_i64().to_string());
            Ok(())
        }
    }

    struct Broken;

    impl Block for Broken {
        fn name(&self) -> String {
            "broken".to_string()
        }

        fn measure(&self, _canvas: &Canvas, _env: &BlockEnv<'_>) -> Mm {
            Mm::from_i32(10)
        }

        fn draw(
            &self,
            canvas: &mut Canvas,
            env: &BlockEnv<'_>,
            _accent: &mut dyn AccentSource,
            top: Mm,
        ) -> Result<(), ReportError> {
            canvas.draw_line(Mm::ZERO, top, Mm::from_i32(10), top, env.style.palette.accent, Mm::from_i32(1));
            Err(ReportError::Image("corrupt".to_string()))
        }
    }

    fn engine(style: &ReportStyle) -> LayoutEngine<'_> {
        let canvas = Canvas::new(style.geometry.page).expect("canvas");
        let mut engine = LayoutEngine::new(canvas, style, None, None).expect("engine");
        engine.start_content().expect("start");
        engine
    }

    fn footers(page: &Page) -> Vec<String> {
        page.meta_values(crate::META_FOOTER_KEY).map(str::to_string).collect()
    }

    #[test]
    fn first_content_page_starts_at_profile_offset() {
        let style = ReportStyle::default();
        let engine = engine(&style);
        assert_eq!(engine.cursor(), Mm::from_i32(40));
        assert_eq!(engine.canvas().page_count(), 2);
        assert_eq!(footers(engine.canvas().page(0).expect("cover")), vec!["1"]);
        assert!(footers(engine.canvas().page(1).expect("page")).is_empty());
    }

    #[test]
    fn cursor_never_passes_the_limit_and_resets_after_breaks() {
        let style = ReportStyle::default();
        let mut engine = engine(&style);
        let mut accent = FixedAccent(0.5);
        let mut pages = engine.canvas().page_count();
        for step in 0..60 {
            let height = Mm::from_i32(7 + (step % 5) * 9);
            match engine.place(&Fixed(height), &mut accent).expect("place") {
                PlaceOutcome::Placed { top, .. } => {
                    if engine.canvas().page_count() > pages {
                        assert_eq!(top, Mm::from_i32(30));
                        pages = engine.canvas().page_count();
                    }
                    assert!(top + height <= engine.limit());
                }
                PlaceOutcome::Skipped => panic!("fixed blocks never skip"),
            }
            assert!(engine.cursor() <= engine.limit());
        }
        assert!(engine.stats().page_breaks > 0);
    }

    #[test]
    fn oversize_block_lands_on_fresh_page_and_clamps_cursor() {
        let style = ReportStyle::default();
        let mut engine = engine(&style);
        let mut accent = FixedAccent(0.5);
        engine.place(&Fixed(Mm::from_i32(20)), &mut accent).expect("place");
        let outcome = engine.place(&Fixed(Mm::from_i32(400)), &mut accent).expect("place");
        assert_eq!(
            outcome,
            PlaceOutcome::Placed {
                page: 2,
                top: Mm::from_i32(30),
                height: Mm::from_i32(400)
            }
        );
        assert_eq!(engine.cursor(), engine.limit());
        engine.place(&Fixed(Mm::from_i32(5)), &mut accent).expect("place");
        assert_eq!(engine.canvas().active_page(), 3);
    }

    #[test]
    fn failed_block_is_rolled_back_and_skipped() {
        let style = ReportStyle::default();
        let mut engine = engine(&style);
        let mut accent = FixedAccent(0.5);
        let before = engine.canvas().current_command_count();
        let cursor = engine.cursor();
        assert_eq!(engine.place(&Broken, &mut accent).expect("place"), PlaceOutcome::Skipped);
        assert_eq!(engine.canvas().current_command_count(), before);
        assert_eq!(engine.cursor(), cursor);

        let art = Illustration::new("visual-career", b"junk", Mm::from_i32(55), IllustrationWidth::Inline);
        assert_eq!(engine.place(&art, &mut accent).expect("place"), PlaceOutcome::Skipped);
        assert_eq!(engine.stats().skipped_blocks, 2);
        assert_eq!(engine.canvas().page_count(), 2);
    }

    #[test]
    fn every_page_gets_exactly_one_footer() {
        let style = ReportStyle::default();
        let mut engine = engine(&style);
        let mut accent = FixedAccent(0.5);
        engine.place(&SectionTitle::new("Timeline & Forecast"), &mut accent).expect("title");
        for year in 0..100 {
            engine
                .place(&LabelValue::new(format!("{}", 2020 + year), "Jupiter transit"), &mut accent)
                .expect("row");
        }
        engine
            .place(&Card::new("Gemstones", "Yellow sapphire"), &mut accent)
            .expect("card");
        let (document, stats) = engine.finish(None).expect("finish");
        assert!(document.page_count() >= 5);
        assert_eq!(stats.page_breaks, document.page_count() - 2);
        for (index, page) in document.pages.iter().enumerate() {
            assert_eq!(footers(page), vec![(index + 1).to_string()]);
        }
    }

    #[test]
    fn section_title_keeps_with_following_space() {
        let style = ReportStyle::default();
        let mut engine = engine(&style);
        let mut accent = FixedAccent(0.5);
        // Leave 20mm: title (13) + keep (8) + spacing (4) no longer fits.
        engine.place(&Fixed(Mm::from_i32(213)), &mut accent).expect("filler");
        assert_eq!(engine.cursor(), Mm::from_i32(257));
        let outcome = engine
            .place(&SectionTitle::new("Remedial Measures"), &mut accent)
            .expect("title");
        assert!(matches!(outcome, PlaceOutcome::Placed { page: 2, .. }));
    }
}
