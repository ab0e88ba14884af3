mod accent;
mod blocks;
mod canvas;
mod chrome;
mod composer;
mod error;
mod fetch;
mod font;
mod inspect;
mod layout;
mod metrics;
mod pdf;
mod preprocess;
mod record;
mod style;
mod trace;
mod types;

pub use accent::{AccentSource, FixedAccent, MAX_FILL, MIN_FILL, RandomAccent};
pub use blocks::{Block, BlockEnv, META_HIGHLIGHT_CARD_KEY};
pub use chrome::BrandMark;
pub use canvas::{Canvas, Command, Document, ImageResource, Page, TextAlign, TextStyle};
pub use error::ReportError;
pub use fetch::{FileLogoSource, HttpLogoSource, LogoSource, StaticLogoSource, fetch_logo};
pub use font::FontFace;
pub use inspect::{PdfSummary, summarize_pdf, verify_report};
pub use layout::{LayoutEngine, LayoutStats, PlaceOutcome};
pub use metrics::{PageMetrics, RenderMetrics};
pub use preprocess::{LogoAsset, PreparedLogo, prepare_logo};
pub use record::{
    EncodedImage, LabeledValue, PersonalityHealth, Remedies, ReportRecord, VisualKey, Visuals,
};
pub use style::{Brand, PageGeometry, Palette, ReportStyle};
pub use trace::LayoutTrace;
pub use types::{Color, Margins, Mm, Rect, Size};

use chrono::NaiveDate;
use composer::Composer;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Meta key carrying `name@x,y,w,h` (milli-mm) for every placed block.
pub const META_BLOCK_KEY: &str = "block";
/// Meta key carrying the 1-based page number written by the footer.
pub const META_FOOTER_KEY: &str = "footer";

#[derive(Debug, Clone, Copy, PartialEq)]
enum AccentMode {
    Entropy,
    Seeded(u64),
    Fixed(f32),
}

/// Renders consultation records into paginated PDF reports.
///
/// A renderer is immutable after `build()` and can be shared across threads;
/// each render owns its canvas and layout state.
pub struct ReportRenderer {
    style: ReportStyle,
    report_date: Option<NaiveDate>,
    accent: AccentMode,
    trace: Option<LayoutTrace>,
}

pub struct ReportRendererBuilder {
    page_size: Size,
    margins: Margins,
    palette: Palette,
    brand: Brand,
    report_date: Option<NaiveDate>,
    accent: AccentMode,
    trace_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Document title written to the PDF info dictionary.
    pub title: String,
}

impl RenderedReport {
    /// Writes the report into `dir` under its derived filename.
    pub fn save_to(&self, dir: impl AsRef<Path>) -> Result<PathBuf, ReportError> {
        let path = dir.as_ref().join(&self.filename);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

impl ReportRenderer {
    pub fn builder() -> ReportRendererBuilder {
        ReportRendererBuilder::new()
    }

    pub fn style(&self) -> &ReportStyle {
        &self.style
    }

    pub fn render(
        &self,
        record: &ReportRecord,
        logo: Option<&LogoAsset>,
    ) -> Result<RenderedReport, ReportError> {
        let mut accent = self.accent_source();
        self.render_with_accent(record, logo, accent.as_mut())
    }

    pub fn render_with_accent(
        &self,
        record: &ReportRecord,
        logo: Option<&LogoAsset>,
        accent: &mut dyn AccentSource,
    ) -> Result<RenderedReport, ReportError> {
        let (document, _stats) = self.layout(record, logo, accent)?;
        self.serialize(record, &document)
    }

    pub fn render_with_metrics(
        &self,
        record: &ReportRecord,
        logo: Option<&LogoAsset>,
    ) -> Result<(RenderedReport, RenderMetrics), ReportError> {
        let started = Instant::now();
        let mut accent = self.accent_source();
        let (document, stats) = self.layout(record, logo, accent.as_mut())?;
        let report = self.serialize(record, &document)?;

        let pages = document
            .pages
            .iter()
            .enumerate()
            .map(|(index, page)| PageMetrics {
                page_number: index + 1,
                block_count: stats.blocks_per_page.get(index).copied().unwrap_or(0),
                command_count: page.commands.len(),
            })
            .collect();
        let metrics = RenderMetrics {
            pages,
            total_render_ms: started.elapsed().as_secs_f64() * 1000.0,
            page_breaks: stats.page_breaks,
            placed_blocks: stats.placed_blocks,
            skipped_blocks: stats.skipped_blocks,
            total_bytes: report.bytes.len(),
        };
        Ok((report, metrics))
    }

    /// Lays the record out without serialising it.
    pub fn render_document(
        &self,
        record: &ReportRecord,
        logo: Option<&LogoAsset>,
    ) -> Result<Document, ReportError> {
        let mut accent = self.accent_source();
        self.layout(record, logo, accent.as_mut())
            .map(|(document, _)| document)
    }

    /// Renders independent records in parallel; results keep input order.
    pub fn render_many(
        &self,
        records: &[ReportRecord],
        logo: Option<&LogoAsset>,
    ) -> Vec<Result<RenderedReport, ReportError>> {
        use rayon::prelude::*;

        records
            .par_iter()
            .map(|record| self.render(record, logo))
            .collect()
    }

    /// Awaits the logo, then renders synchronously. A failed fetch renders without a logo.
    pub async fn render_with_logo_source(
        &self,
        record: &ReportRecord,
        source: &dyn LogoSource,
    ) -> Result<RenderedReport, ReportError> {
        let logo = fetch_logo(source).await;
        self.render(record, logo.as_ref())
    }

    fn accent_source(&self) -> Box<dyn AccentSource> {
        match self.accent {
            AccentMode::Entropy => Box::new(RandomAccent::from_entropy()),
            AccentMode::Seeded(seed) => Box::new(RandomAccent::seeded(seed)),
            AccentMode::Fixed(fill) => Box::new(FixedAccent(fill)),
        }
    }

    fn layout(
        &self,
        record: &ReportRecord,
        logo: Option<&LogoAsset>,
        accent: &mut dyn AccentSource,
    ) -> Result<(Document, LayoutStats), ReportError> {
        let prepared = logo.map(prepare_logo);
        let trace = self
            .trace
            .as_ref()
            .map(|trace| trace.for_render(record.client_name.trim()));
        let date = self
            .report_date
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let composer = Composer {
            record,
            style: &self.style,
            logo: prepared.as_ref(),
            date,
            trace: trace.as_ref(),
        };
        let (document, stats) = composer.compose(accent)?;
        log::debug!(
            "laid out report for '{}': {} pages, {} blocks placed, {} skipped",
            record.client_name.trim(),
            document.page_count(),
            stats.placed_blocks,
            stats.skipped_blocks
        );
        if let Some(trace) = &trace {
            trace.summary(document.page_count(), &stats);
        }
        Ok((document, stats))
    }

    fn serialize(
        &self,
        record: &ReportRecord,
        document: &Document,
    ) -> Result<RenderedReport, ReportError> {
        let bytes = pdf::document_to_pdf(document)?;
        Ok(RenderedReport {
            filename: report_filename(&record.client_name),
            bytes,
            page_count: document.page_count(),
            title: document.title.clone().unwrap_or_default(),
        })
    }
}

impl Default for ReportRendererBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportRendererBuilder {
    pub fn new() -> Self {
        let geometry = PageGeometry::default();
        Self {
            page_size: geometry.page,
            margins: geometry.margins,
            palette: Palette::default(),
            brand: Brand::default(),
            report_date: None,
            accent: AccentMode::Entropy,
            trace_path: None,
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    pub fn brand(mut self, brand: Brand) -> Self {
        self.brand = brand;
        self
    }

    /// Date printed on the cover. Defaults to the local date at render time.
    pub fn report_date(mut self, date: NaiveDate) -> Self {
        self.report_date = Some(date);
        self
    }

    pub fn accent_seed(mut self, seed: u64) -> Self {
        self.accent = AccentMode::Seeded(seed);
        self
    }

    pub fn fixed_accent(mut self, fill: f32) -> Self {
        self.accent = AccentMode::Fixed(fill);
        self
    }

    pub fn layout_trace(mut self, path: impl Into<PathBuf>) -> Self {
        self.trace_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ReportRenderer, ReportError> {
        if let AccentMode::Fixed(fill) = self.accent {
            if !fill.is_finite() {
                return Err(ReportError::InvalidConfiguration(
                    "fixed_accent must be a finite fraction".to_string(),
                ));
            }
        }
        let geometry = PageGeometry::new(self.page_size, self.margins);
        geometry
            .validate()
            .map_err(ReportError::InvalidConfiguration)?;
        let trace = match self.trace_path {
            Some(path) => Some(LayoutTrace::create(path)?),
            None => None,
        };
        Ok(ReportRenderer {
            style: ReportStyle::new(geometry, self.palette, self.brand),
            report_date: self.report_date,
            accent: self.accent,
            trace,
        })
    }
}

/// `"A. Test User"` becomes `a_test_user_consultation.pdf`.
pub fn report_filename(client_name: &str) -> String {
    let mut stem = String::with_capacity(client_name.len());
    for ch in client_name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch.to_ascii_lowercase());
        } else if !stem.ends_with('_') {
            stem.push('_');
        }
    }
    let stem = stem.trim_matches('_');
    let stem = if stem.is_empty() { "report" } else { stem };
    format!("{stem}_consultation.pdf")
}

/// Hex sha256 over the page count and every block placement, in page order.
/// Identical records and configuration always produce the same fingerprint.
pub fn layout_fingerprint(document: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.page_count().to_le_bytes());
    for (index, page) in document.pages.iter().enumerate() {
        hasher.update(index.to_le_bytes());
        for value in page.meta_values(META_BLOCK_KEY) {
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        }
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}
