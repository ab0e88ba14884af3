//! Read-back checks on a serialised report: the bytes parse, and the parsed
//! document agrees with what the renderer says it produced.

use crate::RenderedReport;
use crate::error::ReportError;
use lopdf::{Document as LoDocument, ObjectId};

/// What a PDF reader sees in a report.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfSummary {
    pub version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub title: Option<String>,
    /// Width and height of the first page, in points.
    pub first_page_pt: Option<(f32, f32)>,
    pub byte_len: usize,
}

pub fn summarize_pdf(bytes: &[u8]) -> Result<PdfSummary, ReportError> {
    let pdf = LoDocument::load_mem(bytes)
        .map_err(|err| ReportError::Verification(format!("pdf does not parse: {err}")))?;
    let pages = pdf.get_pages();
    let first_page_pt = pages
        .values()
        .next()
        .and_then(|id| media_box_size(&pdf, *id));
    Ok(PdfSummary {
        version: pdf.version.clone(),
        page_count: pages.len(),
        encrypted: pdf.is_encrypted(),
        title: info_title(&pdf),
        first_page_pt,
        byte_len: bytes.len(),
    })
}

/// Parses `report.bytes` and checks page count and title against the report.
pub fn verify_report(report: &RenderedReport) -> Result<PdfSummary, ReportError> {
    let summary = summarize_pdf(&report.bytes)?;
    if summary.encrypted {
        return Err(ReportError::Verification(format!(
            "{} is encrypted",
            report.filename
        )));
    }
    if summary.page_count == 0 || summary.page_count != report.page_count {
        return Err(ReportError::Verification(format!(
            "{} has {} pages, renderer laid out {}",
            report.filename, summary.page_count, report.page_count
        )));
    }
    if summary.title.as_deref() != Some(report.title.as_str()) {
        return Err(ReportError::Verification(format!(
            "{} carries title {:?}, expected {:?}",
            report.filename, summary.title, report.title
        )));
    }
    Ok(summary)
}

fn info_title(pdf: &LoDocument) -> Option<String> {
    let info_ref = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let title = pdf.get_dictionary(info_ref).ok()?.get(b"Title").ok()?.as_str().ok()?;
    Some(String::from_utf8_lossy(title).into_owned())
}

fn media_box_size(pdf: &LoDocument, page: ObjectId) -> Option<(f32, f32)> {
    let media_box = pdf.get_dictionary(page).ok()?.get(b"MediaBox").ok()?.as_array().ok()?;
    let coords: Vec<f32> = media_box.iter().filter_map(|value| value.as_float().ok()).collect();
    match coords.as_slice() {
        [x0, y0, x1, y1] => Some((x1 - x0, y1 - y0)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, TextAlign, TextStyle};
    use crate::font::FontFace;
    use crate::pdf::document_to_pdf;
    use crate::types::{Color, Mm, Size};

    const TITLE: &str = "Astrological Consultation - Ravi";

    fn rendered(pages: usize) -> RenderedReport {
        let mut canvas = Canvas::new(Size::a4()).expect("canvas");
        let style = TextStyle::new(FontFace::Regular, 10.0, Color::BLACK);
        for page in 0..pages {
            if page > 0 {
                canvas.new_page();
            }
            canvas.draw_text("Page", Mm::from_i32(20), Mm::from_i32(30), &style, TextAlign::Left);
        }
        let bytes = document_to_pdf(&canvas.finish(Some(TITLE.to_string()))).expect("pdf");
        RenderedReport {
            filename: "ravi_consultation.pdf".to_string(),
            bytes,
            page_count: pages,
            title: TITLE.to_string(),
        }
    }

    #[test]
    fn summary_reads_pages_title_and_a4_box() {
        let report = rendered(3);
        let summary = verify_report(&report).expect("verify");
        assert_eq!(summary.page_count, 3);
        assert_eq!(summary.version, "1.7");
        assert!(!summary.encrypted);
        assert_eq!(summary.title.as_deref(), Some(TITLE));
        assert_eq!(summary.byte_len, report.bytes.len());
        let (width, height) = summary.first_page_pt.expect("media box");
        assert!((width - 595.276).abs() < 0.01, "{width}");
        assert!((height - 841.89).abs() < 0.01, "{height}");
    }

    #[test]
    fn garbage_bytes_fail_verification() {
        let err = summarize_pdf(b"not a pdf").expect_err("invalid");
        assert!(matches!(err, ReportError::Verification(_)));
    }

    #[test]
    fn page_count_mismatch_is_reported() {
        let mut report = rendered(2);
        report.page_count = 3;
        let err = verify_report(&report).expect_err("mismatch");
        assert!(err.to_string().contains("has 2 pages, renderer laid out 3"), "{err}");
    }

    #[test]
    fn title_must_name_the_client() {
        let mut report = rendered(1);
        report.title = "Astrological Consultation - Asha".to_string();
        let err = verify_report(&report).expect_err("wrong title");
        assert!(matches!(err, ReportError::Verification(_)));
    }
}
