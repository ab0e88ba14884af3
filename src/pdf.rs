//! PDF 1.7 serialisation of a finished [`Document`].
//!
//! Object layout: catalog, page tree, info, the three Times fonts, one
//! ExtGState per distinct opacity, image XObjects (plus soft masks), then a
//! page and content stream per page. Every content stream opens with a
//! transform that maps millimetres from the top-left corner to PDF space, so
//! commands are written in canvas units.

use crate::canvas::{Command, Document, ImageResource, Page};
use crate::error::ReportError;
use crate::font::FontFace;
use crate::types::{Color, Mm};
use fixed::types::I32F32;
use std::collections::BTreeMap;
use std::io::{self, Write};

const PT_PER_MM: f32 = 72.0 / 25.4;

pub fn document_to_pdf(document: &Document) -> Result<Vec<u8>, ReportError> {
    let mut out = Vec::new();
    write_document(document, &mut out)?;
    Ok(out)
}

struct ImageEntry {
    resource: String,
    object_id: usize,
}

struct ObjectPlan {
    catalog_id: usize,
    pages_id: usize,
    info_id: usize,
    font_ids: Vec<(FontFace, usize)>,
    gs_names: BTreeMap<u32, (String, usize)>,
    images: BTreeMap<String, ImageEntry>,
    page_ids: Vec<(usize, usize)>,
    total: usize,
}

fn plan_objects(document: &Document) -> ObjectPlan {
    let mut next = 1usize;
    let mut alloc = || {
        let id = next;
        next += 1;
        id
    };
    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();
    let font_ids = FontFace::ALL.iter().map(|face| (*face, alloc())).collect();

    let mut gs_names = BTreeMap::new();
    for alpha in collect_opacities(document) {
        let name = format!("GS{}", gs_names.len() + 1);
        gs_names.insert(alpha, (name, alloc()));
    }

    let mut images = BTreeMap::new();
    for (index, (id, resource)) in document.images.iter().enumerate() {
        let object_id = alloc();
        if needs_soft_mask(resource) {
            // Soft mask takes the following id.
            alloc();
        }
        images.insert(
            id.clone(),
            ImageEntry {
                resource: format!("Im{}", index + 1),
                object_id,
            },
        );
    }

    let page_ids = document.pages.iter().map(|_| (alloc(), alloc())).collect();
    ObjectPlan {
        catalog_id,
        pages_id,
        info_id,
        font_ids,
        gs_names,
        images,
        page_ids,
        total: next - 1,
    }
}

fn write_document<W: Write>(document: &Document, writer: &mut W) -> Result<(), ReportError> {
    let plan = plan_objects(document);
    let mut offset = 0usize;
    let mut offsets = vec![0usize; plan.total + 1];

    write_bytes(writer, b"%PDF-1.7\n%\xE2\xE3\xCF\xD3\n", &mut offset)?;

    let kids = plan
        .page_ids
        .iter()
        .map(|(page_id, _)| format!("{page_id} 0 R"))
        .collect::<Vec<_>>()
        .join(" ");
    write_object(
        writer,
        &mut offset,
        &mut offsets,
        plan.catalog_id,
        format!("<< /Type /Catalog /Pages {} 0 R >>", plan.pages_id).as_bytes(),
    )?;
    write_object(
        writer,
        &mut offset,
        &mut offsets,
        plan.pages_id,
        format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", plan.page_ids.len()).as_bytes(),
    )?;
    write_object(
        writer,
        &mut offset,
        &mut offsets,
        plan.info_id,
        info_object(document.title.as_deref()).as_bytes(),
    )?;
    for (face, id) in &plan.font_ids {
        write_object(writer, &mut offset, &mut offsets, *id, font_object(*face).as_bytes())?;
    }
    for (alpha, (_, id)) in &plan.gs_names {
        let value = format_milli(*alpha as i64);
        let body = format!("<< /Type /ExtGState /ca {value} /CA {value} >>");
        write_object(writer, &mut offset, &mut offsets, *id, body.as_bytes())?;
    }
    for (id, entry) in &plan.images {
        let Some(resource) = document.images.get(id) else {
            continue;
        };
        let smask_id = needs_soft_mask(resource).then_some(entry.object_id + 1);
        let body = image_object(resource, smask_id);
        write_object(writer, &mut offset, &mut offsets, entry.object_id, &body)?;
        if let Some(smask_id) = smask_id {
            let body = soft_mask_object(resource);
            write_object(writer, &mut offset, &mut offsets, smask_id, &body)?;
        }
    }

    let resources = resource_dict(&plan);
    let width_pt = fmt(document.page_size.width.to_pt());
    let height_pt = fmt(document.page_size.height.to_pt());
    for (page, (page_id, content_id)) in document.pages.iter().zip(&plan.page_ids) {
        let body = format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {width_pt} {height_pt}] /Resources {resources} /Contents {content_id} 0 R >>",
            plan.pages_id
        );
        write_object(writer, &mut offset, &mut offsets, *page_id, body.as_bytes())?;
        let content = render_page(page, document.page_size.height, &plan);
        let compressed = flate_compress(content.as_bytes());
        let stream = stream_object("/Filter /FlateDecode", &compressed);
        write_object(writer, &mut offset, &mut offsets, *content_id, &stream)?;
    }

    let xref_start = offset;
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", plan.total + 1);
    for slot in offsets.iter().skip(1) {
        xref.push_str(&format!("{slot:010} 00000 n \n"));
    }
    write_bytes(writer, xref.as_bytes(), &mut offset)?;
    let trailer = format!(
        "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{xref_start}\n%%EOF\n",
        plan.total + 1,
        plan.catalog_id,
        plan.info_id
    );
    write_bytes(writer, trailer.as_bytes(), &mut offset)?;
    Ok(())
}

fn resource_dict(plan: &ObjectPlan) -> String {
    let fonts = plan
        .font_ids
        .iter()
        .map(|(face, id)| format!("/{} {id} 0 R", face.resource_name()))
        .collect::<Vec<_>>()
        .join(" ");
    let mut dict = format!("<< /Font << {fonts} >>");
    if !plan.gs_names.is_empty() {
        let states = plan
            .gs_names
            .values()
            .map(|(name, id)| format!("/{name} {id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");
        dict.push_str(&format!(" /ExtGState << {states} >>"));
    }
    if !plan.images.is_empty() {
        let images = plan
            .images
            .values()
            .map(|entry| format!("/{} {} 0 R", entry.resource, entry.object_id))
            .collect::<Vec<_>>()
            .join(" ");
        dict.push_str(&format!(" /XObject << {images} >>"));
    }
    dict.push_str(" >>");
    dict
}

fn collect_opacities(document: &Document) -> Vec<u32> {
    let mut values: Vec<u32> = document
        .pages
        .iter()
        .flat_map(|page| page.commands.iter())
        .filter_map(|cmd| match cmd {
            Command::SetOpacity(alpha) => Some(alpha_key(*alpha)),
            _ => None,
        })
        .collect();
    values.sort_unstable();
    values.dedup();
    values
}

fn alpha_key(alpha: f32) -> u32 {
    (alpha.clamp(0.0, 1.0) * 1000.0).round() as u32
}

fn render_page(page: &Page, page_height: Mm, plan: &ObjectPlan) -> String {
    let mut out = String::new();
    let mut font = (FontFace::Regular, 12.0f32);
    // Mirrors q/Q so a restored state draws in the font that was active before it.
    let mut saved_fonts = Vec::new();
    out.push_str(&format!(
        "q\n{k} 0 0 -{k} 0 {} cm\n",
        fmt(page_height.to_pt()),
        k = fmt(PT_PER_MM)
    ));

    for cmd in &page.commands {
        match cmd {
            Command::SaveState => {
                saved_fonts.push(font);
                out.push_str("q\n");
            }
            Command::RestoreState => {
                if let Some(previous) = saved_fonts.pop() {
                    font = previous;
                }
                out.push_str("Q\n");
            }
            Command::Translate(x, y) => {
                out.push_str(&format!("1 0 0 1 {} {} cm\n", fmt_mm(*x), fmt_mm(*y)));
            }
            Command::Rotate(degrees) => {
                let radians = degrees.to_radians();
                let sin = libm::sinf(radians);
                let cos = libm::cosf(radians);
                out.push_str(&format!(
                    "{} {} {} {} 0 0 cm\n",
                    fmt(cos),
                    fmt(-sin),
                    fmt(sin),
                    fmt(cos)
                ));
            }
            Command::Meta { .. } => {}
            Command::SetFillColor(color) => out.push_str(&format!("{} rg\n", fmt_color(*color))),
            Command::SetStrokeColor(color) => out.push_str(&format!("{} RG\n", fmt_color(*color))),
            Command::SetLineWidth(width) => out.push_str(&format!("{} w\n", fmt_mm(*width))),
            Command::SetOpacity(alpha) => {
                if let Some((name, _)) = plan.gs_names.get(&alpha_key(*alpha)) {
                    out.push_str(&format!("/{name} gs\n"));
                }
            }
            Command::SetFont { face, size_pt } => font = (*face, *size_pt),
            Command::MoveTo { x, y } => out.push_str(&format!("{} {} m\n", fmt_mm(*x), fmt_mm(*y))),
            Command::LineTo { x, y } => out.push_str(&format!("{} {} l\n", fmt_mm(*x), fmt_mm(*y))),
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => out.push_str(&format!(
                "{} {} {} {} {} {} c\n",
                fmt_mm(*x1),
                fmt_mm(*y1),
                fmt_mm(*x2),
                fmt_mm(*y2),
                fmt_mm(*x),
                fmt_mm(*y)
            )),
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::DrawString { x, y, text } => {
                // Font size in millimetre user space; the -1 in Tm undoes the page flip.
                let size = fmt(font.1 / PT_PER_MM);
                out.push_str(&format!(
                    "BT /{} {size} Tf 1 0 0 -1 {} {} Tm ({}) Tj ET\n",
                    font.0.resource_name(),
                    fmt_mm(*x),
                    fmt_mm(*y),
                    encode_winansi(text)
                ));
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => out.push_str(&format!(
                "{} {} {} {} re f\n",
                fmt_mm(*x),
                fmt_mm(*y),
                fmt_mm(*width),
                fmt_mm(*height)
            )),
            Command::DrawImage {
                x,
                y,
                width,
                height,
                resource_id,
            } => {
                if let Some(entry) = plan.images.get(resource_id) {
                    out.push_str(&format!(
                        "q {} 0 0 -{} {} {} cm /{} Do Q\n",
                        fmt_mm(*width),
                        fmt_mm(*height),
                        fmt_mm(*x),
                        fmt_mm(*y + *height),
                        entry.resource
                    ));
                }
            }
        }
    }
    out.push_str("Q\n");
    out
}

fn needs_soft_mask(resource: &ImageResource) -> bool {
    resource.jpeg_passthrough.is_none() && resource.pixels.pixels().any(|pixel| pixel[3] < 255)
}

fn image_object(resource: &ImageResource, smask_id: Option<usize>) -> Vec<u8> {
    let (width, height) = resource.pixels.dimensions();
    if let Some(jpeg) = &resource.jpeg_passthrough {
        let dict = format!(
            "/Type /XObject /Subtype /Image /Width {width} /Height {height} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /DCTDecode"
        );
        return stream_object(&dict, jpeg);
    }
    let rgb: Vec<u8> = resource
        .pixels
        .pixels()
        .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
        .collect();
    let smask = smask_id
        .map(|id| format!(" /SMask {id} 0 R"))
        .unwrap_or_default();
    let dict = format!(
        "/Type /XObject /Subtype /Image /Width {width} /Height {height} /ColorSpace /DeviceRGB /BitsPerComponent 8 /Filter /FlateDecode{smask}"
    );
    stream_object(&dict, &flate_compress(&rgb))
}

fn soft_mask_object(resource: &ImageResource) -> Vec<u8> {
    let (width, height) = resource.pixels.dimensions();
    let alpha: Vec<u8> = resource.pixels.pixels().map(|pixel| pixel[3]).collect();
    let dict = format!(
        "/Type /XObject /Subtype /Image /Width {width} /Height {height} /ColorSpace /DeviceGray /BitsPerComponent 8 /Filter /FlateDecode"
    );
    stream_object(&dict, &flate_compress(&alpha))
}

fn stream_object(dict_entries: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!("<< {dict_entries} /Length {} >>\nstream\n", data.len()).into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

fn font_object(face: FontFace) -> String {
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
        face.base_font()
    )
}

fn info_object(title: Option<&str>) -> String {
    let mut entries = vec![format!(
        "/Producer (consultation-report {})",
        env!("CARGO_PKG_VERSION")
    )];
    if let Some(title) = title {
        entries.push(format!("/Title ({})", encode_winansi(title)));
    }
    format!("<< {} >>", entries.join(" "))
}

fn flate_compress(data: &[u8]) -> Vec<u8> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    let _ = encoder.write_all(data);
    encoder.finish().unwrap_or_default()
}

fn write_object<W: Write>(
    writer: &mut W,
    offset: &mut usize,
    offsets: &mut [usize],
    obj_id: usize,
    body: &[u8],
) -> io::Result<()> {
    if let Some(slot) = offsets.get_mut(obj_id) {
        *slot = *offset;
    }
    write_bytes(writer, format!("{obj_id} 0 obj\n").as_bytes(), offset)?;
    write_bytes(writer, body, offset)?;
    write_bytes(writer, b"\nendobj\n", offset)
}

fn write_bytes<W: Write>(writer: &mut W, data: &[u8], offset: &mut usize) -> io::Result<()> {
    writer.write_all(data)?;
    *offset += data.len();
    Ok(())
}

/// Escaped WinAnsi string body; characters outside cp1252 become `?`.
fn encode_winansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2026}' => 0x85,
            '\u{20AC}' => 0x80,
            '\u{2122}' => 0x99,
            _ => b'?',
        };
        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b if !(0x20..0x7f).contains(&b) => out.push_str(&format!("\\{b:03o}")),
            b => out.push(b as char),
        }
    }
    out
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::from_num(value);
    let scaled = (fixed * I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn fmt_mm(value: Mm) -> String {
    format_milli(value.to_milli_i64())
}

fn fmt_color(color: Color) -> String {
    format!(
        "{} {} {}",
        fmt(color.r.clamp(0.0, 1.0)),
        fmt(color.g.clamp(0.0, 1.0)),
        fmt(color.b.clamp(0.0, 1.0))
    )
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{sign}{int_part}")
    } else {
        let mut s = format!("{sign}{int_part}.{frac_part:03}");
        while s.ends_with('0') {
            s.pop();
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{Canvas, TextAlign, TextStyle};
    use crate::types::{Rect, Size};
    use image::{Rgba, RgbaImage};

    fn sample_document() -> Document {
        let mut canvas = Canvas::new(Size::a4()).expect("canvas");
        let style = TextStyle::new(FontFace::Bold, 14.0, Color::rgb8(0, 60, 50));
        canvas.draw_text("PERSONAL (PROFILE)", Mm::from_i32(24), Mm::from_i32(50), &style, TextAlign::Left);
        canvas.new_page();
        let mut logo = RgbaImage::from_pixel(4, 2, Rgba([0, 60, 50, 255]));
        logo.put_pixel(0, 0, Rgba([0, 0, 0, 0]));
        canvas.register_pixels("logo", logo).expect("register");
        canvas.save_state();
        canvas.set_opacity(0.05);
        canvas
            .draw_image(Rect::new(Mm::from_i32(45), Mm::from_i32(100), Mm::from_i32(120), Mm::from_i32(60)), "logo")
            .expect("image");
        canvas.restore_state();
        canvas.draw_text("\u{2022} Ruby", Mm::from_i32(25), Mm::from_i32(60), &style, TextAlign::Left);
        canvas.finish(Some("Astrological Consultation - Asha".to_string()))
    }

    #[test]
    fn format_milli_trims_trailing_zeros() {
        assert_eq!(format_milli(0), "0");
        assert_eq!(format_milli(1500), "1.5");
        assert_eq!(format_milli(-250), "-0.25");
        assert_eq!(format_milli(2835), "2.835");
        assert_eq!(fmt_mm(Mm::from_i32(297)), "297");
    }

    #[test]
    fn winansi_escapes_delimiters_and_maps_bullet() {
        assert_eq!(encode_winansi("a(b)\\c"), "a\\(b\\)\\\\c");
        assert_eq!(encode_winansi("\u{2022} x"), "\\225 x");
        assert_eq!(encode_winansi("\u{263C}"), "?");
    }

    #[test]
    fn restore_state_brings_back_the_outer_font() {
        let mut canvas = Canvas::new(Size::a4()).expect("canvas");
        let body = TextStyle::new(FontFace::Regular, 10.0, Color::BLACK);
        let mark = TextStyle::new(FontFace::Bold, 60.0, Color::BLACK);
        canvas.draw_text("before", Mm::from_i32(20), Mm::from_i32(30), &body, TextAlign::Left);
        canvas.save_state();
        canvas.draw_text("MARK", Mm::from_i32(20), Mm::from_i32(90), &mark, TextAlign::Left);
        canvas.restore_state();
        canvas.draw_text("after", Mm::from_i32(20), Mm::from_i32(40), &body, TextAlign::Left);
        let document = canvas.finish(None);
        let plan = plan_objects(&document);
        let content = render_page(&document.pages[0], document.page_size.height, &plan);
        assert!(content.contains("BT /F2 21.167 Tf 1 0 0 -1 20 90 Tm (MARK) Tj ET"), "{content}");
        assert!(content.contains("BT /F1 3.528 Tf 1 0 0 -1 20 40 Tm (after) Tj ET"), "{content}");
    }

    #[test]
    fn page_stream_flips_to_millimetre_space() {
        let document = sample_document();
        let plan = plan_objects(&document);
        let content = render_page(&document.pages[0], document.page_size.height, &plan);
        assert!(content.starts_with("q\n2.835 0 0 -2.835 0 841.89 cm\n"), "{content}");
        assert!(content.contains("BT /F2 4.939 Tf 1 0 0 -1 24 50 Tm (PERSONAL \\(PROFILE\\)) Tj ET"));
        let second = render_page(&document.pages[1], document.page_size.height, &plan);
        assert!(second.contains("/GS1 gs"));
        assert!(second.contains("q 120 0 0 -60 45 160 cm /Im1 Do Q"));
    }

    #[test]
    fn output_parses_with_lopdf() {
        let document = sample_document();
        let bytes = document_to_pdf(&document).expect("pdf");
        assert!(bytes.starts_with(b"%PDF-1.7"));
        let parsed = lopdf::Document::load_mem(&bytes).expect("parse");
        assert_eq!(parsed.get_pages().len(), 2);
        let needle = b"/Title (Astrological Consultation - Asha)";
        assert!(bytes.windows(needle.len()).any(|w| w == needle));
        // Alpha in the logo requires a soft mask.
        let plan = plan_objects(&document);
        assert_eq!(plan.images.len(), 1);
        assert_eq!(plan.total, 3 + 3 + 1 + 2 + 4);
    }
}
