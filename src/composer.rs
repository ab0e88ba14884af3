//! Fixed section order: cover, profile, summary, timeline, personality,
//! remedies, nature and spirit, closing seal. Empty sections are skipped.

use crate::accent::AccentSource;
use crate::blocks::{
    Block, BlockEnv, Card, ClosingSeal, Cover, HighlightGrid, Illustration, IllustrationWidth,
    LabelValue, Marker, SectionTitle,
};
use crate::canvas::{Canvas, Document};
use crate::chrome::{BrandMark, LOGO_RESOURCE_ID};
use crate::error::ReportError;
use crate::layout::{LayoutEngine, LayoutStats};
use crate::preprocess::PreparedLogo;
use crate::record::{ReportRecord, VisualKey, non_blank};
use crate::style::ReportStyle;
use crate::trace::LayoutTrace;
use crate::types::Mm;
use chrono::NaiveDate;

const FULL_ART_HEIGHT: i32 = 70;
const SECTION_ART_HEIGHT: i32 = 55;
const REMEDY_ART_HEIGHT: i32 = 45;

pub struct Composer<'a> {
    pub record: &'a ReportRecord,
    pub style: &'a ReportStyle,
    pub logo: Option<&'a PreparedLogo>,
    pub date: NaiveDate,
    pub trace: Option<&'a LayoutTrace>,
}

impl Composer<'_> {
    pub fn compose(&self, accent: &mut dyn AccentSource) -> Result<(Document, LayoutStats), ReportError> {
        let mut canvas = Canvas::new(self.style.geometry.page)?;
        let brand = register_logo(&mut canvas, self.logo);
        let mut engine = LayoutEngine::new(canvas, self.style, brand.as_ref(), self.trace)?;

        let env = BlockEnv {
            style: self.style,
            logo: brand.as_ref(),
        };
        Cover {
            client_name: &self.record.client_name,
            date: self.date,
        }
        .draw(engine.canvas_mut(), &env)?;
        engine.start_content()?;

        let mut sections = Sections {
            engine: &mut engine,
            record: self.record,
        };
        sections.profile(accent)?;
        sections.illustration(accent, VisualKey::Planetary, FULL_ART_HEIGHT, IllustrationWidth::Full)?;
        sections.executive_summary(accent)?;
        sections.timeline(accent)?;
        sections.illustration(accent, VisualKey::Career, SECTION_ART_HEIGHT, IllustrationWidth::Inline)?;
        sections.personality(accent)?;
        sections.illustration(
            accent,
            VisualKey::Personality,
            SECTION_ART_HEIGHT,
            IllustrationWidth::Inline,
        )?;
        sections.remedies(accent)?;
        sections.nature_and_spirit(accent)?;
        engine.place(&ClosingSeal, accent)?;

        let title = if self.record.client_name.trim().is_empty() {
            self.style.brand.document_title.clone()
        } else {
            format!("{} - {}", self.style.brand.document_title, self.record.client_name.trim())
        };
        engine.finish(Some(title))
    }
}

/// Registers the prepared logo once; a registration failure means no logo.
fn register_logo(canvas: &mut Canvas, logo: Option<&PreparedLogo>) -> Option<BrandMark> {
    let prepared = logo?;
    let pixels = prepared.image.clone()?;
    match canvas.register_pixels(LOGO_RESOURCE_ID, pixels) {
        Ok(_) => Some(BrandMark {
            resource_id: LOGO_RESOURCE_ID.to_string(),
            aspect_ratio: prepared.aspect_ratio,
        }),
        Err(err) => {
            log::warn!("logo could not be registered, rendering without logo: {err}");
            None
        }
    }
}

struct Sections<'e, 'a, 'r> {
    engine: &'e mut LayoutEngine<'a>,
    record: &'r ReportRecord,
}

impl Sections<'_, '_, '_> {
    fn place(&mut self, accent: &mut dyn AccentSource, block: &dyn Block) -> Result<(), ReportError> {
        self.engine.place(block, accent).map(|_| ())
    }

    fn profile(&mut self, accent: &mut dyn AccentSource) -> Result<(), ReportError> {
        let record = self.record;
        self.place(accent, &SectionTitle::new("Personal Profile"))?;
        self.place(accent, &LabelValue::new("Ascendant", record.ascendant.trim()))?;
        self.place(accent, &LabelValue::new("Moon Sign", record.moon_sign.trim()))?;
        let observations = record.observations();
        if !observations.is_empty() {
            self.place(accent, &LabelValue::new("Key Observations", observations.join("\n")))?;
        }
        Ok(())
    }

    fn executive_summary(&mut self, accent: &mut dyn AccentSource) -> Result<(), ReportError> {
        let record = self.record;
        let highlights = record.highlights();
        if highlights.is_empty() {
            return Ok(());
        }
        let grid = HighlightGrid::new(highlights);
        self.place(accent, &SectionTitle::new("Executive Summary").keep_with(grid.height()))?;
        self.place(accent, &grid)
    }

    fn timeline(&mut self, accent: &mut dyn AccentSource) -> Result<(), ReportError> {
        let record = self.record;
        let entries = &record.timeline_analysis;
        if entries.is_empty() {
            return Ok(());
        }
        self.place(accent, &SectionTitle::new("Timeline & Forecast"))?;
        for entry in entries {
            self.place(accent, &LabelValue::new(entry.label.as_str(), entry.value.as_str()))?;
        }
        Ok(())
    }

    fn personality(&mut self, accent: &mut dyn AccentSource) -> Result<(), ReportError> {
        let record = self.record;
        let entries = record.personality_health.entries();
        if entries.is_empty() {
            return Ok(());
        }
        self.place(accent, &SectionTitle::new("Personality & Health"))?;
        for (label, value) in entries {
            self.place(accent, &LabelValue::new(label, value))?;
        }
        Ok(())
    }

    fn remedies(&mut self, accent: &mut dyn AccentSource) -> Result<(), ReportError> {
        let record = self.record;
        let remedies = &record.structured_remedies;
        if remedies.is_empty() {
            return Ok(());
        }
        self.place(accent, &SectionTitle::new("Remedial Measures"))?;
        let gemstones = remedies.gemstones.trim();
        if !gemstones.is_empty() {
            self.place(accent, &Card::new("Gemstones", gemstones).with_marker(Marker::Diamond))?;
            self.illustration(accent, VisualKey::Gemstone, REMEDY_ART_HEIGHT, IllustrationWidth::Inline)?;
        }
        let rudraksha = remedies.rudraksha.trim();
        if !rudraksha.is_empty() {
            self.place(accent, &Card::new("Rudraksha", rudraksha).with_marker(Marker::Circle))?;
        }
        let rituals = non_blank(&remedies.rituals);
        if !rituals.is_empty() {
            self.place(accent, &Card::bulleted("Rituals", &rituals).with_marker(Marker::Triangle))?;
        }
        let lifestyle = non_blank(&remedies.lifestyle);
        if !lifestyle.is_empty() {
            self.place(accent, &Card::bulleted("Lifestyle Adjustments", &lifestyle).with_marker(Marker::Square))?;
        }
        Ok(())
    }

    fn nature_and_spirit(&mut self, accent: &mut dyn AccentSource) -> Result<(), ReportError> {
        let record = self.record;
        let plants = record.plants();
        let sites = record.pilgrimage_sites();
        if plants.is_empty() && sites.is_empty() {
            return Ok(());
        }
        self.place(accent, &SectionTitle::new("Nature & Spirit"))?;
        if !plants.is_empty() {
            self.place(accent, &Card::new("Botanical Remedies (Trees to Plant)", plants.join(", ")))?;
            self.illustration(accent, VisualKey::Botanical, REMEDY_ART_HEIGHT, IllustrationWidth::Inline)?;
        }
        if !sites.is_empty() {
            self.place(accent, &Card::numbered("Recommended Pilgrimage", &sites))?;
            self.illustration(accent, VisualKey::PilgrimageMap, FULL_ART_HEIGHT, IllustrationWidth::Full)?;
        }
        Ok(())
    }

    fn illustration(
        &mut self,
        accent: &mut dyn AccentSource,
        key: VisualKey,
        height: i32,
        width: IllustrationWidth,
    ) -> Result<(), ReportError> {
        let record = self.record;
        let Some(image) = record.visual(key) else {
            return Ok(());
        };
        self.place(accent, &Illustration::encoded(key.resource_id(), image, Mm::from_i32(height), width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accent::FixedAccent;
    use crate::record::{LabeledValue, PersonalityHealth, Remedies};

    fn compose(record: &ReportRecord) -> (Document, LayoutStats) {
        let style = ReportStyle::default();
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).expect("date");
        Composer {
            record,
            style: &style,
            logo: None,
            date,
            trace: None,
        }
        .compose(&mut FixedAccent(0.6))
        .expect("compose")
    }

    fn all_text(document: &Document) -> Vec<String> {
        document
            .pages
            .iter()
            .flat_map(|page| page.texts().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    #[test]
    fn empty_record_yields_cover_and_profile_page() {
        let record = ReportRecord::default();
        let (document, stats) = compose(&record);
        assert_eq!(document.page_count(), 2);
        let text = all_text(&document);
        assert!(text.contains(&"PERSONAL PROFILE".to_string()));
        assert!(text.contains(&"May the stars guide you.".to_string()));
        for heading in [
            "EXECUTIVE SUMMARY",
            "TIMELINE & FORECAST",
            "PERSONALITY & HEALTH",
            "REMEDIAL MEASURES",
            "NATURE & SPIRIT",
        ] {
            assert!(!text.contains(&heading.to_string()), "{heading}");
        }
        // Ascendant, moon sign.
        assert_eq!(text.iter().filter(|t| *t == "-").count(), 2);
        assert_eq!(stats.skipped_blocks, 0);
    }

    #[test]
    fn sections_with_only_blank_entries_are_omitted() {
        let record = ReportRecord {
            personality_health: PersonalityHealth {
                caution: "Avoid haste".to_string(),
                ..PersonalityHealth::default()
            },
            structured_remedies: Remedies {
                lifestyle: vec![" ".to_string()],
                ..Remedies::default()
            },
            spiritual_pilgrimage: vec!["Kedarnath".to_string()],
            ..ReportRecord::default()
        };
        let text = all_text(&compose(&record).0);
        assert!(text.contains(&"PERSONALITY & HEALTH".to_string()));
        assert!(text.contains(&"Caution".to_string()));
        assert!(!text.contains(&"Temperament".to_string()));
        assert!(!text.contains(&"REMEDIAL MEASURES".to_string()));
        assert!(text.contains(&"NATURE & SPIRIT".to_string()));
        assert!(text.contains(&"1. Kedarnath".to_string()));
        assert!(!text.iter().any(|t| t.starts_with("Botanical")));
    }

    #[test]
    fn timeline_entries_survive_page_breaks_in_order() {
        let long = "Saturn's transit over the natal moon brings a slow, demanding period in which \
                    career matters need patience; Jupiter's aspect later softens the pressure and \
                    opens doors through mentors, study and travel across the following seasons.";
        let record = ReportRecord {
            key_observations: vec![long.to_string(); 6],
            summary_highlights: (0..6).map(|i| LabeledValue::new(format!("H{i}"), "Strong")).collect(),
            timeline_analysis: (1..=7)
                .map(|i| LabeledValue::new(format!("Phase {i}"), long))
                .collect(),
            ..ReportRecord::default()
        };
        let (document, _) = compose(&record);
        assert!(document.page_count() > 2);
        let labels: Vec<String> = all_text(&document)
            .into_iter()
            .filter(|t| t.starts_with("Phase "))
            .collect();
        let expected: Vec<String> = (1..=7).map(|i| format!("Phase {i}")).collect();
        assert_eq!(labels, expected);
    }

    #[test]
    fn remedies_use_bullets_and_markers() {
        let record = ReportRecord {
            structured_remedies: Remedies {
                gemstones: "Yellow sapphire".to_string(),
                rudraksha: "Five mukhi".to_string(),
                rituals: vec!["Recite Guru mantra".to_string()],
                lifestyle: vec!["Rise before dawn".to_string()],
            },
            botanical_remedies: vec!["Peepal".to_string(), "Banyan".to_string()],
            ..ReportRecord::default()
        };
        let text = all_text(&compose(&record).0);
        assert!(text.contains(&"\u{2022} Recite Guru mantra".to_string()));
        assert!(text.contains(&"Lifestyle Adjustments".to_string()));
        assert!(text.contains(&"Peepal, Banyan".to_string()));
    }

    #[test]
    fn malformed_visual_is_skipped_and_render_continues() {
        let record = ReportRecord {
            timeline_analysis: vec![LabeledValue::new("2025", "Growth")],
            ..ReportRecord::default()
        }
        .with_visual(VisualKey::Career, b"definitely not a png");
        let (document, stats) = compose(&record);
        assert_eq!(stats.skipped_blocks, 1);
        assert!(document.images.keys().all(|id| id != "visual-career"));
        assert!(all_text(&document).contains(&"May the stars guide you.".to_string()));
    }

    #[test]
    fn undecodable_visual_from_json_skips_only_its_illustration() {
        let record = ReportRecord::from_json(
            r#"{
                "clientName": "Asha",
                "timelineAnalysis": [{"label": "2025", "value": "Growth"}],
                "visuals": {"career": "not*base64", "planetary": null, "zodiac": "aGVsbG8="}
            }"#,
        )
        .expect("record parses");
        let (document, stats) = compose(&record);
        assert_eq!(stats.skipped_blocks, 1);
        assert!(document.images.is_empty());
        let text = all_text(&document);
        assert!(text.contains(&"Growth".to_string()));
        assert!(text.contains(&"May the stars guide you.".to_string()));
    }
}
