use crate::error::ReportError;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const MAX_HIGHLIGHTS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabeledValue {
    pub label: String,
    pub value: String,
}

impl LabeledValue {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalityHealth {
    pub temperament: String,
    pub caution: String,
    pub physical: String,
    pub advice: String,
}

impl PersonalityHealth {
    /// Labeled fields in print order, blanks dropped.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("Temperament", self.temperament.as_str()),
            ("Caution", self.caution.as_str()),
            ("Physical", self.physical.as_str()),
            ("Advice", self.advice.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| !value.trim().is_empty())
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Remedies {
    pub gemstones: String,
    pub rudraksha: String,
    pub rituals: Vec<String>,
    pub lifestyle: Vec<String>,
}

impl Remedies {
    pub fn is_empty(&self) -> bool {
        self.gemstones.trim().is_empty()
            && self.rudraksha.trim().is_empty()
            && non_blank(&self.rituals).is_empty()
            && non_blank(&self.lifestyle).is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisualKey {
    Planetary,
    Career,
    Personality,
    Gemstone,
    Botanical,
    PilgrimageMap,
}

impl VisualKey {
    pub fn resource_id(self) -> &'static str {
        match self {
            VisualKey::Planetary => "visual-planetary",
            VisualKey::Career => "visual-career",
            VisualKey::Personality => "visual-personality",
            VisualKey::Gemstone => "visual-gemstone",
            VisualKey::Botanical => "visual-botanical",
            VisualKey::PilgrimageMap => "visual-pilgrimage-map",
        }
    }
}

/// A visual exactly as it arrived: base64, optionally wrapped in a `data:` URL.
/// Decoding is deferred to the illustration that draws it, so a broken visual
/// costs one block instead of the whole record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedImage(pub String);

impl EncodedImage {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(STANDARD.encode(bytes))
    }

    pub fn decode(&self) -> Result<Vec<u8>, ReportError> {
        decode_base64_image(&self.0).map_err(ReportError::Image)
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncodedImage({} chars)", self.0.len())
    }
}

pub fn decode_base64_image(raw: &str) -> Result<Vec<u8>, String> {
    let payload = match raw.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => raw,
    };
    let compact: String = payload.chars().filter(|ch| !ch.is_whitespace()).collect();
    STANDARD
        .decode(compact.as_bytes())
        .map_err(|err| format!("invalid base64 image: {err}"))
}

/// Illustrations keyed by slot. Unknown keys and non-string values are
/// dropped while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Visuals(BTreeMap<VisualKey, EncodedImage>);

impl Visuals {
    pub fn get(&self, key: VisualKey) -> Option<&EncodedImage> {
        self.0.get(&key)
    }

    pub fn insert(&mut self, key: VisualKey, image: EncodedImage) {
        self.0.insert(key, image);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<'de> Deserialize<'de> for Visuals {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let Value::Object(entries) = Value::deserialize(deserializer)? else {
            return Ok(Visuals::default());
        };
        let mut visuals = Visuals::default();
        for (name, value) in entries {
            let Value::String(encoded) = value else {
                continue;
            };
            match serde_json::from_value::<VisualKey>(Value::String(name.clone())) {
                Ok(key) => visuals.insert(key, EncodedImage(encoded)),
                Err(_) => log::debug!("ignoring unknown visual '{name}'"),
            }
        }
        Ok(visuals)
    }
}

/// Immutable input to a render. Every field defaults when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReportRecord {
    pub client_name: String,
    pub ascendant: String,
    pub moon_sign: String,
    pub key_observations: Vec<String>,
    pub timeline_analysis: Vec<LabeledValue>,
    pub personality_health: PersonalityHealth,
    pub structured_remedies: Remedies,
    pub botanical_remedies: Vec<String>,
    pub spiritual_pilgrimage: Vec<String>,
    pub summary_highlights: Vec<LabeledValue>,
    pub visuals: Visuals,
}

impl ReportRecord {
    pub fn from_json(json: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ReportError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn visual(&self, key: VisualKey) -> Option<&EncodedImage> {
        self.visuals.get(key)
    }

    pub fn with_visual(mut self, key: VisualKey, bytes: &[u8]) -> Self {
        self.visuals.insert(key, EncodedImage::from_bytes(bytes));
        self
    }

    /// Highlights actually rendered (at most six).
    pub fn highlights(&self) -> &[LabeledValue] {
        let end = self.summary_highlights.len().min(MAX_HIGHLIGHTS);
        &self.summary_highlights[..end]
    }

    pub fn observations(&self) -> Vec<&str> {
        non_blank(&self.key_observations)
    }

    pub fn plants(&self) -> Vec<&str> {
        non_blank(&self.botanical_remedies)
    }

    pub fn pilgrimage_sites(&self) -> Vec<&str> {
        non_blank(&self.spiritual_pilgrimage)
    }
}

pub(crate) fn non_blank(items: &[String]) -> Vec<&str> {
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect()
}
