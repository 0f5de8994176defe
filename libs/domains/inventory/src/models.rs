use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use strum::{Display, EnumString};

/// Stored and displayed form of an attribute the model did not provide.
pub const UNSPECIFIED: &str = "N/A";

/// Stock-photo provider an image was discovered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImageSourceKind {
    #[default]
    Pexels,
}

/// An image discovered by a search, not yet tagged or stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateImage {
    /// Identifier unique within the source (Pexels ids are carried as decimal strings)
    pub id: String,
    /// URL of the rendition sent to the extractor
    pub url: String,
}

impl CandidateImage {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// A single fashion attribute as produced by the model.
///
/// Models answer loosely: keys go missing, values come back as `null`, as
/// lists, or as the literal `"N/A"`. All of that is normalized on the way in,
/// and [`Attribute::Unspecified`] is written out as [`UNSPECIFIED`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<JsonValue>", into = "String")]
pub enum Attribute {
    #[default]
    Unspecified,
    Value(String),
}

impl Attribute {
    pub fn new(value: impl Into<String>) -> Self {
        Self::from_text(&value.into())
    }

    fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNSPECIFIED) {
            Attribute::Unspecified
        } else {
            Attribute::Value(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Attribute::Unspecified => UNSPECIFIED,
            Attribute::Value(v) => v,
        }
    }

    pub fn is_specified(&self) -> bool {
        matches!(self, Attribute::Value(_))
    }
}

impl From<Option<JsonValue>> for Attribute {
    fn from(value: Option<JsonValue>) -> Self {
        match value {
            None | Some(JsonValue::Null) => Attribute::Unspecified,
            Some(JsonValue::String(s)) => Attribute::from_text(&s),
            Some(JsonValue::Array(items)) => {
                let parts: Vec<String> = items
                    .into_iter()
                    .map(|item| Attribute::from(Some(item)))
                    .filter_map(|attr| match attr {
                        Attribute::Value(v) => Some(v),
                        Attribute::Unspecified => None,
                    })
                    .collect();
                Attribute::from_text(&parts.join(", "))
            }
            Some(other @ (JsonValue::Number(_) | JsonValue::Bool(_) | JsonValue::Object(_))) => {
                Attribute::from_text(&other.to_string())
            }
        }
    }
}

impl From<Attribute> for String {
    fn from(value: Attribute) -> Self {
        match value {
            Attribute::Unspecified => UNSPECIFIED.to_string(),
            Attribute::Value(v) => v,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five attribute keys, named as they appear in stored documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum AttributeKey {
    Style,
    Color,
    Occasion,
    GarmentType,
    Fitting,
}

/// Structured tag set derived from one image.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeRecord {
    #[serde(default, alias = "Style")]
    pub style: Attribute,
    #[serde(default, alias = "Color", alias = "colour")]
    pub color: Attribute,
    #[serde(default, alias = "Occasion")]
    pub occasion: Attribute,
    #[serde(default, alias = "garmentType", alias = "Garment_type", alias = "Garment Type")]
    pub garment_type: Attribute,
    #[serde(default, alias = "Fitting", alias = "fit")]
    pub fitting: Attribute,
}

impl AttributeRecord {
    /// Number of attributes the model actually filled in.
    pub fn specified_count(&self) -> usize {
        self.iter().filter(|(_, a)| a.is_specified()).count()
    }

    /// Attributes paired with their keys, in document order.
    pub fn iter(&self) -> impl Iterator<Item = (AttributeKey, &Attribute)> {
        [
            (AttributeKey::Style, &self.style),
            (AttributeKey::Color, &self.color),
            (AttributeKey::Occasion, &self.occasion),
            (AttributeKey::GarmentType, &self.garment_type),
            (AttributeKey::Fitting, &self.fitting),
        ]
        .into_iter()
    }
}

/// A tagged image as persisted in the inventory collection.
///
/// Field names match the documents the mobile client reads
/// (`_id`, `imageUrl`, `tags`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    pub image_url: String,
    #[serde(rename = "tags")]
    pub attributes: AttributeRecord,
    #[serde(default)]
    pub source: ImageSourceKind,
    pub tagged_at: DateTime<Utc>,
}

impl InventoryEntry {
    pub fn new(
        candidate: &CandidateImage,
        attributes: AttributeRecord,
        source: ImageSourceKind,
    ) -> Self {
        Self {
            id: candidate.id.clone(),
            image_url: candidate.url.clone(),
            attributes,
            source,
            tagged_at: Utc::now(),
        }
    }
}
