//! Typed records persisted by the catalog
//!
//! Constrained columns (source type, conservation status) are enums here so
//! that only validated values reach the store. List columns are stored as
//! JSON text and surface as `Vec<String>`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Kind of provenance record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Book,
    Paper,
    Website,
    Observation,
    Database,
    Other,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Book => "book",
            SourceType::Paper => "paper",
            SourceType::Website => "website",
            SourceType::Observation => "observation",
            SourceType::Database => "database",
            SourceType::Other => "other",
        }
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "book" => Ok(SourceType::Book),
            "paper" => Ok(SourceType::Paper),
            "website" => Ok(SourceType::Website),
            "observation" => Ok(SourceType::Observation),
            "database" => Ok(SourceType::Database),
            "other" => Ok(SourceType::Other),
            other => Err(Error::Validation(format!("unknown source type '{}'", other))),
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// IUCN Red List category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConservationStatus {
    /// Least Concern
    LC,
    /// Near Threatened
    NT,
    /// Vulnerable
    VU,
    /// Endangered
    EN,
    /// Critically Endangered
    CR,
    /// Extinct in the Wild
    EW,
    /// Extinct
    EX,
    /// Data Deficient
    DD,
    /// Not Evaluated
    NE,
}

impl ConservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConservationStatus::LC => "LC",
            ConservationStatus::NT => "NT",
            ConservationStatus::VU => "VU",
            ConservationStatus::EN => "EN",
            ConservationStatus::CR => "CR",
            ConservationStatus::EW => "EW",
            ConservationStatus::EX => "EX",
            ConservationStatus::DD => "DD",
            ConservationStatus::NE => "NE",
        }
    }
}

impl FromStr for ConservationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LC" => Ok(ConservationStatus::LC),
            "NT" => Ok(ConservationStatus::NT),
            "VU" => Ok(ConservationStatus::VU),
            "EN" => Ok(ConservationStatus::EN),
            "CR" => Ok(ConservationStatus::CR),
            "EW" => Ok(ConservationStatus::EW),
            "EX" => Ok(ConservationStatus::EX),
            "DD" => Ok(ConservationStatus::DD),
            "NE" => Ok(ConservationStatus::NE),
            other => Err(Error::Validation(format!(
                "unknown conservation status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ConservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Provenance record
///
/// `id` is assigned by the store on creation and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub id: Option<i64>,
    pub source_type: SourceType,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub license_url: Option<String>,
}

impl Source {
    /// Unsaved source with only the required fields set
    pub fn new(source_type: SourceType, name: impl Into<String>) -> Self {
        Self {
            id: None,
            source_type,
            name: name.into(),
            description: None,
            author: None,
            year: None,
            url: None,
            isbn: None,
            doi: None,
            notes: None,
            license: None,
            license_url: None,
        }
    }
}

/// Taxonomic entry keyed by scientific name
///
/// `hybrids` is maintained by the store from other entries' parent slots.
/// Values supplied by callers are ignored on save.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Species {
    pub scientific_name: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub is_hybrid: bool,
    #[serde(default)]
    pub conservation_status: Option<ConservationStatus>,
    #[serde(default)]
    pub subgenus: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub subsection: Option<String>,
    #[serde(default)]
    pub complex: Option<String>,
    #[serde(default)]
    pub parent1: Option<String>,
    #[serde(default)]
    pub parent2: Option<String>,
    #[serde(default)]
    pub hybrids: Vec<String>,
    #[serde(default)]
    pub closely_related_to: Vec<String>,
    #[serde(default)]
    pub subspecies_varieties: Vec<String>,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl Species {
    pub fn new(scientific_name: impl Into<String>) -> Self {
        Self {
            scientific_name: scientific_name.into(),
            ..Default::default()
        }
    }

    /// Hybrid with the given parents
    pub fn hybrid(
        scientific_name: impl Into<String>,
        parent1: Option<&str>,
        parent2: Option<&str>,
    ) -> Self {
        Self {
            scientific_name: scientific_name.into(),
            is_hybrid: true,
            parent1: parent1.map(str::to_string),
            parent2: parent2.map(str::to_string),
            ..Default::default()
        }
    }

    /// Distinct non-empty parent names
    ///
    /// Both slots naming the same species yield a single entry.
    pub fn parents(&self) -> BTreeSet<String> {
        [&self.parent1, &self.parent2]
            .into_iter()
            .flatten()
            .filter(|p| !p.trim().is_empty())
            .cloned()
            .collect()
    }
}

/// Descriptive field carried by a source-attributed record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceField {
    LocalNames,
    Range,
    GrowthHabit,
    Leaves,
    Flowers,
    Fruits,
    Bark,
    Twigs,
    Buds,
    HardinessHabitat,
    Miscellaneous,
    Url,
    IsPreferred,
}

impl SourceField {
    pub const ALL: [SourceField; 13] = [
        SourceField::LocalNames,
        SourceField::Range,
        SourceField::GrowthHabit,
        SourceField::Leaves,
        SourceField::Flowers,
        SourceField::Fruits,
        SourceField::Bark,
        SourceField::Twigs,
        SourceField::Buds,
        SourceField::HardinessHabitat,
        SourceField::Miscellaneous,
        SourceField::Url,
        SourceField::IsPreferred,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceField::LocalNames => "local_names",
            SourceField::Range => "range",
            SourceField::GrowthHabit => "growth_habit",
            SourceField::Leaves => "leaves",
            SourceField::Flowers => "flowers",
            SourceField::Fruits => "fruits",
            SourceField::Bark => "bark",
            SourceField::Twigs => "twigs",
            SourceField::Buds => "buds",
            SourceField::HardinessHabitat => "hardiness_habitat",
            SourceField::Miscellaneous => "miscellaneous",
            SourceField::Url => "url",
            SourceField::IsPreferred => "is_preferred",
        }
    }
}

impl fmt::Display for SourceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single field value, typed by the shape of its column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Flag(b) => write!(f, "{}", b),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::List(items) => f.write_str(&items.join(", ")),
        }
    }
}

/// Field values one source supplies for one species
///
/// `None` means the source has no value for that field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceFields {
    #[serde(default)]
    pub local_names: Option<Vec<String>>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub growth_habit: Option<String>,
    #[serde(default)]
    pub leaves: Option<String>,
    #[serde(default)]
    pub flowers: Option<String>,
    #[serde(default)]
    pub fruits: Option<String>,
    #[serde(default)]
    pub bark: Option<String>,
    #[serde(default)]
    pub twigs: Option<String>,
    #[serde(default)]
    pub buds: Option<String>,
    #[serde(default)]
    pub hardiness_habitat: Option<String>,
    #[serde(default)]
    pub miscellaneous: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub is_preferred: Option<bool>,
}

impl SourceFields {
    pub fn get(&self, field: SourceField) -> Option<FieldValue> {
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        match field {
            SourceField::LocalNames => self.local_names.clone().map(FieldValue::List),
            SourceField::Range => text(&self.range),
            SourceField::GrowthHabit => text(&self.growth_habit),
            SourceField::Leaves => text(&self.leaves),
            SourceField::Flowers => text(&self.flowers),
            SourceField::Fruits => text(&self.fruits),
            SourceField::Bark => text(&self.bark),
            SourceField::Twigs => text(&self.twigs),
            SourceField::Buds => text(&self.buds),
            SourceField::HardinessHabitat => text(&self.hardiness_habitat),
            SourceField::Miscellaneous => text(&self.miscellaneous),
            SourceField::Url => text(&self.url),
            SourceField::IsPreferred => self.is_preferred.map(FieldValue::Flag),
        }
    }

    /// Set one field, rejecting a value of the wrong shape
    pub fn set(&mut self, field: SourceField, value: Option<FieldValue>) -> Result<()> {
        let mismatch = |value: &FieldValue| {
            Error::InvalidInput(format!("value '{}' does not fit field {}", value, field))
        };

        match (field, value) {
            (SourceField::LocalNames, None) => self.local_names = None,
            (SourceField::LocalNames, Some(FieldValue::List(items))) => {
                self.local_names = Some(items)
            }
            (SourceField::LocalNames, Some(FieldValue::Text(s))) => {
                // Comma-separated input from a prompt
                self.local_names = Some(
                    s.split(',')
                        .map(|n| n.trim().to_string())
                        .filter(|n| !n.is_empty())
                        .collect(),
                )
            }
            (SourceField::IsPreferred, None) => self.is_preferred = None,
            (SourceField::IsPreferred, Some(FieldValue::Flag(b))) => self.is_preferred = Some(b),
            (SourceField::IsPreferred, Some(FieldValue::Text(s))) => {
                let flag = match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "1" => true,
                    "false" | "no" | "0" => false,
                    _ => return Err(mismatch(&FieldValue::Text(s))),
                };
                self.is_preferred = Some(flag);
            }
            (SourceField::LocalNames | SourceField::IsPreferred, Some(other)) => {
                return Err(mismatch(&other))
            }
            (text_field, value) => {
                let value = match value {
                    None => None,
                    Some(FieldValue::Text(s)) => Some(s),
                    Some(other) => return Err(mismatch(&other)),
                };
                if let Some(slot) = self.text_slot(text_field) {
                    *slot = value;
                }
            }
        }
        Ok(())
    }

    fn text_slot(&mut self, field: SourceField) -> Option<&mut Option<String>> {
        match field {
            SourceField::Range => Some(&mut self.range),
            SourceField::GrowthHabit => Some(&mut self.growth_habit),
            SourceField::Leaves => Some(&mut self.leaves),
            SourceField::Flowers => Some(&mut self.flowers),
            SourceField::Fruits => Some(&mut self.fruits),
            SourceField::Bark => Some(&mut self.bark),
            SourceField::Twigs => Some(&mut self.twigs),
            SourceField::Buds => Some(&mut self.buds),
            SourceField::HardinessHabitat => Some(&mut self.hardiness_habitat),
            SourceField::Miscellaneous => Some(&mut self.miscellaneous),
            SourceField::Url => Some(&mut self.url),
            SourceField::LocalNames | SourceField::IsPreferred => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        SourceField::ALL.iter().all(|f| self.get(*f).is_none())
    }
}

/// Source-attributed data for one (species, source) pair
///
/// The (species, source) pair is unique, so each field of the pair holds at
/// most one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesSource {
    pub scientific_name: String,
    pub source_id: i64,
    #[serde(flatten)]
    pub fields: SourceFields,
}

impl SpeciesSource {
    pub fn new(scientific_name: impl Into<String>, source_id: i64) -> Self {
        Self {
            scientific_name: scientific_name.into(),
            source_id,
            fields: SourceFields::default(),
        }
    }
}

/// Source-attributed record joined with its source's display name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributedRecord {
    pub source_name: String,
    #[serde(flatten)]
    pub record: SpeciesSource,
}

/// Species with every source's attributed data, preferred sources first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeciesWithSources {
    #[serde(flatten)]
    pub species: Species,
    pub sources: Vec<AttributedRecord>,
}

/// Row counts for a quick overview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CatalogStats {
    pub species: i64,
    pub hybrids: i64,
    pub sources: i64,
    pub attributed_records: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parents_deduplicates_same_species_in_both_slots() {
        let s = Species::hybrid("× bebbiana", Some("alba"), Some("alba"));
        let parents: Vec<String> = s.parents().into_iter().collect();
        assert_eq!(parents, vec!["alba".to_string()]);
    }

    #[test]
    fn test_parents_ignores_blank_slots() {
        let s = Species::hybrid("× x", Some("  "), None);
        assert!(s.parents().is_empty());
    }

    #[test]
    fn test_enum_parsing_rejects_unknown_values() {
        assert_eq!("Book".parse::<SourceType>().unwrap(), SourceType::Book);
        assert!("magazine".parse::<SourceType>().is_err());
        assert_eq!("vu".parse::<ConservationStatus>().unwrap(), ConservationStatus::VU);
        assert!(matches!(
            "rare".parse::<ConservationStatus>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_source_fields_get_set() {
        let mut fields = SourceFields::default();
        fields
            .set(SourceField::Leaves, Some(FieldValue::Text("lobed".into())))
            .unwrap();
        fields
            .set(SourceField::LocalNames, Some(FieldValue::Text("white oak, stave oak".into())))
            .unwrap();
        fields
            .set(SourceField::IsPreferred, Some(FieldValue::Text("yes".into())))
            .unwrap();

        assert_eq!(fields.get(SourceField::Leaves), Some(FieldValue::Text("lobed".into())));
        assert_eq!(
            fields.local_names,
            Some(vec!["white oak".to_string(), "stave oak".to_string()])
        );
        assert_eq!(fields.is_preferred, Some(true));
        assert!(fields.get(SourceField::Bark).is_none());

        let err = fields.set(SourceField::Bark, Some(FieldValue::Flag(true)));
        assert!(matches!(err, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_source_fields_deserialize_from_json() {
        let json = r#"{"leaves": "green", "local_names": ["white oak"], "is_preferred": true}"#;
        let fields: SourceFields = serde_json::from_str(json).unwrap();
        assert_eq!(fields.leaves.as_deref(), Some("green"));
        assert_eq!(fields.is_preferred, Some(true));
        assert!(!fields.is_empty());
        assert!(SourceFields::default().is_empty());
    }
}
