//! Per-field classification of incoming import values
//!
//! Every supplied value is compared against what the store holds for the
//! same species (core fields) or the same (species, import source) pair
//! (attributed fields). Values held under other sources are never looked at,
//! so they can never conflict.

use crate::db::models::{
    ConservationStatus, FieldValue, SourceField, SourceFields, Species, SpeciesSource,
};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;

/// How an incoming value relates to the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Nothing stored; applied automatically
    New,
    /// Identical value stored; no-op
    Redundant,
    /// Different value stored; needs a resolution
    Conflicting,
}

pub fn classify(existing: Option<&FieldValue>, incoming: &FieldValue) -> Classification {
    match existing {
        None => Classification::New,
        Some(stored) if stored == incoming => Classification::Redundant,
        Some(_) => Classification::Conflicting,
    }
}

/// Single-valued core field of a species
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeciesField {
    Author,
    ConservationStatus,
    Subgenus,
    Section,
    Subsection,
    Complex,
    Parent1,
    Parent2,
}

impl SpeciesField {
    pub const ALL: [SpeciesField; 8] = [
        SpeciesField::Author,
        SpeciesField::ConservationStatus,
        SpeciesField::Subgenus,
        SpeciesField::Section,
        SpeciesField::Subsection,
        SpeciesField::Complex,
        SpeciesField::Parent1,
        SpeciesField::Parent2,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SpeciesField::Author => "author",
            SpeciesField::ConservationStatus => "conservation_status",
            SpeciesField::Subgenus => "subgenus",
            SpeciesField::Section => "section",
            SpeciesField::Subsection => "subsection",
            SpeciesField::Complex => "complex",
            SpeciesField::Parent1 => "parent1",
            SpeciesField::Parent2 => "parent2",
        }
    }

    fn slot<'a>(&self, species: &'a mut Species) -> Option<&'a mut Option<String>> {
        match self {
            SpeciesField::Author => Some(&mut species.author),
            SpeciesField::Subgenus => Some(&mut species.subgenus),
            SpeciesField::Section => Some(&mut species.section),
            SpeciesField::Subsection => Some(&mut species.subsection),
            SpeciesField::Complex => Some(&mut species.complex),
            SpeciesField::Parent1 => Some(&mut species.parent1),
            SpeciesField::Parent2 => Some(&mut species.parent2),
            SpeciesField::ConservationStatus => None,
        }
    }

    pub fn get(&self, species: &Species) -> Option<FieldValue> {
        let text = |v: &Option<String>| v.clone().map(FieldValue::Text);
        match self {
            SpeciesField::Author => text(&species.author),
            SpeciesField::ConservationStatus => species
                .conservation_status
                .map(|s| FieldValue::Text(s.as_str().to_string())),
            SpeciesField::Subgenus => text(&species.subgenus),
            SpeciesField::Section => text(&species.section),
            SpeciesField::Subsection => text(&species.subsection),
            SpeciesField::Complex => text(&species.complex),
            SpeciesField::Parent1 => text(&species.parent1),
            SpeciesField::Parent2 => text(&species.parent2),
        }
    }

    pub fn set(&self, species: &mut Species, value: Option<FieldValue>) -> Result<()> {
        let text = match value {
            None => None,
            Some(FieldValue::Text(s)) => Some(s),
            Some(other) => {
                return Err(Error::InvalidInput(format!(
                    "value '{}' does not fit field {}",
                    other, self
                )))
            }
        };

        match self.slot(species) {
            Some(slot) => *slot = text,
            None => {
                species.conservation_status =
                    text.as_deref().map(str::parse::<ConservationStatus>).transpose()?
            }
        }
        Ok(())
    }
}

impl fmt::Display for SpeciesField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any field the merger classifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MergeField {
    Species(SpeciesField),
    Attributed(SourceField),
}

impl fmt::Display for MergeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeField::Species(field) => write!(f, "{}", field),
            MergeField::Attributed(field) => write!(f, "{}", field),
        }
    }
}

/// One supplied value and how it compares to storage
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: MergeField,
    pub existing: Option<FieldValue>,
    pub incoming: FieldValue,
    pub classification: Classification,
}

/// Classify every supplied core field of `incoming` against `existing`
pub fn classify_species(existing: &Species, incoming: &Species) -> Vec<FieldChange> {
    SpeciesField::ALL
        .iter()
        .filter_map(|field| {
            let incoming_value = field.get(incoming)?;
            let existing_value = field.get(existing);
            Some(FieldChange {
                field: MergeField::Species(*field),
                classification: classify(existing_value.as_ref(), &incoming_value),
                existing: existing_value,
                incoming: incoming_value,
            })
        })
        .collect()
}

/// Classify every supplied attributed field against the import source's stored record
pub fn classify_attributed(
    existing: Option<&SpeciesSource>,
    incoming: &SourceFields,
) -> Vec<FieldChange> {
    SourceField::ALL
        .iter()
        .filter_map(|field| {
            let incoming_value = incoming.get(*field)?;
            let existing_value = existing.and_then(|record| record.fields.get(*field));
            Some(FieldChange {
                field: MergeField::Attributed(*field),
                classification: classify(existing_value.as_ref(), &incoming_value),
                existing: existing_value,
                incoming: incoming_value,
            })
        })
        .collect()
}

/// Append items not already present, preserving stored order
///
/// Returns true when anything was added.
pub fn union_into(stored: &mut Vec<String>, incoming: &[String]) -> bool {
    let before = stored.len();
    for item in incoming {
        if !stored.contains(item) {
            stored.push(item.clone());
        }
    }
    stored.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn test_classify_states() {
        assert_eq!(classify(None, &text("green")), Classification::New);
        assert_eq!(classify(Some(&text("green")), &text("green")), Classification::Redundant);
        assert_eq!(
            classify(Some(&text("green")), &text("dark green")),
            Classification::Conflicting
        );
    }

    #[test]
    fn test_unsupplied_fields_are_not_classified() {
        let mut existing = Species::new("alba");
        existing.author = Some("L.".to_string());
        existing.section = Some("Quercus".to_string());

        let mut incoming = Species::new("alba");
        incoming.author = Some("L.".to_string());
        incoming.subgenus = Some("Quercus".to_string());

        let changes = classify_species(&existing, &incoming);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, MergeField::Species(SpeciesField::Author));
        assert_eq!(changes[0].classification, Classification::Redundant);
        assert_eq!(changes[1].field, MergeField::Species(SpeciesField::Subgenus));
        assert_eq!(changes[1].classification, Classification::New);
    }

    #[test]
    fn test_attributed_without_stored_record_is_all_new() {
        let incoming = SourceFields {
            leaves: Some("lobed".to_string()),
            is_preferred: Some(false),
            ..Default::default()
        };
        let changes = classify_attributed(None, &incoming);
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|c| c.classification == Classification::New));
    }

    #[test]
    fn test_species_field_set_parses_conservation_status() {
        let mut species = Species::new("alba");
        SpeciesField::ConservationStatus
            .set(&mut species, Some(text("EN")))
            .unwrap();
        assert_eq!(species.conservation_status, Some(ConservationStatus::EN));

        let err = SpeciesField::ConservationStatus.set(&mut species, Some(text("rare")));
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn test_union_into_preserves_order() {
        let mut stored = vec!["b".to_string(), "a".to_string()];
        assert!(union_into(&mut stored, &["a".to_string(), "c".to_string()]));
        assert_eq!(stored, vec!["b", "a", "c"]);
        assert!(!union_into(&mut stored, &["c".to_string()]));
    }
}
