//! Boundary validation
//!
//! Everything entering the store passes through here first. Enumerated
//! values are already enforced by the model types; this pass covers the
//! structural rules the types cannot express.

use crate::db::models::{Source, Species, SpeciesSource};
use crate::{Error, Result};

/// Validate a species and normalize blank optional strings to `None`
///
/// Rejects an empty scientific name and a species naming itself as a parent.
pub fn validate_species(mut species: Species) -> Result<Species> {
    species.scientific_name = species.scientific_name.trim().to_string();
    if species.scientific_name.is_empty() {
        return Err(Error::Validation("scientific name must not be empty".to_string()));
    }

    for slot in [
        &mut species.author,
        &mut species.subgenus,
        &mut species.section,
        &mut species.subsection,
        &mut species.complex,
        &mut species.parent1,
        &mut species.parent2,
    ] {
        normalize_blank(slot);
    }

    for parent in [&species.parent1, &species.parent2].into_iter().flatten() {
        if *parent == species.scientific_name {
            return Err(Error::Validation(format!(
                "'{}' cannot be its own parent",
                species.scientific_name
            )));
        }
    }

    for list in [
        &mut species.synonyms,
        &mut species.closely_related_to,
        &mut species.subspecies_varieties,
    ] {
        list.retain(|item| !item.trim().is_empty());
    }

    Ok(species)
}

/// Validate a source before it is registered or updated
pub fn validate_source(source: &Source) -> Result<()> {
    if source.name.trim().is_empty() {
        return Err(Error::Validation("source name must not be empty".to_string()));
    }
    if let Some(year) = source.year {
        if !(1000..=9999).contains(&year) {
            return Err(Error::Validation(format!("implausible publication year {}", year)));
        }
    }
    Ok(())
}

/// Validate a source-attributed record
pub fn validate_species_source(record: &SpeciesSource) -> Result<()> {
    if record.scientific_name.trim().is_empty() {
        return Err(Error::Validation("scientific name must not be empty".to_string()));
    }
    Ok(())
}

fn normalize_blank(value: &mut Option<String>) {
    if let Some(s) = value {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            *value = None;
        } else if trimmed.len() != s.len() {
            *value = Some(trimmed.to_string());
        }
    }
}
