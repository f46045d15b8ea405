//! Import batch documents
//!
//! A batch file is a JSON or YAML list of entries. Each entry carries the
//! species core fields and optionally a `source_data` block of values
//! attributed to the batch's source.

use crate::db::models::{SourceFields, Species};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;

/// Read a JSON or YAML document, choosing the format by extension
pub fn load_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "json" => Ok(serde_json::from_str(&text)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(&text)?),
        other => Err(Error::InvalidInput(format!(
            "unsupported document format '{}' (use .json, .yaml or .yml)",
            other
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ImportEntry {
    #[serde(flatten)]
    pub species: Species,
    #[serde(default)]
    pub source_data: Option<SourceFields>,
}

impl ImportEntry {
    pub fn new(species: Species) -> Self {
        Self {
            species,
            source_data: None,
        }
    }

    pub fn with_source_data(mut self, fields: SourceFields) -> Self {
        self.source_data = Some(fields);
        self
    }
}

/// Ordered entries, all attributed to one source at import time
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImportBatch {
    pub entries: Vec<ImportEntry>,
}

impl ImportBatch {
    pub fn new(entries: Vec<ImportEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(text)?))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(Self::new(serde_yaml::from_str(text)?))
    }

    /// Read a batch file, choosing the format by extension
    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(load_document(path)?))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ConservationStatus;

    #[test]
    fn test_yaml_batch() {
        let yaml = r#"
- scientific_name: alba
  author: L.
  conservation_status: LC
  synonyms: [Quercus alba var. repanda]
  source_data:
    leaves: lobed, glaucous beneath
    local_names: [white oak]
- scientific_name: × bebbiana
  is_hybrid: true
  parent1: alba
  parent2: macrocarpa
"#;
        let batch = ImportBatch::from_yaml_str(yaml).unwrap();
        assert_eq!(batch.len(), 2);

        let alba = &batch.entries[0];
        assert_eq!(alba.species.conservation_status, Some(ConservationStatus::LC));
        let data = alba.source_data.as_ref().unwrap();
        assert_eq!(data.leaves.as_deref(), Some("lobed, glaucous beneath"));
        assert_eq!(data.local_names, Some(vec!["white oak".to_string()]));

        let hybrid = &batch.entries[1];
        assert!(hybrid.species.is_hybrid);
        assert_eq!(hybrid.species.parent2.as_deref(), Some("macrocarpa"));
        assert!(hybrid.source_data.is_none());
    }

    #[test]
    fn test_json_batch_rejects_unknown_status() {
        let json = r#"[{"scientific_name": "alba", "conservation_status": "rare"}]"#;
        assert!(ImportBatch::from_json_str(json).is_err());
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.csv");
        std::fs::write(&path, "scientific_name\nalba\n").unwrap();

        let err = ImportBatch::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
