//! Whole-catalog export
//!
//! A self-contained snapshot for publishing: every source, and every species
//! with its taxonomy nested and its attributed data inlined under the
//! source's name and license. Empty values are left out.

use crate::db::models::{ConservationStatus, Source, Species, SpeciesSource};
use crate::store::sources::source_from_row;
use crate::store::species::species_from_row;
use crate::store::species_sources::species_source_from_row;
use crate::store::RecordStore;
use crate::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

pub const GENUS: &str = "Quercus";

#[derive(Debug, Clone, Serialize)]
pub struct CatalogExport {
    pub metadata: ExportMetadata,
    pub sources: Vec<Source>,
    pub species: Vec<ExportedSpecies>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    /// Export timestamp at second precision, doubles as the data version
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub species_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedTaxonomy {
    pub genus: String,
    pub subgenus: Option<String>,
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subsection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complex: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedSpecies {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub is_hybrid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conservation_status: Option<ConservationStatus>,
    pub taxonomy: ExportedTaxonomy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent2: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hybrids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub closely_related_to: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subspecies_varieties: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<ExportedSourceData>,
}

/// One source's data for a species, labelled with the source itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedSourceData {
    pub source_id: i64,
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license_url: Option<String>,
    pub is_preferred: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub local_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub growth_habit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaves: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flowers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fruits: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bark: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twigs: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buds: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardiness_habitat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub miscellaneous: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ExportedSourceData {
    fn new(record: SpeciesSource, source: Option<&Source>) -> Self {
        let fields = record.fields;
        Self {
            source_id: record.source_id,
            source_name: source.map(|s| s.name.clone()).unwrap_or_default(),
            source_url: source.and_then(|s| s.url.clone()),
            license: source.and_then(|s| s.license.clone()),
            license_url: source.and_then(|s| s.license_url.clone()),
            is_preferred: fields.is_preferred.unwrap_or(false),
            local_names: fields.local_names.unwrap_or_default(),
            range: fields.range,
            growth_habit: fields.growth_habit,
            leaves: fields.leaves,
            flowers: fields.flowers,
            fruits: fields.fruits,
            bark: fields.bark,
            twigs: fields.twigs,
            buds: fields.buds,
            hardiness_habitat: fields.hardiness_habitat,
            miscellaneous: fields.miscellaneous,
            url: fields.url,
        }
    }
}

impl ExportedSpecies {
    fn new(species: Species, sources: Vec<ExportedSourceData>) -> Self {
        Self {
            name: species.scientific_name,
            author: species.author,
            is_hybrid: species.is_hybrid,
            conservation_status: species.conservation_status,
            taxonomy: ExportedTaxonomy {
                genus: GENUS.to_string(),
                subgenus: species.subgenus,
                section: species.section,
                subsection: species.subsection,
                complex: species.complex,
            },
            parent1: species.parent1,
            parent2: species.parent2,
            hybrids: species.hybrids,
            closely_related_to: species.closely_related_to,
            subspecies_varieties: species.subspecies_varieties,
            synonyms: species.synonyms,
            sources,
        }
    }
}

impl RecordStore {
    /// Snapshot the whole catalog; all reads share one transaction
    pub async fn export_catalog(&self) -> Result<CatalogExport> {
        let mut tx = self.pool().begin().await?;

        let sources = sqlx::query("SELECT * FROM sources ORDER BY id")
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(source_from_row)
            .collect::<Result<Vec<_>>>()?;

        let species = sqlx::query("SELECT * FROM species ORDER BY scientific_name")
            .fetch_all(&mut *tx)
            .await?
            .iter()
            .map(species_from_row)
            .collect::<Result<Vec<_>>>()?;

        let records = sqlx::query(
            "SELECT * FROM species_sources ORDER BY scientific_name, is_preferred DESC, source_id",
        )
        .fetch_all(&mut *tx)
        .await?
        .iter()
        .map(species_source_from_row)
        .collect::<Result<Vec<_>>>()?;

        tx.commit().await?;

        let by_id: HashMap<i64, &Source> = sources
            .iter()
            .filter_map(|s| s.id.map(|id| (id, s)))
            .collect();
        let mut attributed: BTreeMap<String, Vec<ExportedSourceData>> = BTreeMap::new();
        for record in records {
            let source = by_id.get(&record.source_id).copied();
            attributed
                .entry(record.scientific_name.clone())
                .or_default()
                .push(ExportedSourceData::new(record, source));
        }

        let species: Vec<ExportedSpecies> = species
            .into_iter()
            .map(|s| {
                let data = attributed.remove(&s.scientific_name).unwrap_or_default();
                ExportedSpecies::new(s, data)
            })
            .collect();

        let now = Utc::now();
        info!(
            "Exported {} species and {} sources",
            species.len(),
            sources.len()
        );
        Ok(CatalogExport {
            metadata: ExportMetadata {
                version: now.to_rfc3339_opts(SecondsFormat::Secs, true),
                exported_at: now,
                species_count: species.len(),
            },
            sources,
            species,
        })
    }
}
