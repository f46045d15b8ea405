//! Taxonomic reference data
//!
//! Names and authorities for subgenera, sections, subsections and complexes.
//! The table is reference material only: species keep their taxonomy as
//! free text and nothing here constrains them.

use crate::merge::load_document;
use crate::store::RecordStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// Rank below the genus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxonLevel {
    Subgenus,
    Section,
    Subsection,
    Complex,
}

impl TaxonLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaxonLevel::Subgenus => "subgenus",
            TaxonLevel::Section => "section",
            TaxonLevel::Subsection => "subsection",
            TaxonLevel::Complex => "complex",
        }
    }

    /// Nesting depth below the genus, starting at 0
    pub fn depth(&self) -> usize {
        match self {
            TaxonLevel::Subgenus => 0,
            TaxonLevel::Section => 1,
            TaxonLevel::Subsection => 2,
            TaxonLevel::Complex => 3,
        }
    }
}

impl FromStr for TaxonLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "subgenus" => Ok(TaxonLevel::Subgenus),
            "section" => Ok(TaxonLevel::Section),
            "subsection" => Ok(TaxonLevel::Subsection),
            "complex" => Ok(TaxonLevel::Complex),
            other => Err(Error::Validation(format!("unknown taxon level '{}'", other))),
        }
    }
}

impl fmt::Display for TaxonLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonLink {
    pub label: String,
    pub url: String,
}

/// One reference entry, unique per (name, level)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxon {
    pub name: String,
    pub level: TaxonLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<TaxonLink>,
}

impl Taxon {
    pub fn new(name: impl Into<String>, level: TaxonLevel) -> Self {
        Self {
            name: name.into(),
            level,
            parent: None,
            author: None,
            notes: None,
            links: Vec::new(),
        }
    }
}

/// Entry as written in a taxa file, where the level comes from the enclosing list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaxonEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub links: Vec<TaxonLink>,
}

/// Taxa file: one list per level
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaxaFile {
    #[serde(default)]
    pub subgenera: Vec<TaxonEntry>,
    #[serde(default)]
    pub sections: Vec<TaxonEntry>,
    #[serde(default)]
    pub subsections: Vec<TaxonEntry>,
    #[serde(default)]
    pub complexes: Vec<TaxonEntry>,
}

impl TaxaFile {
    /// Read a JSON or YAML taxa file
    pub fn load(path: &Path) -> Result<Self> {
        load_document(path)
    }

    /// Entries in level order, blank names dropped
    pub fn taxa(&self) -> Vec<Taxon> {
        let lists = [
            (TaxonLevel::Subgenus, &self.subgenera),
            (TaxonLevel::Section, &self.sections),
            (TaxonLevel::Subsection, &self.subsections),
            (TaxonLevel::Complex, &self.complexes),
        ];
        lists
            .into_iter()
            .flat_map(|(level, entries)| {
                entries.iter().filter_map(move |entry| {
                    let name = entry.name.trim();
                    if name.is_empty() {
                        return None;
                    }
                    Some(Taxon {
                        name: name.to_string(),
                        level,
                        parent: blank_to_none(&entry.parent),
                        author: blank_to_none(&entry.author),
                        notes: blank_to_none(&entry.notes),
                        links: entry.links.clone(),
                    })
                })
            })
            .collect()
    }
}

fn blank_to_none(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Counts from one taxa import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaxaImportSummary {
    pub imported: usize,
    /// Entries whose (name, level) was already present
    pub skipped: usize,
}

fn taxon_from_row(row: &SqliteRow) -> Result<Taxon> {
    let level: String = row.try_get("level")?;
    let links: Option<String> = row.try_get("links")?;
    Ok(Taxon {
        name: row.try_get("name")?,
        level: level.parse()?,
        parent: row.try_get("parent")?,
        author: row.try_get("author")?,
        notes: row.try_get("notes")?,
        links: match links {
            Some(text) if !text.is_empty() => serde_json::from_str(&text)?,
            _ => Vec::new(),
        },
    })
}

/// Insert a taxon unless its (name, level) exists; returns whether a row was added
pub async fn insert_taxon_tx(conn: &mut SqliteConnection, taxon: &Taxon) -> Result<bool> {
    if taxon.name.trim().is_empty() {
        return Err(Error::Validation("taxon name must not be empty".to_string()));
    }
    let links = if taxon.links.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&taxon.links)?)
    };

    let result = sqlx::query(
        r#"
        INSERT INTO taxa (name, level, parent, author, notes, links)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(name, level) DO NOTHING
        "#,
    )
    .bind(taxon.name.trim())
    .bind(taxon.level.as_str())
    .bind(&taxon.parent)
    .bind(&taxon.author)
    .bind(&taxon.notes)
    .bind(links)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn load_taxon(
    conn: &mut SqliteConnection,
    name: &str,
    level: TaxonLevel,
) -> Result<Option<Taxon>> {
    let row = sqlx::query("SELECT * FROM taxa WHERE name = ? AND level = ?")
        .bind(name)
        .bind(level.as_str())
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(taxon_from_row).transpose()
}

impl RecordStore {
    /// Load a taxa file in one transaction, optionally replacing what is stored
    pub async fn import_taxa(&self, file: &TaxaFile, clear: bool) -> Result<TaxaImportSummary> {
        let mut tx = self.pool().begin().await?;
        if clear {
            let cleared = sqlx::query("DELETE FROM taxa").execute(&mut *tx).await?;
            debug!("Cleared {} taxa", cleared.rows_affected());
        }

        let mut summary = TaxaImportSummary::default();
        for taxon in file.taxa() {
            if insert_taxon_tx(&mut tx, &taxon).await? {
                summary.imported += 1;
            } else {
                debug!("Taxon {} '{}' already present", taxon.level, taxon.name);
                summary.skipped += 1;
            }
        }
        tx.commit().await?;

        info!(
            "Imported {} taxa ({} already present)",
            summary.imported, summary.skipped
        );
        Ok(summary)
    }

    pub async fn get_taxon(&self, name: &str, level: TaxonLevel) -> Result<Taxon> {
        let mut conn = self.pool().acquire().await?;
        load_taxon(&mut conn, name, level)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} '{}'", level, name)))
    }

    pub async fn taxon_exists(&self, name: &str, level: TaxonLevel) -> Result<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM taxa WHERE name = ? AND level = ?")
            .bind(name)
            .bind(level.as_str())
            .fetch_optional(self.pool())
            .await?;
        Ok(found.is_some())
    }

    /// All taxa, or those of one level, in rank then name order
    pub async fn list_taxa(&self, level: Option<TaxonLevel>) -> Result<Vec<Taxon>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM taxa
            WHERE ?1 IS NULL OR level = ?1
            ORDER BY CASE level
                WHEN 'subgenus' THEN 0
                WHEN 'section' THEN 1
                WHEN 'subsection' THEN 2
                ELSE 3
            END, name
            "#,
        )
        .bind(level.map(|l| l.as_str()))
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(taxon_from_row).collect()
    }

    /// Taxonomy values on `species` that have no reference entry
    ///
    /// Empty while no taxa are loaded at all.
    pub async fn unlisted_taxa(
        &self,
        species: &crate::Species,
    ) -> Result<Vec<(TaxonLevel, String)>> {
        let loaded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM taxa")
            .fetch_one(self.pool())
            .await?;
        if loaded == 0 {
            return Ok(Vec::new());
        }

        let slots = [
            (TaxonLevel::Subgenus, &species.subgenus),
            (TaxonLevel::Section, &species.section),
            (TaxonLevel::Subsection, &species.subsection),
            (TaxonLevel::Complex, &species.complex),
        ];
        let mut missing = Vec::new();
        for (level, value) in slots {
            if let Some(name) = value {
                if !self.taxon_exists(name, level).await? {
                    missing.push((level, name.clone()));
                }
            }
        }
        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TAXA_YAML: &str = r#"
subgenera:
  - name: Quercus
    author: L.
sections:
  - name: Lobatae
    parent: Quercus
    author: Loudon
    links:
      - label: Oaks of the World
        url: https://oaksoftheworld.fr
  - name: "  "
  - name: Quercus
    parent: Quercus
complexes:
  - name: Quercus robur complex
    parent: Quercus
"#;

    fn sample() -> TaxaFile {
        serde_yaml::from_str(TAXA_YAML).unwrap()
    }

    #[test]
    fn test_level_parse() {
        assert_eq!("Section".parse::<TaxonLevel>().unwrap(), TaxonLevel::Section);
        assert!("series".parse::<TaxonLevel>().is_err());
    }

    #[test]
    fn test_taxa_file_drops_blank_names() {
        let taxa = sample().taxa();
        let names: Vec<(TaxonLevel, &str)> =
            taxa.iter().map(|t| (t.level, t.name.as_str())).collect();
        assert_eq!(
            names,
            vec![
                (TaxonLevel::Subgenus, "Quercus"),
                (TaxonLevel::Section, "Lobatae"),
                (TaxonLevel::Section, "Quercus"),
                (TaxonLevel::Complex, "Quercus robur complex"),
            ]
        );
        assert_eq!(taxa[1].links[0].label, "Oaks of the World");
    }

    #[tokio::test]
    async fn test_same_name_on_two_levels_is_two_taxa() {
        let store = RecordStore::open_in_memory().await.unwrap();
        let summary = store.import_taxa(&sample(), false).await.unwrap();
        assert_eq!(summary, TaxaImportSummary { imported: 4, skipped: 0 });

        assert!(store.taxon_exists("Quercus", TaxonLevel::Subgenus).await.unwrap());
        assert!(store.taxon_exists("Quercus", TaxonLevel::Section).await.unwrap());
        assert!(!store.taxon_exists("Quercus", TaxonLevel::Subsection).await.unwrap());

        let lobatae = store.get_taxon("Lobatae", TaxonLevel::Section).await.unwrap();
        assert_eq!(lobatae.author.as_deref(), Some("Loudon"));
        assert_eq!(lobatae.links.len(), 1);
    }

    #[tokio::test]
    async fn test_reimport_skips_existing_unless_cleared() {
        let store = RecordStore::open_in_memory().await.unwrap();
        store.import_taxa(&sample(), false).await.unwrap();

        let again = store.import_taxa(&sample(), false).await.unwrap();
        assert_eq!(again, TaxaImportSummary { imported: 0, skipped: 4 });

        let smaller: TaxaFile = serde_yaml::from_str("subgenera:\n  - name: Cerris\n").unwrap();
        let cleared = store.import_taxa(&smaller, true).await.unwrap();
        assert_eq!(cleared, TaxaImportSummary { imported: 1, skipped: 0 });
        let all = store.list_taxa(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "Cerris");
    }

    #[tokio::test]
    async fn test_blank_taxon_name_is_rejected() {
        let store = RecordStore::open_in_memory().await.unwrap();
        let mut conn = store.pool().acquire().await.unwrap();
        let result = insert_taxon_tx(&mut conn, &Taxon::new("  ", TaxonLevel::Complex)).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(insert_taxon_tx(&mut conn, &Taxon::new("Cerris", TaxonLevel::Subgenus))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_list_taxa_orders_by_rank() {
        let store = RecordStore::open_in_memory().await.unwrap();
        store.import_taxa(&sample(), false).await.unwrap();

        let levels: Vec<TaxonLevel> = store
            .list_taxa(None)
            .await
            .unwrap()
            .iter()
            .map(|t| t.level)
            .collect();
        assert_eq!(
            levels,
            vec![
                TaxonLevel::Subgenus,
                TaxonLevel::Section,
                TaxonLevel::Section,
                TaxonLevel::Complex
            ]
        );

        let sections = store.list_taxa(Some(TaxonLevel::Section)).await.unwrap();
        let names: Vec<&str> = sections.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Lobatae", "Quercus"]);
    }

    #[tokio::test]
    async fn test_unlisted_taxa_only_once_reference_data_exists() {
        let store = RecordStore::open_in_memory().await.unwrap();
        let mut species = crate::Species::new("rubra");
        species.section = Some("Lobatae".to_string());
        species.subsection = Some("Coccineae".to_string());

        assert!(store.unlisted_taxa(&species).await.unwrap().is_empty());

        store.import_taxa(&sample(), false).await.unwrap();
        assert_eq!(
            store.unlisted_taxa(&species).await.unwrap(),
            vec![(TaxonLevel::Subsection, "Coccineae".to_string())]
        );
    }
}
