//! Read-only query paths for front ends
//!
//! Exact lookups live on [`RecordStore`] itself; this module adds substring
//! search, filtered listing, the joined species view and overview counts.
//! Nothing here writes.

use crate::db::models::{AttributedRecord, CatalogStats, Source, Species, SpeciesWithSources};
use crate::store::sources::load_source;
use crate::store::species::species_from_row;
use crate::store::species_sources::species_source_from_row;
use crate::store::RecordStore;
use crate::Result;
use sqlx::{QueryBuilder, Row, Sqlite};

/// Escape LIKE wildcards so user input matches literally (use with `ESCAPE '\'`)
pub fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn contains_pattern(query: &str) -> String {
    format!("%{}%", escape_like(query.trim()))
}

/// Taxonomic filter for species listings; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeciesFilter {
    pub subgenus: Option<String>,
    pub section: Option<String>,
    pub subsection: Option<String>,
    pub complex: Option<String>,
    pub hybrid: Option<bool>,
}

impl SpeciesFilter {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let mut sep = " WHERE ";
        for (column, value) in [
            ("subgenus", &self.subgenus),
            ("section", &self.section),
            ("subsection", &self.subsection),
            ("complex", &self.complex),
        ] {
            if let Some(value) = value {
                qb.push(sep).push(column).push(" = ").push_bind(value.clone());
                sep = " AND ";
            }
        }
        if let Some(hybrid) = self.hybrid {
            qb.push(sep).push("is_hybrid = ").push_bind(hybrid);
        }
    }
}

impl RecordStore {
    /// Case-insensitive substring search
    ///
    /// Matches scientific name, author, synonyms and any source's local names.
    /// List columns are matched item by item, never as raw JSON text.
    pub async fn search_species(&self, query: &str, limit: i64) -> Result<Vec<Species>> {
        let pattern = contains_pattern(query);
        let rows = sqlx::query(
            r#"
            SELECT * FROM species
            WHERE scientific_name LIKE ?1 ESCAPE '\'
               OR author LIKE ?1 ESCAPE '\'
               OR EXISTS (
                   SELECT 1 FROM json_each(species.synonyms)
                   WHERE value LIKE ?1 ESCAPE '\'
               )
               OR scientific_name IN (
                   SELECT ss.scientific_name
                   FROM species_sources ss, json_each(ss.local_names) names
                   WHERE names.value LIKE ?1 ESCAPE '\'
               )
            ORDER BY scientific_name
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(species_from_row).collect()
    }

    /// Substring search over source names and authors
    pub async fn search_sources(&self, query: &str) -> Result<Vec<Source>> {
        let pattern = contains_pattern(query);
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM sources
            WHERE name LIKE ?1 ESCAPE '\' OR author LIKE ?1 ESCAPE '\'
            ORDER BY id
            "#,
        )
        .bind(&pattern)
        .fetch_all(self.pool())
        .await?;

        let mut conn = self.pool().acquire().await?;
        let mut sources = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(source) = load_source(&mut conn, id).await? {
                sources.push(source);
            }
        }
        Ok(sources)
    }

    /// Page through species matching a taxonomic filter
    pub async fn list_species_filtered(
        &self,
        filter: &SpeciesFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Species>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM species");
        filter.push_where(&mut qb);
        qb.push(" ORDER BY scientific_name LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let rows = qb.build().fetch_all(self.pool()).await?;
        rows.iter().map(species_from_row).collect()
    }

    pub async fn count_species(&self, filter: &SpeciesFilter) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) AS n FROM species");
        filter.push_where(&mut qb);

        let row = qb.build().fetch_one(self.pool()).await?;
        Ok(row.try_get("n")?)
    }

    /// Species joined with every source's attributed data, preferred first
    pub async fn species_with_sources(&self, name: &str) -> Result<SpeciesWithSources> {
        let species = self.get_species(name).await?;

        let rows = sqlx::query(
            r#"
            SELECT ss.*, s.name AS source_name
            FROM species_sources ss
            JOIN sources s ON s.id = ss.source_id
            WHERE ss.scientific_name = ?
            ORDER BY ss.is_preferred DESC, ss.source_id
            "#,
        )
        .bind(name)
        .fetch_all(self.pool())
        .await?;

        let sources = rows
            .iter()
            .map(|row| {
                Ok(AttributedRecord {
                    source_name: row.try_get("source_name")?,
                    record: species_source_from_row(row)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SpeciesWithSources { species, sources })
    }

    pub async fn stats(&self) -> Result<CatalogStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM species WHERE is_hybrid = 0) AS species,
                (SELECT COUNT(*) FROM species WHERE is_hybrid = 1) AS hybrids,
                (SELECT COUNT(*) FROM sources) AS sources,
                (SELECT COUNT(*) FROM species_sources) AS attributed
            "#,
        )
        .fetch_one(self.pool())
        .await?;

        Ok(CatalogStats {
            species: row.try_get("species")?,
            hybrids: row.try_get("hybrids")?,
            sources: row.try_get("sources")?,
            attributed_records: row.try_get("attributed")?,
        })
    }
}
