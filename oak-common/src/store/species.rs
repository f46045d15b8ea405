//! Species rows
//!
//! Plain row access. Writes that touch parent slots must go through
//! [`crate::hybrids`] so parents' `hybrids` lists stay in step.

use super::RecordStore;
use crate::db::models::{ConservationStatus, Species};
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

fn decode_list(row: &SqliteRow, column: &str) -> Result<Vec<String>> {
    let text: Option<String> = row.try_get(column)?;
    match text {
        Some(text) if !text.is_empty() => Ok(serde_json::from_str(&text)?),
        _ => Ok(Vec::new()),
    }
}

pub(crate) fn species_from_row(row: &SqliteRow) -> Result<Species> {
    let status: Option<String> = row.try_get("conservation_status")?;
    Ok(Species {
        scientific_name: row.try_get("scientific_name")?,
        author: row.try_get("author")?,
        is_hybrid: row.try_get("is_hybrid")?,
        conservation_status: status
            .as_deref()
            .map(str::parse::<ConservationStatus>)
            .transpose()?,
        subgenus: row.try_get("subgenus")?,
        section: row.try_get("section")?,
        subsection: row.try_get("subsection")?,
        complex: row.try_get("complex")?,
        parent1: row.try_get("parent1")?,
        parent2: row.try_get("parent2")?,
        hybrids: decode_list(row, "hybrids")?,
        closely_related_to: decode_list(row, "closely_related_to")?,
        subspecies_varieties: decode_list(row, "subspecies_varieties")?,
        synonyms: decode_list(row, "synonyms")?,
    })
}

/// Load a species by scientific name
pub async fn load_species(conn: &mut SqliteConnection, name: &str) -> Result<Option<Species>> {
    let row = sqlx::query("SELECT * FROM species WHERE scientific_name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(species_from_row).transpose()
}

/// Upsert the full species row, `hybrids` included, exactly as given
pub(crate) async fn write_species_row(conn: &mut SqliteConnection, species: &Species) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO species (
            scientific_name, author, is_hybrid, conservation_status,
            subgenus, section, subsection, complex, parent1, parent2,
            hybrids, closely_related_to, subspecies_varieties, synonyms
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(scientific_name) DO UPDATE SET
            author = excluded.author,
            is_hybrid = excluded.is_hybrid,
            conservation_status = excluded.conservation_status,
            subgenus = excluded.subgenus,
            section = excluded.section,
            subsection = excluded.subsection,
            complex = excluded.complex,
            parent1 = excluded.parent1,
            parent2 = excluded.parent2,
            hybrids = excluded.hybrids,
            closely_related_to = excluded.closely_related_to,
            subspecies_varieties = excluded.subspecies_varieties,
            synonyms = excluded.synonyms
        "#,
    )
    .bind(&species.scientific_name)
    .bind(&species.author)
    .bind(species.is_hybrid)
    .bind(species.conservation_status.map(|s| s.as_str()))
    .bind(&species.subgenus)
    .bind(&species.section)
    .bind(&species.subsection)
    .bind(&species.complex)
    .bind(&species.parent1)
    .bind(&species.parent2)
    .bind(serde_json::to_string(&species.hybrids)?)
    .bind(serde_json::to_string(&species.closely_related_to)?)
    .bind(serde_json::to_string(&species.subspecies_varieties)?)
    .bind(serde_json::to_string(&species.synonyms)?)
    .execute(&mut *conn)
    .await?;

    debug!(species = %species.scientific_name, "Wrote species row");
    Ok(())
}

/// Read only the stored `hybrids` list; `None` when the species has no row
pub(crate) async fn load_hybrids(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Vec<String>>> {
    let text: Option<String> =
        sqlx::query_scalar("SELECT hybrids FROM species WHERE scientific_name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;

    text.map(|t| serde_json::from_str::<Vec<String>>(&t).map_err(Error::from))
        .transpose()
}

pub(crate) async fn store_hybrids(
    conn: &mut SqliteConnection,
    name: &str,
    hybrids: &[String],
) -> Result<()> {
    sqlx::query("UPDATE species SET hybrids = ? WHERE scientific_name = ?")
        .bind(serde_json::to_string(hybrids)?)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Names of species whose parent1 or parent2 is `name`, sorted
pub async fn referencing_hybrids(conn: &mut SqliteConnection, name: &str) -> Result<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT scientific_name FROM species
        WHERE parent1 = ? OR parent2 = ?
        ORDER BY scientific_name
        "#,
    )
    .bind(name)
    .bind(name)
    .fetch_all(&mut *conn)
    .await?;

    Ok(names)
}

/// Delete the species row and its source-attributed data
pub(crate) async fn delete_species_row(conn: &mut SqliteConnection, name: &str) -> Result<u64> {
    let attributed = sqlx::query("DELETE FROM species_sources WHERE scientific_name = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let result = sqlx::query("DELETE FROM species WHERE scientific_name = ?")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    debug!(species = %name, attributed_rows = attributed, "Deleted species row");
    Ok(result.rows_affected())
}

impl RecordStore {
    pub async fn get_species(&self, name: &str) -> Result<Species> {
        let mut conn = self.pool().acquire().await?;
        load_species(&mut conn, name)
            .await?
            .ok_or_else(|| Error::NotFound(format!("species '{}'", name)))
    }

    pub async fn species_exists(&self, name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM species WHERE scientific_name = ?)",
        )
        .bind(name)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    /// All species ordered by name
    pub async fn list_species(&self) -> Result<Vec<Species>> {
        let rows = sqlx::query("SELECT * FROM species ORDER BY scientific_name")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(species_from_row).collect()
    }

    /// Species currently naming `name` as a parent
    pub async fn hybrids_referencing(&self, name: &str) -> Result<Vec<String>> {
        let mut conn = self.pool().acquire().await?;
        referencing_hybrids(&mut conn, name).await
    }
}
