//! Source-attributed species data
//!
//! One row per (species, source) pair, one column per descriptive field, so
//! a (species, source, field) triple can never hold two values.

use super::RecordStore;
use crate::db::models::{SourceFields, SpeciesSource};
use crate::validate::validate_species_source;
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info};

pub(crate) fn species_source_from_row(row: &SqliteRow) -> Result<SpeciesSource> {
    let local_names: Option<String> = row.try_get("local_names")?;
    Ok(SpeciesSource {
        scientific_name: row.try_get("scientific_name")?,
        source_id: row.try_get("source_id")?,
        fields: SourceFields {
            local_names: local_names
                .as_deref()
                .map(serde_json::from_str::<Vec<String>>)
                .transpose()?,
            range: row.try_get("range")?,
            growth_habit: row.try_get("growth_habit")?,
            leaves: row.try_get("leaves")?,
            flowers: row.try_get("flowers")?,
            fruits: row.try_get("fruits")?,
            bark: row.try_get("bark")?,
            twigs: row.try_get("twigs")?,
            buds: row.try_get("buds")?,
            hardiness_habitat: row.try_get("hardiness_habitat")?,
            miscellaneous: row.try_get("miscellaneous")?,
            url: row.try_get("url")?,
            is_preferred: row.try_get("is_preferred")?,
        },
    })
}

/// Load the record one source holds for one species
pub async fn load_species_source(
    conn: &mut SqliteConnection,
    name: &str,
    source_id: i64,
) -> Result<Option<SpeciesSource>> {
    let row = sqlx::query("SELECT * FROM species_sources WHERE scientific_name = ? AND source_id = ?")
        .bind(name)
        .bind(source_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(species_source_from_row).transpose()
}

/// Upsert on the (species, source) pair, replacing every field
///
/// Both the species and the source must already exist.
pub async fn upsert_species_source_tx(
    conn: &mut SqliteConnection,
    record: &SpeciesSource,
) -> Result<()> {
    validate_species_source(record)?;

    let species_exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM species WHERE scientific_name = ?)")
            .bind(&record.scientific_name)
            .fetch_one(&mut *conn)
            .await?;
    if !species_exists {
        return Err(Error::NotFound(format!("species '{}'", record.scientific_name)));
    }

    let source_exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM sources WHERE id = ?)")
        .bind(record.source_id)
        .fetch_one(&mut *conn)
        .await?;
    if !source_exists {
        return Err(Error::NotFound(format!("source {}", record.source_id)));
    }

    let f = &record.fields;
    let local_names = f.local_names.as_ref().map(serde_json::to_string).transpose()?;

    sqlx::query(
        r#"
        INSERT INTO species_sources (
            scientific_name, source_id, local_names, range, growth_habit,
            leaves, flowers, fruits, bark, twigs, buds,
            hardiness_habitat, miscellaneous, url, is_preferred
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(scientific_name, source_id) DO UPDATE SET
            local_names = excluded.local_names,
            range = excluded.range,
            growth_habit = excluded.growth_habit,
            leaves = excluded.leaves,
            flowers = excluded.flowers,
            fruits = excluded.fruits,
            bark = excluded.bark,
            twigs = excluded.twigs,
            buds = excluded.buds,
            hardiness_habitat = excluded.hardiness_habitat,
            miscellaneous = excluded.miscellaneous,
            url = excluded.url,
            is_preferred = excluded.is_preferred
        "#,
    )
    .bind(&record.scientific_name)
    .bind(record.source_id)
    .bind(local_names)
    .bind(&f.range)
    .bind(&f.growth_habit)
    .bind(&f.leaves)
    .bind(&f.flowers)
    .bind(&f.fruits)
    .bind(&f.bark)
    .bind(&f.twigs)
    .bind(&f.buds)
    .bind(&f.hardiness_habitat)
    .bind(&f.miscellaneous)
    .bind(&f.url)
    .bind(f.is_preferred)
    .execute(&mut *conn)
    .await?;

    debug!(
        species = %record.scientific_name,
        source_id = record.source_id,
        "Wrote source-attributed record"
    );
    Ok(())
}

pub async fn delete_species_source_tx(
    conn: &mut SqliteConnection,
    name: &str,
    source_id: i64,
) -> Result<()> {
    let result = sqlx::query("DELETE FROM species_sources WHERE scientific_name = ? AND source_id = ?")
        .bind(name)
        .bind(source_id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!(
            "source {} data for species '{}'",
            source_id, name
        )));
    }
    Ok(())
}

impl RecordStore {
    pub async fn get_species_source(&self, name: &str, source_id: i64) -> Result<SpeciesSource> {
        let mut conn = self.pool().acquire().await?;
        load_species_source(&mut conn, name, source_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("source {} data for species '{}'", source_id, name))
            })
    }

    /// Every source's record for a species, preferred first
    pub async fn list_species_sources(&self, name: &str) -> Result<Vec<SpeciesSource>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM species_sources
            WHERE scientific_name = ?
            ORDER BY is_preferred DESC, source_id
            "#,
        )
        .bind(name)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(species_source_from_row).collect()
    }

    pub async fn save_species_source(&self, record: &SpeciesSource) -> Result<SpeciesSource> {
        let mut tx = self.pool().begin().await?;
        upsert_species_source_tx(&mut tx, record).await?;
        tx.commit().await?;
        Ok(record.clone())
    }

    pub async fn delete_species_source(&self, name: &str, source_id: i64) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        delete_species_source_tx(&mut tx, name, source_id).await?;
        tx.commit().await?;

        info!("Deleted source {} data for '{}'", source_id, name);
        Ok(())
    }
}
