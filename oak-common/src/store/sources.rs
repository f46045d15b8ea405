//! Source (provenance) records

use super::RecordStore;
use crate::db::models::{Source, SourceType};
use crate::validate::validate_source;
use crate::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::{debug, info};

pub(crate) fn source_from_row(row: &SqliteRow) -> Result<Source> {
    let source_type: String = row.try_get("source_type")?;
    Ok(Source {
        id: Some(row.try_get("id")?),
        source_type: source_type.parse::<SourceType>()?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        author: row.try_get("author")?,
        year: row.try_get("year")?,
        url: row.try_get("url")?,
        isbn: row.try_get("isbn")?,
        doi: row.try_get("doi")?,
        notes: row.try_get("notes")?,
        license: row.try_get("license")?,
        license_url: row.try_get("license_url")?,
    })
}

/// Load a source by id
pub async fn load_source(conn: &mut SqliteConnection, id: i64) -> Result<Option<Source>> {
    let row = sqlx::query("SELECT * FROM sources WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(source_from_row).transpose()
}

/// Insert a new source, returning it with its assigned id
///
/// Any id already present on `source` is ignored.
pub async fn insert_source_tx(conn: &mut SqliteConnection, source: &Source) -> Result<Source> {
    validate_source(source)?;

    let result = sqlx::query(
        r#"
        INSERT INTO sources (
            source_type, name, description, author, year, url,
            isbn, doi, notes, license, license_url
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(source.source_type.as_str())
    .bind(&source.name)
    .bind(&source.description)
    .bind(&source.author)
    .bind(source.year)
    .bind(&source.url)
    .bind(&source.isbn)
    .bind(&source.doi)
    .bind(&source.notes)
    .bind(&source.license)
    .bind(&source.license_url)
    .execute(&mut *conn)
    .await?;

    let id = result.last_insert_rowid();
    debug!(source_id = id, name = %source.name, "Registered source");

    Ok(Source {
        id: Some(id),
        ..source.clone()
    })
}

/// Update every mutable field of an existing source
pub async fn update_source_tx(conn: &mut SqliteConnection, source: &Source) -> Result<Source> {
    validate_source(source)?;
    let id = source
        .id
        .ok_or_else(|| Error::InvalidInput("source update requires an id".to_string()))?;

    let result = sqlx::query(
        r#"
        UPDATE sources SET
            source_type = ?, name = ?, description = ?, author = ?, year = ?,
            url = ?, isbn = ?, doi = ?, notes = ?, license = ?, license_url = ?
        WHERE id = ?
        "#,
    )
    .bind(source.source_type.as_str())
    .bind(&source.name)
    .bind(&source.description)
    .bind(&source.author)
    .bind(source.year)
    .bind(&source.url)
    .bind(&source.isbn)
    .bind(&source.doi)
    .bind(&source.notes)
    .bind(&source.license)
    .bind(&source.license_url)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("source {}", id)));
    }

    Ok(source.clone())
}

/// Delete a source that no species data references
pub async fn delete_source_tx(conn: &mut SqliteConnection, id: i64) -> Result<()> {
    let dependents: Vec<String> = sqlx::query_scalar(
        "SELECT scientific_name FROM species_sources WHERE source_id = ? ORDER BY scientific_name",
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    if !dependents.is_empty() {
        return Err(Error::ReferentialConflict {
            entity: "source",
            key: id.to_string(),
            dependents,
        });
    }

    let result = sqlx::query("DELETE FROM sources WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("source {}", id)));
    }

    Ok(())
}

impl RecordStore {
    /// Register a new source; the store assigns its id
    pub async fn create_source(&self, source: &Source) -> Result<Source> {
        let mut tx = self.pool().begin().await?;
        let created = insert_source_tx(&mut tx, source).await?;
        tx.commit().await?;

        info!("Created source {}: {}", created.id.unwrap_or_default(), created.name);
        Ok(created)
    }

    /// Upsert: sources without an id are created, others updated in place
    pub async fn save_source(&self, source: &Source) -> Result<Source> {
        if source.id.is_none() {
            return self.create_source(source).await;
        }

        let mut tx = self.pool().begin().await?;
        let saved = update_source_tx(&mut tx, source).await?;
        tx.commit().await?;
        Ok(saved)
    }

    pub async fn get_source(&self, id: i64) -> Result<Source> {
        let mut conn = self.pool().acquire().await?;
        load_source(&mut conn, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("source {}", id)))
    }

    pub async fn list_sources(&self) -> Result<Vec<Source>> {
        let rows = sqlx::query("SELECT * FROM sources ORDER BY id")
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(source_from_row).collect()
    }

    /// Delete a source; blocked with `ReferentialConflict` while referenced
    pub async fn delete_source(&self, id: i64) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        delete_source_tx(&mut tx, id).await?;
        tx.commit().await?;

        info!("Deleted source {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source() -> Source {
        let mut source = Source::new(SourceType::Book, "Oaks of the World");
        source.author = Some("Le Hardÿ de Beaulieu".to_string());
        source.year = Some(2009);
        source
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_round_trips() {
        let store = RecordStore::open_in_memory().await.unwrap();

        let created = store.create_source(&sample_source()).await.unwrap();
        let id = created.id.expect("id assigned");

        let loaded = store.get_source(id).await.unwrap();
        assert_eq!(loaded, created);
        assert_eq!(loaded.source_type, SourceType::Book);
    }

    #[tokio::test]
    async fn test_save_updates_existing_and_rejects_unknown_id() {
        let store = RecordStore::open_in_memory().await.unwrap();
        let mut source = store.create_source(&sample_source()).await.unwrap();

        source.license = Some("CC BY 4.0".to_string());
        store.save_source(&source).await.unwrap();
        let loaded = store.get_source(source.id.unwrap()).await.unwrap();
        assert_eq!(loaded.license.as_deref(), Some("CC BY 4.0"));

        source.id = Some(999);
        let err = store.save_source(&source).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_source_is_not_found() {
        let store = RecordStore::open_in_memory().await.unwrap();
        let err = store.delete_source(42).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
