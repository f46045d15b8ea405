//! Database schema migrations
//!
//! Versioned, idempotent upgrades for databases created by older releases.
//! Fresh databases are created with the current schema by
//! [`create_tables`](crate::db::init::create_tables), so each migration first
//! checks whether its change is already present.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - users upgrading from any older file rely on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Prefer ALTER TABLE** over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

async fn has_column(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
            .bind(table)
            .bind(column)
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Migration v1: licensing columns on sources
///
/// Early databases recorded bibliographic data only.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: Add license columns to sources");

    for column in ["license", "license_url"] {
        if has_column(pool, "sources", column).await? {
            info!("  {} column already exists - skipping", column);
            continue;
        }
        sqlx::query(&format!("ALTER TABLE sources ADD COLUMN {} TEXT", column))
            .execute(pool)
            .await?;
        info!("  ✓ Added {} column to sources table", column);
    }

    Ok(())
}

/// Migration v2: split the combined bark/twigs/buds description
///
/// Legacy rows kept one free-text `bark_twigs_buds` column. Its text moves to
/// `bark`; twigs and buds start empty.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: Split bark_twigs_buds on species_sources");

    if !has_column(pool, "species_sources", "bark_twigs_buds").await? {
        info!("  bark_twigs_buds column not present - skipping");
        return Ok(());
    }

    let mut tx = pool.begin().await?;

    for column in ["bark", "twigs", "buds"] {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('species_sources') WHERE name = ?",
        )
        .bind(column)
        .fetch_one(&mut *tx)
        .await?;

        if count == 0 {
            sqlx::query(&format!("ALTER TABLE species_sources ADD COLUMN {} TEXT", column))
                .execute(&mut *tx)
                .await?;
        }
    }

    let moved = sqlx::query(
        r#"
        UPDATE species_sources
        SET bark = bark_twigs_buds
        WHERE bark IS NULL AND bark_twigs_buds IS NOT NULL
        "#,
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("ALTER TABLE species_sources DROP COLUMN bark_twigs_buds")
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!("  ✓ Moved {} bark_twigs_buds values into bark", moved);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_schema_version_zero_without_table() {
        let pool = memory_pool().await;
        assert_eq!(get_schema_version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_legacy_database_is_upgraded() {
        let pool = memory_pool().await;

        // Schema as written by the first release
        sqlx::query(
            "CREATE TABLE sources (id INTEGER PRIMARY KEY AUTOINCREMENT, source_type TEXT NOT NULL, name TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "CREATE TABLE species_sources (id INTEGER PRIMARY KEY, scientific_name TEXT NOT NULL, source_id INTEGER NOT NULL, bark_twigs_buds TEXT)",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO species_sources (scientific_name, source_id, bark_twigs_buds) VALUES ('alba', 1, 'scaly, light gray')",
        )
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("CREATE TABLE schema_version (version INTEGER PRIMARY KEY, applied_at TIMESTAMP)")
            .execute(&pool)
            .await
            .unwrap();

        run_migrations(&pool).await.unwrap();

        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
        assert!(has_column(&pool, "sources", "license").await.unwrap());
        assert!(has_column(&pool, "sources", "license_url").await.unwrap());
        assert!(!has_column(&pool, "species_sources", "bark_twigs_buds").await.unwrap());

        let bark: Option<String> =
            sqlx::query_scalar("SELECT bark FROM species_sources WHERE scientific_name = 'alba'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(bark.as_deref(), Some("scaly, light gray"));

        // Second run is a no-op
        run_migrations(&pool).await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    }
}
