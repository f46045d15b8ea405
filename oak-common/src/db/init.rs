//! Database initialization
//!
//! Opens (or creates) the catalog database, creates every table idempotently
//! and brings older files forward through [`run_migrations`].
//!
//! [`run_migrations`]: crate::db::migrations::run_migrations

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas go on the connect options so every pooled connection gets them
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_tables(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// The pool is pinned to a single connection that never expires, since every
/// SQLite memory connection is a separate database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_tables(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create every table and index (idempotent)
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_sources_table(pool).await?;
    create_species_table(pool).await?;
    create_species_sources_table(pool).await?;
    create_import_runs_table(pool).await?;
    create_taxa_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_sources_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_type TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            author TEXT,
            year INTEGER,
            url TEXT,
            isbn TEXT,
            doi TEXT,
            notes TEXT,
            license TEXT,
            license_url TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_sources_name ON sources(name)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_species_table(pool: &SqlitePool) -> Result<()> {
    // List columns hold JSON arrays; hybrids is maintained from parent1/parent2
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS species (
            scientific_name TEXT PRIMARY KEY,
            author TEXT,
            is_hybrid INTEGER NOT NULL DEFAULT 0,
            conservation_status TEXT,
            subgenus TEXT,
            section TEXT,
            subsection TEXT,
            complex TEXT,
            parent1 TEXT,
            parent2 TEXT,
            hybrids TEXT NOT NULL DEFAULT '[]',
            closely_related_to TEXT NOT NULL DEFAULT '[]',
            subspecies_varieties TEXT NOT NULL DEFAULT '[]',
            synonyms TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_species_parent1 ON species(parent1)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_species_parent2 ON species(parent2)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_species_taxonomy ON species(subgenus, section, subsection)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_species_sources_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS species_sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scientific_name TEXT NOT NULL REFERENCES species(scientific_name) ON DELETE CASCADE,
            source_id INTEGER NOT NULL REFERENCES sources(id),
            local_names TEXT,
            range TEXT,
            growth_habit TEXT,
            leaves TEXT,
            flowers TEXT,
            fruits TEXT,
            bark TEXT,
            twigs TEXT,
            buds TEXT,
            hardiness_habitat TEXT,
            miscellaneous TEXT,
            url TEXT,
            is_preferred INTEGER,
            UNIQUE(scientific_name, source_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_species_sources_name ON species_sources(scientific_name)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_species_sources_source ON species_sources(source_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_import_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_runs (
            run_id TEXT PRIMARY KEY,
            source_id INTEGER NOT NULL,
            started_at TIMESTAMP NOT NULL,
            finished_at TIMESTAMP NOT NULL,
            created INTEGER NOT NULL DEFAULT 0,
            updated INTEGER NOT NULL DEFAULT 0,
            redundant INTEGER NOT NULL DEFAULT 0,
            conflict_resolved INTEGER NOT NULL DEFAULT 0,
            skipped INTEGER NOT NULL DEFAULT 0,
            failed INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Reference names per rank; species taxonomy columns do not point here
async fn create_taxa_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS taxa (
            name TEXT NOT NULL,
            level TEXT NOT NULL CHECK (level IN ('subgenus', 'section', 'subsection', 'complex')),
            parent TEXT,
            author TEXT,
            notes TEXT,
            links TEXT,
            PRIMARY KEY (name, level)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_taxa_level ON taxa(level)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_taxa_parent ON taxa(parent)")
        .execute(pool)
        .await?;

    Ok(())
}
