//! Record store
//!
//! Durable storage for sources, species and source-attributed records.
//! [`RecordStore`] is an explicit handle; several stores (for example test
//! fixtures) can coexist in one process.
//!
//! Each entity module exposes two layers:
//! - `*_tx` / `load_*` functions over `&mut SqliteConnection`, so a caller
//!   that already holds a transaction can compose several writes into it
//! - `RecordStore` methods that open and commit their own transaction
//!
//! The hybrid back-reference index on species is maintained in
//! [`crate::hybrids`], which builds on the species functions here.

pub mod sources;
pub mod species;
pub mod species_sources;

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Handle to one catalog database
#[derive(Debug, Clone)]
pub struct RecordStore {
    pool: SqlitePool,
}

impl RecordStore {
    /// Open (creating if missing) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = crate::db::init_database(path).await?;
        Ok(Self { pool })
    }

    /// Private in-memory store with the full schema
    pub async fn open_in_memory() -> Result<Self> {
        let pool = crate::db::init_memory_database().await?;
        Ok(Self { pool })
    }

    /// Wrap an already initialized pool
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close all pooled connections
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Record store closed");
    }
}
