//! # Oak Catalog Common Library
//!
//! Core of the oak (Quercus) taxonomy catalog:
//! - Record store for sources, species and source-attributed data
//! - Hybrid parent/child back-reference maintenance
//! - Conflict-aware bulk import with pluggable resolution
//! - Search and overview queries
//! - Whole-catalog export and taxonomic reference data
//! - Configuration loading

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod hybrids;
pub mod merge;
pub mod names;
pub mod search;
pub mod store;
pub mod taxa;
pub mod validate;

pub use db::models::{
    ConservationStatus, FieldValue, Source, SourceField, SourceFields, SourceType, Species,
    SpeciesSource,
};
pub use error::{Error, Result};
pub use store::RecordStore;
