//! Hybrid relationship maintenance
//!
//! A species' `hybrids` list is a materialized reverse index of every other
//! species naming it in `parent1` or `parent2`. Every write that can change
//! a parent slot runs through [`save_species_tx`] or one of the delete
//! functions here, which update the index in the same transaction as the row
//! itself. Nothing ever commits a species row with stale parent links.
//!
//! **Algorithm (save):**
//! 1. Read the previous stored state inside the caller's transaction
//! 2. Remove the key from parents that are no longer named
//! 3. Add the key to newly named parents that have a row
//! 4. Derive the entry's own `hybrids` from current references and write it
//!
//! A full-scan comparison ([`RecordStore::audit_hybrids`]) exists only as a
//! consistency check; [`RecordStore::repair_hybrids`] rewrites any drift.

use crate::db::models::Species;
use crate::store::species::{
    delete_species_row, load_hybrids, load_species, referencing_hybrids, store_hybrids,
    write_species_row,
};
use crate::store::RecordStore;
use crate::validate::validate_species;
use crate::{Error, Result};
use serde::Serialize;
use sqlx::SqliteConnection;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Result of saving one species
#[derive(Debug, Clone, PartialEq)]
pub struct SavedSpecies {
    /// The stored entry, with its derived `hybrids`
    pub species: Species,
    /// True when no row existed before the save
    pub created: bool,
}

/// Add or remove `hybrid` in `parent`'s list. No-op when `parent` has no row.
async fn relink(
    conn: &mut SqliteConnection,
    parent: &str,
    hybrid: &str,
    add: bool,
) -> Result<()> {
    let Some(current) = load_hybrids(conn, parent).await? else {
        debug!(parent = %parent, hybrid = %hybrid, "Parent not stored yet - nothing to relink");
        return Ok(());
    };

    let mut set: BTreeSet<String> = current.into_iter().collect();
    let changed = if add {
        set.insert(hybrid.to_string())
    } else {
        set.remove(hybrid)
    };

    if changed {
        let list: Vec<String> = set.into_iter().collect();
        store_hybrids(conn, parent, &list).await?;
        debug!(parent = %parent, hybrid = %hybrid, added = add, "Updated hybrids list");
    }
    Ok(())
}

/// Save a species inside the caller's transaction, keeping parents' lists in step
///
/// Caller-supplied `hybrids` values are ignored and replaced by the derived list.
pub async fn save_species_tx(conn: &mut SqliteConnection, species: Species) -> Result<SavedSpecies> {
    let mut species = validate_species(species)?;
    let name = species.scientific_name.clone();

    let old = load_species(conn, &name).await?;
    let old_parents = old.as_ref().map(Species::parents).unwrap_or_default();
    let new_parents = species.parents();

    for parent in old_parents.difference(&new_parents) {
        relink(conn, parent, &name, false).await?;
    }
    for parent in new_parents.difference(&old_parents) {
        relink(conn, parent, &name, true).await?;
    }

    species.hybrids = referencing_hybrids(conn, &name).await?;
    write_species_row(conn, &species).await?;

    Ok(SavedSpecies {
        species,
        created: old.is_none(),
    })
}

/// Delete a species that no other species names as a parent
pub async fn delete_species_tx(conn: &mut SqliteConnection, name: &str) -> Result<()> {
    let species = load_species(conn, name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("species '{}'", name)))?;

    let dependents = referencing_hybrids(conn, name).await?;
    if !dependents.is_empty() {
        return Err(Error::ReferentialConflict {
            entity: "species",
            key: name.to_string(),
            dependents,
        });
    }

    for parent in species.parents() {
        relink(conn, &parent, name, false).await?;
    }
    delete_species_row(conn, name).await?;
    Ok(())
}

/// Clear every parent slot naming `name`, then delete it
///
/// Returns the hybrids that were unlinked.
pub async fn delete_species_unlinking_tx(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Vec<String>> {
    let dependents = referencing_hybrids(conn, name).await?;

    for dependent in &dependents {
        let Some(mut hybrid) = load_species(conn, dependent).await? else {
            continue;
        };
        if hybrid.parent1.as_deref() == Some(name) {
            hybrid.parent1 = None;
        }
        if hybrid.parent2.as_deref() == Some(name) {
            hybrid.parent2 = None;
        }
        write_species_row(conn, &hybrid).await?;
        debug!(hybrid = %dependent, parent = %name, "Cleared parent slot");
    }

    delete_species_tx(conn, name).await?;
    Ok(dependents)
}

/// A species whose stored `hybrids` differs from the derived set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HybridDrift {
    pub species: String,
    pub stored: Vec<String>,
    pub expected: Vec<String>,
}

/// Full scan: derive every list from parent columns and compare
async fn scan_drift(conn: &mut SqliteConnection) -> Result<Vec<HybridDrift>> {
    let rows: Vec<(String, String, Option<String>, Option<String>)> = sqlx::query_as(
        "SELECT scientific_name, hybrids, parent1, parent2 FROM species ORDER BY scientific_name",
    )
    .fetch_all(&mut *conn)
    .await?;

    let mut expected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for (name, _, parent1, parent2) in &rows {
        for parent in [parent1, parent2].into_iter().flatten() {
            if !parent.trim().is_empty() {
                expected.entry(parent.clone()).or_default().insert(name.clone());
            }
        }
    }

    let mut drift = Vec::new();
    for (name, hybrids, _, _) in rows {
        let stored: Vec<String> = serde_json::from_str(&hybrids)?;
        let stored_set: BTreeSet<String> = stored.iter().cloned().collect();
        let want = expected.remove(&name).unwrap_or_default();
        if stored_set != want || stored.len() != stored_set.len() {
            drift.push(HybridDrift {
                species: name,
                stored,
                expected: want.into_iter().collect(),
            });
        }
    }
    Ok(drift)
}

impl RecordStore {
    /// Create or update a species, maintaining hybrid back-references atomically
    pub async fn save_species(&self, species: Species) -> Result<Species> {
        let mut tx = self.pool().begin().await?;
        let saved = save_species_tx(&mut tx, species).await?;
        tx.commit().await?;

        info!(
            "{} species '{}'",
            if saved.created { "Created" } else { "Updated" },
            saved.species.scientific_name
        );
        Ok(saved.species)
    }

    /// Delete a species; rejected with `ReferentialConflict` while it is a parent
    pub async fn delete_species(&self, name: &str) -> Result<()> {
        let mut tx = self.pool().begin().await?;
        delete_species_tx(&mut tx, name).await?;
        tx.commit().await?;

        info!("Deleted species '{}'", name);
        Ok(())
    }

    /// Delete a species after clearing it from every dependent hybrid's parent slots
    pub async fn delete_species_unlinking(&self, name: &str) -> Result<Vec<String>> {
        let mut tx = self.pool().begin().await?;
        let unlinked = delete_species_unlinking_tx(&mut tx, name).await?;
        tx.commit().await?;

        info!("Deleted species '{}' (unlinked {} hybrids)", name, unlinked.len());
        Ok(unlinked)
    }

    /// Species whose stored `hybrids` list disagrees with parent references
    pub async fn audit_hybrids(&self) -> Result<Vec<HybridDrift>> {
        let mut conn = self.pool().acquire().await?;
        let drift = scan_drift(&mut conn).await?;
        if !drift.is_empty() {
            warn!("{} species have drifted hybrids lists", drift.len());
        }
        Ok(drift)
    }

    /// Rewrite every drifted `hybrids` list in one transaction
    pub async fn repair_hybrids(&self) -> Result<usize> {
        let mut tx = self.pool().begin().await?;
        let drift = scan_drift(&mut tx).await?;
        for entry in &drift {
            store_hybrids(&mut tx, &entry.species, &entry.expected).await?;
        }
        tx.commit().await?;

        info!("Repaired {} hybrids lists", drift.len());
        Ok(drift.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_both_parent_slots_same_species_yields_one_entry() {
        let store = RecordStore::open_in_memory().await.unwrap();
        store.save_species(Species::new("alba")).await.unwrap();
        store
            .save_species(Species::hybrid("× jackiana", Some("alba"), Some("alba")))
            .await
            .unwrap();

        let alba = store.get_species("alba").await.unwrap();
        assert_eq!(alba.hybrids, vec!["× jackiana".to_string()]);
    }

    #[tokio::test]
    async fn test_caller_supplied_hybrids_are_ignored() {
        let store = RecordStore::open_in_memory().await.unwrap();
        let mut alba = Species::new("alba");
        alba.hybrids = vec!["made up".to_string()];

        let saved = store.save_species(alba).await.unwrap();
        assert!(saved.hybrids.is_empty());
    }

    #[tokio::test]
    async fn test_self_parent_rejected_without_writing() {
        let store = RecordStore::open_in_memory().await.unwrap();
        let err = store
            .save_species(Species::hybrid("alba", Some("alba"), None))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(!store.species_exists("alba").await.unwrap());
    }

    #[tokio::test]
    async fn test_audit_detects_and_repair_fixes_drift() {
        let store = RecordStore::open_in_memory().await.unwrap();
        store.save_species(Species::new("alba")).await.unwrap();
        store
            .save_species(Species::hybrid("× bebbiana", Some("alba"), None))
            .await
            .unwrap();

        // Corrupt the index behind the maintainer's back
        sqlx::query("UPDATE species SET hybrids = '[]' WHERE scientific_name = 'alba'")
            .execute(store.pool())
            .await
            .unwrap();

        let drift = store.audit_hybrids().await.unwrap();
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].species, "alba");
        assert_eq!(drift[0].expected, vec!["× bebbiana".to_string()]);

        assert_eq!(store.repair_hybrids().await.unwrap(), 1);
        assert!(store.audit_hybrids().await.unwrap().is_empty());
        assert_eq!(
            store.get_species("alba").await.unwrap().hybrids,
            vec!["× bebbiana".to_string()]
        );
    }
}
