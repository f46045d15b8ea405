//! Conflict-aware bulk import
//!
//! Merges a batch of species entries, all attributed to one import source,
//! into the store without silently overwriting or duplicating data.
//!
//! **Per entry:**
//! 1. Snapshot the stored species and the import source's record for it
//! 2. Classify every supplied value as new, redundant or conflicting
//! 3. Ask the resolver about each conflict (no transaction is open here)
//! 4. Open a transaction, verify the snapshot is still current, write the
//!    resolved species through the hybrid maintainer and the attributed
//!    record, commit
//!
//! Entries commit independently. A failure is recorded against that entry
//! and the import moves on, so re-running the same batch is safe: entries
//! that were applied come back as redundant.

pub mod batch;
pub mod classify;
pub mod report;
pub mod resolver;

pub use batch::{load_document, ImportBatch, ImportEntry};
pub use classify::{Classification, FieldChange, MergeField, SpeciesField};
pub use report::{EntryOutcome, EntryReport, ImportReport, ImportSummary, ResolvedConflict};
pub use resolver::{
    AcceptImportedPolicy, ConflictPolicy, ConflictResolver, FieldConflict, KeepExistingPolicy,
    RejectConflictsPolicy, Resolution, SkipEntryPolicy,
};

use crate::db::models::{FieldValue, SourceFields, Species, SpeciesSource};
use crate::hybrids::save_species_tx;
use crate::store::sources::load_source;
use crate::store::species::load_species;
use crate::store::species_sources::{load_species_source, upsert_species_source_tx};
use crate::store::RecordStore;
use crate::validate::validate_species;
use crate::{Error, Result};
use chrono::Utc;
use classify::{classify_attributed, classify_species, union_into};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Stored state an entry was classified against
#[derive(Debug, Clone, PartialEq)]
struct Snapshot {
    species: Option<Species>,
    record: Option<SpeciesSource>,
}

/// Fully resolved writes for one entry
#[derive(Debug)]
enum EntryPlan {
    Skip,
    Apply {
        species: Option<Species>,
        record: Option<SpeciesSource>,
        outcome: EntryOutcome,
    },
}

/// Set one classified field on the working copies
fn apply_value(
    field: MergeField,
    value: FieldValue,
    species: &mut Species,
    record: &mut SourceFields,
) -> Result<()> {
    match field {
        MergeField::Species(f) => f.set(species, Some(value)),
        MergeField::Attributed(f) => record.set(f, Some(value)),
    }
}

/// Classify an entry against its snapshot and resolve every conflict
fn plan_entry<R>(
    entry: &ImportEntry,
    incoming: &Species,
    snapshot: &Snapshot,
    source_id: i64,
    resolver: &mut R,
) -> Result<EntryPlan>
where
    R: ConflictResolver + ?Sized,
{
    let name = &incoming.scientific_name;
    let incoming_fields = entry.source_data.clone().unwrap_or_default();

    // Unknown species: create outright, no conflict possible
    let Some(existing) = &snapshot.species else {
        let record = (!incoming_fields.is_empty()).then(|| SpeciesSource {
            scientific_name: name.clone(),
            source_id,
            fields: incoming_fields,
        });
        return Ok(EntryPlan::Apply {
            species: Some(incoming.clone()),
            record,
            outcome: EntryOutcome::Created,
        });
    };

    let mut changes = classify_species(existing, incoming);
    changes.extend(classify_attributed(snapshot.record.as_ref(), &incoming_fields));

    let mut species = existing.clone();
    let mut fields = snapshot
        .record
        .as_ref()
        .map(|r| r.fields.clone())
        .unwrap_or_default();
    let mut resolved = Vec::new();

    for change in changes {
        match change.classification {
            Classification::Redundant => {}
            Classification::New => {
                apply_value(change.field, change.incoming, &mut species, &mut fields)?
            }
            Classification::Conflicting => {
                let conflict = FieldConflict {
                    species: name.clone(),
                    source_id,
                    field: change.field,
                    existing: change.existing.unwrap_or_else(|| change.incoming.clone()),
                    incoming: change.incoming.clone(),
                };
                let resolution = resolver.resolve(&conflict)?;
                debug!(species = %name, field = %change.field, ?resolution, "Conflict resolved");

                match &resolution {
                    Resolution::SkipEntry => return Ok(EntryPlan::Skip),
                    Resolution::KeepExisting => {}
                    Resolution::AcceptImported => {
                        apply_value(change.field, change.incoming, &mut species, &mut fields)?
                    }
                    Resolution::Manual(value) => {
                        apply_value(change.field, value.clone(), &mut species, &mut fields)?
                    }
                }
                resolved.push(ResolvedConflict {
                    field: change.field,
                    resolution,
                });
            }
        }
    }

    // List fields merge additively and never conflict
    union_into(&mut species.synonyms, &incoming.synonyms);
    union_into(&mut species.closely_related_to, &incoming.closely_related_to);
    union_into(&mut species.subspecies_varieties, &incoming.subspecies_varieties);
    if incoming.is_hybrid {
        species.is_hybrid = true;
    }

    let species_changed = species != *existing;
    let record = match &snapshot.record {
        Some(stored) if stored.fields != fields => Some(SpeciesSource {
            fields,
            ..stored.clone()
        }),
        Some(_) => None,
        None if !fields.is_empty() => Some(SpeciesSource {
            scientific_name: name.clone(),
            source_id,
            fields,
        }),
        None => None,
    };

    let outcome = if !resolved.is_empty() {
        EntryOutcome::ConflictResolved(resolved)
    } else if species_changed || record.is_some() {
        EntryOutcome::Updated
    } else {
        EntryOutcome::Redundant
    };

    Ok(EntryPlan::Apply {
        species: species_changed.then_some(species),
        record,
        outcome,
    })
}

impl RecordStore {
    async fn snapshot(&self, name: &str, source_id: i64) -> Result<Snapshot> {
        let mut conn = self.pool().acquire().await?;
        Ok(Snapshot {
            species: load_species(&mut conn, name).await?,
            record: load_species_source(&mut conn, name, source_id).await?,
        })
    }

    async fn import_entry<R>(
        &self,
        entry: &ImportEntry,
        source_id: i64,
        resolver: &mut R,
    ) -> Result<EntryOutcome>
    where
        R: ConflictResolver + ?Sized,
    {
        let incoming = validate_species(entry.species.clone())?;
        let name = incoming.scientific_name.clone();

        let snapshot = self.snapshot(&name, source_id).await?;

        let (species, record, outcome) =
            match plan_entry(entry, &incoming, &snapshot, source_id, resolver)? {
                EntryPlan::Skip => return Ok(EntryOutcome::Skipped),
                EntryPlan::Apply {
                    species,
                    record,
                    outcome,
                } => (species, record, outcome),
            };

        if species.is_none() && record.is_none() {
            return Ok(outcome);
        }

        let mut tx = self.pool().begin().await?;

        let current = Snapshot {
            species: load_species(&mut tx, &name).await?,
            record: load_species_source(&mut tx, &name, source_id).await?,
        };
        if current != snapshot {
            return Err(Error::StaleEntry(name));
        }

        if let Some(species) = species {
            save_species_tx(&mut tx, species).await?;
        }
        if let Some(record) = &record {
            upsert_species_source_tx(&mut tx, record).await?;
        }
        tx.commit().await?;

        Ok(outcome)
    }

    /// Merge a batch attributed to `source_id`
    ///
    /// Fails up front with `NotFound` when the source does not exist; after
    /// that, failures are reported per entry and never abort the batch.
    pub async fn import_batch<R>(
        &self,
        batch: &ImportBatch,
        source_id: i64,
        resolver: &mut R,
    ) -> Result<ImportReport>
    where
        R: ConflictResolver + ?Sized,
    {
        {
            let mut conn = self.pool().acquire().await?;
            if load_source(&mut conn, source_id).await?.is_none() {
                return Err(Error::NotFound(format!("source {}", source_id)));
            }
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(
            run_id = %run_id,
            source_id,
            entries = batch.len(),
            "Starting import"
        );

        let mut entries = Vec::with_capacity(batch.len());
        for (index, entry) in batch.entries.iter().enumerate() {
            let outcome = match self.import_entry(entry, source_id, resolver).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        index,
                        species = %entry.species.scientific_name,
                        "Import entry failed: {}",
                        e
                    );
                    EntryOutcome::Failed(e.to_string())
                }
            };
            if outcome == EntryOutcome::Skipped {
                warn!(index, species = %entry.species.scientific_name, "Import entry skipped");
            }
            entries.push(EntryReport {
                index,
                scientific_name: entry.species.scientific_name.trim().to_string(),
                outcome,
            });
        }

        let report = ImportReport {
            run_id,
            source_id,
            started_at,
            finished_at: Utc::now(),
            entries,
        };

        if let Err(e) = self.record_import_run(&report).await {
            warn!(run_id = %run_id, "Failed to record import run: {}", e);
        }

        let s = report.summary();
        info!(
            run_id = %run_id,
            created = s.created,
            updated = s.updated,
            redundant = s.redundant,
            conflict_resolved = s.conflict_resolved,
            skipped = s.skipped,
            failed = s.failed,
            "Import finished"
        );
        Ok(report)
    }

    async fn record_import_run(&self, report: &ImportReport) -> Result<()> {
        let s = report.summary();
        sqlx::query(
            r#"
            INSERT INTO import_runs (
                run_id, source_id, started_at, finished_at,
                created, updated, redundant, conflict_resolved, skipped, failed
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(report.run_id.to_string())
        .bind(report.source_id)
        .bind(report.started_at)
        .bind(report.finished_at)
        .bind(s.created as i64)
        .bind(s.updated as i64)
        .bind(s.redundant as i64)
        .bind(s.conflict_resolved as i64)
        .bind(s.skipped as i64)
        .bind(s.failed as i64)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Number of recorded import runs for a source
    pub async fn import_run_count(&self, source_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM import_runs WHERE source_id = ?")
            .bind(source_id)
            .fetch_one(self.pool())
            .await?;
        Ok(count)
    }
}
