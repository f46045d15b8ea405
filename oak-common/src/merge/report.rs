//! Import outcome reporting

use super::classify::MergeField;
use super::resolver::Resolution;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Conflict on one field and how it was settled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConflict {
    pub field: MergeField,
    pub resolution: Resolution,
}

/// What happened to one input entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum EntryOutcome {
    /// Species did not exist and was created
    Created,
    /// Non-conflicting changes applied
    Updated,
    /// Every supplied value was already stored
    Redundant,
    /// At least one conflict was resolved; other changes applied
    ConflictResolved(Vec<ResolvedConflict>),
    /// A resolver chose to skip the entry; nothing was applied
    Skipped,
    /// Entry not applied; earlier and later entries are unaffected
    Failed(String),
}

impl EntryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EntryOutcome::Created => "created",
            EntryOutcome::Updated => "updated",
            EntryOutcome::Redundant => "redundant",
            EntryOutcome::ConflictResolved(_) => "conflict-resolved",
            EntryOutcome::Skipped => "skipped",
            EntryOutcome::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReport {
    /// Position in the input batch
    pub index: usize,
    pub scientific_name: String,
    pub outcome: EntryOutcome,
}

/// Per-outcome counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImportSummary {
    pub created: usize,
    pub updated: usize,
    pub redundant: usize,
    pub conflict_resolved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Result of one import run, entries in input order
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub source_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<EntryReport>,
}

impl ImportReport {
    pub fn summary(&self) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for entry in &self.entries {
            match entry.outcome {
                EntryOutcome::Created => summary.created += 1,
                EntryOutcome::Updated => summary.updated += 1,
                EntryOutcome::Redundant => summary.redundant += 1,
                EntryOutcome::ConflictResolved(_) => summary.conflict_resolved += 1,
                EntryOutcome::Skipped => summary.skipped += 1,
                EntryOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryReport> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, EntryOutcome::Failed(_)))
    }

    /// Outcome for the first entry with this scientific name
    pub fn outcome_for(&self, scientific_name: &str) -> Option<&EntryOutcome> {
        self.entries
            .iter()
            .find(|e| e.scientific_name == scientific_name)
            .map(|e| &e.outcome)
    }
}
