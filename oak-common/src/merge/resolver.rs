//! Conflict resolution strategies
//!
//! The importer calls [`ConflictResolver::resolve`] synchronously for each
//! conflicting value, never while a storage transaction is open. Interactive
//! front ends implement the trait with a prompt; batch callers pick one of
//! the automatic policies below.

use super::classify::MergeField;
use crate::db::models::FieldValue;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// A stored value and a different incoming value for the same key
#[derive(Debug, Clone, PartialEq)]
pub struct FieldConflict {
    pub species: String,
    pub source_id: i64,
    pub field: MergeField,
    pub existing: FieldValue,
    pub incoming: FieldValue,
}

/// Terminal outcome for one conflict
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Keep the stored value
    KeepExisting,
    /// Overwrite with the imported value
    AcceptImported,
    /// Replace with a caller-supplied value
    Manual(FieldValue),
    /// Leave the whole species entry untouched for this import
    SkipEntry,
}

/// Decides conflicting values during an import
pub trait ConflictResolver {
    fn resolve(&mut self, conflict: &FieldConflict) -> Result<Resolution>;
}

impl<F> ConflictResolver for F
where
    F: FnMut(&FieldConflict) -> Result<Resolution>,
{
    fn resolve(&mut self, conflict: &FieldConflict) -> Result<Resolution> {
        self(conflict)
    }
}

/// Always keep what is stored
#[derive(Debug, Default, Clone, Copy)]
pub struct KeepExistingPolicy;

impl ConflictResolver for KeepExistingPolicy {
    fn resolve(&mut self, _conflict: &FieldConflict) -> Result<Resolution> {
        Ok(Resolution::KeepExisting)
    }
}

/// Always take the imported value
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptImportedPolicy;

impl ConflictResolver for AcceptImportedPolicy {
    fn resolve(&mut self, _conflict: &FieldConflict) -> Result<Resolution> {
        Ok(Resolution::AcceptImported)
    }
}

/// Skip every entry that has a conflict
#[derive(Debug, Default, Clone, Copy)]
pub struct SkipEntryPolicy;

impl ConflictResolver for SkipEntryPolicy {
    fn resolve(&mut self, _conflict: &FieldConflict) -> Result<Resolution> {
        Ok(Resolution::SkipEntry)
    }
}

/// No resolution available: the entry fails with `ConflictUnresolved`
#[derive(Debug, Default, Clone, Copy)]
pub struct RejectConflictsPolicy;

impl ConflictResolver for RejectConflictsPolicy {
    fn resolve(&mut self, conflict: &FieldConflict) -> Result<Resolution> {
        Err(Error::ConflictUnresolved {
            species: conflict.species.clone(),
            field: conflict.field.to_string(),
        })
    }
}

/// Configured default for conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Ask the user (front end supplies the resolver)
    #[default]
    Prompt,
    Keep,
    Accept,
    Skip,
    Reject,
}

impl ConflictPolicy {
    /// Resolver for non-interactive policies; `None` for [`ConflictPolicy::Prompt`]
    pub fn automatic(&self) -> Option<Box<dyn ConflictResolver + Send>> {
        match self {
            ConflictPolicy::Prompt => None,
            ConflictPolicy::Keep => Some(Box::new(KeepExistingPolicy)),
            ConflictPolicy::Accept => Some(Box::new(AcceptImportedPolicy)),
            ConflictPolicy::Skip => Some(Box::new(SkipEntryPolicy)),
            ConflictPolicy::Reject => Some(Box::new(RejectConflictsPolicy)),
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prompt" => Ok(ConflictPolicy::Prompt),
            "keep" => Ok(ConflictPolicy::Keep),
            "accept" => Ok(ConflictPolicy::Accept),
            "skip" => Ok(ConflictPolicy::Skip),
            "reject" => Ok(ConflictPolicy::Reject),
            other => Err(Error::Config(format!("unknown conflict policy '{}'", other))),
        }
    }
}
