//! Migration job (Command pattern) for one source-item-to-target-item unit.
//!
//! A MigrationJob carries everything the executor needs: which backends,
//! which items, and the positional column pairing. Its [`JobStatus`] moves
//! through `Created -> SchemaResolved -> TargetProvisioned -> Running` and
//! ends in `Completed` or `Failed`.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MigrateError, Result};

use super::result::Classification;
use super::schema::{BackendKind, SchemaDescriptor};

/// Per-job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    SchemaResolved,
    TargetProvisioned,
    Running,
    Completed(Classification),
    Failed,
}

impl JobStatus {
    /// Completed and Failed are terminal; there are no automatic retries.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed(_) | JobStatus::Failed)
    }

    fn can_advance_to(&self, next: &JobStatus) -> bool {
        match (self, next) {
            (s, JobStatus::Failed) => !s.is_terminal(),
            (JobStatus::Created, JobStatus::SchemaResolved) => true,
            (JobStatus::SchemaResolved, JobStatus::TargetProvisioned) => true,
            (JobStatus::TargetProvisioned, JobStatus::Running) => true,
            (JobStatus::Running, JobStatus::Completed(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => f.write_str("created"),
            JobStatus::SchemaResolved => f.write_str("schema_resolved"),
            JobStatus::TargetProvisioned => f.write_str("target_provisioned"),
            JobStatus::Running => f.write_str("running"),
            JobStatus::Completed(c) => write!(f, "completed ({})", c),
            JobStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Positional pairing of source columns to target column names.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColumnMapping {
    pairs: Vec<(String, String)>,
}

impl ColumnMapping {
    /// Build from explicit (source, target) pairs.
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self { pairs }
    }

    /// Every field of the descriptor, keeping its name.
    pub fn identity(schema: &SchemaDescriptor) -> Self {
        Self {
            pairs: schema
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.name.clone()))
                .collect(),
        }
    }

    /// Parse a `source[:target],...` list, e.g. `id:user_id,name`.
    pub fn parse(list: &str) -> Result<Self> {
        let mut pairs = Vec::new();
        for part in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (source, target) = match part.split_once(':') {
                Some((s, t)) => (s.trim(), t.trim()),
                None => (part, part),
            };
            if source.is_empty() || target.is_empty() {
                return Err(MigrateError::InvalidJob(format!(
                    "empty column name in mapping entry '{}'",
                    part
                )));
            }
            pairs.push((source.to_string(), target.to_string()));
        }
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn source_columns(&self) -> Vec<String> {
        self.pairs.iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn target_columns(&self) -> Vec<String> {
        self.pairs.iter().map(|(_, t)| t.clone()).collect()
    }
}

/// A single item migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationJob {
    pub source_backend: BackendKind,
    pub target_backend: BackendKind,
    pub source_item: String,
    pub target_item: String,

    /// Columns read from the source, in order.
    pub source_columns: Vec<String>,

    /// Target names, paired with `source_columns` by position.
    pub target_columns: Vec<String>,

    status: JobStatus,
}

impl MigrationJob {
    /// Create a job.
    ///
    /// Rejects an empty mapping, and duplicate target names when
    /// `reject_duplicate_targets` is set.
    pub fn new(
        source_backend: BackendKind,
        target_backend: BackendKind,
        source_item: impl Into<String>,
        target_item: impl Into<String>,
        mapping: &ColumnMapping,
        reject_duplicate_targets: bool,
    ) -> Result<Self> {
        let source_item = source_item.into();
        let target_item = target_item.into();

        if target_item.trim().is_empty() {
            return Err(MigrateError::InvalidJob("target item name is empty".into()));
        }
        if mapping.is_empty() {
            return Err(MigrateError::InvalidJob(format!(
                "no columns selected for {}",
                source_item
            )));
        }

        let target_columns = mapping.target_columns();
        if reject_duplicate_targets {
            let mut seen = HashSet::new();
            for name in &target_columns {
                if !seen.insert(name.as_str()) {
                    return Err(MigrateError::InvalidJob(format!(
                        "duplicate target column '{}' for {}",
                        name, target_item
                    )));
                }
            }
        }

        Ok(Self {
            source_backend,
            target_backend,
            source_item,
            target_item,
            source_columns: mapping.source_columns(),
            target_columns,
            status: JobStatus::Created,
        })
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Move to the next lifecycle state.
    pub fn advance(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_advance_to(&next) {
            return Err(MigrateError::InvalidJob(format!(
                "{}: cannot move from {} to {}",
                self.source_item, self.status, next
            )));
        }
        debug!("{}: {} -> {}", self.source_item, self.status, next);
        self.status = next;
        Ok(())
    }

    /// Display name used in logs and reports.
    pub fn label(&self) -> String {
        item_label(&self.source_item, &self.target_item)
    }
}

/// `users` when the names match, `users -> User` otherwise.
pub fn item_label(source_item: &str, target_item: &str) -> String {
    if source_item == target_item {
        source_item.to_string()
    } else {
        format!("{} -> {}", source_item, target_item)
    }
}
