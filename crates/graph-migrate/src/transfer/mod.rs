//! Row migration executor.
//!
//! Moves every row of one source item into one target item:
//! remap (positional) -> normalize -> insert, in source order. A row that
//! fails with a row-level error is counted and logged and the job carries on.
//! Any other error (source read, lost connection) aborts the job; rows
//! already committed by then stay counted as migrated.

use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::job::{JobStatus, MigrationJob};
use crate::core::result::JobResult;
use crate::core::traits::DataSource;
use crate::core::value::RowRecord;
use crate::error::{MigrateError, Result};
use crate::events::EventSink;
use crate::normalize::normalize_row;

/// Event category used for executor log lines.
pub const CATEGORY: &str = "Migration";

/// Executor settings.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Emit an informational checkpoint every this many rows.
    pub checkpoint_interval: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 100,
        }
    }
}

/// A job-level error and what had been committed when it struck.
struct Abort {
    error: MigrateError,
    /// Known once the source rows have been read.
    total: Option<u64>,
    migrated: u64,
}

impl From<MigrateError> for Abort {
    fn from(error: MigrateError) -> Self {
        Self {
            error,
            total: None,
            migrated: 0,
        }
    }
}

/// Executor bound to one source and one target connection.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    source: DataSource,
    target: DataSource,
    config: TransferConfig,
    events: EventSink,
    cancel: CancellationToken,
}

impl TransferEngine {
    pub fn new(source: DataSource, target: DataSource, config: TransferConfig) -> Self {
        Self {
            source,
            target,
            config,
            events: EventSink::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the event sink for progress and log events.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Set the stop signal, checked between rows.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn source(&self) -> &DataSource {
        &self.source
    }

    pub fn target(&self) -> &DataSource {
        &self.target
    }

    pub fn events(&self) -> &EventSink {
        &self.events
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run a job on a background task.
    ///
    /// The job must already be target-provisioned.
    pub fn spawn(&self, mut job: MigrationJob) -> JoinHandle<JobResult> {
        let engine = self.clone();
        tokio::spawn(async move { engine.execute(&mut job).await })
    }

    /// Run a job to completion and return its result.
    ///
    /// The job must already be target-provisioned. Its status ends in
    /// `Completed` or `Failed`. A `JobFinished` event is emitted either way.
    pub async fn execute(&self, job: &mut MigrationJob) -> JobResult {
        let start = Instant::now();
        let label = job.label();

        let result = match self.run_rows(job, &label, start).await {
            Ok(result) => {
                let _ = job.advance(JobStatus::Completed(result.classification));
                result
            }
            Err(abort) => {
                let _ = job.advance(JobStatus::Failed);
                self.events
                    .error(CATEGORY, format!("Migration of {} failed: {}", label, abort.error))
                    .await;
                let count = match abort.total {
                    Some(n) => n,
                    None => best_effort_count(&self.source, &job.source_item).await,
                };
                JobResult::aborted(label.clone(), count, abort.migrated, start.elapsed(), abort.error)
            }
        };

        self.events
            .info(
                CATEGORY,
                format!(
                    "{}: {} ({} migrated, {} failed, {:.2}s)",
                    label,
                    result.classification,
                    result.migrated_count,
                    result.failed_count,
                    result.elapsed.as_secs_f64()
                ),
            )
            .await;
        self.events.job_finished(&result).await;
        result
    }

    async fn run_rows(
        &self,
        job: &mut MigrationJob,
        label: &str,
        start: Instant,
    ) -> std::result::Result<JobResult, Abort> {
        if job.source_backend != self.source.kind() || job.target_backend != self.target.kind() {
            return Err(MigrateError::InvalidJob(format!(
                "job is {} -> {} but engine is {} -> {}",
                job.source_backend,
                job.target_backend,
                self.source.kind(),
                self.target.kind()
            ))
            .into());
        }
        job.advance(JobStatus::Running)?;

        let rows = self
            .source
            .fetch_rows(&job.source_item, &job.source_columns)
            .await?;
        let total = rows.len() as u64;
        let insert_columns = unique_columns(&job.target_columns);

        self.events
            .info(
                CATEGORY,
                format!("Migrating {} rows from {} to {}", total, job.source_item, job.target_item),
            )
            .await;

        let interval = self.config.checkpoint_interval.max(1);
        let mut migrated = 0u64;
        let mut failed = 0u64;
        let mut cancelled = false;

        for (i, row) in rows.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                self.events
                    .warning(
                        CATEGORY,
                        format!("Cancelled {} after {}/{} rows", label, i, total),
                    )
                    .await;
                break;
            }

            let index = i as u64 + 1;
            match self.migrate_row(job, &insert_columns, row).await {
                Ok(()) => migrated += 1,
                Err(e) if e.is_fatal() => {
                    return Err(Abort {
                        error: e,
                        total: Some(total),
                        migrated,
                    })
                }
                Err(e) => {
                    failed += 1;
                    self.events
                        .error(CATEGORY, format!("Error migrating row {}: {}", index, e))
                        .await;
                }
            }

            self.events.progress(label, index, total).await;

            if index % interval == 0 || index == total {
                self.events
                    .info(CATEGORY, format!("Migrated {}/{} rows", index, total))
                    .await;
            }
        }

        Ok(JobResult::completed(
            label,
            total,
            migrated,
            failed,
            start.elapsed(),
            cancelled,
        ))
    }

    async fn migrate_row(
        &self,
        job: &MigrationJob,
        insert_columns: &[String],
        row: RowRecord,
    ) -> Result<()> {
        let remapped = row.remap(&job.source_columns, &job.target_columns);
        let normalized = normalize_row(remapped, self.target.kind())?;
        self.target
            .insert_row(&job.target_item, insert_columns, &normalized)
            .await
    }
}

/// Row count used for accounting when a job fails before rows are read.
/// Falls back to 0 when the source cannot answer either.
pub async fn best_effort_count(source: &DataSource, item: &str) -> u64 {
    match source.get_row_count(item).await {
        Ok(n) => n,
        Err(e) => {
            debug!("Row count for {} unavailable: {}", item, e);
            0
        }
    }
}

/// Target column names with repeats removed, first position kept.
fn unique_columns(columns: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(columns.len());
    for c in columns {
        if !out.contains(c) {
            out.push(c.clone());
        }
    }
    out
}
