//! Migration orchestrator - single-item and whole-catalog runs.
//!
//! A single item goes through schema introspection, schema conversion,
//! target provisioning and then the row executor. A batch run does that for
//! every item of the source catalog, strictly one after another, and keeps
//! going when an item fails.

use std::time::Instant;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::MigrationSettings;
use crate::core::job::{item_label, ColumnMapping, JobStatus, MigrationJob};
use crate::core::result::{JobResult, MigrationRun};
use crate::core::schema::SchemaDescriptor;
use crate::core::traits::DataSource;
use crate::error::Result;
use crate::events::EventSink;
use crate::provision::ensure_target;
use crate::transfer::{best_effort_count, TransferConfig, TransferEngine, CATEGORY};
use crate::typemap::convert_schema;

/// Migration orchestrator.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    engine: TransferEngine,
    reject_duplicate_targets: bool,
}

impl Orchestrator {
    /// Create an orchestrator with default settings.
    pub fn new(source: DataSource, target: DataSource) -> Self {
        Self {
            engine: TransferEngine::new(source, target, TransferConfig::default()),
            reject_duplicate_targets: true,
        }
    }

    /// Create an orchestrator from the `migration` config section.
    pub fn from_settings(source: DataSource, target: DataSource, settings: &MigrationSettings) -> Self {
        let config = TransferConfig {
            checkpoint_interval: settings.checkpoint_interval,
        };
        Self {
            engine: TransferEngine::new(source, target, config),
            reject_duplicate_targets: settings.reject_duplicate_targets,
        }
    }

    /// Set the event sink shared by the orchestrator and executor.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.engine = self.engine.with_events(events);
        self
    }

    /// Set the stop signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.engine = self.engine.with_cancellation(cancel);
        self
    }

    pub fn engine(&self) -> &TransferEngine {
        &self.engine
    }

    fn source(&self) -> &DataSource {
        self.engine.source()
    }

    fn target(&self) -> &DataSource {
        self.engine.target()
    }

    fn events(&self) -> &EventSink {
        self.engine.events()
    }

    /// Source descriptor of `item` and its form on the target backend.
    pub async fn describe(&self, item: &str) -> Result<(SchemaDescriptor, SchemaDescriptor)> {
        let schema = self.source().get_schema(item).await?;
        let converted = convert_schema(self.target().kind(), &schema);
        Ok((schema, converted))
    }

    /// Resolve, convert and provision: everything before rows move.
    pub async fn prepare(
        &self,
        source_item: &str,
        target_item: &str,
        mapping: Option<&ColumnMapping>,
    ) -> Result<MigrationJob> {
        let schema = self.source().get_schema(source_item).await?;
        if schema.sampled {
            info!(
                "{}: schema inferred from one sampled record ({} fields)",
                source_item,
                schema.len()
            );
        }

        let mapping = match mapping {
            Some(m) => m.clone(),
            None => ColumnMapping::identity(&schema),
        };
        let mut job = MigrationJob::new(
            self.source().kind(),
            self.target().kind(),
            source_item,
            target_item,
            &mapping,
            self.reject_duplicate_targets,
        )?;
        job.advance(JobStatus::SchemaResolved)?;

        let mut planned = convert_schema(self.target().kind(), &schema.project(mapping.pairs()));
        planned.item = target_item.to_string();
        let mut seen = Vec::with_capacity(planned.fields.len());
        planned.fields.retain(|f| {
            let first = !seen.contains(&f.name);
            seen.push(f.name.clone());
            first
        });

        ensure_target(self.target(), target_item, &planned).await?;
        job.advance(JobStatus::TargetProvisioned)?;

        Ok(job)
    }

    /// Migrate one item. Never returns an error: job-level failures come
    /// back as a `Fail` result carrying the error text.
    pub async fn migrate_item(
        &self,
        source_item: &str,
        target_item: &str,
        mapping: Option<&ColumnMapping>,
    ) -> JobResult {
        let start = Instant::now();
        match self.prepare(source_item, target_item, mapping).await {
            Ok(mut job) => self.engine.execute(&mut job).await,
            Err(e) => {
                let label = item_label(source_item, target_item);
                self.events()
                    .error(CATEGORY, format!("Migration of {} failed: {}", label, e))
                    .await;
                let count = best_effort_count(self.source(), source_item).await;
                let result = JobResult::failed(label, count, start.elapsed(), e);
                self.events().job_finished(&result).await;
                result
            }
        }
    }

    /// Migrate every item of the source catalog, sequentially, each into an
    /// item of the same name on the target.
    ///
    /// Fails only when the catalog itself cannot be listed.
    pub async fn migrate_all(&self) -> Result<MigrationRun> {
        let items = self.source().list_items().await?;
        let total = items.len();
        let cancel = self.engine.cancellation();

        self.events()
            .info(
                CATEGORY,
                format!(
                    "Found {} {}s to migrate from {} to {}",
                    total,
                    self.source().kind().item_noun(),
                    self.source().kind(),
                    self.target().kind()
                ),
            )
            .await;

        let start = Instant::now();
        let mut run = MigrationRun::new(total);

        for (i, item) in items.iter().enumerate() {
            if cancel.is_cancelled() {
                run.cancelled = true;
                self.events()
                    .warning(
                        CATEGORY,
                        format!("Cancellation requested, {} items not started", total - i),
                    )
                    .await;
                break;
            }

            let result = self.migrate_item(item, item, None).await;
            if result.cancelled {
                run.cancelled = true;
            }
            run.push(result);
            self.events().run_progress(i + 1, total).await;
        }

        run.total_elapsed = start.elapsed();

        self.events()
            .info(
                CATEGORY,
                format!(
                    "Migration run finished: {} items, {} rows migrated, {} failed in {:.1}s",
                    run.results.len(),
                    run.migrated_total(),
                    run.failed_total(),
                    run.total_elapsed.as_secs_f64()
                ),
            )
            .await;
        self.events().run_finished(&run).await;

        Ok(run)
    }

    /// Run [`migrate_all`](Self::migrate_all) on a background task.
    pub fn spawn_all(&self) -> JoinHandle<Result<MigrationRun>> {
        let orchestrator = self.clone();
        tokio::spawn(async move { orchestrator.migrate_all().await })
    }
}
