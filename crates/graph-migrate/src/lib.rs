//! # graph-migrate
//!
//! Row-level data migration between a relational store (PostgreSQL), a
//! document store (MongoDB) and a property-graph store (Neo4j).
//!
//! - **Schema introspection** from a declared catalog or a sampled record
//! - **Type mapping** between the three type systems
//! - **Target provisioning** (create-if-absent)
//! - **Per-row transfer** that counts and logs failed rows without aborting
//! - **Batch runs** over a whole source catalog, one item at a time
//! - **Reports** as delimited text or JSON
//!
//! Progress and log events are delivered over a channel so any front end can
//! subscribe.
//!
//! ## Example
//!
//! ```rust,no_run
//! use graph_migrate::{drivers, Config, EventSink, MigrationReport, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> graph_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let source = drivers::connect(config.source_kind()?, &config).await?;
//!     let target = drivers::connect(config.target_kind()?, &config).await?;
//!
//!     let (events, mut rx) = EventSink::channel(config.migration.event_buffer);
//!     tokio::spawn(async move { while rx.recv().await.is_some() {} });
//!
//!     let run = Orchestrator::from_settings(source, target, &config.migration)
//!         .with_events(events)
//!         .migrate_all()
//!         .await?;
//!     print!("{}", MigrationReport::from_run(&run));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod events;
pub mod normalize;
pub mod orchestrator;
pub mod provision;
pub mod report;
pub mod transfer;
pub mod typemap;

// Re-exports for convenient access
pub use config::{Config, DocumentConfig, GraphConfig, MigrationSettings, TabularConfig};
pub use crate::core::{
    AbstractType, Backend, BackendKind, Classification, ColumnMapping, DataSource,
    FieldDescriptor, JobResult, JobStatus, MigrationJob, MigrationRun, RowRecord,
    SchemaDescriptor, Value,
};
pub use error::{MigrateError, Result};
pub use events::{EventSink, LogEvent, LogLevel, MigrationEvent};
pub use orchestrator::Orchestrator;
pub use report::{MigrationReport, ReportRow};
pub use transfer::{TransferConfig, TransferEngine};
