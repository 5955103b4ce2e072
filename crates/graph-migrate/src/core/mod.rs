//! Core abstractions for backend-agnostic migration.
//!
//! - [`schema`]: backend kinds, abstract types and schema descriptors
//! - [`value`]: canonical values and row records
//! - [`traits`]: the [`Backend`] capability trait and [`DataSource`] handle
//! - [`job`]: migration jobs and their lifecycle
//! - [`result`]: per-job results and the aggregated run
//!
//! Drivers in `drivers/` implement [`Backend`] once per [`BackendKind`]; the
//! engine modules only ever see the trait.

pub mod job;
pub mod result;
pub mod schema;
pub mod traits;
pub mod value;

pub use job::{ColumnMapping, JobStatus, MigrationJob};
pub use result::{Classification, JobResult, MigrationRun};
pub use schema::{AbstractType, BackendKind, FieldDescriptor, SchemaDescriptor};
pub use traits::{Backend, DataSource};
pub use value::{RowRecord, Value};
