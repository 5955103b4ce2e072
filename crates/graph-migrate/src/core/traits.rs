//! The backend capability set consumed by the engine.
//!
//! Each [`BackendKind`] has exactly one implementation of [`Backend`] in the
//! `drivers` module. The engine selects it once per [`DataSource`] and never
//! branches on the backend kind again while moving rows.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

use super::schema::{BackendKind, SchemaDescriptor};
use super::value::RowRecord;

/// Read and write operations the migration engine needs from a store.
///
/// Connection lifecycle and credentials belong to whoever constructs the
/// implementation; the engine only calls these operations.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend kind of this implementation.
    fn kind(&self) -> BackendKind;

    /// Every item (table, collection, label) in the catalog.
    async fn list_items(&self) -> Result<Vec<String>>;

    /// Field/type descriptor for one item.
    ///
    /// Fails with `ItemNotFound` when the item does not exist and with
    /// `SchemaUnavailable` when no record exists to sample.
    async fn get_schema(&self, item: &str) -> Result<SchemaDescriptor>;

    /// Number of records in an item.
    async fn get_row_count(&self, item: &str) -> Result<u64>;

    /// All rows of an item restricted to `columns`, in source iteration order.
    async fn fetch_rows(&self, item: &str, columns: &[String]) -> Result<Vec<RowRecord>>;

    /// Make sure `item` exists with a layout compatible with `schema`.
    ///
    /// Must be safe to call when the container already exists.
    async fn create_container(&self, item: &str, schema: &SchemaDescriptor) -> Result<()>;

    /// Insert one already-normalized row.
    async fn insert_row(&self, item: &str, columns: &[String], row: &RowRecord) -> Result<()>;

    /// Release the underlying connection.
    async fn close(&self) {}
}

/// An open connection to one backend, shared by the components of a run.
#[derive(Clone)]
pub struct DataSource {
    kind: BackendKind,
    backend: Arc<dyn Backend>,
}

impl DataSource {
    /// Wrap a backend implementation.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            kind: backend.kind(),
            backend,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Close the connection.
    pub async fn close(&self) {
        self.backend.close().await;
    }
}

impl std::fmt::Debug for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSource").field("kind", &self.kind).finish()
    }
}

impl std::ops::Deref for DataSource {
    type Target = dyn Backend;

    fn deref(&self) -> &Self::Target {
        self.backend.as_ref()
    }
}
