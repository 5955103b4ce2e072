//! Backend driver implementations.
//!
//! One [`Backend`](crate::core::Backend) implementation per [`BackendKind`]:
//!
//! - [`tabular`]: PostgreSQL (tokio-postgres + deadpool-postgres)
//! - [`document`]: MongoDB
//! - [`graph`]: Neo4j
//! - [`common`]: shared helpers (TLS, identifier quoting)
//!
//! [`connect`] is the only place that branches on the backend kind; the
//! engine works on the resulting [`DataSource`] from then on.

pub mod common;
pub mod document;
pub mod graph;
pub mod tabular;

pub use common::SslMode;
pub use document::DocumentBackend;
pub use graph::GraphBackend;
pub use tabular::TabularBackend;

use std::sync::Arc;

use crate::config::Config;
use crate::core::schema::BackendKind;
use crate::core::traits::DataSource;
use crate::error::{MigrateError, Result};

/// Open a connection to the backend of the given kind.
pub async fn connect(kind: BackendKind, config: &Config) -> Result<DataSource> {
    let missing = || MigrateError::Config(format!("no '{}' section in configuration", kind.name()));

    let source = match kind {
        BackendKind::Tabular => {
            let c = config.tabular.as_ref().ok_or_else(missing)?;
            DataSource::new(Arc::new(TabularBackend::connect(c).await?))
        }
        BackendKind::Document => {
            let c = config.document.as_ref().ok_or_else(missing)?;
            DataSource::new(Arc::new(DocumentBackend::connect(c).await?))
        }
        BackendKind::Graph => {
            let c = config.graph.as_ref().ok_or_else(missing)?;
            DataSource::new(Arc::new(GraphBackend::connect(c).await?))
        }
    };
    Ok(source)
}
