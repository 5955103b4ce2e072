//! Target provisioning.
//!
//! Provisioning runs once per job, after schema conversion and before any row
//! moves. Any failure here is fatal for the job and is surfaced as
//! [`MigrateError::Provisioning`] unless the driver already reported a
//! connection-level problem.

use tracing::debug;

use crate::core::schema::SchemaDescriptor;
use crate::core::traits::DataSource;
use crate::error::{MigrateError, Result};

/// Make sure `item` exists on the target with a layout compatible with
/// `schema` (the descriptor already converted for the target backend).
pub async fn ensure_target(target: &DataSource, item: &str, schema: &SchemaDescriptor) -> Result<()> {
    if schema.backend != target.kind() {
        return Err(MigrateError::provisioning(
            item,
            format!(
                "descriptor is for {} but target is {}",
                schema.backend,
                target.kind()
            ),
        ));
    }

    debug!(
        "Provisioning {} {} with {} fields",
        target.kind().item_noun(),
        item,
        schema.len()
    );

    target.create_container(item, schema).await.map_err(|e| match e {
        e @ (MigrateError::Provisioning { .. } | MigrateError::Connection { .. }) => e,
        other => MigrateError::provisioning(item, other),
    })
}
