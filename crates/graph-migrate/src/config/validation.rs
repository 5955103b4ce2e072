//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Connection sections, when present
    if let Some(t) = &config.tabular {
        if t.host.is_empty() {
            return Err(MigrateError::Config("tabular.host is required".into()));
        }
        if t.database.is_empty() {
            return Err(MigrateError::Config("tabular.database is required".into()));
        }
        if t.user.is_empty() {
            return Err(MigrateError::Config("tabular.user is required".into()));
        }
        if t.schema.is_empty() {
            return Err(MigrateError::Config("tabular.schema must not be empty".into()));
        }
        if t.max_connections == 0 {
            return Err(MigrateError::Config(
                "tabular.max_connections must be at least 1".into(),
            ));
        }
    }
    if let Some(d) = &config.document {
        if d.uri.is_empty() {
            return Err(MigrateError::Config("document.uri is required".into()));
        }
        if d.database.is_empty() {
            return Err(MigrateError::Config("document.database is required".into()));
        }
    }
    if let Some(g) = &config.graph {
        if g.uri.is_empty() {
            return Err(MigrateError::Config("graph.uri is required".into()));
        }
        if g.user.is_empty() {
            return Err(MigrateError::Config("graph.user is required".into()));
        }
    }

    // Selected backends need their section
    for (role, kind) in [
        ("source", config.migration.source),
        ("target", config.migration.target),
    ] {
        if let Some(kind) = kind {
            if !config.has_section(kind) {
                return Err(MigrateError::Config(format!(
                    "migration.{} is {} but the '{}' section is missing",
                    role,
                    kind,
                    kind.name()
                )));
            }
        }
    }

    if config.migration.checkpoint_interval == 0 {
        return Err(MigrateError::Config(
            "migration.checkpoint_interval must be at least 1".into(),
        ));
    }
    if config.migration.event_buffer == 0 {
        return Err(MigrateError::Config(
            "migration.event_buffer must be at least 1".into(),
        ));
    }

    Ok(())
}
