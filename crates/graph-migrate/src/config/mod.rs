//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::core::schema::BackendKind;
use crate::error::{MigrateError, Result};
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Override the source/target backends (e.g. from command-line flags)
    /// and re-validate.
    pub fn with_backends(
        mut self,
        source: Option<BackendKind>,
        target: Option<BackendKind>,
    ) -> Result<Self> {
        if source.is_some() {
            self.migration.source = source;
        }
        if target.is_some() {
            self.migration.target = target;
        }
        self.validate()?;
        Ok(self)
    }

    /// Backend rows are read from.
    pub fn source_kind(&self) -> Result<BackendKind> {
        self.migration.source.ok_or_else(|| {
            MigrateError::Config("migration.source is required (or pass --source)".into())
        })
    }

    /// Backend rows are written to.
    pub fn target_kind(&self) -> Result<BackendKind> {
        self.migration.target.ok_or_else(|| {
            MigrateError::Config("migration.target is required (or pass --target)".into())
        })
    }

    /// Whether the connection section for `kind` is present.
    pub fn has_section(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Tabular => self.tabular.is_some(),
            BackendKind::Document => self.document.is_some(),
            BackendKind::Graph => self.graph.is_some(),
        }
    }

    /// Backends with a connection section, in a fixed order.
    pub fn configured_backends(&self) -> Vec<BackendKind> {
        [BackendKind::Tabular, BackendKind::Document, BackendKind::Graph]
            .into_iter()
            .filter(|k| self.has_section(*k))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
tabular:
  host: localhost
  database: shop
  user: postgres
  password: secret
graph:
  uri: 127.0.0.1:7687
  user: neo4j
  password: secret
migration:
  source: tabular
  target: graph
"#;

    #[test]
    fn test_from_yaml_with_defaults() {
        let config = Config::from_yaml(YAML).unwrap();
        let tabular = config.tabular.as_ref().unwrap();
        assert_eq!(tabular.port, 5432);
        assert_eq!(tabular.schema, "public");
        assert_eq!(config.migration.checkpoint_interval, 100);
        assert_eq!(config.source_kind().unwrap(), BackendKind::Tabular);
        assert_eq!(config.target_kind().unwrap(), BackendKind::Graph);
        assert_eq!(
            config.configured_backends(),
            vec![BackendKind::Tabular, BackendKind::Graph]
        );
    }

    #[test]
    fn test_override_requires_section() {
        let config = Config::from_yaml(YAML).unwrap();
        let err = config
            .with_backends(None, Some(BackendKind::Document))
            .unwrap_err();
        assert!(err.to_string().contains("document"));
    }

    #[test]
    fn test_checkpoint_interval_override() {
        let yaml = YAML.replace("source: tabular", "source: tabular\n  checkpoint_interval: 10");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.migration.checkpoint_interval, 10);
    }

    #[test]
    fn test_missing_kinds_reported() {
        let config = Config::default();
        assert!(config.source_kind().is_err());
        assert!(config.target_kind().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/graph-migrate.yaml").unwrap_err();
        assert!(matches!(err, MigrateError::Io(_)));
    }
}
