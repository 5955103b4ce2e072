//! Schema metadata shared by every backend.
//!
//! A [`SchemaDescriptor`] is an ordered list of fields. Position matters: the
//! field at index `i` of a source descriptor corresponds to the field at index
//! `i` of the converted target descriptor.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MigrateError, Result};

/// The three supported storage models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Relational store (tables).
    Tabular,
    /// Document store (collections).
    Document,
    /// Property-graph store (node labels).
    Graph,
}

impl BackendKind {
    /// Identifier used in logs and event categories.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Tabular => "tabular",
            BackendKind::Document => "document",
            BackendKind::Graph => "graph",
        }
    }

    /// What an item is called on this backend.
    pub fn item_noun(&self) -> &'static str {
        match self {
            BackendKind::Tabular => "table",
            BackendKind::Document => "collection",
            BackendKind::Graph => "label",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tabular" | "postgres" | "postgresql" | "pg" => Ok(BackendKind::Tabular),
            "document" | "mongodb" | "mongo" => Ok(BackendKind::Document),
            "graph" | "neo4j" => Ok(BackendKind::Graph),
            other => Err(MigrateError::Config(format!(
                "Unknown backend: '{}'. Supported backends: tabular, document, graph",
                other
            ))),
        }
    }
}

/// Backend-neutral field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbstractType {
    Int,
    Float,
    String,
    Bool,
    DateTime,
    Decimal,
    Unknown,
}

impl fmt::Display for AbstractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AbstractType::Int => "int",
            AbstractType::Float => "float",
            AbstractType::String => "string",
            AbstractType::Bool => "bool",
            AbstractType::DateTime => "datetime",
            AbstractType::Decimal => "decimal",
            AbstractType::Unknown => "unknown",
        };
        f.pad(s)
    }
}

/// One field of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field (column / key / property) name.
    pub name: String,

    /// Backend-neutral type.
    pub abstract_type: AbstractType,

    /// Type spelling on the backend this descriptor belongs to
    /// (e.g. "numeric", "Int64", "Integer").
    pub native_type: String,
}

impl FieldDescriptor {
    pub fn new(
        name: impl Into<String>,
        abstract_type: AbstractType,
        native_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            abstract_type,
            native_type: native_type.into(),
        }
    }
}

/// Ordered field/type listing for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    /// Item name (table, collection or label).
    pub item: String,

    /// Backend the native type spellings belong to.
    pub backend: BackendKind,

    /// Fields in source order.
    pub fields: Vec<FieldDescriptor>,

    /// True when the fields were inferred from a single sampled record
    /// rather than read from a declared catalog.
    pub sampled: bool,
}

impl SchemaDescriptor {
    /// Create a descriptor from a declared catalog.
    pub fn declared(
        item: impl Into<String>,
        backend: BackendKind,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            item: item.into(),
            backend,
            fields,
            sampled: false,
        }
    }

    /// Create a descriptor inferred from one sampled record.
    pub fn sampled(
        item: impl Into<String>,
        backend: BackendKind,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            item: item.into(),
            backend,
            fields,
            sampled: true,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Field names in order.
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Look up a field by exact name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Keep only the named fields, in the order given, renaming each to the
    /// paired target name.
    ///
    /// Fields absent from the descriptor are carried as `Unknown`.
    pub fn project(&self, pairs: &[(String, String)]) -> SchemaDescriptor {
        let fields = pairs
            .iter()
            .map(|(source, target)| match self.field(source) {
                Some(f) => FieldDescriptor::new(target.clone(), f.abstract_type, f.native_type.clone()),
                None => FieldDescriptor::new(target.clone(), AbstractType::Unknown, "unknown"),
            })
            .collect();

        SchemaDescriptor {
            item: self.item.clone(),
            backend: self.backend,
            fields,
            sampled: self.sampled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> SchemaDescriptor {
        SchemaDescriptor::declared(
            "users",
            BackendKind::Tabular,
            vec![
                FieldDescriptor::new("id", AbstractType::Int, "integer"),
                FieldDescriptor::new("name", AbstractType::String, "text"),
                FieldDescriptor::new("balance", AbstractType::Decimal, "numeric"),
            ],
        )
    }

    #[test]
    fn test_backend_kind_parsing() {
        assert_eq!("tabular".parse::<BackendKind>().unwrap(), BackendKind::Tabular);
        assert_eq!("PostgreSQL".parse::<BackendKind>().unwrap(), BackendKind::Tabular);
        assert_eq!("mongodb".parse::<BackendKind>().unwrap(), BackendKind::Document);
        assert_eq!("neo4j".parse::<BackendKind>().unwrap(), BackendKind::Graph);
        assert!("oracle".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_field_names_preserve_order() {
        assert_eq!(users().field_names(), vec!["id", "name", "balance"]);
    }

    #[test]
    fn test_project_renames_positionally() {
        let projected = users().project(&[
            ("balance".to_string(), "amount".to_string()),
            ("id".to_string(), "user_id".to_string()),
        ]);
        assert_eq!(projected.field_names(), vec!["amount", "user_id"]);
        assert_eq!(projected.fields[0].abstract_type, AbstractType::Decimal);
        assert_eq!(projected.fields[1].abstract_type, AbstractType::Int);
    }

    #[test]
    fn test_project_unknown_field() {
        let projected = users().project(&[("email".to_string(), "email".to_string())]);
        assert_eq!(projected.fields[0].abstract_type, AbstractType::Unknown);
    }
}
