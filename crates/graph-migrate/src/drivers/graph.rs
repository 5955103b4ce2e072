//! Graph backend: Neo4j over Bolt.
//!
//! An item is a node label and a row is one node's properties. Labels exist
//! as soon as a node carries them, so provisioning does nothing.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use neo4rs::{query, BoltNull, BoltType, Graph, Node, Query, Row};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::GraphConfig;
use crate::core::schema::{BackendKind, SchemaDescriptor};
use crate::core::traits::Backend;
use crate::core::value::{RowRecord, Value};
use crate::error::{MigrateError, Result};
use crate::typemap;

use super::common::{ensure_decoded, quote_ident};

/// Neo4j implementation of [`Backend`].
pub struct GraphBackend {
    graph: Graph,
}

impl GraphBackend {
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.password)
            .await
            .map_err(|e| MigrateError::connection("graph", format!("Failed to connect to Neo4j: {}", e)))?;
        graph
            .run(query("RETURN 1"))
            .await
            .map_err(|e| MigrateError::connection("graph", e))?;

        info!("Connected to Neo4j at {}", config.uri);
        Ok(Self { graph })
    }

    /// Run a read query and collect every row.
    async fn fetch(&self, q: Query) -> Result<Vec<Row>> {
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| MigrateError::connection("graph", e))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| MigrateError::connection("graph", e))?
        {
            rows.push(row);
        }
        Ok(rows)
    }

    async fn ensure_exists(&self, label: &str) -> Result<()> {
        if self.list_items().await?.iter().any(|l| l == label) {
            Ok(())
        } else {
            Err(MigrateError::ItemNotFound(format!("label {}", label)))
        }
    }
}

#[async_trait]
impl Backend for GraphBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Graph
    }

    async fn list_items(&self) -> Result<Vec<String>> {
        let rows = self.fetch(query("CALL db.labels() YIELD label RETURN label")).await?;
        let mut labels: Vec<String> = rows
            .iter()
            .filter_map(|r| r.get::<String>("label").ok())
            .collect();
        labels.sort();
        Ok(labels)
    }

    async fn get_schema(&self, item: &str) -> Result<SchemaDescriptor> {
        self.ensure_exists(item).await?;

        let cypher = format!("MATCH (n:{}) RETURN n LIMIT 1", quote_ident(item, '`'));
        let rows = self.fetch(query(&cypher)).await?;
        let node: Node = rows
            .first()
            .and_then(|r| r.get::<Node>("n").ok())
            .ok_or_else(|| MigrateError::schema_unavailable(item, "no node carries this label"))?;

        // Property maps are unordered; sort for a stable column order.
        let mut keys: Vec<String> = node.keys().into_iter().map(str::to_string).collect();
        keys.sort();

        let fields = keys
            .into_iter()
            .map(|k| {
                let value = read_property(&node, &k);
                typemap::sampled_field(BackendKind::Graph, k, &value)
            })
            .collect();
        Ok(SchemaDescriptor::sampled(item, BackendKind::Graph, fields))
    }

    async fn get_row_count(&self, item: &str) -> Result<u64> {
        self.ensure_exists(item).await?;
        let cypher = format!("MATCH (n:{}) RETURN count(n) AS count", quote_ident(item, '`'));
        let rows = self.fetch(query(&cypher)).await?;
        let count = rows
            .first()
            .and_then(|r| r.get::<i64>("count").ok())
            .unwrap_or(0);
        Ok(count.max(0) as u64)
    }

    async fn fetch_rows(&self, item: &str, columns: &[String]) -> Result<Vec<RowRecord>> {
        self.ensure_exists(item).await?;
        let rows = self.fetch(query(&build_match_cypher(item, columns))).await?;
        Ok(rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), read_property(row, c)))
                    .collect()
            })
            .collect())
    }

    async fn create_container(&self, item: &str, _schema: &SchemaDescriptor) -> Result<()> {
        debug!("Label {} needs no provisioning", item);
        Ok(())
    }

    async fn insert_row(&self, item: &str, columns: &[String], row: &RowRecord) -> Result<()> {
        ensure_decoded(row)?;
        let mut q = query(&build_create_cypher(item, columns));
        for (i, value) in row.values_for(columns).into_iter().enumerate() {
            q = q.param(&format!("p{}", i), value_to_bolt(value));
        }
        self.graph
            .run(q)
            .await
            .map_err(|e| MigrateError::insert(item, e))
    }
}

fn build_match_cypher(label: &str, columns: &[String]) -> String {
    let returns: Vec<String> = columns
        .iter()
        .map(|c| {
            let q = quote_ident(c, '`');
            format!("n.{} AS {}", q, q)
        })
        .collect();
    format!(
        "MATCH (n:{}) RETURN {}",
        quote_ident(label, '`'),
        returns.join(", ")
    )
}

fn build_create_cypher(label: &str, columns: &[String]) -> String {
    let props: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}: $p{}", quote_ident(c, '`'), i))
        .collect();
    format!("CREATE (:{} {{{}}})", quote_ident(label, '`'), props.join(", "))
}

/// Anything properties can be read from by key.
trait Properties {
    fn property<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, String>;
}

impl Properties for Node {
    fn property<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, String> {
        self.get::<T>(key).map_err(|e| e.to_string())
    }
}

impl Properties for Row {
    fn property<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, String> {
        self.get::<T>(key).map_err(|e| e.to_string())
    }
}

/// Decode one property. Temporal values are re-read through chrono;
/// structural values (lists, maps, points) become their debug text.
/// A missing property is NULL.
fn read_property(src: &impl Properties, key: &str) -> Value {
    match src.property::<BoltType>(key) {
        Err(_) | Ok(BoltType::Null(_)) => Value::Null,
        Ok(BoltType::Boolean(b)) => Value::Bool(b.value),
        Ok(BoltType::Integer(i)) => Value::Int(i.value),
        Ok(BoltType::Float(f)) => Value::Float(f.value),
        Ok(BoltType::String(s)) => Value::Text(s.value),
        Ok(BoltType::Date(_)) => temporal(src.property::<NaiveDate>(key), "date"),
        Ok(BoltType::LocalDateTime(_)) => {
            temporal(src.property::<NaiveDateTime>(key), "local datetime")
        }
        Ok(BoltType::DateTime(_)) | Ok(BoltType::DateTimeZoneId(_)) => {
            temporal(src.property::<DateTime<FixedOffset>>(key), "datetime")
        }
        Ok(other) => Value::Text(format!("{:?}", other)),
    }
}

/// A temporal property chrono cannot represent is unsupported, not NULL.
fn temporal<T: Into<Value>>(decoded: std::result::Result<T, String>, kind: &str) -> Value {
    match decoded {
        Ok(v) => v.into(),
        Err(e) => Value::Unsupported(format!("cannot decode {} property: {}", kind, e)),
    }
}

/// Encode a normalized value as a query parameter.
fn value_to_bolt(value: Value) -> BoltType {
    match value {
        Value::Null | Value::Unsupported(_) => BoltType::Null(BoltNull),
        Value::Bool(b) => b.into(),
        Value::Int(n) => n.into(),
        Value::Float(f) => f.into(),
        Value::Text(s) => s.into(),
        Value::Decimal(d) => d.to_string().into(),
        Value::Date(d) => d.into(),
        Value::DateTime(dt) => dt.into(),
        Value::DateTimeTz(dt) => dt.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_match_cypher() {
        assert_eq!(
            build_match_cypher("Person", &cols(&["name", "born"])),
            "MATCH (n:`Person`) RETURN n.`name` AS `name`, n.`born` AS `born`"
        );
    }

    #[test]
    fn test_create_cypher() {
        assert_eq!(
            build_create_cypher("User", &cols(&["id", "first name"])),
            "CREATE (:`User` {`id`: $p0, `first name`: $p1})"
        );
    }

    #[test]
    fn test_undecodable_temporal_is_unsupported() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(temporal(Ok(date), "date"), Value::Date(date));

        match temporal::<NaiveDate>(Err("year out of range".into()), "date") {
            Value::Unsupported(reason) => assert!(reason.contains("year out of range")),
            other => panic!("expected unsupported, got {:?}", other),
        }
    }

    #[test]
    fn test_value_to_bolt_scalars() {
        assert!(matches!(value_to_bolt(Value::Int(10)), BoltType::Integer(i) if i.value == 10));
        assert!(matches!(value_to_bolt(Value::Float(10.5)), BoltType::Float(f) if f.value == 10.5));
        assert!(matches!(value_to_bolt(Value::Null), BoltType::Null(_)));
        assert!(matches!(value_to_bolt(Value::from("x")), BoltType::String(_)));
    }
}
