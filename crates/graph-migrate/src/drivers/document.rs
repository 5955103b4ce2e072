//! Document backend: MongoDB.
//!
//! Collections have no declared schema, so [`get_schema`](Backend::get_schema)
//! samples the first document. The `_id` field is never migrated.

use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::{Client, Collection, Database};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::DocumentConfig;
use crate::core::schema::{BackendKind, SchemaDescriptor};
use crate::core::traits::Backend;
use crate::core::value::{RowRecord, Value};
use crate::error::{MigrateError, Result};
use crate::typemap;

use super::common::ensure_decoded;

/// Server error code for "collection already exists".
const NAMESPACE_EXISTS: i32 = 48;

/// Field holding the document key.
const ID_FIELD: &str = "_id";

/// MongoDB implementation of [`Backend`].
pub struct DocumentBackend {
    client: Client,
    db: Database,
}

impl DocumentBackend {
    /// Connect and check the server with `ping`.
    pub async fn connect(config: &DocumentConfig) -> Result<Self> {
        let client = Client::with_uri_str(&config.uri)
            .await
            .map_err(|e| MigrateError::connection("document", e))?;
        let db = client.database(&config.database);
        db.run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| MigrateError::connection("document", e))?;

        info!("Connected to MongoDB database {}", config.database);
        Ok(Self { client, db })
    }

    fn collection(&self, item: &str) -> Collection<Document> {
        self.db.collection::<Document>(item)
    }

    async fn ensure_exists(&self, item: &str) -> Result<()> {
        let names = self.list_items().await?;
        if names.iter().any(|n| n == item) {
            Ok(())
        } else {
            Err(MigrateError::ItemNotFound(format!("collection {}", item)))
        }
    }
}

#[async_trait]
impl Backend for DocumentBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }

    async fn list_items(&self) -> Result<Vec<String>> {
        let mut names = self
            .db
            .list_collection_names()
            .await
            .map_err(|e| MigrateError::connection("document", e))?;
        names.sort();
        Ok(names)
    }

    async fn get_schema(&self, item: &str) -> Result<SchemaDescriptor> {
        self.ensure_exists(item).await?;

        let sample = self
            .collection(item)
            .find_one(doc! {})
            .await
            .map_err(|e| MigrateError::connection("document", e))?
            .ok_or_else(|| MigrateError::schema_unavailable(item, "collection has no documents"))?;

        let fields = sample
            .iter()
            .filter(|(k, _)| k.as_str() != ID_FIELD)
            .map(|(k, v)| typemap::sampled_field(BackendKind::Document, k.clone(), &bson_to_value(v)))
            .collect();
        Ok(SchemaDescriptor::sampled(item, BackendKind::Document, fields))
    }

    async fn get_row_count(&self, item: &str) -> Result<u64> {
        self.ensure_exists(item).await?;
        self.collection(item)
            .count_documents(doc! {})
            .await
            .map_err(|e| MigrateError::connection("document", e))
    }

    async fn fetch_rows(&self, item: &str, columns: &[String]) -> Result<Vec<RowRecord>> {
        self.ensure_exists(item).await?;

        let mut cursor = self
            .collection(item)
            .find(doc! {})
            .projection(projection(columns))
            .await
            .map_err(|e| MigrateError::connection("document", e))?;

        let mut rows = Vec::new();
        while let Some(document) = cursor
            .try_next()
            .await
            .map_err(|e| MigrateError::connection("document", e))?
        {
            rows.push(document_to_row(&document, columns));
        }
        Ok(rows)
    }

    async fn create_container(&self, item: &str, _schema: &SchemaDescriptor) -> Result<()> {
        match self.db.create_collection(item).await {
            Ok(()) => {
                info!("Created collection {}", item);
                Ok(())
            }
            Err(e) if is_namespace_exists(&e) => {
                debug!("Collection {} already exists", item);
                Ok(())
            }
            Err(e) => Err(MigrateError::provisioning(item, e)),
        }
    }

    async fn insert_row(&self, item: &str, columns: &[String], row: &RowRecord) -> Result<()> {
        ensure_decoded(row)?;
        let document = row_to_document(row, columns);
        self.collection(item)
            .insert_one(document)
            .await
            .map_err(|e| MigrateError::insert(item, e))?;
        Ok(())
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}

fn is_namespace_exists(e: &mongodb::error::Error) -> bool {
    matches!(e.kind.as_ref(), ErrorKind::Command(c) if c.code == NAMESPACE_EXISTS)
}

/// Include the requested fields, exclude `_id`.
fn projection(columns: &[String]) -> Document {
    let mut p = doc! { "_id": 0 };
    for c in columns.iter().filter(|c| c.as_str() != ID_FIELD) {
        p.insert(c.clone(), 1);
    }
    p
}

/// A field missing from the document reads as NULL.
fn document_to_row(document: &Document, columns: &[String]) -> RowRecord {
    columns
        .iter()
        .map(|c| {
            let value = document.get(c).map(bson_to_value).unwrap_or(Value::Null);
            (c.clone(), value)
        })
        .collect()
}

fn row_to_document(row: &RowRecord, columns: &[String]) -> Document {
    let mut document = Document::new();
    for c in columns {
        let value = row.get(c).cloned().unwrap_or(Value::Null);
        document.insert(c.clone(), value_to_bson(value));
    }
    document
}

/// Decode a BSON element. Nested documents and arrays become relaxed
/// extended JSON text. A decimal or date outside the canonical range is
/// [`Value::Unsupported`].
fn bson_to_value(b: &Bson) -> Value {
    match b {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(v) => Value::Bool(*v),
        Bson::Int32(v) => Value::Int(*v as i64),
        Bson::Int64(v) => Value::Int(*v),
        Bson::Double(v) => Value::Float(*v),
        Bson::String(s) => Value::Text(s.clone()),
        Bson::Decimal128(d) => {
            let text = d.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map(Value::Decimal)
                .unwrap_or_else(|e| {
                    Value::Unsupported(format!("cannot decode decimal {}: {}", text, e))
                })
        }
        Bson::DateTime(dt) => chrono::DateTime::from_timestamp_millis(dt.timestamp_millis())
            .map(|d| Value::DateTimeTz(d.fixed_offset()))
            .unwrap_or_else(|| {
                Value::Unsupported(format!("datetime {}ms is out of range", dt.timestamp_millis()))
            }),
        Bson::ObjectId(oid) => Value::Text(oid.to_hex()),
        Bson::Document(_) | Bson::Array(_) => {
            Value::Text(b.clone().into_relaxed_extjson().to_string())
        }
        other => Value::Text(other.to_string()),
    }
}

/// Encode a normalized value.
fn value_to_bson(v: Value) -> Bson {
    match v {
        Value::Null | Value::Unsupported(_) => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Int(n) => Bson::Int64(n),
        Value::Float(f) => Bson::Double(f),
        Value::Text(s) => Bson::String(s),
        Value::Decimal(d) => d
            .to_f64()
            .map(Bson::Double)
            .unwrap_or_else(|| Bson::String(d.to_string())),
        Value::Date(d) => millis(d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis()),
        Value::DateTime(dt) => millis(dt.and_utc().timestamp_millis()),
        Value::DateTimeTz(dt) => millis(dt.timestamp_millis()),
    }
}

fn millis(ms: i64) -> Bson {
    Bson::DateTime(mongodb::bson::DateTime::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_projection_excludes_id() {
        let p = projection(&cols(&["name", "_id", "age"]));
        assert_eq!(p, doc! { "_id": 0, "name": 1, "age": 1 });
    }

    #[test]
    fn test_missing_field_reads_null() {
        let d = doc! { "name": "ada" };
        let row = document_to_row(&d, &cols(&["name", "age"]));
        assert_eq!(row.get("name"), Some(&Value::from("ada")));
        assert_eq!(row.get("age"), Some(&Value::Null));
    }

    #[test]
    fn test_bson_scalars() {
        assert_eq!(bson_to_value(&Bson::Int32(5)), Value::Int(5));
        assert_eq!(bson_to_value(&Bson::Double(1.5)), Value::Float(1.5));
        assert_eq!(bson_to_value(&Bson::Boolean(true)), Value::Bool(true));
        assert_eq!(bson_to_value(&Bson::Null), Value::Null);
    }

    #[test]
    fn test_bson_datetime_is_utc() {
        let b = millis(1_700_000_000_000);
        match bson_to_value(&b) {
            Value::DateTimeTz(dt) => {
                assert_eq!(dt.timestamp_millis(), 1_700_000_000_000);
                assert_eq!(dt.offset().local_minus_utc(), 0);
            }
            other => panic!("expected timestamp, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_values_are_unsupported() {
        // 1E+40 in BID layout: coefficient 1, biased exponent 6176 + 40.
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&1u64.to_le_bytes());
        bytes[8..].copy_from_slice(&((6176u64 + 40) << 49).to_le_bytes());
        let huge = mongodb::bson::Decimal128::from_bytes(bytes);
        assert!(matches!(bson_to_value(&Bson::Decimal128(huge)), Value::Unsupported(_)));

        let far = Bson::DateTime(mongodb::bson::DateTime::from_millis(i64::MAX));
        assert!(matches!(bson_to_value(&far), Value::Unsupported(_)));
    }

    #[test]
    fn test_nested_document_becomes_text() {
        let b = Bson::Document(doc! { "city": "Oslo" });
        match bson_to_value(&b) {
            Value::Text(s) => assert!(s.contains("Oslo")),
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_row_to_document_keeps_column_order() {
        let tz = chrono::FixedOffset::east_opt(0).unwrap();
        let when = tz.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let row = RowRecord::from_columns(
            &cols(&["b", "a"]),
            vec![Value::DateTimeTz(when), Value::Int(1)],
        );
        let d = row_to_document(&row, &cols(&["b", "a"]));
        let keys: Vec<&String> = d.keys().collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(d.get("a"), Some(&Bson::Int64(1)));
        assert_eq!(
            d.get("b"),
            Some(&Bson::DateTime(mongodb::bson::DateTime::from_millis(
                when.timestamp_millis()
            )))
        );
    }
}
