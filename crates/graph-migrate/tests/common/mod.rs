//! In-memory backend shared by the engine tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use graph_migrate::core::{Backend, BackendKind, DataSource, RowRecord, SchemaDescriptor, Value};
use graph_migrate::typemap;
use graph_migrate::{FieldDescriptor, MigrateError, Result};

type RowPredicate = Box<dyn Fn(&RowRecord) -> bool + Send + Sync>;
type InsertHook = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
struct MockItem {
    /// `None` makes `get_schema` fail with `SchemaUnavailable`.
    schema: Option<SchemaDescriptor>,
    rows: Vec<RowRecord>,
}

/// Backend that keeps everything in memory.
pub struct MockBackend {
    kind: BackendKind,
    items: Mutex<BTreeMap<String, MockItem>>,
    inserted: Mutex<BTreeMap<String, Vec<RowRecord>>>,
    created: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    fail_when: Option<RowPredicate>,
    on_insert: Option<InsertHook>,
    disconnect_after: Option<usize>,
}

impl MockBackend {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            items: Mutex::new(BTreeMap::new()),
            inserted: Mutex::new(BTreeMap::new()),
            created: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail_when: None,
            on_insert: None,
            disconnect_after: None,
        }
    }

    /// Add an item. Field types are taken from the first row; with no rows
    /// every field is `Unknown`.
    pub fn with_item(self, name: &str, columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
        let kind = self.kind;
        let cols = strings(columns);
        let first = rows.first().cloned();
        let fields = cols
            .iter()
            .enumerate()
            .map(|(i, c)| match first.as_ref().and_then(|r| r.get(i)) {
                Some(v) => typemap::sampled_field(kind, c.clone(), v),
                None => typemap::sampled_field(kind, c.clone(), &Value::Null),
            })
            .collect::<Vec<FieldDescriptor>>();
        let item = MockItem {
            schema: Some(SchemaDescriptor::declared(name, kind, fields)),
            rows: rows
                .into_iter()
                .map(|values| RowRecord::from_columns(&cols, values))
                .collect(),
        };
        self.items.lock().unwrap().insert(name.to_string(), item);
        self
    }

    /// Add an item whose schema cannot be determined.
    pub fn with_unavailable_item(self, name: &str) -> Self {
        self.items
            .lock()
            .unwrap()
            .insert(name.to_string(), MockItem::default());
        self
    }

    /// Reject every inserted row matching `pred`.
    pub fn failing_when(mut self, pred: impl Fn(&RowRecord) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Some(Box::new(pred));
        self
    }

    /// Call `hook` with the running attempt count on every insert.
    pub fn on_insert(mut self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_insert = Some(Box::new(hook));
        self
    }

    /// Lose the connection once `n` inserts have been attempted.
    pub fn disconnect_after(mut self, n: usize) -> Self {
        self.disconnect_after = Some(n);
        self
    }

    pub fn into_source(self) -> (Arc<Self>, DataSource) {
        let backend = Arc::new(self);
        let source = DataSource::new(backend.clone());
        (backend, source)
    }

    pub fn inserted(&self, item: &str) -> Vec<RowRecord> {
        self.inserted
            .lock()
            .unwrap()
            .get(item)
            .cloned()
            .unwrap_or_default()
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn list_items(&self) -> Result<Vec<String>> {
        Ok(self.items.lock().unwrap().keys().cloned().collect())
    }

    async fn get_schema(&self, item: &str) -> Result<SchemaDescriptor> {
        let items = self.items.lock().unwrap();
        let entry = items
            .get(item)
            .ok_or_else(|| MigrateError::ItemNotFound(item.to_string()))?;
        entry
            .schema
            .clone()
            .ok_or_else(|| MigrateError::schema_unavailable(item, "no record to sample"))
    }

    async fn get_row_count(&self, item: &str) -> Result<u64> {
        let items = self.items.lock().unwrap();
        items
            .get(item)
            .map(|i| i.rows.len() as u64)
            .ok_or_else(|| MigrateError::ItemNotFound(item.to_string()))
    }

    async fn fetch_rows(&self, item: &str, columns: &[String]) -> Result<Vec<RowRecord>> {
        let items = self.items.lock().unwrap();
        let entry = items
            .get(item)
            .ok_or_else(|| MigrateError::ItemNotFound(item.to_string()))?;
        Ok(entry
            .rows
            .iter()
            .map(|r| RowRecord::from_columns(columns, r.values_for(columns)))
            .collect())
    }

    async fn create_container(&self, item: &str, _schema: &SchemaDescriptor) -> Result<()> {
        let mut created = self.created.lock().unwrap();
        if !created.iter().any(|c| c == item) {
            created.push(item.to_string());
        }
        Ok(())
    }

    async fn insert_row(&self, item: &str, columns: &[String], row: &RowRecord) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.on_insert {
            hook(attempt);
        }
        if self.disconnect_after.is_some_and(|n| attempt > n) {
            return Err(MigrateError::connection("mock", "connection reset"));
        }
        if let Some(pred) = &self.fail_when {
            if pred(row) {
                return Err(MigrateError::insert(item, "rejected by mock"));
            }
        }
        let stored = RowRecord::from_columns(columns, row.values_for(columns));
        self.inserted
            .lock()
            .unwrap()
            .entry(item.to_string())
            .or_default()
            .push(stored);
        Ok(())
    }
}

pub fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// `n` rows of `(id, name)`.
pub fn people(n: i64) -> Vec<Vec<Value>> {
    (1..=n)
        .map(|i| vec![Value::Int(i), Value::from(format!("person {}", i))])
        .collect()
}
