//! Tabular backend: PostgreSQL through a deadpool-postgres pool.
//!
//! Values are bound as text and cast on the server (`$1::text::bigint`),
//! NULLs are written as literals so the column type decides.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::types::ToSql;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use crate::config::TabularConfig;
use crate::core::schema::{AbstractType, BackendKind, FieldDescriptor, SchemaDescriptor};
use crate::core::traits::Backend;
use crate::core::value::{RowRecord, Value};
use crate::error::{MigrateError, Result};
use crate::typemap;

use super::common::{ensure_decoded, make_connector, quote_ident};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Column types decoded natively; everything else is read as `::text`.
const NATIVE_TYPES: &[&str] = &[
    "boolean",
    "smallint",
    "integer",
    "bigint",
    "real",
    "double precision",
    "numeric",
    "text",
    "character varying",
    "character",
    "date",
    "timestamp without time zone",
    "timestamp with time zone",
];

/// PostgreSQL implementation of [`Backend`].
pub struct TabularBackend {
    pool: Pool,
    schema: String,
}

impl TabularBackend {
    /// Open a pool and check it with `SELECT 1`.
    pub async fn connect(config: &TabularConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        // Canonical timestamps are UTC; keep the session in UTC so
        // TIMESTAMP columns receive the same wall clock.
        pg_config.options("-c TimeZone=UTC");
        pg_config.keepalives(true);
        pg_config.connect_timeout(POOL_CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let pool = match make_connector(config.ssl_mode)? {
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                let mgr = Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating tabular pool"))?
            }
            Some(tls) => {
                let mgr = Manager::from_config(pg_config, tls, mgr_config);
                Pool::builder(mgr)
                    .max_size(config.max_connections)
                    .build()
                    .map_err(|e| MigrateError::pool(e, "creating tabular pool"))?
            }
        };

        let backend = Self {
            pool,
            schema: config.schema.clone(),
        };
        let client = backend.client().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection("tabular", e))?;

        info!(
            "Connected to PostgreSQL: {}:{}/{} (schema {})",
            config.host, config.port, config.database, config.schema
        );
        Ok(backend)
    }

    async fn client(&self) -> Result<Object> {
        self.pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "acquiring tabular connection"))
    }

    fn qualify(&self, item: &str) -> String {
        format!("{}.{}", quote_ident(&self.schema, '"'), quote_ident(item, '"'))
    }

    async fn item_exists(&self, item: &str) -> Result<bool> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = $1::text AND table_name = $2::text",
                &[&self.schema, &item],
            )
            .await
            .map_err(|e| MigrateError::connection("tabular", e))?;
        Ok(row.is_some())
    }

    /// (column name, declared data type) in ordinal order.
    async fn columns(&self, item: &str) -> Result<Vec<(String, String)>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT column_name::text, data_type::text FROM information_schema.columns \
                 WHERE table_schema = $1::text AND table_name = $2::text \
                 ORDER BY ordinal_position",
                &[&self.schema, &item],
            )
            .await
            .map_err(|e| MigrateError::connection("tabular", e))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row
                .try_get(0)
                .map_err(|e| MigrateError::connection("tabular", e))?;
            let data_type: String = row
                .try_get(1)
                .map_err(|e| MigrateError::connection("tabular", e))?;
            out.push((name, data_type));
        }
        Ok(out)
    }
}

#[async_trait]
impl Backend for TabularBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Tabular
    }

    async fn list_items(&self) -> Result<Vec<String>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT table_name::text FROM information_schema.tables \
                 WHERE table_schema = $1::text AND table_type = 'BASE TABLE' \
                 ORDER BY table_name",
                &[&self.schema],
            )
            .await
            .map_err(|e| MigrateError::connection("tabular", e))?;

        rows.iter()
            .map(|r| r.try_get::<_, String>(0).map_err(|e| MigrateError::connection("tabular", e)))
            .collect()
    }

    async fn get_schema(&self, item: &str) -> Result<SchemaDescriptor> {
        let columns = self.columns(item).await?;
        if columns.is_empty() {
            if self.item_exists(item).await? {
                return Err(MigrateError::schema_unavailable(item, "table has no columns"));
            }
            return Err(MigrateError::ItemNotFound(format!("table {}", self.qualify(item))));
        }

        let fields = columns
            .into_iter()
            .map(|(name, data_type)| {
                let abstract_type = typemap::from_declared(&data_type);
                FieldDescriptor::new(name, abstract_type, data_type)
            })
            .collect();
        Ok(SchemaDescriptor::declared(item, BackendKind::Tabular, fields))
    }

    async fn get_row_count(&self, item: &str) -> Result<u64> {
        if !self.item_exists(item).await? {
            return Err(MigrateError::ItemNotFound(format!("table {}", self.qualify(item))));
        }
        let client = self.client().await?;
        let sql = format!("SELECT COUNT(*) FROM {}", self.qualify(item));
        let row = client
            .query_one(&sql, &[])
            .await
            .map_err(|e| MigrateError::connection("tabular", e))?;
        let count: i64 = row
            .try_get(0)
            .map_err(|e| MigrateError::connection("tabular", e))?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_rows(&self, item: &str, columns: &[String]) -> Result<Vec<RowRecord>> {
        let declared: HashMap<String, String> = self.columns(item).await?.into_iter().collect();
        if declared.is_empty() {
            return Err(MigrateError::ItemNotFound(format!("table {}", self.qualify(item))));
        }

        let mut types = Vec::with_capacity(columns.len());
        for c in columns {
            let data_type = declared.get(c).ok_or_else(|| {
                MigrateError::InvalidJob(format!("column {} not found in table {}", c, item))
            })?;
            types.push(data_type.to_lowercase());
        }

        let sql = build_select_sql(&self.qualify(item), columns, &types);
        debug!("{}", sql);

        let client = self.client().await?;
        let rows = client
            .query(&sql, &[])
            .await
            .map_err(|e| MigrateError::connection("tabular", e))?;

        Ok(rows
            .iter()
            .map(|row| {
                let values = types
                    .iter()
                    .enumerate()
                    .map(|(idx, t)| convert_pg_value(row, idx, t))
                    .collect();
                RowRecord::from_columns(columns, values)
            })
            .collect())
    }

    async fn create_container(&self, item: &str, schema: &SchemaDescriptor) -> Result<()> {
        let sql = build_create_sql(&self.qualify(item), schema);
        debug!("{}", sql);
        let client = self.client().await?;
        client
            .batch_execute(&sql)
            .await
            .map_err(|e| MigrateError::provisioning(item, e))?;
        info!("Ensured table {}", self.qualify(item));
        Ok(())
    }

    async fn insert_row(&self, item: &str, columns: &[String], row: &RowRecord) -> Result<()> {
        ensure_decoded(row)?;
        let values = row.values_for(columns);
        let (sql, params) = build_insert_sql(&self.qualify(item), columns, &values);
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let client = self.client().await?;
        client
            .execute(&sql, &refs)
            .await
            .map_err(|e| MigrateError::insert(item, e))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// SELECT list with non-native columns read as text.
fn build_select_sql(table: &str, columns: &[String], types: &[String]) -> String {
    let select: Vec<String> = columns
        .iter()
        .zip(types)
        .map(|(c, t)| {
            let q = quote_ident(c, '"');
            if NATIVE_TYPES.contains(&t.as_str()) {
                q
            } else {
                format!("{}::text AS {}", q, q)
            }
        })
        .collect();
    format!("SELECT {} FROM {}", select.join(", "), table)
}

/// Column type used in CREATE TABLE.
fn column_type(field: &FieldDescriptor) -> String {
    let native = field.native_type.trim();
    match native.to_uppercase().as_str() {
        // Canonical timestamps carry an offset.
        "TIMESTAMP" if field.abstract_type == AbstractType::DateTime => {
            "TIMESTAMP WITH TIME ZONE".to_string()
        }
        // information_schema spellings that are not valid DDL
        "ARRAY" | "USER-DEFINED" | "" => "TEXT".to_string(),
        _ => native.to_string(),
    }
}

fn build_create_sql(table: &str, schema: &SchemaDescriptor) -> String {
    let cols: Vec<String> = schema
        .fields
        .iter()
        .map(|f| format!("{} {}", quote_ident(&f.name, '"'), column_type(f)))
        .collect();
    format!("CREATE TABLE IF NOT EXISTS {} ({})", table, cols.join(", "))
}

/// INSERT with one text parameter per non-null value.
fn build_insert_sql(table: &str, columns: &[String], values: &[Value]) -> (String, Vec<String>) {
    let col_list: Vec<String> = columns.iter().map(|c| quote_ident(c, '"')).collect();
    let mut placeholders = Vec::with_capacity(values.len());
    let mut params = Vec::with_capacity(values.len());

    for value in values {
        match value_to_param(value) {
            None => placeholders.push("NULL".to_string()),
            Some((text, cast)) => {
                params.push(text);
                placeholders.push(format!("${}::text::{}", params.len(), cast));
            }
        }
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        col_list.join(", "),
        placeholders.join(", ")
    );
    (sql, params)
}

/// Text form and server-side cast for a value; `None` for NULL.
fn value_to_param(value: &Value) -> Option<(String, &'static str)> {
    let param = match value {
        Value::Null => return None,
        Value::Bool(b) => ((if *b { "t" } else { "f" }).to_string(), "boolean"),
        Value::Int(n) => (n.to_string(), "bigint"),
        Value::Float(f) => (f.to_string(), "double precision"),
        Value::Text(s) => (s.clone(), "text"),
        Value::Decimal(d) => (d.to_string(), "numeric"),
        Value::Date(d) => (d.format("%Y-%m-%d").to_string(), "date"),
        Value::DateTime(dt) => (dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string(), "timestamp"),
        Value::DateTimeTz(dt) => (dt.to_rfc3339(), "timestamptz"),
        // Refused by `ensure_decoded` before any insert.
        Value::Unsupported(_) => return None,
    };
    Some(param)
}

/// Decode one column by its declared type.
///
/// A value the canonical type cannot hold (a `numeric` NaN, or more digits
/// than a decimal carries) becomes [`Value::Unsupported`] so its row fails
/// instead of being written as NULL.
fn convert_pg_value(row: &tokio_postgres::Row, idx: usize, data_type: &str) -> Value {
    let decoded = match data_type {
        "boolean" => read::<bool>(row, idx),
        "smallint" => row
            .try_get::<_, Option<i16>>(idx)
            .map(|v| v.map(|n| Value::Int(n.into())).unwrap_or(Value::Null)),
        "integer" => read::<i32>(row, idx),
        "bigint" => read::<i64>(row, idx),
        "real" => row
            .try_get::<_, Option<f32>>(idx)
            .map(|v| v.map(|f| Value::Float(f.into())).unwrap_or(Value::Null)),
        "double precision" => read::<f64>(row, idx),
        "numeric" => read::<rust_decimal::Decimal>(row, idx),
        "date" => read::<chrono::NaiveDate>(row, idx),
        "timestamp without time zone" => read::<chrono::NaiveDateTime>(row, idx),
        "timestamp with time zone" => read::<chrono::DateTime<chrono::FixedOffset>>(row, idx),
        _ => read::<String>(row, idx),
    };

    decoded.unwrap_or_else(|e| {
        Value::Unsupported(format!("cannot decode {} value: {}", data_type, e))
    })
}

fn read<'a, T>(row: &'a tokio_postgres::Row, idx: usize) -> std::result::Result<Value, tokio_postgres::Error>
where
    T: tokio_postgres::types::FromSql<'a> + Into<Value>,
{
    row.try_get::<_, Option<T>>(idx).map(Value::from)
}
