//! Type mapping between the abstract type system and each backend.
//!
//! [`resolve`] is total: every (backend, abstract type) pair yields a
//! spelling, with a per-backend fallback for `Unknown`.

use crate::core::schema::{AbstractType, BackendKind, FieldDescriptor, SchemaDescriptor};
use crate::core::value::Value;

/// Map an abstract type to its spelling on the target backend.
pub fn resolve(target: BackendKind, abstract_type: AbstractType) -> &'static str {
    match target {
        BackendKind::Tabular => match abstract_type {
            AbstractType::Int => "INTEGER",
            AbstractType::Float => "FLOAT",
            AbstractType::String => "TEXT",
            AbstractType::Bool => "BOOLEAN",
            AbstractType::DateTime => "TIMESTAMP",
            AbstractType::Decimal => "NUMERIC",
            AbstractType::Unknown => "TEXT",
        },
        BackendKind::Document => match abstract_type {
            AbstractType::Int | AbstractType::Float | AbstractType::Decimal => "Number",
            AbstractType::String => "String",
            AbstractType::Bool => "Boolean",
            AbstractType::DateTime => "Date",
            AbstractType::Unknown => "Mixed",
        },
        BackendKind::Graph => match abstract_type {
            AbstractType::Int => "Integer",
            AbstractType::Float | AbstractType::Decimal => "Float",
            AbstractType::String => "String",
            AbstractType::Bool => "Boolean",
            AbstractType::DateTime => "DateTime",
            AbstractType::Unknown => "String",
        },
    }
}

/// Convert a source descriptor into the descriptor planned for `target`.
///
/// Length and field order are always preserved. A descriptor already
/// belonging to `target` keeps its native spellings.
pub fn convert_schema(target: BackendKind, schema: &SchemaDescriptor) -> SchemaDescriptor {
    if schema.backend == target {
        return schema.clone();
    }

    let fields = schema
        .fields
        .iter()
        .map(|f| FieldDescriptor::new(f.name.clone(), f.abstract_type, resolve(target, f.abstract_type)))
        .collect();

    SchemaDescriptor {
        item: schema.item.clone(),
        backend: target,
        fields,
        sampled: schema.sampled,
    }
}

/// Abstract type of a declared tabular column type
/// (`information_schema.columns.data_type`).
pub fn from_declared(data_type: &str) -> AbstractType {
    let lower = data_type.to_lowercase();
    match lower.as_str() {
        // Integer types
        "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "serial"
        | "bigserial" | "smallserial" => AbstractType::Int,

        // Floating point
        "real" | "float4" | "float8" | "double precision" | "float" => AbstractType::Float,

        // Exact numerics
        "numeric" | "decimal" | "money" => AbstractType::Decimal,

        // Boolean
        "boolean" | "bool" => AbstractType::Bool,

        // Date/time
        "date" | "timestamp" | "timestamptz" | "timestamp without time zone"
        | "timestamp with time zone" => AbstractType::DateTime,

        // String types
        "text" | "character varying" | "varchar" | "character" | "char" | "bpchar" | "name"
        | "citext" | "uuid" => AbstractType::String,

        _ => {
            if lower.starts_with("numeric(") || lower.starts_with("decimal(") {
                AbstractType::Decimal
            } else if lower.starts_with("varchar(") || lower.starts_with("char(") {
                AbstractType::String
            } else {
                AbstractType::Unknown
            }
        }
    }
}

/// Abstract type of a runtime value, used when a schema is inferred from a
/// sampled document or node.
pub fn from_value(value: &Value) -> AbstractType {
    match value {
        Value::Int(_) => AbstractType::Int,
        Value::Float(_) => AbstractType::Float,
        Value::Decimal(_) => AbstractType::Decimal,
        Value::Text(_) => AbstractType::String,
        Value::Bool(_) => AbstractType::Bool,
        Value::Date(_) | Value::DateTime(_) | Value::DateTimeTz(_) => AbstractType::DateTime,
        Value::Null | Value::Unsupported(_) => AbstractType::Unknown,
    }
}

/// Build a descriptor field for a sampled value on `backend`.
pub fn sampled_field(backend: BackendKind, name: impl Into<String>, value: &Value) -> FieldDescriptor {
    let abstract_type = from_value(value);
    FieldDescriptor::new(name, abstract_type, resolve(backend, abstract_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const ALL_TYPES: [AbstractType; 7] = [
        AbstractType::Int,
        AbstractType::Float,
        AbstractType::String,
        AbstractType::Bool,
        AbstractType::DateTime,
        AbstractType::Decimal,
        AbstractType::Unknown,
    ];

    const ALL_BACKENDS: [BackendKind; 3] =
        [BackendKind::Tabular, BackendKind::Document, BackendKind::Graph];

    fn users() -> SchemaDescriptor {
        SchemaDescriptor::declared(
            "users",
            BackendKind::Tabular,
            vec![
                FieldDescriptor::new("id", AbstractType::Int, "integer"),
                FieldDescriptor::new("name", AbstractType::String, "text"),
                FieldDescriptor::new("balance", AbstractType::Decimal, "numeric"),
                FieldDescriptor::new("meta", AbstractType::Unknown, "jsonb"),
            ],
        )
    }

    #[test]
    fn test_resolve_table() {
        assert_eq!(resolve(BackendKind::Tabular, AbstractType::Int), "INTEGER");
        assert_eq!(resolve(BackendKind::Tabular, AbstractType::DateTime), "TIMESTAMP");
        assert_eq!(resolve(BackendKind::Document, AbstractType::Float), "Number");
        assert_eq!(resolve(BackendKind::Document, AbstractType::DateTime), "Date");
        assert_eq!(resolve(BackendKind::Graph, AbstractType::Bool), "Boolean");
        assert_eq!(resolve(BackendKind::Graph, AbstractType::DateTime), "DateTime");
    }

    #[test]
    fn test_resolve_fallbacks() {
        assert_eq!(resolve(BackendKind::Tabular, AbstractType::Unknown), "TEXT");
        assert_eq!(resolve(BackendKind::Document, AbstractType::Unknown), "Mixed");
        assert_eq!(resolve(BackendKind::Graph, AbstractType::Unknown), "String");
    }

    #[test]
    fn test_resolve_is_total() {
        for backend in ALL_BACKENDS {
            for t in ALL_TYPES {
                assert!(!resolve(backend, t).is_empty());
            }
        }
    }

    #[test]
    fn test_convert_schema_preserves_length_and_order() {
        let source = users();
        for target in ALL_BACKENDS {
            let converted = convert_schema(target, &source);
            assert_eq!(converted.len(), source.len());
            assert_eq!(converted.field_names(), source.field_names());
            assert_eq!(converted.backend, target);
        }
    }

    #[test]
    fn test_convert_schema_to_graph() {
        let converted = convert_schema(BackendKind::Graph, &users());
        let natives: Vec<_> = converted.fields.iter().map(|f| f.native_type.as_str()).collect();
        assert_eq!(natives, vec!["Integer", "String", "Float", "String"]);
    }

    #[test]
    fn test_same_backend_keeps_native_spellings() {
        let converted = convert_schema(BackendKind::Tabular, &users());
        assert_eq!(converted.fields[2].native_type, "numeric");
        assert_eq!(converted.fields[3].native_type, "jsonb");
    }

    #[test]
    fn test_from_declared() {
        assert_eq!(from_declared("bigint"), AbstractType::Int);
        assert_eq!(from_declared("double precision"), AbstractType::Float);
        assert_eq!(from_declared("numeric"), AbstractType::Decimal);
        assert_eq!(from_declared("character varying"), AbstractType::String);
        assert_eq!(from_declared("timestamp with time zone"), AbstractType::DateTime);
        assert_eq!(from_declared("date"), AbstractType::DateTime);
        assert_eq!(from_declared("BOOLEAN"), AbstractType::Bool);
        assert_eq!(from_declared("jsonb"), AbstractType::Unknown);
    }

    #[test]
    fn test_from_value() {
        assert_eq!(from_value(&Value::Int(1)), AbstractType::Int);
        assert_eq!(from_value(&Value::Decimal(Decimal::new(105, 1))), AbstractType::Decimal);
        assert_eq!(from_value(&Value::Null), AbstractType::Unknown);

        let field = sampled_field(BackendKind::Document, "age", &Value::Int(30));
        assert_eq!(field.native_type, "Number");
    }
}
