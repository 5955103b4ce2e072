//! Value normalization for a target backend.
//!
//! Each store accepts a slightly different set of scalars. The rules:
//!
//! | source value | Tabular | Document | Graph |
//! |---|---|---|---|
//! | decimal | unchanged | float | int when scale is 0, else float |
//! | naive timestamp | UTC timestamp | UTC timestamp | UTC timestamp |
//! | date | unchanged | UTC midnight timestamp | unchanged |
//! | anything else | unchanged | unchanged | unchanged |
//!
//! The only failure is a value the target cannot represent, reported as
//! [`MigrateError::UnsupportedValue`]. A [`Value::Unsupported`] read by a
//! driver always fails here, so an undecodable source value never reaches
//! the target as NULL.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::core::schema::BackendKind;
use crate::core::value::{RowRecord, Value};
use crate::error::{MigrateError, Result};

/// Normalize one value for the target backend.
pub fn normalize(value: Value, target: BackendKind) -> Result<Value> {
    match value {
        Value::Unsupported(reason) => Err(MigrateError::UnsupportedValue(reason)),
        Value::Decimal(d) => normalize_decimal(d, target),
        Value::DateTime(naive) => Ok(Value::DateTimeTz(assume_utc(naive))),
        Value::Date(date) if target == BackendKind::Document => {
            Ok(Value::DateTimeTz(assume_utc(date.and_time(chrono::NaiveTime::MIN))))
        }
        other => Ok(other),
    }
}

/// Normalize every value of a row, keeping field order.
///
/// Stops at the first value that cannot be represented; the error names the
/// offending field.
pub fn normalize_row(row: RowRecord, target: BackendKind) -> Result<RowRecord> {
    let mut out = RowRecord::new();
    for (name, value) in row.iter() {
        let normalized = normalize(value.clone(), target).map_err(|e| match e {
            MigrateError::UnsupportedValue(msg) => {
                MigrateError::UnsupportedValue(format!("field '{}': {}", name, msg))
            }
            other => other,
        })?;
        out.insert(name.clone(), normalized);
    }
    Ok(out)
}

fn normalize_decimal(d: Decimal, target: BackendKind) -> Result<Value> {
    match target {
        BackendKind::Tabular => Ok(Value::Decimal(d)),
        BackendKind::Document => to_float(d),
        BackendKind::Graph => {
            if d.scale() == 0 {
                d.to_i64().map(Value::Int).ok_or_else(|| {
                    MigrateError::UnsupportedValue(format!(
                        "decimal {} is outside the graph integer range",
                        d
                    ))
                })
            } else {
                to_float(d)
            }
        }
    }
}

fn to_float(d: Decimal) -> Result<Value> {
    d.to_f64()
        .map(Value::Float)
        .ok_or_else(|| MigrateError::UnsupportedValue(format!("decimal {} has no float form", d)))
}

/// Attach a UTC offset to a timestamp that carries no zone.
pub fn assume_utc(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use std::str::FromStr;

    fn dec(s: &str) -> Value {
        Value::Decimal(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_decimal_to_graph() {
        assert_eq!(normalize(dec("10"), BackendKind::Graph).unwrap(), Value::Int(10));
        assert_eq!(normalize(dec("10.5"), BackendKind::Graph).unwrap(), Value::Float(10.5));
        // A trailing zero keeps a fractional scale, so it stays a float.
        assert_eq!(normalize(dec("10.0"), BackendKind::Graph).unwrap(), Value::Float(10.0));
    }

    #[test]
    fn test_decimal_to_graph_out_of_range() {
        let err = normalize(dec("99999999999999999999999"), BackendKind::Graph).unwrap_err();
        assert!(matches!(err, MigrateError::UnsupportedValue(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_decimal_to_document_and_tabular() {
        assert_eq!(normalize(dec("2.25"), BackendKind::Document).unwrap(), Value::Float(2.25));
        assert_eq!(normalize(dec("2.25"), BackendKind::Tabular).unwrap(), dec("2.25"));
    }

    #[test]
    fn test_naive_timestamp_becomes_utc() {
        let naive = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        for target in [BackendKind::Tabular, BackendKind::Document, BackendKind::Graph] {
            match normalize(Value::DateTime(naive), target).unwrap() {
                Value::DateTimeTz(dt) => {
                    assert_eq!(dt.offset().local_minus_utc(), 0);
                    assert_eq!(dt.naive_utc(), naive);
                }
                other => panic!("expected timestamp, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_aware_timestamp_unchanged() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let dt = tz.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        assert_eq!(
            normalize(Value::DateTimeTz(dt), BackendKind::Document).unwrap(),
            Value::DateTimeTz(dt)
        );
    }

    #[test]
    fn test_date_promoted_for_document_only() {
        let date = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        match normalize(Value::Date(date), BackendKind::Document).unwrap() {
            Value::DateTimeTz(dt) => assert_eq!(dt.to_rfc3339(), "2023-12-31T00:00:00+00:00"),
            other => panic!("expected timestamp, got {:?}", other),
        }
        assert_eq!(normalize(Value::Date(date), BackendKind::Graph).unwrap(), Value::Date(date));
        assert_eq!(normalize(Value::Date(date), BackendKind::Tabular).unwrap(), Value::Date(date));
    }

    #[test]
    fn test_plain_scalars_pass_through() {
        for v in [Value::Int(3), Value::Float(1.5), Value::from("x"), Value::Bool(true), Value::Null] {
            assert_eq!(normalize(v.clone(), BackendKind::Graph).unwrap(), v);
        }
    }

    #[test]
    fn test_undecodable_value_is_rejected() {
        for target in [BackendKind::Tabular, BackendKind::Document, BackendKind::Graph] {
            let err = normalize(Value::Unsupported("numeric NaN".into()), target).unwrap_err();
            assert!(matches!(err, MigrateError::UnsupportedValue(ref m) if m == "numeric NaN"));
            assert!(!err.is_fatal());
        }
    }

    #[test]
    fn test_normalize_row_names_field() {
        let row = RowRecord::from_columns(
            &["id".to_string(), "balance".to_string()],
            vec![Value::Int(2), dec("99999999999999999999999")],
        );
        let err = normalize_row(row, BackendKind::Graph).unwrap_err();
        assert!(err.to_string().contains("balance"));
    }
}
