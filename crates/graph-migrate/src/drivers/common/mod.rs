//! Helpers shared by the drivers.
//!
//! - [`tls`]: TLS connector for the tabular driver

pub mod tls;

pub use tls::{make_connector, SslMode};

use crate::core::value::{RowRecord, Value};
use crate::error::{MigrateError, Result};

/// Quote an identifier with `quote`, doubling embedded quote characters.
///
/// PostgreSQL uses `"`, Cypher uses a backtick.
pub fn quote_ident(name: &str, quote: char) -> String {
    let doubled: String = [quote, quote].iter().collect();
    format!(
        "{q}{}{q}",
        name.replace(quote, &doubled),
        q = quote
    )
}

/// Refuse to write a row that still holds an undecoded source value.
pub fn ensure_decoded(row: &RowRecord) -> Result<()> {
    match row.iter().find(|(_, v)| matches!(v, Value::Unsupported(_))) {
        Some((name, Value::Unsupported(reason))) => Err(MigrateError::UnsupportedValue(format!(
            "field '{}': {}",
            name, reason
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_decoded() {
        let cols = vec!["id".to_string(), "born".to_string()];
        let ok = RowRecord::from_columns(&cols, vec![Value::Int(1), Value::Null]);
        assert!(ensure_decoded(&ok).is_ok());

        let bad = RowRecord::from_columns(
            &cols,
            vec![Value::Int(1), Value::Unsupported("bad date".into())],
        );
        let err = ensure_decoded(&bad).unwrap_err();
        assert!(matches!(err, MigrateError::UnsupportedValue(_)));
        assert!(err.to_string().contains("born"));
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users", '"'), "\"users\"");
        assert_eq!(quote_ident("we\"ird", '"'), "\"we\"\"ird\"");
        assert_eq!(quote_ident("Per`son", '`'), "`Per``son`");
    }
}
