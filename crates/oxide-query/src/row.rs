//! Result rows.
//!
//! A row is a JSON object whose keys follow the column order of the result
//! set. Eager-loaded relations are spliced in as extra keys.

use oxide_query_core::{Record, SqlValue};
use serde_json::{Map, Number, Value};

/// One result row.
pub type Row = Map<String, Value>;

/// Converts a JSON value into a bindable SQL value.
///
/// Arrays and objects are bound as their JSON text.
#[must_use]
pub fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Int)
            .or_else(|| n.as_f64().map(SqlValue::Float))
            .unwrap_or_else(|| SqlValue::Text(n.to_string())),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Converts an SQL value into JSON. Blobs become arrays of bytes.
#[must_use]
pub fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Bool(b),
        SqlValue::Int(n) => Value::from(n),
        SqlValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => Value::from(bytes),
    }
}

/// Builds an insert/update record from a JSON object, keeping key order.
#[must_use]
pub fn record_from_row(row: &Row) -> Record {
    row.iter()
        .map(|(column, value)| (column.clone(), json_to_sql(value)))
        .collect()
}

/// The key used to match rows across queries.
///
/// Integers and their text spelling map to the same key so that a `TEXT`
/// foreign key still finds an `INTEGER` primary key. Integral floats use the
/// integer spelling, so `REAL` keys match too. Nulls and empty strings have
/// no key.
pub(crate) fn correlation_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_f64() => Some(match n.as_f64() {
            Some(f) if f.fract().abs() < f64::EPSILON && f.abs() < 9.0e15 => format!("{f:.0}"),
            _ => n.to_string(),
        }),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(String::from(if *b { "1" } else { "0" })),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Reads a scalar column as an unsigned count.
pub(crate) fn as_count(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_sql_conversions() {
        assert_eq!(json_to_sql(&json!(3)), SqlValue::Int(3));
        assert_eq!(json_to_sql(&json!(2.5)), SqlValue::Float(2.5));
        assert_eq!(json_to_sql(&json!("a")), SqlValue::Text(String::from("a")));
        assert_eq!(json_to_sql(&json!([1])), SqlValue::Text(String::from("[1]")));
        assert_eq!(sql_to_json(SqlValue::Blob(vec![1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_correlation_keys_unify_numbers_and_text() {
        assert_eq!(correlation_key(&json!(7)), correlation_key(&json!("7")));
        assert_eq!(correlation_key(&json!(null)), None);
        assert_eq!(correlation_key(&json!("")), None);
    }

    #[test]
    fn test_correlation_keys_unify_integral_floats() {
        assert_eq!(correlation_key(&json!(1.0)), Some(String::from("1")));
        assert_eq!(correlation_key(&json!(1.0)), correlation_key(&json!(1)));
        assert_eq!(correlation_key(&json!(1.5)), Some(String::from("1.5")));
    }

    #[test]
    fn test_record_from_row_keeps_order() {
        let row = json!({"b": 1, "a": "x"});
        let record = record_from_row(row.as_object().unwrap());
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_as_count() {
        assert_eq!(as_count(Some(&json!(3))), 3);
        assert_eq!(as_count(Some(&json!("12"))), 12);
        assert_eq!(as_count(None), 0);
    }
}
