//! Maps logical column types to Snowflake DDL types and infers them from
//! extracted JSON values.

use crate::domain::entities::DataType;
use serde_json::Value;

/// Returns the Snowflake type used in `CREATE TABLE` / `ADD COLUMN`.
pub fn to_snowflake_ddl(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Text => "VARCHAR",
        DataType::Bigint => "NUMBER(19,0)",
        DataType::Double => "FLOAT",
        DataType::Bool => "BOOLEAN",
        DataType::Timestamp => "TIMESTAMP_TZ",
        DataType::Date => "DATE",
        DataType::Time => "TIME",
        DataType::Decimal => "NUMBER(38,9)",
        DataType::Binary => "BINARY",
        DataType::Json => "VARIANT",
    }
}

/// Infers the type of a single value. `null` carries no type information.
pub fn infer_from_json(value: &Value) -> Option<DataType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(DataType::Bool),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(DataType::Bigint),
        Value::Number(_) => Some(DataType::Double),
        Value::String(_) => Some(DataType::Text),
        Value::Array(_) | Value::Object(_) => Some(DataType::Json),
    }
}

/// Combines two observed types of the same column.
pub fn widen(current: DataType, seen: DataType) -> DataType {
    match (current, seen) {
        (a, b) if a == b => a,
        (DataType::Bigint, DataType::Double) | (DataType::Double, DataType::Bigint) => {
            DataType::Double
        }
        (DataType::Json, _) | (_, DataType::Json) => DataType::Json,
        _ => DataType::Text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_infer_from_json() {
        assert_eq!(infer_from_json(&json!(1)), Some(DataType::Bigint));
        assert_eq!(infer_from_json(&json!(1.5)), Some(DataType::Double));
        assert_eq!(infer_from_json(&json!("a")), Some(DataType::Text));
        assert_eq!(infer_from_json(&json!(true)), Some(DataType::Bool));
        assert_eq!(infer_from_json(&json!({"a": 1})), Some(DataType::Json));
        assert_eq!(infer_from_json(&json!(null)), None);
    }

    #[test]
    fn test_widen() {
        assert_eq!(widen(DataType::Bigint, DataType::Double), DataType::Double);
        assert_eq!(widen(DataType::Bool, DataType::Text), DataType::Text);
        assert_eq!(widen(DataType::Text, DataType::Json), DataType::Json);
        assert_eq!(widen(DataType::Date, DataType::Date), DataType::Date);
    }

    #[test]
    fn test_ddl_types() {
        assert_eq!(to_snowflake_ddl(DataType::Json), "VARIANT");
        assert_eq!(to_snowflake_ddl(DataType::Bigint), "NUMBER(19,0)");
    }
}
