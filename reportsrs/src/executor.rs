#[cfg(feature = "duckdb")]
use duckdb::types::Value as DuckValue;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
}

/// Tabular result of one statement; each row maps column name to a JSON value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Map<String, Value>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of the first column, in row order.
    pub fn first_column(&self) -> Vec<Value> {
        let Some(first) = self.columns.first() else {
            return Vec::new();
        };
        self.rows
            .iter()
            .map(|row| row.get(&first.name).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// JSON parameter to a DuckDB bind value.
#[cfg(feature = "duckdb")]
pub(crate) fn json_to_duck_value(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                DuckValue::BigInt(i)
            } else if let Some(u) = n.as_u64() {
                DuckValue::UBigInt(u)
            } else {
                DuckValue::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => DuckValue::Text(s.clone()),
        other => DuckValue::Text(other.to_string()),
    }
}

#[cfg(feature = "duckdb")]
pub(crate) fn duck_value_to_json(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::from(i),
        DuckValue::SmallInt(i) => Value::from(i),
        DuckValue::Int(i) => Value::from(i),
        DuckValue::BigInt(i) => Value::from(i),
        // SUM over integers widens to HUGEINT
        DuckValue::HugeInt(i) => i64::try_from(i)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(i.to_string())),
        DuckValue::UTinyInt(i) => Value::from(i),
        DuckValue::USmallInt(i) => Value::from(i),
        DuckValue::UInt(i) => Value::from(i),
        DuckValue::UBigInt(i) => Value::from(i),
        DuckValue::Float(f) => Value::from(f),
        DuckValue::Double(f) => Value::from(f),
        DuckValue::Decimal(d) => {
            let text = d.to_string();
            text.parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::String(text))
        }
        DuckValue::Timestamp(unit, t) => Value::String(format!("{t} ({unit:?})")),
        DuckValue::Text(s) => Value::String(s),
        DuckValue::Blob(bytes) => Value::String(hex::encode(bytes)),
        DuckValue::Date32(d) => Value::from(d),
        DuckValue::Time64(unit, t) => Value::String(format!("{t} ({unit:?})")),
        DuckValue::Interval {
            months,
            days,
            nanos,
        } => Value::String(format!("{months} months {days} days {nanos} nanos")),
        DuckValue::List(items) => {
            let values = items.into_iter().map(duck_value_to_json).collect();
            Value::Array(values)
        }
        DuckValue::Enum(s) => Value::String(s),
        DuckValue::Struct(fields) => {
            let mut map = Map::new();
            for (key, val) in fields.iter() {
                map.insert(key.clone(), duck_value_to_json(val.clone()));
            }
            Value::Object(map)
        }
        DuckValue::Array(items) => {
            let values = items.into_iter().map(duck_value_to_json).collect();
            Value::Array(values)
        }
        DuckValue::Map(entries) => {
            let pairs: Vec<Value> = entries
                .iter()
                .map(|(k, v)| {
                    Value::Array(vec![
                        duck_value_to_json(k.clone()),
                        duck_value_to_json(v.clone()),
                    ])
                })
                .collect();
            Value::Array(pairs)
        }
        DuckValue::Union(inner) => duck_value_to_json(*inner),
    }
}
