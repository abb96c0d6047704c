use rusqlite::types::Value;

use crate::output::Field;

/// Convert a SQLite value to an output field.
pub fn sqlite_value_to_field(value: Value) -> Field {
    match value {
        Value::Null => Field::Null,
        Value::Integer(n) => Field::Int(n),
        Value::Real(n) => Field::Float(n),
        Value::Text(s) => Field::Text(s),
        Value::Blob(b) => Field::Text(format!("<{} byte blob>", b.len())),
    }
}
