//! JSON append transform for `fscache append`.

use fscache_store::Modify;
use serde_json::Value;

/// Append `addition` to a stored JSON value.
///
/// - arrays get `addition` pushed
/// - strings get a string `addition` concatenated
/// - numbers get a numeric `addition` added
///
/// Any other combination aborts, which invalidates the entry.
pub fn append_value(current: Value, addition: &Value) -> Modify<Value> {
    match (current, addition) {
        (Value::Array(mut items), _) => {
            items.push(addition.clone());
            Modify::Set(Value::Array(items))
        }
        (Value::String(mut s), Value::String(tail)) => {
            s.push_str(tail);
            Modify::Set(Value::String(s))
        }
        (Value::Number(a), Value::Number(b)) => match add_numbers(&a, b) {
            Some(sum) => Modify::Set(Value::Number(sum)),
            None => Modify::Abort,
        },
        _ => Modify::Abort,
    }
}

fn add_numbers(a: &serde_json::Number, b: &serde_json::Number) -> Option<serde_json::Number> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = x.checked_add(y) {
            return Some(sum.into());
        }
    }
    serde_json::Number::from_f64(a.as_f64()? + b.as_f64()?)
}
