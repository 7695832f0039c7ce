//! Structural before/after diffing for audit snapshots.

use serde_json::{Map, Value};

/// Reduce two JSON snapshots to the keys whose values differ.
///
/// For object snapshots, the result keeps every key present in either side
/// with a differing value; a key absent on one side appears as `null`
/// there. Non-object snapshots are returned whole when they differ, and as
/// a pair of empty objects when they are equal.
pub fn structural_diff(before: &Value, after: &Value) -> (Value, Value) {
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            let mut before_changed = Map::new();
            let mut after_changed = Map::new();
            let mut keys: Vec<&String> = b.keys().collect();
            for key in a.keys() {
                if !b.contains_key(key) {
                    keys.push(key);
                }
            }
            for key in keys {
                let bv = b.get(key).unwrap_or(&Value::Null);
                let av = a.get(key).unwrap_or(&Value::Null);
                if bv != av {
                    before_changed.insert(key.clone(), bv.clone());
                    after_changed.insert(key.clone(), av.clone());
                }
            }
            (Value::Object(before_changed), Value::Object(after_changed))
        }
        _ if before == after => (Value::Object(Map::new()), Value::Object(Map::new())),
        _ => (before.clone(), after.clone()),
    }
}
