//! Normalisation of vendor payload shapes.

use serde_json::Value;

/// Extracts the record list from a vendor payload.
///
/// The vendor answers either with a bare array or with an object wrapping
/// the array in `records` or `data`. Anything else yields no records.
pub fn normalize_records(payload: Value) -> Vec<Value> {
    match payload {
        Value::Array(records) => records,
        Value::Object(mut map) => {
            for key in ["records", "data"] {
                if let Some(Value::Array(records)) = map.remove(key) {
                    return records;
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Collects the embedded `recovery` objects of a list of cycles.
pub fn recoveries_from_cycles(cycles: &[Value]) -> Vec<Value> {
    cycles
        .iter()
        .filter_map(|cycle| cycle.get("recovery"))
        .filter(|recovery| !recovery.is_null())
        .cloned()
        .collect()
}
