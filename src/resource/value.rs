//! Helpers for reading and writing appliance records.
//!
//! Appliance records are converted from XML, which leaves a few quirks the
//! rest of the crate has to absorb: every scalar is text, a one-element list
//! collapses to a bare value, and records carry transaction metadata that is
//! not part of the configuration.

use serde_json::{Map, Value};

/// Keys that carry per-request metadata rather than configuration.
pub const VOLATILE_KEYS: &[&str] = &["@transactionid", "transactionid", "@xmlns"];

/// Field holding the record name.
pub const NAME_FIELD: &str = "Name";

/// Reads the value at a nested key path.
#[must_use]
pub fn get_path<'a>(record: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(record, |current, key| current.get(*key))
}

/// Writes a value at a nested key path, creating intermediate objects.
///
/// Any non-object found along the path is replaced by an object.
pub fn set_path(record: &mut Value, path: &[&str], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        *record = value;
        return;
    };

    let mut current = record;
    for key in parents {
        current = object_mut(current)
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    object_mut(current).insert((*last).to_string(), value);
}

fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            *other = Value::Object(Map::new());
            object_mut(other)
        }
    }
}

/// Returns the text form of a scalar.
///
/// `null` has no text form. Arrays and objects are rendered as JSON.
#[must_use]
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Returns the items of a list field.
///
/// A missing or `null` field is an empty list; a bare value is a
/// one-element list.
#[must_use]
pub fn list_items(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

/// Converts every scalar in a value to its text form, recursively.
#[must_use]
pub fn canonical(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => {
            Value::String(scalar_text(value).unwrap_or_default())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), canonical(v)))
                .collect(),
        ),
    }
}

/// Sort key for list items; equal keys mean equal items.
#[must_use]
pub fn sort_key(value: &Value) -> String {
    match canonical(value) {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Removes volatile metadata keys from a record, recursively.
#[must_use]
pub fn strip_volatile(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !VOLATILE_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), strip_volatile(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_volatile).collect()),
        other => other.clone(),
    }
}

/// Returns the record's name field as text.
#[must_use]
pub fn record_name(record: &Value) -> Option<String> {
    record
        .get(NAME_FIELD)
        .and_then(scalar_text)
        .filter(|name| !name.is_empty())
}

/// Maps a desired toggle value onto the appliance's `Enable`/`Disable` enum.
///
/// Text values are passed through so callers may also write the enum directly.
#[must_use]
pub fn toggle_text(value: &Value) -> Option<String> {
    match value {
        Value::Bool(true) => Some(String::from("Enable")),
        Value::Bool(false) => Some(String::from("Disable")),
        other => scalar_text(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_and_set_path() {
        let mut record = json!({ "Name": "r1" });
        set_path(&mut record, &["NetworkPolicy", "Action"], json!("Accept"));

        assert_eq!(get_path(&record, &["NetworkPolicy", "Action"]), Some(&json!("Accept")));
        assert_eq!(get_path(&record, &["NetworkPolicy", "Missing"]), None);
        assert_eq!(record["Name"], "r1");
    }

    #[test]
    fn test_set_path_replaces_scalar_parent() {
        let mut record = json!({ "HostList": "" });
        set_path(&mut record, &["HostList", "Host"], json!(["H1"]));

        assert_eq!(record, json!({ "HostList": { "Host": ["H1"] } }));

        let mut scalar = json!("text");
        set_path(&mut scalar, &["Name"], json!("r1"));
        assert_eq!(scalar, json!({ "Name": "r1" }));
    }

    #[test]
    fn test_list_items_normalizes_collapsed_lists() {
        assert!(list_items(None).is_empty());
        assert!(list_items(Some(&Value::Null)).is_empty());
        assert_eq!(list_items(Some(&json!("H1"))), vec![json!("H1")]);
        assert_eq!(list_items(Some(&json!(["H1", "H2"]))).len(), 2);
    }

    #[test]
    fn test_strip_volatile_is_recursive() {
        let record = json!({
            "@transactionid": "",
            "Name": "GRP1",
            "HostList": { "transactionid": "7", "Host": ["H1"] }
        });

        assert_eq!(
            strip_volatile(&record),
            json!({ "Name": "GRP1", "HostList": { "Host": ["H1"] } })
        );
    }

    #[test]
    fn test_canonical_stringifies_scalars() {
        assert_eq!(
            canonical(&json!({ "Port": 443, "Enabled": true, "List": [1, "2"] })),
            json!({ "Port": "443", "Enabled": "true", "List": ["1", "2"] })
        );
    }

    #[test]
    fn test_toggle_text() {
        assert_eq!(toggle_text(&json!(true)).as_deref(), Some("Enable"));
        assert_eq!(toggle_text(&json!(false)).as_deref(), Some("Disable"));
        assert_eq!(toggle_text(&json!("Disable")).as_deref(), Some("Disable"));
        assert_eq!(toggle_text(&Value::Null), None);
    }
}
