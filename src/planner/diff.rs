//! Diff engine for comparing desired attributes with a remote snapshot.
//!
//! This module decides whether a resource needs a change and builds the
//! payload to submit. Payloads are always full records: the appliance's
//! create and update calls do not accept sparse patches.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::debug;

use crate::resource::value::{
    NAME_FIELD, canonical, get_path, list_items, scalar_text, set_path, sort_key,
    strip_volatile, toggle_text,
};
use crate::resource::{FieldShape, FieldSpec, KindSchema, ListMutation};

/// Engine for computing diffs between desired and observed state.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffEngine;

/// Detail about a specific difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffDetail {
    /// Attribute that differs.
    pub field: String,
    /// Value currently on the appliance.
    pub old_value: Option<String>,
    /// Value that will be submitted.
    pub new_value: Option<String>,
}

/// Result of planning an update against an existing record.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdatePlan {
    /// Whether an update call is required.
    pub changed: bool,
    /// Full record to submit.
    pub payload: Value,
    /// Per-attribute differences.
    pub details: Vec<DiffDetail>,
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Combines a desired list with the existing one.
    ///
    /// `add` keeps the existing order and appends new items, `remove` drops
    /// the desired items, `replace` returns the desired items. The result
    /// never contains duplicates.
    #[must_use]
    pub fn merge_list(existing: &[Value], desired: &[Value], mutation: ListMutation) -> Vec<Value> {
        let desired_keys: BTreeSet<String> = desired.iter().map(sort_key).collect();

        let source: Vec<&Value> = match mutation {
            ListMutation::Add => existing.iter().chain(desired).collect(),
            ListMutation::Remove => existing
                .iter()
                .filter(|item| !desired_keys.contains(&sort_key(item)))
                .collect(),
            ListMutation::Replace => desired.iter().collect(),
        };

        let mut seen = BTreeSet::new();
        source
            .into_iter()
            .filter(|item| seen.insert(sort_key(item)))
            .cloned()
            .collect()
    }

    /// Order-independent list comparison.
    #[must_use]
    pub fn lists_equivalent(a: &[Value], b: &[Value]) -> bool {
        let a: BTreeSet<String> = a.iter().map(sort_key).collect();
        let b: BTreeSet<String> = b.iter().map(sort_key).collect();
        a == b
    }

    /// Returns true if the desired attributes require an update of `existing`.
    #[must_use]
    pub fn requires_change(
        &self,
        schema: &KindSchema,
        desired: &Map<String, Value>,
        existing: &Value,
        mutation: ListMutation,
    ) -> bool {
        self.plan_update(schema, None, desired, existing, mutation)
            .changed
    }

    /// Plans an update of an existing record.
    ///
    /// The payload starts from the existing record with volatile metadata
    /// stripped, then every desired attribute is written over it. Desired
    /// attributes that are absent or `null` are left as they are.
    #[must_use]
    pub fn plan_update(
        &self,
        schema: &KindSchema,
        name: Option<&str>,
        desired: &Map<String, Value>,
        existing: &Value,
        mutation: ListMutation,
    ) -> UpdatePlan {
        let mut payload = strip_volatile(existing);
        if let Some(name) = name {
            set_path(&mut payload, &[NAME_FIELD], Value::String(name.to_string()));
        }

        let mut details = Vec::new();
        for field in schema.fields {
            let Some(wanted) = desired.get(field.attr).filter(|v| !v.is_null()) else {
                continue;
            };
            let current = get_path(existing, field.path);
            if let Some(detail) = Self::apply_field(&mut payload, field, wanted, current, mutation) {
                debug!(
                    "{} differs: {:?} -> {:?}",
                    detail.field, detail.old_value, detail.new_value
                );
                details.push(detail);
            }
        }

        let forced: Vec<DiffDetail> = Self::missing_enable_dependents(schema, desired, existing)
            .into_iter()
            .filter(|forced| details.iter().all(|d| d.field != forced.field))
            .collect();
        details.extend(forced);

        UpdatePlan {
            changed: !details.is_empty(),
            payload,
            details,
        }
    }

    /// Builds the record submitted when creating a resource.
    #[must_use]
    pub fn build_create_payload(
        &self,
        schema: &KindSchema,
        name: Option<&str>,
        desired: &Map<String, Value>,
        mutation: ListMutation,
    ) -> Value {
        self.plan_update(schema, name, desired, &Value::Object(Map::new()), mutation)
            .payload
    }

    /// Structural equality of two records, ignoring volatile metadata and
    /// the text/number/boolean distinction of scalars.
    #[must_use]
    pub fn records_equal(existing: &Value, desired: &Value) -> bool {
        canonical(&strip_volatile(existing)) == canonical(&strip_volatile(desired))
    }

    /// Lists the top-level keys whose values differ between two records.
    #[must_use]
    pub fn record_details(existing: &Value, desired: &Value) -> Vec<DiffDetail> {
        let existing = canonical(&strip_volatile(existing));
        let desired = canonical(&strip_volatile(desired));
        let empty = Map::new();
        let old = existing.as_object().unwrap_or(&empty);
        let new = desired.as_object().unwrap_or(&empty);

        let keys: BTreeSet<&String> = old.keys().chain(new.keys()).collect();
        keys.into_iter()
            .filter(|key| old.get(*key) != new.get(*key))
            .map(|key| DiffDetail {
                field: key.clone(),
                old_value: old.get(key).and_then(scalar_text),
                new_value: new.get(key).and_then(scalar_text),
            })
            .collect()
    }

    /// Writes one desired attribute into the payload, returning a detail if
    /// it differs from the current value.
    fn apply_field(
        payload: &mut Value,
        field: &FieldSpec,
        wanted: &Value,
        current: Option<&Value>,
        mutation: ListMutation,
    ) -> Option<DiffDetail> {
        match field.shape {
            FieldShape::Scalar | FieldShape::Toggle => {
                let rendered = if field.shape == FieldShape::Toggle {
                    toggle_text(wanted)
                } else {
                    scalar_text(wanted)
                };
                let new_text = rendered?;
                let old_text = current.and_then(scalar_text);
                let differs = old_text.as_deref() != Some(new_text.as_str());
                set_path(payload, field.path, Value::String(new_text.clone()));

                differs.then(|| DiffDetail {
                    field: field.attr.to_string(),
                    old_value: old_text,
                    new_value: Some(new_text),
                })
            }
            FieldShape::List => {
                let existing_items = list_items(current);
                let desired_items = list_items(Some(wanted));
                let merged = Self::merge_list(&existing_items, &desired_items, mutation);
                let differs = !Self::lists_equivalent(&existing_items, &merged);

                let detail = differs.then(|| DiffDetail {
                    field: field.attr.to_string(),
                    old_value: Some(Self::describe_list(&existing_items)),
                    new_value: Some(Self::describe_list(&merged)),
                });
                set_path(payload, field.path, Value::Array(merged));
                detail
            }
        }
    }

    /// Forces a change when the resource is declared enabled but the
    /// appliance record lacks an attribute it only reports while enabled.
    fn missing_enable_dependents(
        schema: &KindSchema,
        desired: &Map<String, Value>,
        existing: &Value,
    ) -> Vec<DiffDetail> {
        let Some(toggle) = schema.toggle_field() else {
            return Vec::new();
        };
        let enabled = desired
            .get(toggle.attr)
            .and_then(toggle_text)
            .is_some_and(|t| t == "Enable");
        if !enabled {
            return Vec::new();
        }

        schema
            .enable_dependents
            .iter()
            .filter_map(|attr| schema.field(attr))
            .filter(|field| get_path(existing, field.path).is_none())
            .map(|field| DiffDetail {
                field: field.attr.to_string(),
                old_value: None,
                new_value: desired.get(field.attr).and_then(scalar_text),
            })
            .collect()
    }

    fn describe_list(items: &[Value]) -> String {
        let mut keys: Vec<String> = items.iter().map(sort_key).collect();
        keys.sort();
        format!("[{}]", keys.join(", "))
    }
}

impl UpdatePlan {
    /// Returns the names of the attributes that differ.
    #[must_use]
    pub fn changed_fields(&self) -> Vec<&str> {
        self.details.iter().map(|d| d.field.as_str()).collect()
    }
}

impl std::fmt::Display for DiffDetail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.field,
            self.old_value.as_deref().unwrap_or("(unset)"),
            self.new_value.as_deref().unwrap_or("(unset)")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;
    use serde_json::json;

    fn strings(items: &[Value]) -> Vec<String> {
        items.iter().filter_map(scalar_text).collect()
    }

    fn attrs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_merge_list_add() {
        let merged = DiffEngine::merge_list(
            &[json!("A"), json!("B")],
            &[json!("C"), json!("A")],
            ListMutation::Add,
        );
        assert_eq!(strings(&merged), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_merge_list_remove() {
        let merged = DiffEngine::merge_list(
            &[json!("A"), json!("B"), json!("C")],
            &[json!("B")],
            ListMutation::Remove,
        );
        assert_eq!(strings(&merged), vec!["A", "C"]);
    }

    #[test]
    fn test_merge_list_replace() {
        let merged = DiffEngine::merge_list(
            &[json!("A"), json!("B")],
            &[json!("D"), json!("D")],
            ListMutation::Replace,
        );
        assert_eq!(strings(&merged), vec!["D"]);
    }

    #[test]
    fn test_merge_list_ignores_input_order() {
        let a = DiffEngine::merge_list(&[json!("B"), json!("A")], &[json!("C")], ListMutation::Add);
        let b = DiffEngine::merge_list(&[json!("A"), json!("B")], &[json!("C")], ListMutation::Add);
        assert!(DiffEngine::lists_equivalent(&a, &b));
    }

    #[test]
    fn test_reordered_list_is_not_a_change() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::IpHostGroup.schema();
        let existing = json!({ "Name": "GRP1", "HostList": { "Host": ["H1", "H2"] } });
        let desired = attrs(json!({ "hosts": ["H2", "H1"] }));

        assert!(!engine.requires_change(schema, &desired, &existing, ListMutation::Replace));
    }

    #[test]
    fn test_collapsed_single_item_list_matches() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::IpHostGroup.schema();
        let existing = json!({ "Name": "GRP1", "HostList": { "Host": "H1" } });
        let desired = attrs(json!({ "hosts": ["H1"] }));

        assert!(!engine.requires_change(schema, &desired, &existing, ListMutation::Replace));
    }

    #[test]
    fn test_absent_desired_fields_have_no_opinion() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::IpHostGroup.schema();
        let existing = json!({ "Name": "GRP1", "Description": "edge hosts" });
        let desired = attrs(json!({ "description": null }));

        assert!(!engine.requires_change(schema, &desired, &existing, ListMutation::Replace));
    }

    #[test]
    fn test_scalar_change_is_normalized() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::FirewallRule.schema();
        let existing = json!({ "Name": "allow-web", "Position": "Top", "Status": "Enable",
            "NetworkPolicy": { "LogTraffic": "Enable", "Action": "Accept" } });

        let same = attrs(json!({ "enabled": true, "action": "Accept" }));
        assert!(!engine.requires_change(schema, &same, &existing, ListMutation::Replace));

        let disabled = attrs(json!({ "enabled": false }));
        let plan = engine.plan_update(schema, Some("allow-web"), &disabled, &existing, ListMutation::Replace);
        assert!(plan.changed);
        assert_eq!(plan.changed_fields(), vec!["enabled"]);
        assert_eq!(plan.payload["Status"], "Disable");
    }

    #[test]
    fn test_numbers_compare_as_text() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::IpHost.schema();
        let existing = json!({ "Name": "h", "Subnet": "24" });
        let desired = attrs(json!({ "subnet": 24 }));

        assert!(!engine.requires_change(schema, &desired, &existing, ListMutation::Replace));
    }

    #[test]
    fn test_enabled_without_dependent_is_always_changed() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::FirewallRule.schema();
        let existing = json!({ "Name": "allow-web", "Status": "Enable",
            "NetworkPolicy": { "Action": "Accept" } });
        let desired = attrs(json!({ "enabled": true }));

        let plan = engine.plan_update(schema, Some("allow-web"), &desired, &existing, ListMutation::Replace);
        assert!(plan.changed);
        assert_eq!(plan.changed_fields(), vec!["log_traffic"]);
    }

    #[test]
    fn test_declared_dependent_is_reported_once() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::FirewallRule.schema();
        let existing = json!({ "Name": "allow-web", "Status": "Enable",
            "NetworkPolicy": { "Action": "Accept" } });
        let desired = attrs(json!({ "enabled": true, "log_traffic": "Enable" }));

        let plan = engine.plan_update(schema, Some("allow-web"), &desired, &existing, ListMutation::Replace);
        assert!(plan.changed);
        assert_eq!(plan.changed_fields(), vec!["log_traffic"]);
    }

    #[test]
    fn test_disabled_resource_ignores_dependents() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::FirewallRule.schema();
        let existing = json!({ "Name": "allow-web", "Status": "Disable" });
        let desired = attrs(json!({ "enabled": false }));

        assert!(!engine.requires_change(schema, &desired, &existing, ListMutation::Replace));
    }

    #[test]
    fn test_update_payload_is_fully_merged() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::IpHostGroup.schema();
        let existing = json!({
            "@transactionid": "",
            "Name": "GRP1",
            "Description": "edge hosts",
            "IPFamily": "IPv4",
            "HostList": { "Host": ["H2", "H3"] }
        });
        let desired = attrs(json!({ "hosts": ["H1", "H2"] }));

        let plan = engine.plan_update(schema, Some("GRP1"), &desired, &existing, ListMutation::Replace);

        assert!(plan.changed);
        assert_eq!(
            plan.payload,
            json!({
                "Name": "GRP1",
                "Description": "edge hosts",
                "IPFamily": "IPv4",
                "HostList": { "Host": ["H1", "H2"] }
            })
        );
    }

    #[test]
    fn test_add_mutation_detects_new_members_only() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::IpHostGroup.schema();
        let existing = json!({ "Name": "GRP1", "HostList": { "Host": ["H1", "H2"] } });

        let subset = attrs(json!({ "hosts": ["H2"] }));
        assert!(!engine.requires_change(schema, &subset, &existing, ListMutation::Add));

        let extra = attrs(json!({ "hosts": ["H3"] }));
        let plan = engine.plan_update(schema, Some("GRP1"), &extra, &existing, ListMutation::Add);
        assert_eq!(plan.payload["HostList"]["Host"], json!(["H1", "H2", "H3"]));
    }

    #[test]
    fn test_remove_mutation_of_missing_member_is_noop() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::IpHostGroup.schema();
        let existing = json!({ "Name": "GRP1", "HostList": { "Host": ["H1", "H2"] } });
        let desired = attrs(json!({ "hosts": ["H9"] }));

        assert!(!engine.requires_change(schema, &desired, &existing, ListMutation::Remove));
    }

    #[test]
    fn test_create_payload_uses_remote_field_names() {
        let engine = DiffEngine::new();
        let schema = ResourceKind::FirewallRule.schema();
        let desired = attrs(json!({
            "action": "Accept",
            "position": "Top",
            "enabled": true,
            "source_zones": ["LAN"]
        }));

        let payload = engine.build_create_payload(schema, Some("allow-web"), &desired, ListMutation::Add);

        assert_eq!(payload["Name"], "allow-web");
        assert_eq!(payload["Status"], "Enable");
        assert_eq!(payload["NetworkPolicy"]["Action"], "Accept");
        assert_eq!(payload["NetworkPolicy"]["SourceZones"]["Zone"], json!(["LAN"]));
    }

    #[test]
    fn test_records_equal_ignores_metadata() {
        let remote = json!({ "@transactionid": "", "TimeZone": "Europe/Paris", "Port": "123" });
        let desired = json!({ "TimeZone": "Europe/Paris", "Port": 123 });
        assert!(DiffEngine::records_equal(&remote, &desired));

        let other = json!({ "TimeZone": "UTC", "Port": 123 });
        assert!(!DiffEngine::records_equal(&remote, &other));

        let details = DiffEngine::record_details(&remote, &other);
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].field, "TimeZone");
    }
}
