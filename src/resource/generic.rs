//! Kind-agnostic adapter for tags without a dedicated schema.
//!
//! The caller supplies the appliance tag and the record exactly as the
//! appliance stores it. Updates compare whole records instead of
//! individual attributes.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceResult;
use crate::planner::{DiffEngine, UpdatePlan};
use crate::service::{
    DiagnosticCapture, OperationResponse, RawOperation, RemoteConfigService,
};

use super::adapter::{MutationCall, ResourceAdapter};
use super::model::{ListMutation, ResourceId};
use super::value::{NAME_FIELD, record_name};

/// How the current record is located.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// By record name.
    Name(String),
    /// By the first record whose `key` field equals `value`.
    Filter {
        /// Field to match.
        key: String,
        /// Value to match.
        value: String,
    },
    /// The tag as a whole.
    Collection,
}

/// Adapter over an arbitrary tag and raw payload.
#[derive(Debug, Clone)]
pub struct GenericAdapter {
    /// Identity, recomputed whenever the lookup changes.
    id: ResourceId,
    /// Record as the appliance stores it.
    payload: Value,
    /// Explicit name, if given.
    name: Option<String>,
    /// Key/value filter, if given.
    filter: Option<(String, String)>,
}

impl GenericAdapter {
    /// Creates an adapter for a tag and payload.
    #[must_use]
    pub fn new(tag: impl Into<String>, payload: Value) -> Self {
        let mut adapter = Self {
            id: ResourceId::singleton(tag),
            payload,
            name: None,
            filter: None,
        };
        adapter.refresh_id();
        adapter
    }

    /// Locates the record by an explicit name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self.refresh_id();
        self
    }

    /// Locates the record by a key/value filter.
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter = Some((key.into(), value.into()));
        self
    }

    /// Returns the payload.
    #[must_use]
    pub const fn payload(&self) -> &Value {
        &self.payload
    }

    /// Resolves how the current record is located.
    ///
    /// Explicit name first, then the payload's `Name` field, then the
    /// filter, then the whole tag.
    #[must_use]
    pub fn lookup(&self) -> Lookup {
        if let Some(name) = self.resolved_name() {
            return Lookup::Name(name);
        }
        match &self.filter {
            Some((key, value)) => Lookup::Filter {
                key: key.clone(),
                value: value.clone(),
            },
            None => Lookup::Collection,
        }
    }

    fn resolved_name(&self) -> Option<String> {
        self.name.clone().or_else(|| record_name(&self.payload))
    }

    fn refresh_id(&mut self) {
        self.id.name = self.resolved_name();
    }

    fn has_payload(&self) -> bool {
        self.payload.as_object().is_some_and(|map| !map.is_empty())
    }

    /// Payload with the resolved name written into it.
    fn desired_record(&self) -> Value {
        let mut record = self.payload.clone();
        if let (Some(name), Value::Object(map)) = (&self.name, &mut record) {
            map.insert(NAME_FIELD.to_string(), Value::String(name.clone()));
        }
        record
    }
}

#[async_trait]
impl ResourceAdapter for GenericAdapter {
    fn id(&self) -> &ResourceId {
        &self.id
    }

    async fn fetch(&self, service: &dyn RemoteConfigService) -> ServiceResult<Value> {
        let tag = self.id.tag.as_str();
        match self.lookup() {
            Lookup::Name(name) => service.get(tag, Some(&name)).await,
            Lookup::Filter { key, value } => service.get_filtered(tag, &key, &value).await,
            Lookup::Collection => service.get(tag, None).await,
        }
    }

    fn create_payload(&self, _mutation: ListMutation) -> std::result::Result<Value, Vec<String>> {
        if self.has_payload() {
            Ok(self.desired_record())
        } else {
            Err(vec![String::from("payload")])
        }
    }

    fn plan_update(&self, existing: &Value, _mutation: ListMutation) -> UpdatePlan {
        let mut payload = self.desired_record();
        if let (None, Some(name), Value::Object(map)) =
            (self.resolved_name(), record_name(existing), &mut payload)
        {
            map.insert(NAME_FIELD.to_string(), Value::String(name));
        }
        if !self.has_payload() || DiffEngine::records_equal(existing, &payload) {
            return UpdatePlan {
                changed: false,
                payload,
                details: Vec::new(),
            };
        }

        UpdatePlan {
            changed: true,
            details: DiffEngine::record_details(existing, &payload),
            payload,
        }
    }

    fn delete_name(&self, existing: &Value) -> Option<String> {
        self.resolved_name().or_else(|| record_name(existing))
    }

    async fn apply(
        &self,
        service: &dyn RemoteConfigService,
        call: &MutationCall,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse> {
        let tag = self.id.tag.as_str();
        match call {
            MutationCall::Create(payload) => {
                service
                    .submit_raw(tag, payload, RawOperation::Create, diagnostics)
                    .await
            }
            MutationCall::Update(payload) => {
                service
                    .submit_raw(tag, payload, RawOperation::Update, diagnostics)
                    .await
            }
            MutationCall::Delete(name) => service.delete(tag, name, diagnostics).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_resolution_order() {
        let payload = json!({ "Name": "from-payload", "Port": "514" });

        let explicit = GenericAdapter::new("SyslogServers", payload.clone())
            .with_name("explicit")
            .with_filter("Port", "514");
        assert_eq!(explicit.lookup(), Lookup::Name(String::from("explicit")));
        assert_eq!(explicit.id().to_string(), "SyslogServers/explicit");

        let embedded = GenericAdapter::new("SyslogServers", payload).with_filter("Port", "514");
        assert_eq!(embedded.lookup(), Lookup::Name(String::from("from-payload")));

        let filtered = GenericAdapter::new("SyslogServers", json!({ "Port": "514" }))
            .with_filter("Port", "514");
        assert_eq!(
            filtered.lookup(),
            Lookup::Filter {
                key: String::from("Port"),
                value: String::from("514"),
            }
        );

        let collection = GenericAdapter::new("Time", json!({ "TimeZone": "UTC" }));
        assert_eq!(collection.lookup(), Lookup::Collection);
        assert_eq!(collection.id().to_string(), "Time");
    }

    #[test]
    fn test_update_ignores_transaction_metadata() {
        let adapter = GenericAdapter::new("Time", json!({ "TimeZone": "UTC" }));
        let existing = json!({ "@transactionid": "4", "TimeZone": "UTC" });

        let plan = adapter.plan_update(&existing, ListMutation::Replace);
        assert!(!plan.changed);
    }

    #[test]
    fn test_any_difference_triggers_full_update() {
        let adapter = GenericAdapter::new("Time", json!({ "TimeZone": "Europe/Paris", "Format": "24" }));
        let existing = json!({ "@transactionid": "4", "TimeZone": "UTC", "Format": "24" });

        let plan = adapter.plan_update(&existing, ListMutation::Replace);
        assert!(plan.changed);
        assert_eq!(plan.changed_fields(), vec!["TimeZone"]);
        assert_eq!(plan.payload, json!({ "TimeZone": "Europe/Paris", "Format": "24" }));
    }

    #[test]
    fn test_explicit_name_is_written_into_payload() {
        let adapter = GenericAdapter::new("SyslogServers", json!({ "Port": "514" })).with_name("siem");
        let payload = adapter.create_payload(ListMutation::Replace).expect("payload");
        assert_eq!(payload["Name"], "siem");
    }

    #[test]
    fn test_empty_payload_cannot_be_created() {
        let adapter = GenericAdapter::new("SyslogServers", Value::Null).with_name("siem");
        assert_eq!(
            adapter.create_payload(ListMutation::Replace),
            Err(vec![String::from("payload")])
        );
    }

    #[test]
    fn test_filtered_update_keeps_record_name() {
        let adapter = GenericAdapter::new("SyslogServers", json!({ "Port": "514", "Level": "debug" }))
            .with_filter("Port", "514");
        let existing = json!({ "@transactionid": "1", "Name": "siem", "Port": "514", "Level": "info" });

        let plan = adapter.plan_update(&existing, ListMutation::Replace);
        assert!(plan.changed);
        assert_eq!(plan.changed_fields(), vec!["Level"]);
        assert_eq!(plan.payload["Name"], "siem");
    }

    #[test]
    fn test_delete_name_falls_back_to_record() {
        let adapter = GenericAdapter::new("SyslogServers", json!({ "Port": "514" }))
            .with_filter("Port", "514");
        assert_eq!(
            adapter.delete_name(&json!({ "Name": "siem", "Port": "514" })),
            Some(String::from("siem"))
        );
    }
}
