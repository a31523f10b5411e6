//! Per-kind capability set consumed by the reconciler.
//!
//! The reconciler's control flow is the same for every kind; what differs
//! is how a kind is fetched, how its create and update payloads are built,
//! and which call submits them. [`ResourceAdapter`] captures exactly that.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Operation, Result, ServiceResult};
use crate::planner::{DiffEngine, UpdatePlan};
use crate::service::{DiagnosticCapture, OperationResponse, RemoteConfigService};

use super::kind::{FieldShape, KindSchema, SUCCESS_MARKER};
use super::model::{ListMutation, ResourceId, ResourceSpec};
use super::value::{scalar_text, toggle_text};

/// Mutation chosen by the reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationCall {
    /// Create with a full record.
    Create(Value),
    /// Update with a full record.
    Update(Value),
    /// Delete the named record.
    Delete(String),
}

impl MutationCall {
    /// Returns the operation this call performs.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Create(_) => Operation::Create,
            Self::Update(_) => Operation::Update,
            Self::Delete(_) => Operation::Delete,
        }
    }
}

/// Capability set the reconciler needs for one resource.
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Identity of the resource being reconciled.
    fn id(&self) -> &ResourceId;

    /// Status text that marks a successful mutation.
    fn success_marker(&self) -> &str {
        SUCCESS_MARKER
    }

    /// Reads the current record from the appliance.
    async fn fetch(&self, service: &dyn RemoteConfigService) -> ServiceResult<Value>;

    /// Builds the create payload, or lists the attributes a create is missing.
    ///
    /// # Errors
    ///
    /// Returns the names of missing required attributes.
    fn create_payload(&self, mutation: ListMutation) -> std::result::Result<Value, Vec<String>>;

    /// Plans an update of the existing record.
    fn plan_update(&self, existing: &Value, mutation: ListMutation) -> UpdatePlan;

    /// Name to delete, if the resource can be deleted by name.
    fn delete_name(&self, existing: &Value) -> Option<String>;

    /// Issues the mutation.
    async fn apply(
        &self,
        service: &dyn RemoteConfigService,
        call: &MutationCall,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse>;
}

/// Adapter for kinds with a dedicated schema.
#[derive(Debug, Clone)]
pub struct SchemaAdapter {
    /// Desired state.
    spec: ResourceSpec,
    /// Identity derived from the spec.
    id: ResourceId,
    /// Diff engine.
    engine: DiffEngine,
}

impl SchemaAdapter {
    /// Creates an adapter for a typed resource spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec's name does not fit its kind.
    pub fn new(spec: ResourceSpec) -> Result<Self> {
        spec.check_identity()?;
        let id = spec.id();
        Ok(Self {
            spec,
            id,
            engine: DiffEngine::new(),
        })
    }

    /// Returns the desired state.
    #[must_use]
    pub const fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    fn schema(&self) -> &'static KindSchema {
        self.spec.kind.schema()
    }

    fn is_provided(&self, attr: &str) -> bool {
        match self.spec.attributes.get(attr) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    /// Lists the required attributes missing for a create, in schema order.
    fn missing_attributes(&self) -> Vec<String> {
        let schema = self.schema();
        let mut missing: Vec<String> = schema
            .required_on_create
            .iter()
            .filter(|attr| !self.is_provided(attr))
            .map(|attr| (*attr).to_string())
            .collect();

        for cond in schema.conditional_required {
            let selected = self
                .spec
                .attributes
                .get(cond.attr)
                .and_then(|v| match schema.field(cond.attr).map(|f| f.shape) {
                    Some(FieldShape::Toggle) => toggle_text(v),
                    _ => scalar_text(v),
                })
                .is_some_and(|v| v == cond.equals);
            if !selected {
                continue;
            }
            for attr in cond.requires {
                if !self.is_provided(attr) && !missing.iter().any(|m| m == attr) {
                    missing.push((*attr).to_string());
                }
            }
        }

        missing
    }
}

#[async_trait]
impl ResourceAdapter for SchemaAdapter {
    fn id(&self) -> &ResourceId {
        &self.id
    }

    fn success_marker(&self) -> &str {
        self.schema().success_marker
    }

    async fn fetch(&self, service: &dyn RemoteConfigService) -> ServiceResult<Value> {
        service.get(&self.id.tag, self.id.name.as_deref()).await
    }

    fn create_payload(&self, mutation: ListMutation) -> std::result::Result<Value, Vec<String>> {
        let missing = self.missing_attributes();
        if !missing.is_empty() {
            return Err(missing);
        }
        Ok(self.engine.build_create_payload(
            self.schema(),
            self.id.name.as_deref(),
            &self.spec.attributes,
            mutation,
        ))
    }

    fn plan_update(&self, existing: &Value, mutation: ListMutation) -> UpdatePlan {
        self.engine.plan_update(
            self.schema(),
            self.id.name.as_deref(),
            &self.spec.attributes,
            existing,
            mutation,
        )
    }

    fn delete_name(&self, _existing: &Value) -> Option<String> {
        if self.schema().singleton {
            None
        } else {
            self.id.name.clone()
        }
    }

    async fn apply(
        &self,
        service: &dyn RemoteConfigService,
        call: &MutationCall,
        diagnostics: &DiagnosticCapture,
    ) -> ServiceResult<OperationResponse> {
        let tag = self.id.tag.as_str();
        match call {
            MutationCall::Create(record) => service.create(tag, record, diagnostics).await,
            MutationCall::Update(record) => {
                service
                    .update(tag, self.id.name.as_deref(), record, diagnostics)
                    .await
            }
            MutationCall::Delete(name) => service.delete(tag, name, diagnostics).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;
    use serde_json::json;

    #[test]
    fn test_rejects_mismatched_identity() {
        assert!(SchemaAdapter::new(ResourceSpec::singleton(ResourceKind::IpHost)).is_err());
        assert!(SchemaAdapter::new(ResourceSpec::named(ResourceKind::TimeSettings, "t")).is_err());
    }

    #[test]
    fn test_missing_required_attributes() {
        let adapter = SchemaAdapter::new(
            ResourceSpec::named(ResourceKind::FirewallRule, "allow-web").with("action", "Accept"),
        )
        .expect("adapter");

        assert_eq!(
            adapter.create_payload(ListMutation::Replace),
            Err(vec![String::from("position")])
        );
    }

    #[test]
    fn test_conditional_requirements_follow_selector() {
        let network = SchemaAdapter::new(
            ResourceSpec::named(ResourceKind::IpHost, "lan")
                .with("host_type", "Network")
                .with("ip_address", "10.0.0.0"),
        )
        .expect("adapter");
        assert_eq!(
            network.create_payload(ListMutation::Replace),
            Err(vec![String::from("subnet")])
        );

        let single = SchemaAdapter::new(
            ResourceSpec::named(ResourceKind::IpHost, "web-01")
                .with("host_type", "IP")
                .with("ip_address", "10.0.0.10"),
        )
        .expect("adapter");
        let payload = single.create_payload(ListMutation::Replace).expect("payload");
        assert_eq!(payload["Name"], "web-01");
        assert_eq!(payload["IPAddress"], "10.0.0.10");
    }

    #[test]
    fn test_empty_list_does_not_satisfy_requirement() {
        let adapter = SchemaAdapter::new(
            ResourceSpec::named(ResourceKind::Service, "https")
                .with("service_type", "TCPorUDP")
                .with("entries", json!([])),
        )
        .expect("adapter");

        assert_eq!(
            adapter.create_payload(ListMutation::Replace),
            Err(vec![String::from("entries")])
        );
    }

    #[test]
    fn test_singletons_cannot_be_deleted() {
        let adapter = SchemaAdapter::new(ResourceSpec::singleton(ResourceKind::TimeSettings))
            .expect("adapter");
        assert_eq!(adapter.delete_name(&json!({})), None);

        let named = SchemaAdapter::new(ResourceSpec::named(ResourceKind::IpHostGroup, "GRP1"))
            .expect("adapter");
        assert_eq!(named.delete_name(&json!({})), Some(String::from("GRP1")));
    }
}
