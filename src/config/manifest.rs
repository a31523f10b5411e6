//! Manifest types for the reconciliation system.
//!
//! This module defines the structs that map to the `rampart.yaml` file:
//! which appliance to converge, run-wide defaults, and the ordered list of
//! resources with their desired state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::reconciler::ReconcileRequest;
use crate::resource::{
    GenericAdapter, ListMutation, ResourceAdapter, ResourceId, ResourceKind, ResourceSpec,
    SchemaAdapter, TargetState,
};

/// The root manifest structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Appliance to converge.
    pub appliance: ApplianceConfig,
    /// Run-wide defaults.
    #[serde(default)]
    pub defaults: Defaults,
    /// Resources, reconciled in order.
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

/// Appliance configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApplianceConfig {
    /// Appliance name, used in logs and reports.
    pub name: String,
    /// Path of the appliance snapshot file, relative to the manifest.
    #[serde(default = "default_snapshot")]
    pub snapshot: PathBuf,
}

/// Run-wide defaults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Defaults {
    /// Decide without mutating.
    #[serde(default)]
    pub dry_run: bool,
    /// List mutation mode for entries that do not set one.
    #[serde(default)]
    pub list_mutation: ListMutation,
}

/// One manifest resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResourceEntry {
    /// Resource of a kind with a dedicated schema.
    Typed(TypedEntry),
    /// Raw payload for any appliance tag.
    Generic(GenericEntry),
}

/// Resource of a kind with a dedicated schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TypedEntry {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Record name; omitted for singleton kinds.
    #[serde(default)]
    pub name: Option<String>,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// List mutation mode, overriding the run default.
    #[serde(default)]
    pub list_mutation: Option<ListMutation>,
    /// Desired attributes.
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

/// Raw payload for an appliance tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GenericEntry {
    /// Appliance tag.
    pub tag: String,
    /// Record name, if not carried in the payload.
    #[serde(default)]
    pub name: Option<String>,
    /// Key/value filter locating the record.
    #[serde(default)]
    pub filter: Option<FilterConfig>,
    /// Target state.
    #[serde(default)]
    pub state: TargetState,
    /// Record as the appliance stores it.
    #[serde(default)]
    pub payload: Value,
}

/// Key/value filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Field to match.
    pub key: String,
    /// Value to match.
    pub value: String,
}

fn default_snapshot() -> PathBuf {
    PathBuf::from("appliance.json")
}

impl Manifest {
    /// Resolves the snapshot path against the manifest's directory.
    #[must_use]
    pub fn snapshot_path(&self, base: &Path) -> PathBuf {
        if self.appliance.snapshot.is_absolute() {
            self.appliance.snapshot.clone()
        } else {
            base.join(&self.appliance.snapshot)
        }
    }
}

impl ResourceEntry {
    /// Returns the target state.
    #[must_use]
    pub const fn state(&self) -> TargetState {
        match self {
            Self::Typed(entry) => entry.state,
            Self::Generic(entry) => entry.state,
        }
    }

    /// Returns the identity the entry addresses.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Typed(entry) => ResourceId {
                tag: entry.kind.schema().tag.to_string(),
                name: entry.name.clone(),
            },
            Self::Generic(entry) => entry.adapter().id().clone(),
        }
    }

    /// Builds the reconcile request for this entry.
    #[must_use]
    pub fn request(&self, defaults: &Defaults) -> ReconcileRequest {
        let list_mutation = match self {
            Self::Typed(entry) => entry.list_mutation.unwrap_or(defaults.list_mutation),
            Self::Generic(_) => defaults.list_mutation,
        };
        ReconcileRequest::new(self.state())
            .with_dry_run(defaults.dry_run)
            .with_list_mutation(list_mutation)
    }

    /// Builds the adapter that reconciles this entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a typed entry's name does not fit its kind.
    pub fn adapter(&self) -> Result<Box<dyn ResourceAdapter>> {
        match self {
            Self::Typed(entry) => Ok(Box::new(SchemaAdapter::new(entry.spec())?)),
            Self::Generic(entry) => Ok(Box::new(entry.adapter())),
        }
    }
}

impl TypedEntry {
    /// Returns the resource spec for this entry.
    #[must_use]
    pub fn spec(&self) -> ResourceSpec {
        ResourceSpec {
            kind: self.kind,
            name: self.name.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

impl GenericEntry {
    /// Returns the adapter for this entry.
    #[must_use]
    pub fn adapter(&self) -> GenericAdapter {
        let mut adapter = GenericAdapter::new(&self.tag, self.payload.clone());
        if let Some(name) = &self.name {
            adapter = adapter.with_name(name);
        }
        if let Some(filter) = &self.filter {
            adapter = adapter.with_filter(&filter.key, &filter.value);
        }
        adapter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Lookup;

    #[test]
    fn test_untagged_entries() {
        let yaml = r"
appliance:
  name: edge-fw
resources:
  - kind: ip_host_group
    name: GRP1
    state: updated
    list_mutation: add
    attributes:
      hosts: [H1, H2]
  - tag: SyslogServers
    filter:
      key: Port
      value: '514'
    payload:
      Port: '514'
";
        let manifest: Manifest = serde_yaml::from_str(yaml).expect("manifest");
        assert_eq!(manifest.appliance.snapshot, PathBuf::from("appliance.json"));
        assert_eq!(manifest.resources.len(), 2);

        let typed = &manifest.resources[0];
        assert!(matches!(typed, ResourceEntry::Typed(_)));
        assert_eq!(typed.id().to_string(), "IPHostGroup/GRP1");
        let request = typed.request(&manifest.defaults);
        assert_eq!(request.target, TargetState::Updated);
        assert_eq!(request.list_mutation, ListMutation::Add);

        match &manifest.resources[1] {
            ResourceEntry::Generic(entry) => {
                assert_eq!(entry.state, TargetState::Present);
                assert_eq!(
                    entry.adapter().lookup(),
                    Lookup::Filter {
                        key: String::from("Port"),
                        value: String::from("514"),
                    }
                );
            }
            ResourceEntry::Typed(_) => panic!("expected a generic entry"),
        }
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let yaml = r"
appliance:
  name: edge-fw
resources:
  - kind: ip_host
    name: web
    colour: blue
";
        assert!(serde_yaml::from_str::<Manifest>(yaml).is_err());
    }

    #[test]
    fn test_defaults_apply_to_requests() {
        let yaml = r"
appliance:
  name: edge-fw
  snapshot: /var/lib/rampart/edge.json
defaults:
  dry_run: true
  list_mutation: remove
resources:
  - kind: time_settings
    state: updated
    attributes:
      timezone: UTC
";
        let manifest: Manifest = serde_yaml::from_str(yaml).expect("manifest");
        let request = manifest.resources[0].request(&manifest.defaults);
        assert!(request.dry_run);
        assert_eq!(request.list_mutation, ListMutation::Remove);
        assert_eq!(
            manifest.snapshot_path(Path::new("/etc/rampart")),
            PathBuf::from("/var/lib/rampart/edge.json")
        );
    }
}
