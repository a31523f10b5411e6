//! Core data model shared by the diff engine and the reconciler.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::error::{ConfigError, RampartError, Result};

use super::kind::ResourceKind;

/// Identity of a remote resource: the appliance tag plus the record name.
///
/// `name` is `None` for collection-level singletons such as time settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ResourceId {
    /// Appliance tag (e.g. `IPHostGroup`).
    pub tag: String,
    /// Record name, if the tag holds named records.
    pub name: Option<String>,
}

impl ResourceId {
    /// Creates an identity for a named record.
    #[must_use]
    pub fn named(tag: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: Some(name.into()),
        }
    }

    /// Creates an identity for a collection-level singleton.
    #[must_use]
    pub fn singleton(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: None,
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}/{name}", self.tag),
            None => write!(f, "{}", self.tag),
        }
    }
}

/// Desired state for a typed resource.
///
/// Attribute names are the caller-facing names from the kind's schema
/// (`hosts`, `enabled`, ...), not the appliance's field names.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Record name; must be `None` for singleton kinds.
    pub name: Option<String>,
    /// Desired attribute values.
    pub attributes: Map<String, Value>,
}

impl ResourceSpec {
    /// Creates a spec for a named resource.
    #[must_use]
    pub fn named(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            attributes: Map::new(),
        }
    }

    /// Creates a spec for a singleton kind.
    #[must_use]
    pub fn singleton(kind: ResourceKind) -> Self {
        Self {
            kind,
            name: None,
            attributes: Map::new(),
        }
    }

    /// Adds a desired attribute.
    #[must_use]
    pub fn with(mut self, attr: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(attr.into(), value.into());
        self
    }

    /// Returns the identity this spec addresses.
    #[must_use]
    pub fn id(&self) -> ResourceId {
        ResourceId {
            tag: self.kind.schema().tag.to_string(),
            name: self.name.clone(),
        }
    }

    /// Checks that the name matches the kind's singleton flag.
    ///
    /// # Errors
    ///
    /// Returns an error if a named kind has no name, or a singleton kind has one.
    pub fn check_identity(&self) -> Result<()> {
        let singleton = self.kind.schema().singleton;
        match (&self.name, singleton) {
            (None, false) => Err(RampartError::Config(ConfigError::validation(
                format!("{} resources require a name", self.kind),
                "name",
            ))),
            (Some(name), true) => Err(RampartError::Config(ConfigError::validation(
                format!("{} is a singleton and cannot be named '{name}'", self.kind),
                "name",
            ))),
            (Some(name), false) if name.trim().is_empty() => Err(RampartError::Config(
                ConfigError::validation("Resource name cannot be empty", "name"),
            )),
            _ => Ok(()),
        }
    }
}

/// The appliance's current view of a resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "record", rename_all = "lowercase")]
pub enum RemoteSnapshot {
    /// No matching record exists.
    Absent,
    /// The record as serialized by the appliance.
    Present(Value),
}

impl RemoteSnapshot {
    /// Returns true if the resource exists.
    #[must_use]
    pub const fn exists(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// Returns the record, if present.
    #[must_use]
    pub const fn record(&self) -> Option<&Value> {
        match self {
            Self::Present(record) => Some(record),
            Self::Absent => None,
        }
    }
}

/// How a desired list combines with the list already on the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListMutation {
    /// Union desired items into the existing list.
    Add,
    /// Subtract desired items from the existing list.
    Remove,
    /// Substitute the existing list wholesale.
    #[default]
    Replace,
}

/// The state the caller wants the resource to converge to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    /// Read the current state only.
    Query,
    /// Ensure the resource exists; never updates attributes.
    #[default]
    Present,
    /// Ensure the resource does not exist.
    Absent,
    /// Ensure an existing resource carries the desired attributes.
    Updated,
}

impl std::fmt::Display for ListMutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Remove => "remove",
            Self::Replace => "replace",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ListMutation {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "add" => Ok(Self::Add),
            "remove" => Ok(Self::Remove),
            "replace" => Ok(Self::Replace),
            other => Err(ConfigError::validation(
                format!("Unknown list mutation '{other}' (expected add, remove or replace)"),
                "list_mutation",
            )),
        }
    }
}

impl std::fmt::Display for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Query => "query",
            Self::Present => "present",
            Self::Absent => "absent",
            Self::Updated => "updated",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_display() {
        assert_eq!(ResourceId::named("IPHost", "web-01").to_string(), "IPHost/web-01");
        assert_eq!(ResourceId::singleton("Time").to_string(), "Time");
    }

    #[test]
    fn test_check_identity() {
        assert!(ResourceSpec::named(ResourceKind::IpHostGroup, "GRP1").check_identity().is_ok());
        assert!(ResourceSpec::singleton(ResourceKind::TimeSettings).check_identity().is_ok());
        assert!(ResourceSpec::singleton(ResourceKind::IpHostGroup).check_identity().is_err());
        assert!(ResourceSpec::named(ResourceKind::TimeSettings, "x").check_identity().is_err());
        assert!(ResourceSpec::named(ResourceKind::IpHost, " ").check_identity().is_err());
    }

    #[test]
    fn test_list_mutation_from_str() {
        assert_eq!("ADD".parse::<ListMutation>().ok(), Some(ListMutation::Add));
        assert_eq!(" remove ".parse::<ListMutation>().ok(), Some(ListMutation::Remove));
        assert!("merge".parse::<ListMutation>().is_err());
    }

    #[test]
    fn test_snapshot_serializes_with_state_tag() {
        let json = serde_json::to_value(RemoteSnapshot::Absent).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "absent" }));

        let json = serde_json::to_value(RemoteSnapshot::Present(serde_json::json!({ "Name": "a" })))
            .unwrap();
        assert_eq!(json["record"]["Name"], "a");
    }
}
