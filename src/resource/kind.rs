//! Resource kinds and their per-kind schemas.
//!
//! A [`KindSchema`] is the static description of a kind: the appliance tag,
//! how caller-facing attributes map onto the appliance record, which
//! attributes a create needs, and which attributes only mean something
//! while the resource is enabled.

use serde::{Deserialize, Serialize};

/// Status text the appliance returns when a change was applied in full.
pub const SUCCESS_MARKER: &str = "Configuration applied successfully.";

/// How an attribute is represented on the appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    /// A single value compared as text.
    Scalar,
    /// A boolean mapped to the appliance's `Enable`/`Disable` enum.
    Toggle,
    /// An unordered list, combined according to a list mutation.
    List,
}

/// Mapping of one caller-facing attribute onto the appliance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Caller-facing attribute name.
    pub attr: &'static str,
    /// Path of nested keys inside the appliance record.
    pub path: &'static [&'static str],
    /// Value representation.
    pub shape: FieldShape,
}

impl FieldSpec {
    const fn scalar(attr: &'static str, path: &'static [&'static str]) -> Self {
        Self {
            attr,
            path,
            shape: FieldShape::Scalar,
        }
    }

    const fn toggle(attr: &'static str, path: &'static [&'static str]) -> Self {
        Self {
            attr,
            path,
            shape: FieldShape::Toggle,
        }
    }

    const fn list(attr: &'static str, path: &'static [&'static str]) -> Self {
        Self {
            attr,
            path,
            shape: FieldShape::List,
        }
    }
}

/// Attributes required on create only when a selector attribute has a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalRequirement {
    /// Selector attribute.
    pub attr: &'static str,
    /// Selector value that triggers the requirement.
    pub equals: &'static str,
    /// Attributes required in that case.
    pub requires: &'static [&'static str],
}

/// Static description of a resource kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSchema {
    /// Appliance tag.
    pub tag: &'static str,
    /// True if the tag holds exactly one unnamed record.
    pub singleton: bool,
    /// Attribute mappings.
    pub fields: &'static [FieldSpec],
    /// Attributes that must be present to create the resource.
    pub required_on_create: &'static [&'static str],
    /// Extra create requirements keyed on a selector attribute.
    pub conditional_required: &'static [ConditionalRequirement],
    /// Attributes the appliance only reports while `enabled` is on.
    pub enable_dependents: &'static [&'static str],
    /// Status text that marks a successful mutation of this kind.
    pub success_marker: &'static str,
}

impl KindSchema {
    /// Looks up the mapping for an attribute.
    #[must_use]
    pub fn field(&self, attr: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.attr == attr)
    }

    /// Returns the toggle field, if the kind has one.
    #[must_use]
    pub fn toggle_field(&self) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.shape == FieldShape::Toggle)
    }
}

/// Resource kinds with a dedicated schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Single host, network, range or address list.
    IpHost,
    /// Group of IP hosts.
    IpHostGroup,
    /// TCP/UDP/ICMP service definition.
    Service,
    /// Group of services.
    ServiceGroup,
    /// Firewall rule (network policy).
    FirewallRule,
    /// Group of firewall rules.
    FirewallRuleGroup,
    /// SNMP agent configuration.
    SnmpAgent,
    /// Time zone and NTP settings.
    TimeSettings,
    /// Hostname and administrative language settings.
    LocaleSettings,
}

static IP_HOST: KindSchema = KindSchema {
    tag: "IPHost",
    singleton: false,
    fields: &[
        FieldSpec::scalar("ip_family", &["IPFamily"]),
        FieldSpec::scalar("host_type", &["HostType"]),
        FieldSpec::scalar("ip_address", &["IPAddress"]),
        FieldSpec::scalar("subnet", &["Subnet"]),
        FieldSpec::scalar("start_ip", &["StartIPAddress"]),
        FieldSpec::scalar("end_ip", &["EndIPAddress"]),
        FieldSpec::scalar("ip_list", &["ListOfIPAddresses"]),
        FieldSpec::list("host_groups", &["HostGroupList", "HostGroup"]),
    ],
    required_on_create: &["host_type"],
    conditional_required: &[
        ConditionalRequirement {
            attr: "host_type",
            equals: "IP",
            requires: &["ip_address"],
        },
        ConditionalRequirement {
            attr: "host_type",
            equals: "Network",
            requires: &["ip_address", "subnet"],
        },
        ConditionalRequirement {
            attr: "host_type",
            equals: "IPRange",
            requires: &["start_ip", "end_ip"],
        },
        ConditionalRequirement {
            attr: "host_type",
            equals: "IPList",
            requires: &["ip_list"],
        },
    ],
    enable_dependents: &[],
    success_marker: SUCCESS_MARKER,
};

static IP_HOST_GROUP: KindSchema = KindSchema {
    tag: "IPHostGroup",
    singleton: false,
    fields: &[
        FieldSpec::scalar("description", &["Description"]),
        FieldSpec::scalar("ip_family", &["IPFamily"]),
        FieldSpec::list("hosts", &["HostList", "Host"]),
    ],
    required_on_create: &[],
    conditional_required: &[],
    enable_dependents: &[],
    success_marker: SUCCESS_MARKER,
};

static SERVICE: KindSchema = KindSchema {
    tag: "Services",
    singleton: false,
    fields: &[
        FieldSpec::scalar("service_type", &["Type"]),
        FieldSpec::scalar("description", &["Description"]),
        FieldSpec::list("entries", &["ServiceDetails", "ServiceDetail"]),
    ],
    required_on_create: &["service_type", "entries"],
    conditional_required: &[],
    enable_dependents: &[],
    success_marker: SUCCESS_MARKER,
};

static SERVICE_GROUP: KindSchema = KindSchema {
    tag: "ServiceGroup",
    singleton: false,
    fields: &[
        FieldSpec::scalar("description", &["Description"]),
        FieldSpec::list("services", &["ServiceList", "Service"]),
    ],
    required_on_create: &[],
    conditional_required: &[],
    enable_dependents: &[],
    success_marker: SUCCESS_MARKER,
};

static FIREWALL_RULE: KindSchema = KindSchema {
    tag: "FirewallRule",
    singleton: false,
    fields: &[
        FieldSpec::scalar("description", &["Description"]),
        FieldSpec::toggle("enabled", &["Status"]),
        FieldSpec::scalar("position", &["Position"]),
        FieldSpec::scalar("after_rule", &["After", "Name"]),
        FieldSpec::scalar("action", &["NetworkPolicy", "Action"]),
        FieldSpec::scalar("log_traffic", &["NetworkPolicy", "LogTraffic"]),
        FieldSpec::list("source_zones", &["NetworkPolicy", "SourceZones", "Zone"]),
        FieldSpec::list("destination_zones", &["NetworkPolicy", "DestinationZones", "Zone"]),
        FieldSpec::list("source_networks", &["NetworkPolicy", "SourceNetworks", "Network"]),
        FieldSpec::list(
            "destination_networks",
            &["NetworkPolicy", "DestinationNetworks", "Network"],
        ),
        FieldSpec::list("services", &["NetworkPolicy", "Services", "Service"]),
    ],
    required_on_create: &["action", "position"],
    conditional_required: &[ConditionalRequirement {
        attr: "position",
        equals: "After",
        requires: &["after_rule"],
    }],
    enable_dependents: &["log_traffic"],
    success_marker: SUCCESS_MARKER,
};

static FIREWALL_RULE_GROUP: KindSchema = KindSchema {
    tag: "FirewallRuleGroup",
    singleton: false,
    fields: &[
        FieldSpec::scalar("description", &["Description"]),
        FieldSpec::scalar("policy_type", &["Policytype"]),
        FieldSpec::list("rules", &["SecurityPolicyList", "SecurityPolicy"]),
        FieldSpec::list("source_zones", &["SourceZones", "Zone"]),
        FieldSpec::list("destination_zones", &["DestinationZones", "Zone"]),
    ],
    required_on_create: &[],
    conditional_required: &[],
    enable_dependents: &[],
    success_marker: SUCCESS_MARKER,
};

static SNMP_AGENT: KindSchema = KindSchema {
    tag: "SNMPAgentConfiguration",
    singleton: true,
    fields: &[
        FieldSpec::toggle("enabled", &["Configuration", "AgentStatus"]),
        FieldSpec::scalar("agent_name", &["Configuration", "Name"]),
        FieldSpec::scalar("description", &["Configuration", "Description"]),
        FieldSpec::scalar("location", &["Configuration", "Location"]),
        FieldSpec::scalar("contact_person", &["Configuration", "ContactPerson"]),
    ],
    required_on_create: &[],
    conditional_required: &[],
    enable_dependents: &["location", "contact_person"],
    success_marker: SUCCESS_MARKER,
};

static TIME_SETTINGS: KindSchema = KindSchema {
    tag: "Time",
    singleton: true,
    fields: &[
        FieldSpec::scalar("timezone", &["TimeZone"]),
        FieldSpec::scalar("ntp_mode", &["SetDateTime", "NTPServer", "NTPServerType"]),
        FieldSpec::list("ntp_servers", &["SetDateTime", "NTPServer", "NTPServerList", "Server"]),
    ],
    required_on_create: &[],
    conditional_required: &[],
    enable_dependents: &[],
    success_marker: SUCCESS_MARKER,
};

static LOCALE_SETTINGS: KindSchema = KindSchema {
    tag: "AdminSettings",
    singleton: true,
    fields: &[
        FieldSpec::scalar("hostname", &["HostnameSettings", "HostName"]),
        FieldSpec::scalar("hostname_description", &["HostnameSettings", "HostNameDesc"]),
        FieldSpec::scalar("language", &["WebAdminSettings", "Language"]),
    ],
    required_on_create: &[],
    conditional_required: &[],
    enable_dependents: &[],
    success_marker: SUCCESS_MARKER,
};

impl ResourceKind {
    /// Every kind with a dedicated schema.
    pub const ALL: [Self; 9] = [
        Self::IpHost,
        Self::IpHostGroup,
        Self::Service,
        Self::ServiceGroup,
        Self::FirewallRule,
        Self::FirewallRuleGroup,
        Self::SnmpAgent,
        Self::TimeSettings,
        Self::LocaleSettings,
    ];

    /// Returns the static schema for this kind.
    #[must_use]
    pub fn schema(self) -> &'static KindSchema {
        match self {
            Self::IpHost => &IP_HOST,
            Self::IpHostGroup => &IP_HOST_GROUP,
            Self::Service => &SERVICE,
            Self::ServiceGroup => &SERVICE_GROUP,
            Self::FirewallRule => &FIREWALL_RULE,
            Self::FirewallRuleGroup => &FIREWALL_RULE_GROUP,
            Self::SnmpAgent => &SNMP_AGENT,
            Self::TimeSettings => &TIME_SETTINGS,
            Self::LocaleSettings => &LOCALE_SETTINGS,
        }
    }

    /// Finds the kind whose schema uses the given appliance tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.schema().tag == tag)
    }

    /// Returns the manifest name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IpHost => "ip_host",
            Self::IpHostGroup => "ip_host_group",
            Self::Service => "service",
            Self::ServiceGroup => "service_group",
            Self::FirewallRule => "firewall_rule",
            Self::FirewallRuleGroup => "firewall_rule_group",
            Self::SnmpAgent => "snmp_agent",
            Self::TimeSettings => "time_settings",
            Self::LocaleSettings => "locale_settings",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_tags_are_unique() {
        let tags: HashSet<_> = ResourceKind::ALL.iter().map(|k| k.schema().tag).collect();
        assert_eq!(tags.len(), ResourceKind::ALL.len());
    }

    #[test]
    fn test_from_tag_round_trips() {
        for kind in ResourceKind::ALL {
            assert_eq!(ResourceKind::from_tag(kind.schema().tag), Some(kind));
        }
        assert_eq!(ResourceKind::from_tag("Unknown"), None);
    }

    #[test]
    fn test_required_attributes_are_declared_fields() {
        for kind in ResourceKind::ALL {
            let schema = kind.schema();
            for attr in schema.required_on_create.iter().chain(schema.enable_dependents) {
                assert!(schema.field(attr).is_some(), "{kind}: {attr} is not a field");
            }
            for cond in schema.conditional_required {
                assert!(schema.field(cond.attr).is_some(), "{kind}: {}", cond.attr);
                for attr in cond.requires {
                    assert!(schema.field(attr).is_some(), "{kind}: {attr} is not a field");
                }
            }
        }
    }

    #[test]
    fn test_enable_dependents_need_a_toggle() {
        for kind in ResourceKind::ALL {
            let schema = kind.schema();
            if !schema.enable_dependents.is_empty() {
                assert!(schema.toggle_field().is_some(), "{kind} has no toggle");
            }
        }
    }
}
