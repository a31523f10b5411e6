//! Manifest validation.
//!
//! This module checks a manifest before anything is sent to the appliance,
//! so that a run never stops halfway through on a mistake that was visible
//! up front.

use crate::error::{ConfigError, RampartError, Result};
use crate::resource::{FieldShape, ResourceKind, TargetState};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use super::manifest::{GenericEntry, Manifest, ResourceEntry, TypedEntry};

/// Longest record name the appliance accepts by default.
const DEFAULT_MAX_NAME_LEN: usize = 60;

/// Validator for manifests.
#[derive(Debug)]
pub struct ManifestValidator {
    /// Longest accepted record name.
    max_name_len: usize,
}

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ManifestValidator {
    /// Creates a new validator with the default name length limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }

    /// Sets the longest accepted record name.
    #[must_use]
    pub const fn with_max_name_len(mut self, max_name_len: usize) -> Self {
        self.max_name_len = max_name_len;
        self
    }

    /// Collects every error and warning in a manifest.
    #[must_use]
    pub fn check(&self, manifest: &Manifest) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_appliance(manifest, &mut result);
        self.validate_resources(&manifest.resources, &mut result);

        result
    }

    /// Validates a manifest.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails.
    pub fn validate(&self, manifest: &Manifest) -> Result<ValidationResult> {
        let result = self.check(manifest);

        if result.errors.is_empty() {
            debug!("Manifest validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(RampartError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    fn validate_appliance(manifest: &Manifest, result: &mut ValidationResult) {
        let name = &manifest.appliance.name;
        if name.is_empty() {
            result.error("appliance.name", "Appliance name cannot be empty");
        } else if !is_valid_appliance_name(name) {
            result.error(
                "appliance.name",
                format!(
                    "Appliance name '{name}' is invalid. Must be lowercase alphanumeric with hyphens."
                ),
            );
        }

        if manifest.appliance.snapshot.as_os_str().is_empty() {
            result.error("appliance.snapshot", "Snapshot path cannot be empty");
        }
    }

    fn validate_resources(&self, resources: &[ResourceEntry], result: &mut ValidationResult) {
        if resources.is_empty() {
            result.warnings.push(String::from("No resources defined in manifest"));
            return;
        }

        let mut seen = HashSet::new();

        for (i, entry) in resources.iter().enumerate() {
            let prefix = format!("resources[{i}]");

            let identity = entry.id().to_string();
            if !seen.insert(identity.clone()) {
                result.error(
                    format!("{prefix}.name"),
                    format!("Duplicate resource: {identity}"),
                );
            }

            match entry {
                ResourceEntry::Typed(typed) => self.validate_typed(typed, &prefix, result),
                ResourceEntry::Generic(generic) => self.validate_generic(generic, &prefix, result),
            }
        }
    }

    fn validate_typed(&self, entry: &TypedEntry, prefix: &str, result: &mut ValidationResult) {
        let schema = entry.kind.schema();

        match (&entry.name, schema.singleton) {
            (Some(_), true) => result.error(
                format!("{prefix}.name"),
                format!("{} is a singleton and cannot be named", entry.kind),
            ),
            (None, false) => result.error(
                format!("{prefix}.name"),
                format!("{} resources require a name", entry.kind),
            ),
            (Some(name), false) => self.validate_name(name, prefix, result),
            (None, true) => {}
        }

        if schema.singleton && entry.state == TargetState::Absent {
            result.error(
                format!("{prefix}.state"),
                format!("{} is a singleton and cannot be deleted", entry.kind),
            );
        }

        for (attr, value) in &entry.attributes {
            let field_path = format!("{prefix}.attributes.{attr}");
            let Some(field) = schema.field(attr) else {
                result.error(
                    field_path,
                    format!("Unknown attribute '{attr}' for {}", entry.kind),
                );
                continue;
            };

            match (field.shape, value) {
                (_, Value::Null)
                | (FieldShape::List, Value::Array(_))
                | (FieldShape::Toggle, Value::Bool(_))
                | (FieldShape::Scalar, Value::String(_) | Value::Number(_) | Value::Bool(_)) => {}
                (FieldShape::List, _) => result.error(field_path, "Expected a list"),
                (FieldShape::Toggle, _) => result.error(field_path, "Expected true or false"),
                (FieldShape::Scalar, _) => result.error(field_path, "Expected a single value"),
            }
        }

        if entry.state == TargetState::Updated && entry.attributes.is_empty() {
            result.warnings.push(format!(
                "{prefix}: state is 'updated' but no attributes are declared"
            ));
        }
        if entry.list_mutation.is_some() && !schema.fields.iter().any(|f| f.shape == FieldShape::List) {
            result.warnings.push(format!(
                "{prefix}.list_mutation: {} has no list attributes",
                entry.kind
            ));
        }
    }

    fn validate_generic(&self, entry: &GenericEntry, prefix: &str, result: &mut ValidationResult) {
        if entry.tag.trim().is_empty() {
            result.error(format!("{prefix}.tag"), "Tag cannot be empty");
        } else if let Some(kind) = ResourceKind::from_tag(&entry.tag) {
            result.warnings.push(format!(
                "{prefix}.tag: '{}' has a dedicated kind; consider 'kind: {kind}'",
                entry.tag
            ));
        }

        if let Some(name) = &entry.name {
            self.validate_name(name, prefix, result);
        }

        if let Some(filter) = &entry.filter
            && filter.key.trim().is_empty()
        {
            result.error(format!("{prefix}.filter.key"), "Filter key cannot be empty");
        }

        let needs_payload = matches!(entry.state, TargetState::Present | TargetState::Updated);
        match &entry.payload {
            Value::Object(map) if !map.is_empty() => {}
            Value::Null if !needs_payload => {}
            Value::Object(_) | Value::Null => result.error(
                format!("{prefix}.payload"),
                format!("A payload is required for state '{}'", entry.state),
            ),
            _ => result.error(format!("{prefix}.payload"), "Payload must be a mapping"),
        }
    }

    fn validate_name(&self, name: &str, prefix: &str, result: &mut ValidationResult) {
        if !is_valid_resource_name(name, self.max_name_len) {
            result.error(
                format!("{prefix}.name"),
                format!(
                    "Resource name '{name}' is invalid. Must be 1-{} characters without '/' or surrounding whitespace.",
                    self.max_name_len
                ),
            );
        }
    }
}

/// Validates that an appliance name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_appliance_name(name: &str) -> bool {
    let mut chars = name.chars();

    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return false;
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

/// Validates a record name as the appliance stores it.
fn is_valid_resource_name(name: &str, max_len: usize) -> bool {
    !name.is_empty()
        && name.chars().count() <= max_len
        && name.trim() == name
        && !name.chars().any(|c| c == '/' || c.is_control())
}

impl Default for ManifestValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
