//! Manifest module for the Rampart reconciler.
//!
//! This module handles everything about the `rampart.yaml` manifest:
//! - Deserializing appliance, defaults and resource entries
//! - Loading from disk with `.env` and environment overrides
//! - Validation before anything reaches the appliance

mod manifest;
mod parser;
mod validator;

pub use manifest::{
    ApplianceConfig, Defaults, FilterConfig, GenericEntry, Manifest, ResourceEntry, TypedEntry,
};
pub use parser::{
    DEFAULT_MANIFEST_FILES, ENV_APPLIANCE_NAME, ENV_DRY_RUN, ENV_LIST_MUTATION, ENV_SNAPSHOT,
    ManifestParser, find_manifest_file,
};
pub use validator::{ManifestValidator, ValidationError, ValidationResult};
