//! Manifest parser for loading `rampart.yaml` files.
//!
//! This module handles loading the manifest from YAML and applying
//! environment variable overrides, with proper precedence and error handling.

use crate::error::{ConfigError, RampartError, Result};
use crate::resource::ListMutation;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::manifest::Manifest;

/// Environment variable overriding `appliance.name`.
pub const ENV_APPLIANCE_NAME: &str = "RAMPART_APPLIANCE_NAME";
/// Environment variable overriding `appliance.snapshot`.
pub const ENV_SNAPSHOT: &str = "RAMPART_SNAPSHOT";
/// Environment variable overriding `defaults.dry_run`.
pub const ENV_DRY_RUN: &str = "RAMPART_DRY_RUN";
/// Environment variable overriding `defaults.list_mutation`.
pub const ENV_LIST_MUTATION: &str = "RAMPART_LIST_MUTATION";

/// Parser for loading manifests.
#[derive(Debug, Default)]
pub struct ManifestParser {
    /// Base path for resolving `.env`.
    base_path: Option<PathBuf>,
}

impl ManifestParser {
    /// Creates a new manifest parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a manifest from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Manifest> {
        let path = path.as_ref();
        info!("Loading manifest from: {}", path.display());

        if !path.exists() {
            return Err(RampartError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            RampartError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a manifest from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Manifest> {
        debug!("Parsing YAML manifest");

        let manifest: Manifest = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            RampartError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Parsed manifest for appliance {} with {} resource(s)",
            manifest.appliance.name,
            manifest.resources.len()
        );
        Ok(manifest)
    }

    /// Loads a manifest with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or an
    /// override has an invalid value.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<Manifest> {
        let mut manifest = self.load_file(path)?;
        Self::apply_env_overrides(&mut manifest)?;
        Ok(manifest)
    }

    /// Applies environment variable overrides to the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an invalid value.
    pub fn apply_env_overrides(manifest: &mut Manifest) -> Result<()> {
        Self::apply_overrides(manifest, |key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if an override has an invalid value.
    pub fn apply_overrides(
        manifest: &mut Manifest,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(name) = lookup(ENV_APPLIANCE_NAME) {
            debug!("Overriding appliance.name from environment");
            manifest.appliance.name = name;
        }

        if let Some(snapshot) = lookup(ENV_SNAPSHOT) {
            debug!("Overriding appliance.snapshot from environment");
            manifest.appliance.snapshot = PathBuf::from(snapshot);
        }

        if let Some(dry_run) = lookup(ENV_DRY_RUN) {
            debug!("Overriding defaults.dry_run from environment");
            manifest.defaults.dry_run = parse_bool(&dry_run).ok_or_else(|| {
                ConfigError::validation(
                    format!("Invalid boolean '{dry_run}'"),
                    ENV_DRY_RUN,
                )
            })?;
        }

        if let Some(mutation) = lookup(ENV_LIST_MUTATION) {
            debug!("Overriding defaults.list_mutation from environment");
            manifest.defaults.list_mutation = mutation.parse::<ListMutation>()?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                RampartError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Default manifest file names to search for.
pub const DEFAULT_MANIFEST_FILES: &[&str] = &["rampart.yaml", "rampart.yml"];

/// Finds the manifest in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no manifest is found.
pub fn find_manifest_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_MANIFEST_FILES {
            let manifest_path = current.join(filename);
            if manifest_path.exists() {
                info!("Found manifest: {}", manifest_path.display());
                return Ok(manifest_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(RampartError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_MANIFEST_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const MINIMAL: &str = r"
appliance:
  name: edge-fw
";

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = ManifestParser::new()
            .parse_yaml(MINIMAL, None)
            .expect("manifest");

        assert_eq!(manifest.appliance.name, "edge-fw");
        assert!(!manifest.defaults.dry_run);
        assert_eq!(manifest.defaults.list_mutation, ListMutation::Replace);
        assert!(manifest.resources.is_empty());
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = ManifestParser::new()
            .parse_yaml("appliance: [", Some(Path::new("rampart.yaml")))
            .expect_err("invalid yaml");

        match err {
            RampartError::Config(ConfigError::ParseError { location, .. }) => {
                assert_eq!(location.as_deref(), Some("rampart.yaml"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_overrides() {
        let mut manifest = ManifestParser::new()
            .parse_yaml(MINIMAL, None)
            .expect("manifest");
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_APPLIANCE_NAME, "branch-fw"),
            (ENV_SNAPSHOT, "branch.json"),
            (ENV_DRY_RUN, "yes"),
            (ENV_LIST_MUTATION, "add"),
        ]);

        ManifestParser::apply_overrides(&mut manifest, |key| {
            env.get(key).map(|v| (*v).to_string())
        })
        .expect("overrides");

        assert_eq!(manifest.appliance.name, "branch-fw");
        assert_eq!(manifest.appliance.snapshot, PathBuf::from("branch.json"));
        assert!(manifest.defaults.dry_run);
        assert_eq!(manifest.defaults.list_mutation, ListMutation::Add);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut manifest = ManifestParser::new()
            .parse_yaml(MINIMAL, None)
            .expect("manifest");

        let result = ManifestParser::apply_overrides(&mut manifest, |key| {
            (key == ENV_DRY_RUN).then(|| String::from("maybe"))
        });
        assert!(result.is_err());

        let result = ManifestParser::apply_overrides(&mut manifest, |key| {
            (key == ENV_LIST_MUTATION).then(|| String::from("merge"))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_find_manifest_in_parent() {
        let temp = TempDir::new().expect("temp dir");
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("create dirs");
        std::fs::write(temp.path().join("rampart.yaml"), MINIMAL).expect("write");

        let found = find_manifest_file(&nested).expect("manifest");
        assert_eq!(found, temp.path().join("rampart.yaml"));

        let manifest = ManifestParser::new().load_file(&found).expect("load");
        assert_eq!(manifest.appliance.name, "edge-fw");
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().expect("temp dir");
        let err = ManifestParser::new()
            .load_file(temp.path().join("rampart.yaml"))
            .expect_err("missing");
        assert!(matches!(err, RampartError::Config(ConfigError::FileNotFound { .. })));
    }
}
