//! Manifest runner.
//!
//! The converger drives every manifest entry through the reconciler in
//! order and collects the outcomes into a [`RunReport`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{Defaults, Manifest, ResourceEntry};
use crate::error::{ErrorCategory, Result};
use crate::reconciler::{ReconciliationOutcome, Reconciler};
use crate::resource::TargetState;
use crate::service::RemoteConfigService;

/// Runner for a whole manifest.
pub struct Converger<'a> {
    /// Remote configuration service.
    service: &'a dyn RemoteConfigService,
    /// Whether to keep going after a failed resource.
    continue_on_error: bool,
    /// Forces dry run regardless of the manifest defaults.
    force_dry_run: bool,
}

/// Result of reconciling one manifest entry.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceResult {
    /// Position in the manifest.
    pub index: usize,
    /// Resource identity.
    pub resource: String,
    /// Requested target state.
    pub target: TargetState,
    /// Outcome, if the reconciliation succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ReconciliationOutcome>,
    /// Error message, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error category, if it failed with one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
}

impl ResourceResult {
    /// Returns true if the resource was reconciled without error.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns true if the resource changed, or would have in dry run.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.outcome.as_ref().is_some_and(|o| o.changed)
    }
}

/// Report of a manifest run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,
    /// Appliance name.
    pub appliance: String,
    /// Whether this was a dry run.
    pub dry_run: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Per-resource results, in manifest order.
    pub results: Vec<ResourceResult>,
    /// Resources that changed.
    pub changed: usize,
    /// Resources already converged.
    pub unchanged: usize,
    /// Resources that failed.
    pub failed: usize,
    /// Resources not attempted after a failure.
    pub skipped: usize,
}

impl RunReport {
    /// Returns true if every attempted resource succeeded and none were skipped.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Returns the error messages, in manifest order.
    #[must_use]
    pub fn errors(&self) -> Vec<&str> {
        self.results.iter().filter_map(|r| r.error.as_deref()).collect()
    }

    /// Returns the run duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

impl<'a> Converger<'a> {
    /// Creates a new converger.
    #[must_use]
    pub const fn new(service: &'a dyn RemoteConfigService) -> Self {
        Self {
            service,
            continue_on_error: false,
            force_dry_run: false,
        }
    }

    /// Sets whether to continue after a failed resource.
    #[must_use]
    pub const fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Forces dry run for every resource.
    #[must_use]
    pub const fn with_force_dry_run(mut self, force_dry_run: bool) -> Self {
        self.force_dry_run = force_dry_run;
        self
    }

    /// Reconciles every manifest entry in order.
    pub async fn run(&self, manifest: &Manifest) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", run_id = %run_id, appliance = %manifest.appliance.name);

        self.run_entries(run_id, manifest).instrument(span).await
    }

    async fn run_entries(&self, run_id: String, manifest: &Manifest) -> RunReport {
        let mut defaults = manifest.defaults;
        defaults.dry_run |= self.force_dry_run;

        info!(
            "Converging {} resource(s) on {}{}",
            manifest.resources.len(),
            manifest.appliance.name,
            if defaults.dry_run { " (dry run)" } else { "" }
        );

        let started_at = Utc::now();
        let reconciler = Reconciler::new(self.service);
        let mut results = Vec::new();

        for (index, entry) in manifest.resources.iter().enumerate() {
            let resource = entry.id().to_string();
            let outcome = Self::reconcile_entry(&reconciler, entry, &defaults).await;

            let result = match outcome {
                Ok(outcome) => ResourceResult {
                    index,
                    resource,
                    target: entry.state(),
                    outcome: Some(outcome),
                    error: None,
                    category: None,
                },
                Err(err) => {
                    error!("Failed to reconcile {}: {}", resource, err);
                    ResourceResult {
                        index,
                        resource,
                        target: entry.state(),
                        outcome: None,
                        category: err.category(),
                        error: Some(err.to_string()),
                    }
                }
            };

            let failed = !result.success();
            results.push(result);

            if failed && !self.continue_on_error {
                warn!("Stopping after first failure");
                break;
            }
        }

        let changed = results.iter().filter(|r| r.changed()).count();
        let failed = results.iter().filter(|r| !r.success()).count();
        let report = RunReport {
            run_id,
            appliance: manifest.appliance.name.clone(),
            dry_run: defaults.dry_run,
            started_at,
            finished_at: Utc::now(),
            changed,
            unchanged: results.len() - changed - failed,
            failed,
            skipped: manifest.resources.len() - results.len(),
            results,
        };

        info!(
            "Run finished: {} changed, {} unchanged, {} failed, {} skipped",
            report.changed, report.unchanged, report.failed, report.skipped
        );
        report
    }

    async fn reconcile_entry(
        reconciler: &Reconciler<'_>,
        entry: &ResourceEntry,
        defaults: &Defaults,
    ) -> Result<ReconciliationOutcome> {
        let adapter = entry.adapter()?;
        reconciler
            .reconcile(adapter.as_ref(), &entry.request(defaults))
            .await
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.success() { "successful" } else { "failed" };
        let mode = if self.dry_run { " (dry run)" } else { "" };
        writeln!(f, "Run {} on {} {status}{mode}:", self.run_id, self.appliance)?;
        writeln!(f, "  Changed: {}", self.changed)?;
        writeln!(f, "  Unchanged: {}", self.unchanged)?;
        writeln!(f, "  Failed: {}", self.failed)?;
        writeln!(f, "  Skipped: {}", self.skipped)?;

        let errors = self.errors();
        if !errors.is_empty() {
            writeln!(f, "  Errors:")?;
            for error in errors {
                writeln!(f, "    - {error}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManifestParser;
    use crate::service::MemoryConfigService;
    use serde_json::json;

    const MANIFEST: &str = r"
appliance:
  name: edge-fw
resources:
  - kind: ip_host
    name: web-01
    attributes:
      host_type: IP
      ip_address: 10.0.0.10
  - kind: ip_host_group
    name: GRP1
    state: updated
    attributes:
      hosts: [web-01]
  - kind: time_settings
    state: updated
    attributes:
      timezone: UTC
";

    fn manifest(yaml: &str) -> Manifest {
        ManifestParser::new().parse_yaml(yaml, None).expect("manifest")
    }

    fn appliance() -> MemoryConfigService {
        MemoryConfigService::new()
            .with_record("IPHostGroup", json!({ "Name": "GRP1", "HostList": { "Host": ["old"] } }))
            .with_record("Time", json!({ "TimeZone": "Europe/Paris" }))
    }

    #[tokio::test]
    async fn test_run_converges_and_is_idempotent() {
        let service = appliance();
        let manifest = manifest(MANIFEST);
        let converger = Converger::new(&service);

        let first = converger.run(&manifest).await;
        assert!(first.success(), "{first}");
        assert_eq!(first.changed, 3);
        assert_eq!(service.mutation_count(), 3);
        assert!(!first.run_id.is_empty());

        service.clear_calls();
        let second = converger.run(&manifest).await;
        assert!(second.success(), "{second}");
        assert_eq!(second.changed, 0);
        assert_eq!(second.unchanged, 3);
        assert_eq!(service.mutation_count(), 0);
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_forced_dry_run_never_mutates() {
        let service = appliance();
        let report = Converger::new(&service)
            .with_force_dry_run(true)
            .run(&manifest(MANIFEST))
            .await;

        assert!(report.dry_run);
        assert_eq!(report.changed, 3);
        assert_eq!(service.query_count(), 3);
        assert_eq!(service.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_stops_at_first_failure() {
        let yaml = r"
appliance:
  name: edge-fw
resources:
  - kind: ip_host_group
    name: missing
    state: updated
    attributes:
      description: nope
  - kind: time_settings
    state: updated
    attributes:
      timezone: UTC
";
        let service = appliance();
        let report = Converger::new(&service).run(&manifest(yaml)).await;

        assert!(!report.success());
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.results[0].category, Some(ErrorCategory::NotFound));
        assert_eq!(service.query_count(), 1);
    }

    #[tokio::test]
    async fn test_continue_on_error() {
        let yaml = r"
appliance:
  name: edge-fw
resources:
  - kind: ip_host
    name: incomplete
  - kind: time_settings
    state: updated
    attributes:
      timezone: UTC
";
        let service = appliance();
        let report = Converger::new(&service)
            .with_continue_on_error(true)
            .run(&manifest(yaml))
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.changed, 1);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.results[0].category, Some(ErrorCategory::Precondition));
        assert_eq!(report.errors().len(), 1);
    }
}
