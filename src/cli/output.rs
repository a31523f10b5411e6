//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{Manifest, ValidationResult};
use crate::converger::{ResourceResult, RunReport};
use crate::error::RampartError;
use crate::reconciler::Action;
use crate::resource::ResourceKind;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Resource result row for table display.
#[derive(Tabled)]
struct ResultRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Result")]
    result: String,
}

/// Kind row for table display.
#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Tag")]
    tag: String,
    #[tabled(rename = "Singleton")]
    singleton: String,
    #[tabled(rename = "Attributes")]
    attributes: String,
    #[tabled(rename = "Required on create")]
    required: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a run report for display.
    #[must_use]
    pub fn format_report(&self, report: &RunReport) -> String {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    fn format_report_text(report: &RunReport) -> String {
        let mut output = String::new();

        let mode = if report.dry_run { " (dry run)" } else { "" };
        let _ = write!(output, "\nAppliance: {}{mode}\n", report.appliance);
        let _ = write!(output, "   Run: {}\n\n", report.run_id);

        if report.results.is_empty() {
            output.push_str("   No resources reconciled.\n");
        } else {
            let rows: Vec<ResultRow> = report
                .results
                .iter()
                .map(|r| ResultRow {
                    index: r.index + 1,
                    resource: r.resource.clone(),
                    target: r.target.to_string(),
                    action: Self::format_action(r),
                    result: Self::format_result(r, report.dry_run),
                })
                .collect();

            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let changes: Vec<&ResourceResult> = report
            .results
            .iter()
            .filter(|r| r.outcome.as_ref().is_some_and(|o| !o.diff.is_empty()))
            .collect();
        if !changes.is_empty() {
            output.push_str("\nChanges:\n");
            for result in changes {
                let _ = writeln!(output, "   {}", result.resource);
                for detail in result.outcome.iter().flat_map(|o| &o.diff) {
                    let _ = writeln!(output, "     ~ {detail}");
                }
            }
        }

        let verb = if report.dry_run { "to change" } else { "changed" };
        let _ = write!(
            output,
            "\nSummary: {} {verb}, {} unchanged, {} failed, {} skipped ({} ms)\n",
            report.changed.to_string().yellow(),
            report.unchanged.to_string().green(),
            report.failed.to_string().red(),
            report.skipped,
            report.duration_ms()
        );

        let errors = report.errors();
        if !errors.is_empty() {
            let _ = write!(output, "\n{} Errors:\n", "⚠".yellow());
            for error in errors {
                let _ = writeln!(output, "   - {error}");
            }
        }

        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        manifest: &Manifest,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => to_json(&ValidationJson {
                appliance: &manifest.appliance.name,
                resources: manifest.resources.len(),
                valid: result.is_valid(),
                errors: result.errors.iter().map(ToString::to_string).collect(),
                warnings: &result.warnings,
            }),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Manifest is valid!\n", "✓".green())
                } else {
                    let mut text = format!("{} Manifest is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(text, "   - {error}");
                    }
                    text
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nManifest summary:\n");
                let _ = writeln!(output, "   Appliance: {}", manifest.appliance.name);
                let _ = writeln!(output, "   Snapshot: {}", manifest.appliance.snapshot.display());
                let _ = writeln!(output, "   Resources: {}", manifest.resources.len());
                let _ = writeln!(output, "   Dry run: {}", manifest.defaults.dry_run);
                let _ = writeln!(output, "   List mutation: {}", manifest.defaults.list_mutation);
                output
            }
        }
    }

    /// Formats a record returned by a query.
    #[must_use]
    pub fn format_record(&self, tag: &str, name: Option<&str>, record: &Value) -> String {
        let body = serde_json::to_string_pretty(record).unwrap_or_default();
        match self.format {
            OutputFormat::Json => body,
            OutputFormat::Text => {
                let identity = name.map_or_else(|| tag.to_string(), |n| format!("{tag}/{n}"));
                format!("\n{}\n{body}\n", identity.bold())
            }
        }
    }

    /// Formats the table of supported kinds.
    #[must_use]
    pub fn format_kinds(&self) -> String {
        match self.format {
            OutputFormat::Json => {
                let kinds: Vec<KindJson> = ResourceKind::ALL.iter().map(|k| KindJson::from(*k)).collect();
                to_json(&kinds)
            }
            OutputFormat::Text => {
                let rows: Vec<KindRow> = ResourceKind::ALL
                    .iter()
                    .map(|kind| {
                        let schema = kind.schema();
                        KindRow {
                            kind: kind.to_string(),
                            tag: schema.tag.to_string(),
                            singleton: if schema.singleton { "yes" } else { "no" }.to_string(),
                            attributes: schema
                                .fields
                                .iter()
                                .map(|f| f.attr)
                                .collect::<Vec<_>>()
                                .join(", "),
                            required: schema.required_on_create.join(", "),
                        }
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats an error, with its category when it has one.
    #[must_use]
    pub fn format_error(&self, error: &RampartError) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "status": "error",
                "category": error.category(),
                "message": error.to_string(),
            })),
            OutputFormat::Text => match error.category() {
                Some(category) => format!("{} [{category}] {error}", "✗".red()),
                None => format!("{} {error}", "✗".red()),
            },
        }
    }

    /// Formats the action column with color.
    fn format_action(result: &ResourceResult) -> String {
        match result.outcome.as_ref().map(|o| o.action) {
            Some(Action::Create) => "+create".green().to_string(),
            Some(Action::Update) => "~update".yellow().to_string(),
            Some(Action::Delete) => "-delete".red().to_string(),
            Some(Action::None) => "none".dimmed().to_string(),
            None => "-".dimmed().to_string(),
        }
    }

    /// Formats the result column with color.
    fn format_result(result: &ResourceResult, dry_run: bool) -> String {
        if !result.success() {
            let category = result
                .category
                .map_or_else(|| String::from("error"), |c| c.to_string());
            return format!("{} {}", "failed".red(), Self::truncate(&category, 20));
        }
        match (result.changed(), dry_run) {
            (true, true) => "would change".yellow().to_string(),
            (true, false) => "changed".yellow().to_string(),
            (false, _) => "ok".green().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

// JSON serialization helpers

#[derive(Serialize)]
struct ValidationJson<'a> {
    appliance: &'a str,
    resources: usize,
    valid: bool,
    errors: Vec<String>,
    warnings: &'a [String],
}

#[derive(Serialize)]
struct KindJson {
    kind: ResourceKind,
    tag: &'static str,
    singleton: bool,
    attributes: Vec<&'static str>,
    required_on_create: &'static [&'static str],
}

impl From<ResourceKind> for KindJson {
    fn from(kind: ResourceKind) -> Self {
        let schema = kind.schema();
        Self {
            kind,
            tag: schema.tag,
            singleton: schema.singleton,
            attributes: schema.fields.iter().map(|f| f.attr).collect(),
            required_on_create: schema.required_on_create,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("precondition", 20), "precondition");
        assert_eq!(OutputFormatter::truncate("transport_error_long", 10), "transpo...");
    }

    #[test]
    fn test_kinds_json_lists_every_kind() {
        let output = OutputFormatter::new(OutputFormat::Json).format_kinds();
        let parsed: Vec<Value> = serde_json::from_str(&output).expect("json");
        assert_eq!(parsed.len(), ResourceKind::ALL.len());
        assert_eq!(parsed[0]["kind"], "ip_host");
        assert_eq!(parsed[0]["tag"], "IPHost");
    }

    #[test]
    fn test_error_json_carries_category() {
        let error = RampartError::Reconcile(crate::error::ReconcileError::NotFound {
            operation: crate::error::Operation::Update,
            resource: String::from("IPHost/web-01"),
        });
        let output = OutputFormatter::new(OutputFormat::Json).format_error(&error);
        let parsed: Value = serde_json::from_str(&output).expect("json");
        assert_eq!(parsed["category"], "not_found");
    }
}
