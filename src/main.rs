//! Rampart CLI entrypoint.
//!
//! This is the main entrypoint for the rampart command-line tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use rampart::cli::{Cli, Commands, LogFormat, OutputFormatter};
use rampart::config::{Manifest, ManifestParser, ManifestValidator, find_manifest_file};
use rampart::converger::Converger;
use rampart::error::Result;
use rampart::service::{MemoryConfigService, RemoteConfigService};

use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    let formatter = OutputFormatter::new(cli.output);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli, &formatter)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", formatter.format_error(&e));
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli, formatter: &OutputFormatter) -> Result<ExitCode> {
    match cli.command {
        Commands::Validate { warnings } => cmd_validate(cli.manifest.as_ref(), warnings, formatter),
        Commands::Plan => cmd_converge(cli.manifest.as_ref(), true, false, formatter).await,
        Commands::Apply { continue_on_error } => {
            cmd_converge(cli.manifest.as_ref(), false, continue_on_error, formatter).await
        }
        Commands::Query { tag, name } => {
            cmd_query(cli.manifest.as_ref(), &tag, name.as_deref(), formatter).await
        }
        Commands::Kinds => {
            eprintln!("{}", formatter.format_kinds());
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Validate the manifest.
fn cmd_validate(
    manifest_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let (manifest, _) = load_manifest(manifest_path)?;

    let result = ManifestValidator::new().check(&manifest);
    eprintln!("{}", formatter.format_validation(&manifest, &result, show_warnings));

    if result.is_valid() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Plan or apply the manifest.
async fn cmd_converge(
    manifest_path: Option<&PathBuf>,
    dry_run: bool,
    continue_on_error: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let (manifest, base) = load_manifest(manifest_path)?;
    ManifestValidator::new().validate(&manifest)?;

    let snapshot = manifest.snapshot_path(&base);
    let service = MemoryConfigService::load(&snapshot)?;

    let report = Converger::new(&service)
        .with_force_dry_run(dry_run)
        .with_continue_on_error(continue_on_error)
        .run(&manifest)
        .await;

    eprintln!("{}", formatter.format_report(&report));

    if !report.dry_run && report.changed > 0 {
        service.save(&snapshot)?;
    } else {
        debug!("Snapshot unchanged, not saving");
    }

    if report.success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Show the appliance's current record.
async fn cmd_query(
    manifest_path: Option<&PathBuf>,
    tag: &str,
    name: Option<&str>,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let (manifest, base) = load_manifest(manifest_path)?;
    let service = MemoryConfigService::load(manifest.snapshot_path(&base))?;

    info!("Querying {} on {}", tag, manifest.appliance.name);
    let record = service.get(tag, name).await?;

    eprintln!("{}", formatter.format_record(tag, name, &record));
    Ok(ExitCode::SUCCESS)
}

/// Resolves the manifest path.
fn resolve_manifest_path(manifest_path: Option<&PathBuf>) -> Result<PathBuf> {
    manifest_path.map_or_else(|| find_manifest_file("."), |path| Ok(path.clone()))
}

/// Loads the manifest with `.env` and environment overrides applied.
///
/// Returns the manifest and the directory relative paths resolve against.
fn load_manifest(manifest_path: Option<&PathBuf>) -> Result<(Manifest, PathBuf)> {
    let manifest_file = resolve_manifest_path(manifest_path)?;
    debug!("Loading manifest from: {}", manifest_file.display());

    let base = manifest_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let parser = ManifestParser::new().with_base_path(&base);
    parser.load_dotenv()?;

    let manifest = parser.load_with_env(&manifest_file)?;
    Ok((manifest, base))
}
