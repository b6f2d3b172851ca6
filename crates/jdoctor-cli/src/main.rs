//! juju-doctor - topology assertions for Juju deployments
//!
//! ## Commands
//!
//! - `check`: run probes and rulesets against status/bundle/show-unit snapshots
//! - `schema`: print the JSON Schema of ruleset documents

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use tracing::{warn, Level};

use jdoctor_core::{collect_models, ruleset_schema, Artifacts, Fetcher, JujuCli, ResolverConfig};
use jdoctor_runner::{Check, ExecutorConfig, ProbeExecutor};

#[derive(Parser)]
#[command(name = "juju-doctor")]
#[command(author = "Juju Doctor Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Validate Juju deployments with probes and rulesets", long_about = None)]
struct Cli {
    /// Show debug logs
    #[arg(long, global = true)]
    debug: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "JDOCTOR_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run probes against deployment snapshots
    Check(CheckArgs),

    /// Emit the JSON Schema of ruleset documents
    Schema {
        /// Print the schema to stdout
        #[arg(long)]
        stdout: bool,

        /// Write the schema to a file
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("artifacts")
        .required(true)
        .multiple(true)
        .args(["model", "status", "bundle", "show_unit"])
))]
struct CheckArgs {
    /// Probe source: a path, file://<path> or github://<org>/<repo>//<path>[?<ref>]
    #[arg(short, long = "probe", required = true)]
    probes: Vec<String>,

    /// Live model to collect artifacts from
    #[arg(short, long, conflicts_with_all = ["status", "bundle", "show_unit"])]
    model: Vec<String>,

    /// `juju status --format yaml` snapshot file
    #[arg(long)]
    status: Vec<PathBuf>,

    /// `juju export-bundle` snapshot file
    #[arg(long)]
    bundle: Vec<PathBuf>,

    /// `juju show-unit` snapshot file
    #[arg(long = "show-unit")]
    show_unit: Vec<PathBuf>,

    /// Show per-function results and captured errors
    #[arg(short, long)]
    verbose: bool,

    /// Output format (plain tree when omitted)
    #[arg(short = 'o', long, value_enum)]
    format: Option<OutputFormat>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    jdoctor_core::init_tracing(cli.log_json, level);

    match cli.command {
        Commands::Check(args) => {
            let output = cmd_check(&args).await?;
            print!("{output}");
        }
        Commands::Schema { stdout, file } => {
            if let Some(schema) = cmd_schema(stdout, file.as_deref())? {
                println!("{schema}");
            }
        }
    }

    Ok(())
}

fn load_artifacts(args: &CheckArgs) -> Artifacts {
    if args.model.is_empty() {
        Artifacts::from_files(&args.status, &args.bundle, &args.show_unit)
    } else {
        collect_models(&JujuCli::default(), &args.model)
    }
}

async fn cmd_check(args: &CheckArgs) -> Result<String> {
    let artifacts = load_artifacts(args);
    if artifacts.is_empty() {
        warn!("no artifact could be loaded; every probe function will be skipped");
    }

    let staging = tempfile::Builder::new()
        .prefix("juju-doctor-")
        .tempdir()
        .context("Failed to create probe staging directory")?;

    let fetcher = Fetcher::default();
    let executor = ProbeExecutor::from_config(ExecutorConfig::from_env());
    let report = Check::new(&fetcher, executor, staging.path())
        .with_resolver_config(ResolverConfig::from_env())
        .verbose(args.verbose)
        .run(&args.probes, &artifacts)
        .await;

    match args.format {
        Some(OutputFormat::Json) => {
            let document = serde_json::to_string_pretty(&report.to_json())
                .context("Failed to serialize check results")?;
            Ok(format!("{document}\n"))
        }
        Some(OutputFormat::Text) | None => Ok(report.to_text()),
    }
}

/// Write the schema to `file` when given; return it for stdout when asked (or when no file).
fn cmd_schema(stdout: bool, file: Option<&Path>) -> Result<Option<String>> {
    let schema = serde_json::to_string_pretty(&ruleset_schema())
        .context("Failed to serialize ruleset schema")?;

    if let Some(path) = file {
        std::fs::write(path, format!("{schema}\n"))
            .with_context(|| format!("Failed to write schema to {}", path.display()))?;
    }

    if stdout || file.is_none() {
        Ok(Some(schema))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::Value;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("juju-doctor").chain(args.iter().copied()))
    }

    fn check_args(cli: Cli) -> CheckArgs {
        match cli.command {
            Commands::Check(args) => args,
            Commands::Schema { .. } => panic!("expected check"),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_requires_probe() {
        let err = parse(&["check", "--status", "status.yaml"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_check_requires_artifact_source() {
        let err = parse(&["check", "--probe", "file://p.py"]).err().unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_model_conflicts_with_files() {
        let err = parse(&["check", "-p", "p.py", "--model", "cos", "--status", "s.yaml"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_check_accepts_repeated_sources() {
        let args = check_args(
            parse(&[
                "check", "-p", "a.py", "-p", "b.yaml", "--status", "s1.yaml", "--status",
                "s2.yaml", "--show-unit", "u.yaml", "-v", "-o", "json",
            ])
            .unwrap(),
        );
        assert_eq!(args.probes, vec!["a.py", "b.yaml"]);
        assert_eq!(args.status.len(), 2);
        assert_eq!(args.show_unit, vec![PathBuf::from("u.yaml")]);
        assert!(args.verbose);
        assert_eq!(args.format, Some(OutputFormat::Json));
    }

    #[test]
    fn test_schema_to_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");

        let printed = cmd_schema(false, Some(&path)).unwrap();
        assert!(printed.is_none());

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["title"], "RuleSet");
        assert!(cmd_schema(true, Some(&path)).unwrap().is_some());
        assert!(cmd_schema(false, None).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cmd_check_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let rules = dir.path().join("rules.yaml");
        std::fs::write(
            &rules,
            "name: cos\napplications:\n  - name: alertmanager\n    minimum: 2\n",
        )
        .unwrap();
        let status = dir.path().join("status.yaml");
        std::fs::write(&status, "applications:\n  alertmanager:\n    scale: 1\n").unwrap();

        let rules_arg = rules.display().to_string();
        let status_arg = status.display().to_string();
        let args = check_args(
            parse(&[
                "check", "-p", &rules_arg, "--status", &status_arg, "-v", "-o", "json",
            ])
            .unwrap(),
        );

        let output = cmd_check(&args).await.unwrap();
        let document: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(document["failed"], 1);
        assert_eq!(document["passed"], 0);
        let exceptions = document["exceptions"].as_array().unwrap();
        assert!(exceptions[0]
            .as_str()
            .unwrap()
            .contains("alertmanager scale (1) is below the allowable limit: 2"));
    }
}
