use anyhow::Context;
use clap::{Parser, Subcommand};
use perfpair_config::QueueConfig;
use perfpair_types::{
    ComparisonGroupId, ComparisonOutcome, ComparisonResult, CompletionEvent, PairStatistics,
    Significance, TestType,
};
use schemars::schema_for;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "xtask", about = "Repo automation for perfpair")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// (Re)generate JSON Schemas for events, results and config.
    Schema {
        /// Output directory
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },

    /// Run the usual repo checks (fmt, clippy, test, schema).
    Ci,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Command::Schema { out_dir } => cmd_schema(&out_dir),
        Command::Ci => cmd_ci(),
    }
}

fn cmd_ci() -> anyhow::Result<()> {
    run("cargo", ["fmt", "--all", "--", "--check"])?;
    run(
        "cargo",
        ["clippy", "--all-targets", "--all-features", "--", "-D", "warnings"],
    )?;
    run("cargo", ["test", "--all"])?;
    run("cargo", ["run", "-p", "xtask", "--", "schema"])?;
    Ok(())
}

fn run<const N: usize>(bin: &str, args: [&str; N]) -> anyhow::Result<()> {
    let status = std::process::Command::new(bin)
        .args(args)
        .status()
        .with_context(|| format!("running {bin}"))?;
    if !status.success() {
        anyhow::bail!("{bin} failed: {status}");
    }
    Ok(())
}

fn cmd_schema(out_dir: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("create dir {}", out_dir.display()))?;

    let event = CompletionEvent::new(
        "SortingAlgorithms",
        "QuickSort",
        vec![10.2, 10.4, 10.1],
        "2024-01-01T00:00:00Z",
    );
    write_schema(
        out_dir,
        "perfpair.completion_event.v1.schema.json",
        schema_for!(CompletionEvent),
        &event,
    )?;

    let result = ComparisonResult {
        group: ComparisonGroupId::new("SortingAlgorithms")?,
        method_a: "BubbleSort".into(),
        method_b: "QuickSort".into(),
        outcome: ComparisonOutcome::Completed(sample_statistics()),
    };
    write_schema(
        out_dir,
        "perfpair.comparison_result.v1.schema.json",
        schema_for!(ComparisonResult),
        &result,
    )?;

    write_schema(
        out_dir,
        "perfpair.config.v1.schema.json",
        schema_for!(QueueConfig),
        &QueueConfig::default(),
    )?;

    Ok(())
}

fn sample_statistics() -> PairStatistics {
    PairStatistics {
        mean_a: 90.45,
        mean_b: 10.45,
        median_a: 90.45,
        median_b: 10.45,
        p_value: 1e-12,
        test_statistic: 596.2,
        test_type: TestType::TTest,
        significance: Significance::Improved,
        sample_size_a: 10,
        sample_size_b: 10,
        outliers_removed: 0,
    }
}

/// Write `schema` and check that `sample` validates against it.
fn write_schema<T: Serialize>(
    out_dir: &Path,
    name: &str,
    schema: schemars::Schema,
    sample: &T,
) -> anyhow::Result<()> {
    let schema = serde_json::to_value(&schema)?;
    let validator = jsonschema::validator_for(&schema)
        .map_err(|e| anyhow::anyhow!("{name} is not a valid schema: {e}"))?;
    let instance = serde_json::to_value(sample)?;
    if let Err(e) = validator.validate(&instance) {
        anyhow::bail!("sample does not match {name}: {e}");
    }

    let path = out_dir.join(name);
    let json = serde_json::to_vec_pretty(&schema)?;
    fs::write(&path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
