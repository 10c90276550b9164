//! Step outputs and terminal rendering

use colored::Colorize;
use ecs_runner_common::{OutcomeSink, ReconciliationOutcome, Result, StopReport};
use serde_json::json;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info};

pub const LABEL_OUTPUT: &str = "label";
pub const INSTANCE_ID_OUTPUT: &str = "ecs-instance-id";

/// Writes `label` and `ecs-instance-id` to the file named by `GITHUB_OUTPUT`
pub struct StepOutputs {
    path: Option<PathBuf>,
}

impl StepOutputs {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    /// Outputs file from the action runtime, if there is one
    pub fn from_env() -> Self {
        Self::new(
            std::env::var_os("GITHUB_OUTPUT")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        )
    }
}

impl OutcomeSink for StepOutputs {
    fn publish(&self, outcome: &ReconciliationOutcome) -> Result<()> {
        let Some(path) = &self.path else {
            debug!("GITHUB_OUTPUT not set, outputs are only printed");
            return Ok(());
        };

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}={}", LABEL_OUTPUT, outcome.label)?;
        writeln!(file, "{}={}", INSTANCE_ID_OUTPUT, outcome.instance_ids.joined())?;

        info!("Outputs written to {}", path.display());
        Ok(())
    }
}

pub fn print_started(outcome: Option<&ReconciliationOutcome>, json: bool) -> anyhow::Result<()> {
    match (outcome, json) {
        (Some(outcome), true) => println!(
            "{}",
            serde_json::to_string(&json!({
                LABEL_OUTPUT: outcome.label,
                INSTANCE_ID_OUTPUT: outcome.instance_ids.joined(),
            }))?
        ),
        (Some(outcome), false) => {
            println!("{} Runner online", "✓".green());
            println!("  {}: {}", LABEL_OUTPUT, outcome.label.as_str().bold());
            println!("  {}: {}", INSTANCE_ID_OUTPUT, outcome.instance_ids.joined());
        }
        (None, true) => println!("{}", json!({ "skipped": true })),
        (None, false) => println!("{} Nothing to start", "-".yellow()),
    }
    Ok(())
}

/// Machine-readable form of a stop report
fn stop_summary(report: &StopReport) -> serde_json::Value {
    json!({
        LABEL_OUTPUT: report.label,
        INSTANCE_ID_OUTPUT: report.instance_ids.joined(),
        "instances": report.instances,
    })
}

pub fn print_stopped(report: &StopReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(&stop_summary(report))?);
    } else {
        println!("{} Runner removed", "✓".green());
        println!("  {}: {}", LABEL_OUTPUT, report.label);
        println!(
            "  {}: {} ({:?})",
            INSTANCE_ID_OUTPUT,
            report.instance_ids.joined(),
            report.instances
        );
    }
    Ok(())
}
