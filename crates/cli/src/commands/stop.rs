//! Stop command implementation

use anyhow::{Context, Result};
use ecs_runner_common::{Config, StopConfig};

use crate::output::print_stopped;

/// Delete the instances and remove the runner registration
pub async fn execute(config: &Config, stop: &StopConfig, json: bool) -> Result<()> {
    let report = super::reconciler(config)?
        .stop(stop)
        .await
        .with_context(|| format!("Failed to stop runner {}", stop.label))?;

    print_stopped(&report, json)
}
