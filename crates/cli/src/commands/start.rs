//! Start command implementation

use anyhow::{Context, Result};
use ecs_runner_common::{Config, StartConfig};
use std::sync::Arc;
use tracing::info;

use crate::output::{print_started, StepOutputs};

/// Provision the runner instances and wait for registration
pub async fn execute(config: &Config, start: &StartConfig, json: bool) -> Result<()> {
    info!(
        "Starting {} instance(s) of {} in {}",
        start.count, start.placement.flavor_id, start.placement.availability_zone
    );

    let reconciler = super::reconciler(config)?.with_sink(Arc::new(StepOutputs::from_env()));
    let outcome = reconciler
        .start(start)
        .await
        .context("Failed to start runner instances")?;

    print_started(outcome.as_ref(), json)
}
