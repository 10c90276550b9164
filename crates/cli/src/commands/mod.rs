//! Command implementations
//!
//! Each mode is implemented as a separate module. Both build their remote clients from a
//! validated [`Config`] and hand them to the reconciler.

pub mod start;
pub mod stop;

use anyhow::{Context, Result};
use ecs_runner_common::{Config, EcsClient, GitHubClient, Reconciler};
use std::sync::Arc;

/// Reconciler wired to the live ECS and GitHub APIs
fn reconciler(config: &Config) -> Result<Reconciler> {
    let ecs = EcsClient::new(config.ecs_config()).context("Failed to create ECS client")?;
    let github =
        GitHubClient::new(config.github.clone()).context("Failed to create GitHub client")?;
    Ok(Reconciler::new(Arc::new(ecs), Arc::new(github)))
}
