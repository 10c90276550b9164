//! Polling loops
//!
//! Two waits make up the slow part of a start:
//! - [`JobPoller`] follows the cloud creation job until it succeeds or fails
//! - [`confirm_runner_online`] waits for the agent on the new instance to show up online
//!
//! The job wait has no overall deadline; the caller's environment owns that.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::cloud::{CloudLifecycle, JobHandle, JobStatus};
use crate::error::{Result, RunnerError};
use crate::label::RunnerLabel;
use crate::registration::RegistrationGateway;

/// Sleep between two job status queries
pub const DEFAULT_JOB_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Waits for a provider job to reach a terminal state
pub struct JobPoller<'a> {
    cloud: &'a dyn CloudLifecycle,
    interval: Duration,
}

impl<'a> JobPoller<'a> {
    pub fn new(cloud: &'a dyn CloudLifecycle, interval: Duration) -> Self {
        Self { cloud, interval }
    }

    /// Poll until the job succeeds. A failed job is terminal and is not queried again.
    pub async fn await_completion(&self, job: &JobHandle) -> Result<()> {
        let mut attempts: u64 = 0;

        loop {
            attempts += 1;
            match self.cloud.job_status(job).await? {
                JobStatus::Success => {
                    info!("Job {} succeeded after {} status queries", job, attempts);
                    return Ok(());
                }
                JobStatus::Failed { reason } => {
                    return Err(RunnerError::ProvisioningFailed(reason));
                }
                JobStatus::Pending => {
                    debug!("Job {} still pending, retrying in {:?}", job, self.interval);
                    sleep(self.interval).await;
                }
            }
        }
    }
}

/// Timing of the runner-online confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationPolicy {
    /// Initial wait before the first check; the agent cannot be up any sooner
    pub quiet_period: Duration,
    /// Sleep between two checks
    pub interval: Duration,
    /// Give up once this much time has passed since the wait began
    pub timeout: Duration,
}

impl Default for RegistrationPolicy {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_secs(30),
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Wait until a runner carrying `label` reports online.
///
/// Transient lookup failures count as "not online yet"; rejected credentials end the wait.
pub async fn confirm_runner_online(
    gateway: &dyn RegistrationGateway,
    label: &RunnerLabel,
    policy: RegistrationPolicy,
) -> Result<()> {
    let started = Instant::now();
    info!(
        "Waiting {:?} before checking whether runner {} is online",
        policy.quiet_period, label
    );
    sleep(policy.quiet_period).await;

    loop {
        match gateway.runner_online(label).await {
            Ok(true) => {
                info!("Runner {} is online", label);
                return Ok(());
            }
            Ok(false) => debug!("Runner {} not online yet", label),
            Err(e @ RunnerError::Transport(_)) => warn!("Runner lookup failed: {}", e),
            Err(RunnerError::Api { status, message, .. }) if status >= 500 => {
                warn!("Runner lookup failed ({}): {}", status, message)
            }
            Err(e) => return Err(e),
        }

        let waited = started.elapsed();
        if waited >= policy.timeout {
            return Err(RunnerError::RegistrationTimeout {
                label: label.to_string(),
                waited,
            });
        }

        sleep(policy.interval).await;
    }
}
