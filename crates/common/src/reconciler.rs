//! Start/stop orchestration
//!
//! The reconciler ties the cloud instance lifecycle to the runner registration lifecycle.
//! Start and stop run in separate processes and share nothing but the label and instance
//! ids the caller carries from one to the other.
//!
//! A start that fails after instances were created does not delete them. The ids are
//! published to the [`OutcomeSink`] as soon as creation is accepted so the caller can run
//! a stop to reclaim them.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::bootstrap::BootstrapScript;
use crate::cloud::{CloudLifecycle, DeleteOutcome, InstanceIdentity, ProvisioningRequest};
use crate::config::{StartConfig, StopConfig};
use crate::error::{Result, RunnerError};
use crate::label::RunnerLabel;
use crate::poller::{confirm_runner_online, JobPoller};
use crate::registration::RegistrationGateway;

/// What a successful start hands back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub label: RunnerLabel,
    pub instance_ids: InstanceIdentity,
}

/// Receives the outcome as soon as instance ids exist, before readiness is known
pub trait OutcomeSink: Send + Sync {
    fn publish(&self, outcome: &ReconciliationOutcome) -> Result<()>;
}

/// Sink that drops everything
pub struct DiscardOutcome;

impl OutcomeSink for DiscardOutcome {
    fn publish(&self, _outcome: &ReconciliationOutcome) -> Result<()> {
        Ok(())
    }
}

/// Summary of a successful stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReport {
    pub label: RunnerLabel,
    pub instance_ids: InstanceIdentity,
    pub instances: DeleteOutcome,
}

/// Start/stop orchestrator
pub struct Reconciler {
    cloud: Arc<dyn CloudLifecycle>,
    gateway: Arc<dyn RegistrationGateway>,
    sink: Arc<dyn OutcomeSink>,
}

impl Reconciler {
    pub fn new(cloud: Arc<dyn CloudLifecycle>, gateway: Arc<dyn RegistrationGateway>) -> Self {
        Self {
            cloud,
            gateway,
            sink: Arc::new(DiscardOutcome),
        }
    }

    /// Publish outcomes to `sink` as soon as creation is accepted
    pub fn with_sink(mut self, sink: Arc<dyn OutcomeSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Provision runner instances and wait until one of them is online.
    ///
    /// Returns `Ok(None)` without touching either remote service when `count < 1`.
    pub async fn start(&self, config: &StartConfig) -> Result<Option<ReconciliationOutcome>> {
        if config.count < 1 {
            info!("Instance count is {}, skipping provisioning", config.count);
            return Ok(None);
        }
        let count = u32::try_from(config.count).map_err(|_| {
            RunnerError::Configuration(format!("instance count {} is too large", config.count))
        })?;
        config.placement.validate()?;

        let label = RunnerLabel::generate();
        info!("Starting {} runner instance(s) with label {}", count, label);

        let token = self.gateway.issue_registration_token().await?;
        if token.is_expired() {
            return Err(RunnerError::Authorization(
                "registration token expired before use".to_string(),
            ));
        }
        debug!("Registration token expires at {:?}", token.expires_at());

        let script = BootstrapScript::render(
            &label,
            token,
            &self.gateway.registration_url(),
            &config.runner,
        );

        let request = ProvisioningRequest {
            name: label.to_string(),
            placement: config.placement.clone(),
            root_volume: config.root_volume.clone(),
            public_ip: config.public_ip.clone(),
            tags: config.tags.clone(),
            count,
            user_data: script.encoded(),
        };

        let (instance_ids, job) = self.cloud.create_instances(&request).await?;
        info!(
            "Instance(s) {} created, waiting for job {}",
            instance_ids.joined(),
            job
        );

        let outcome = ReconciliationOutcome {
            label: label.clone(),
            instance_ids,
        };
        self.sink.publish(&outcome)?;

        JobPoller::new(self.cloud.as_ref(), config.job_poll_interval)
            .await_completion(&job)
            .await
            .inspect_err(|e| {
                error!(
                    "Instance(s) {} did not become ready: {}",
                    outcome.instance_ids.joined(),
                    e
                )
            })?;
        info!("Instance(s) {} ready", outcome.instance_ids.joined());

        confirm_runner_online(self.gateway.as_ref(), &label, config.registration).await?;
        info!(
            "Runner {} registered on instance(s) {}",
            label,
            outcome.instance_ids.joined()
        );

        Ok(Some(outcome))
    }

    /// Delete the instances, then remove the runner registration.
    ///
    /// Registration removal is skipped only when the provider rejects the instance ids as
    /// invalid. Any other deletion failure is reported after removal has been attempted.
    pub async fn stop(&self, config: &StopConfig) -> Result<StopReport> {
        info!(
            "Stopping instance(s) {} with runner label {}",
            config.instance_ids.joined(),
            config.label
        );

        let mut failures = Vec::new();

        let instances = match self.cloud.delete_instances(&config.instance_ids).await {
            Ok(DeleteOutcome::Deleted) => {
                info!("Instance(s) {} terminated", config.instance_ids.joined());
                Some(DeleteOutcome::Deleted)
            }
            Ok(DeleteOutcome::AlreadyDeleted) => {
                warn!(
                    "Instance(s) {} already gone, continuing with runner removal",
                    config.instance_ids.joined()
                );
                Some(DeleteOutcome::AlreadyDeleted)
            }
            Err(RunnerError::InvalidInstance(message)) => {
                return Err(RunnerError::Teardown(format!(
                    "instance deletion rejected, runner {} left registered: {}",
                    config.label, message
                )));
            }
            Err(e) => {
                error!("Instance deletion failed: {}", e);
                failures.push(format!("instance deletion failed: {}", e));
                None
            }
        };

        match self.gateway.remove_runner(&config.label).await {
            Ok(()) => info!("Runner {} removed", config.label),
            Err(e) => {
                error!("Runner removal failed: {}", e);
                failures.push(format!("runner removal failed: {}", e));
            }
        }

        match instances {
            Some(instances) if failures.is_empty() => Ok(StopReport {
                label: config.label.clone(),
                instance_ids: config.instance_ids.clone(),
                instances,
            }),
            _ => Err(RunnerError::Teardown(failures.join("; "))),
        }
    }
}
