//! ecs-runner-common
//!
//! Ephemeral GitHub Actions runners on Huawei Cloud ECS. This crate handles:
//! - Runner label generation and the first-boot bootstrap script
//! - The ECS client (AK/SK signing, create, job status, delete)
//! - The GitHub client (registration tokens, runner lookup and removal)
//! - Polling for job completion and runner registration
//! - Start/stop reconciliation across both services

pub mod bootstrap;
pub mod cloud;
pub mod config;
pub mod ecs;
pub mod error;
pub mod github;
pub mod label;
pub mod poller;
pub mod reconciler;
pub mod registration;
pub mod signer;

// Re-export commonly used types
pub use bootstrap::{Arch, BootstrapScript, RunnerHints};
pub use cloud::{
    CloudLifecycle, DeleteOutcome, InstanceId, InstanceIdentity, JobHandle, JobStatus,
    Placement, ProvisioningRequest, ServerTag,
};
pub use config::{Config, Mode, Operation, RawInputs, StartConfig, StopConfig};
pub use ecs::{EcsClient, EcsConfig};
pub use error::{Result, RunnerError};
pub use github::{GitHubClient, GitHubConfig};
pub use label::RunnerLabel;
pub use poller::{confirm_runner_online, JobPoller, RegistrationPolicy};
pub use reconciler::{OutcomeSink, ReconciliationOutcome, Reconciler, StopReport};
pub use registration::{RegistrationGateway, RegistrationToken};
