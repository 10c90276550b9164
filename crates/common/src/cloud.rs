//! Cloud side of the runner lifecycle
//!
//! [`CloudLifecycle`] is what the reconciler and the job poller consume. The ECS client in
//! [`crate::ecs`] is the production implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, RunnerError};

/// Key/value tag attached to created instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTag {
    pub key: String,
    pub value: String,
}

/// Root volume of a runner instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootVolumeSpec {
    pub volume_type: String,
    pub size_gb: u32,
}

impl Default for RootVolumeSpec {
    fn default() -> Self {
        Self {
            volume_type: "SSD".to_string(),
            size_gb: 40,
        }
    }
}

/// Elastic public IP attached to a runner instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicIpSpec {
    pub ip_type: String,
    pub bandwidth_mbit: u32,
    pub share_type: String,
    pub charge_mode: String,
}

impl Default for PublicIpSpec {
    fn default() -> Self {
        Self {
            ip_type: "5_bgp".to_string(),
            bandwidth_mbit: 300,
            share_type: "PER".to_string(),
            charge_mode: "traffic".to_string(),
        }
    }
}

/// Where and how instances are placed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub availability_zone: String,
    pub image_id: String,
    pub flavor_id: String,
    pub vpc_id: String,
    pub subnet_id: String,
    pub security_group_id: String,
}

impl Placement {
    /// Every field is mandatory for submission
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("availability-zone", &self.availability_zone),
            ("ecs-image-id", &self.image_id),
            ("ecs-instance-type", &self.flavor_id),
            ("vpc-id", &self.vpc_id),
            ("subnet-id", &self.subnet_id),
            ("security-group-id", &self.security_group_id),
        ];

        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RunnerError::Configuration(format!(
                "missing placement fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Desired state for a batch of runner instances
#[derive(Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    /// Instance name; the runner label
    pub name: String,
    pub placement: Placement,
    pub root_volume: RootVolumeSpec,
    pub public_ip: PublicIpSpec,
    pub tags: Vec<ServerTag>,
    pub count: u32,
    /// Base64 encoded first-boot script
    pub user_data: String,
}

// user_data embeds the registration token
impl fmt::Debug for ProvisioningRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProvisioningRequest")
            .field("name", &self.name)
            .field("placement", &self.placement)
            .field("root_volume", &self.root_volume)
            .field("public_ip", &self.public_ip)
            .field("tags", &self.tags)
            .field("count", &self.count)
            .field("user_data", &"<redacted>")
            .finish()
    }
}

/// Provider-assigned instance id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ids returned once creation is accepted. They are valid before the instances are ready.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceIdentity(Vec<InstanceId>);

impl InstanceIdentity {
    pub fn new(ids: Vec<InstanceId>) -> Self {
        Self(ids)
    }

    /// Parse the comma separated form used for outputs, ignoring blanks
    pub fn parse_list(list: &str) -> Self {
        Self(
            list.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(InstanceId::new)
                .collect(),
        )
    }

    pub fn ids(&self) -> &[InstanceId] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Comma separated form, e.g. `i-123,i-456`
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(InstanceId::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Handle of an in-flight provider job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(String);

impl JobHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Status of a provider job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Success,
    Failed { reason: String },
}

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Deletion accepted
    Deleted,
    /// The provider no longer knows the instances
    AlreadyDeleted,
}

/// Operations the reconciler needs from the cloud provider.
#[async_trait]
pub trait CloudLifecycle: Send + Sync {
    /// Submit one creation request for `request.count` instances.
    async fn create_instances(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<(InstanceIdentity, JobHandle)>;

    /// Query the current state of a provider job.
    async fn job_status(&self, job: &JobHandle) -> Result<JobStatus>;

    /// Delete instances together with their root volumes and public IPs.
    async fn delete_instances(&self, ids: &InstanceIdentity) -> Result<DeleteOutcome>;
}
