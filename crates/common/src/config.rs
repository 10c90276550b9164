//! Configuration for a single start or stop invocation
//!
//! Inputs arrive as loosely typed strings (CLI flags or GitHub Action `INPUT_*`
//! variables). [`Config::from_inputs`] validates them up front so that a bad input
//! fails before any remote call is made.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::bootstrap::{RunnerHints, DEFAULT_RUNNER_VERSION};
use crate::cloud::{InstanceIdentity, Placement, PublicIpSpec, RootVolumeSpec, ServerTag};
use crate::ecs::{endpoint_for_zone, EcsConfig};
use crate::error::{Result, RunnerError};
use crate::github::GitHubConfig;
use crate::label::RunnerLabel;
use crate::poller::{RegistrationPolicy, DEFAULT_JOB_POLL_INTERVAL};

pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_SERVER_URL: &str = "https://github.com";

/// Invocation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Start,
    Stop,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Start => "start",
            Mode::Stop => "stop",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "start" => Ok(Mode::Start),
            "stop" => Ok(Mode::Stop),
            other => Err(RunnerError::Configuration(format!(
                "wrong mode '{}'. Allowed values: start, stop",
                other
            ))),
        }
    }
}

/// Unvalidated inputs, one field per action input
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub mode: Option<String>,
    pub github_token: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub project_id: Option<String>,
    pub image_id: Option<String>,
    pub instance_type: Option<String>,
    pub availability_zone: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub security_group_id: Option<String>,
    pub label: Option<String>,
    pub instance_id: Option<String>,
    pub server_tags: Option<String>,
    pub count: Option<String>,
    pub ecs_endpoint: Option<String>,
    /// `owner/repo`
    pub github_repository: Option<String>,
    pub github_api_url: Option<String>,
    pub github_server_url: Option<String>,
    pub runner_version: Option<String>,
    pub runner_arch: Option<String>,
    /// Comma separated labels registered next to the generated one
    pub runner_labels: Option<String>,
}

/// Huawei Cloud credentials and account scope
#[derive(Clone)]
pub struct CloudCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub project_id: String,
}

impl fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("project_id", &self.project_id)
            .finish()
    }
}

/// Everything a start needs besides the collaborators
#[derive(Debug, Clone)]
pub struct StartConfig {
    pub placement: Placement,
    pub tags: Vec<ServerTag>,
    /// Below 1 the start is skipped
    pub count: i64,
    pub root_volume: RootVolumeSpec,
    pub public_ip: PublicIpSpec,
    pub runner: RunnerHints,
    pub job_poll_interval: Duration,
    pub registration: RegistrationPolicy,
}

impl StartConfig {
    /// Start settings with default volume, IP, runner and timing settings
    pub fn new(placement: Placement, count: i64) -> Self {
        Self {
            placement,
            tags: Vec::new(),
            count,
            root_volume: RootVolumeSpec::default(),
            public_ip: PublicIpSpec::default(),
            runner: RunnerHints::default(),
            job_poll_interval: DEFAULT_JOB_POLL_INTERVAL,
            registration: RegistrationPolicy::default(),
        }
    }
}

/// What a stop tears down; both values come from an earlier start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopConfig {
    pub label: RunnerLabel,
    pub instance_ids: InstanceIdentity,
}

#[derive(Debug, Clone)]
pub enum Operation {
    Start(StartConfig),
    Stop(StopConfig),
}

/// Validated configuration of one invocation
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: CloudCredentials,
    pub github: GitHubConfig,
    pub ecs_endpoint: String,
    pub operation: Operation,
}

/// Trimmed, non-empty value of an input
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required(value: &Option<String>, name: &str) -> Result<String> {
    present(value)
        .map(str::to_string)
        .ok_or_else(|| RunnerError::Configuration(format!("the '{}' input is not specified", name)))
}

impl Config {
    /// Validate raw inputs. No remote call is made here.
    pub fn from_inputs(inputs: &RawInputs) -> Result<Self> {
        let mode: Mode = required(&inputs.mode, "mode")?.parse()?;

        let token = required(&inputs.github_token, "github-token")?;
        let credentials = CloudCredentials {
            access_key: required(&inputs.access_key, "huawei-cloud-ak")?,
            secret_key: required(&inputs.secret_key, "huawei-cloud-sk")?,
            project_id: required(&inputs.project_id, "project-id")?,
        };

        let (owner, repo) = parse_repository(&required(
            &inputs.github_repository,
            "github-repository",
        )?)?;
        let github = GitHubConfig {
            api_url: present(&inputs.github_api_url)
                .unwrap_or(DEFAULT_GITHUB_API_URL)
                .to_string(),
            server_url: present(&inputs.github_server_url)
                .unwrap_or(DEFAULT_GITHUB_SERVER_URL)
                .to_string(),
            token,
            owner,
            repo,
        };

        let operation = match mode {
            Mode::Start => Operation::Start(start_config(inputs)?),
            Mode::Stop => Operation::Stop(stop_config(inputs)?),
        };

        let availability_zone = required(&inputs.availability_zone, "availability-zone")?;
        let ecs_endpoint = match present(&inputs.ecs_endpoint) {
            Some(endpoint) => endpoint.to_string(),
            None => endpoint_for_zone(&availability_zone)?,
        };

        Ok(Self {
            credentials,
            github,
            ecs_endpoint,
            operation,
        })
    }

    pub fn mode(&self) -> Mode {
        match self.operation {
            Operation::Start(_) => Mode::Start,
            Operation::Stop(_) => Mode::Stop,
        }
    }

    /// Connection settings for the ECS client
    pub fn ecs_config(&self) -> EcsConfig {
        EcsConfig {
            endpoint: self.ecs_endpoint.clone(),
            project_id: self.credentials.project_id.clone(),
            access_key: self.credentials.access_key.clone(),
            secret_key: self.credentials.secret_key.clone(),
        }
    }
}

fn start_config(inputs: &RawInputs) -> Result<StartConfig> {
    let placement = Placement {
        availability_zone: present(&inputs.availability_zone).unwrap_or_default().to_string(),
        image_id: present(&inputs.image_id).unwrap_or_default().to_string(),
        flavor_id: present(&inputs.instance_type).unwrap_or_default().to_string(),
        vpc_id: present(&inputs.vpc_id).unwrap_or_default().to_string(),
        subnet_id: present(&inputs.subnet_id).unwrap_or_default().to_string(),
        security_group_id: present(&inputs.security_group_id)
            .unwrap_or_default()
            .to_string(),
    };
    placement.validate().map_err(|_| {
        RunnerError::Configuration(
            "not all the required inputs are provided for the 'start' mode".to_string(),
        )
    })?;

    let count = match present(&inputs.count) {
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            RunnerError::Configuration(format!("the 'count' input is not an integer: '{}'", raw))
        })?,
        None => 1,
    };

    let mut config = StartConfig::new(placement, count);
    config.tags = parse_server_tags(present(&inputs.server_tags))?;
    config.runner = RunnerHints {
        version: present(&inputs.runner_version)
            .map(|v| v.trim_start_matches('v').to_string())
            .unwrap_or_else(|| DEFAULT_RUNNER_VERSION.to_string()),
        architecture: present(&inputs.runner_arch).map(str::to_string),
        extra_labels: match present(&inputs.runner_labels) {
            Some(labels) => labels
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            None => RunnerHints::default().extra_labels,
        },
    };

    Ok(config)
}

fn stop_config(inputs: &RawInputs) -> Result<StopConfig> {
    let missing = || {
        RunnerError::Configuration(
            "not all the required inputs are provided for the 'stop' mode".to_string(),
        )
    };

    let label = present(&inputs.label).ok_or_else(missing)?;
    present(&inputs.availability_zone).ok_or_else(missing)?;
    let instance_ids = InstanceIdentity::parse_list(present(&inputs.instance_id).ok_or_else(missing)?);
    if instance_ids.is_empty() {
        return Err(missing());
    }

    Ok(StopConfig {
        label: RunnerLabel::new(label),
        instance_ids,
    })
}

/// `owner/repo` → (`owner`, `repo`)
fn parse_repository(value: &str) -> Result<(String, String)> {
    match value.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(RunnerError::Configuration(format!(
            "repository must be in 'owner/repo' format, got '{}'",
            value
        ))),
    }
}

/// Parse the `server-tags` JSON array. Absent or `null` means no tags.
fn parse_server_tags(raw: Option<&str>) -> Result<Vec<ServerTag>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };

    let tags: Option<Vec<ServerTag>> = serde_json::from_str(raw).map_err(|e| {
        RunnerError::Configuration(format!("the 'server-tags' input is not valid JSON: {}", e))
    })?;

    Ok(tags.unwrap_or_default())
}
