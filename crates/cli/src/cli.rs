//! Command-line interface definitions
//!
//! Every flag can also be supplied through the environment variable a GitHub Action
//! runtime sets for the input of the same name (`INPUT_<NAME>`), so the binary works both
//! as an action entrypoint and from a shell.

use clap::{Args, Parser, Subcommand};
use ecs_runner_common::RawInputs;

/// Ephemeral GitHub Actions runners on Huawei Cloud ECS
#[derive(Parser, Debug)]
#[command(name = "ecs-runner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Mode to run in when no subcommand is given (start or stop)
    #[arg(long, env = "INPUT_MODE", global = true)]
    pub mode: Option<String>,

    /// Print the outcome as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub inputs: InputArgs,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Provision ECS instances and register them as runners
    Start,

    /// Delete ECS instances and remove their runners
    Stop,
}

impl Commands {
    pub fn as_mode(&self) -> &'static str {
        match self {
            Commands::Start => "start",
            Commands::Stop => "stop",
        }
    }
}

/// Action inputs
#[derive(Args, Debug, Clone, Default)]
pub struct InputArgs {
    /// GitHub token with administration rights on the repository
    #[arg(long, env = "INPUT_GITHUB-TOKEN", hide_env_values = true, global = true)]
    pub github_token: Option<String>,

    /// Huawei Cloud access key
    #[arg(long = "huawei-cloud-ak", env = "INPUT_HUAWEI-CLOUD-AK", hide_env_values = true, global = true)]
    pub access_key: Option<String>,

    /// Huawei Cloud secret key
    #[arg(long = "huawei-cloud-sk", env = "INPUT_HUAWEI-CLOUD-SK", hide_env_values = true, global = true)]
    pub secret_key: Option<String>,

    /// Huawei Cloud project id
    #[arg(long, env = "INPUT_PROJECT-ID", global = true)]
    pub project_id: Option<String>,

    /// Image id for the runner instances
    #[arg(long = "ecs-image-id", env = "INPUT_ECS-IMAGE-ID", global = true)]
    pub image_id: Option<String>,

    /// Flavor of the runner instances
    #[arg(long = "ecs-instance-type", env = "INPUT_ECS-INSTANCE-TYPE", global = true)]
    pub instance_type: Option<String>,

    /// Availability zone, the region is derived from it
    #[arg(long, env = "INPUT_AVAILABILITY-ZONE", global = true)]
    pub availability_zone: Option<String>,

    #[arg(long, env = "INPUT_VPC-ID", global = true)]
    pub vpc_id: Option<String>,

    #[arg(long, env = "INPUT_SUBNET-ID", global = true)]
    pub subnet_id: Option<String>,

    #[arg(long, env = "INPUT_SECURITY-GROUP-ID", global = true)]
    pub security_group_id: Option<String>,

    /// Runner label returned by a previous start
    #[arg(long, env = "INPUT_LABEL", global = true)]
    pub label: Option<String>,

    /// Comma separated instance ids returned by a previous start
    #[arg(long = "ecs-instance-id", env = "INPUT_ECS-INSTANCE-ID", global = true)]
    pub instance_id: Option<String>,

    /// JSON array of {"key", "value"} tags for the instances
    #[arg(long, env = "INPUT_SERVER-TAGS", global = true)]
    pub server_tags: Option<String>,

    /// Number of instances to create
    #[arg(long, env = "INPUT_COUNT", global = true)]
    pub count: Option<String>,

    /// Override the ECS endpoint derived from the availability zone
    #[arg(long, env = "INPUT_ECS-ENDPOINT", global = true)]
    pub ecs_endpoint: Option<String>,

    /// Repository the runners register to (owner/repo)
    #[arg(long, env = "GITHUB_REPOSITORY", global = true)]
    pub github_repository: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", global = true)]
    pub github_api_url: Option<String>,

    #[arg(long, env = "GITHUB_SERVER_URL", global = true)]
    pub github_server_url: Option<String>,

    /// Actions runner release to install
    #[arg(long, env = "INPUT_RUNNER-VERSION", global = true)]
    pub runner_version: Option<String>,

    /// Runner architecture (x64 or arm64), detected on the instance when unset
    #[arg(long, env = "INPUT_RUNNER-ARCH", global = true)]
    pub runner_arch: Option<String>,

    /// Extra comma separated runner labels
    #[arg(long, env = "INPUT_RUNNER-LABELS", global = true)]
    pub runner_labels: Option<String>,
}

impl Cli {
    /// Collect the inputs for validation. A subcommand takes precedence over `--mode`.
    pub fn raw_inputs(&self) -> RawInputs {
        let inputs = self.inputs.clone();
        RawInputs {
            mode: self
                .command
                .map(|c| c.as_mode().to_string())
                .or_else(|| self.mode.clone()),
            github_token: inputs.github_token,
            access_key: inputs.access_key,
            secret_key: inputs.secret_key,
            project_id: inputs.project_id,
            image_id: inputs.image_id,
            instance_type: inputs.instance_type,
            availability_zone: inputs.availability_zone,
            vpc_id: inputs.vpc_id,
            subnet_id: inputs.subnet_id,
            security_group_id: inputs.security_group_id,
            label: inputs.label,
            instance_id: inputs.instance_id,
            server_tags: inputs.server_tags,
            count: inputs.count,
            ecs_endpoint: inputs.ecs_endpoint,
            github_repository: inputs.github_repository,
            github_api_url: inputs.github_api_url,
            github_server_url: inputs.github_server_url,
            runner_version: inputs.runner_version,
            runner_arch: inputs.runner_arch,
            runner_labels: inputs.runner_labels,
        }
    }
}
