//! Huawei Cloud ECS client
//!
//! Implements [`CloudLifecycle`] on top of the ECS REST API:
//! - `POST /v1.1/{project_id}/cloudservers` to create post-paid servers
//! - `GET /v1/{project_id}/jobs/{job_id}` to follow the creation job
//! - `POST /v1/{project_id}/cloudservers/delete` to delete servers with their volumes and EIPs

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cloud::{
    CloudLifecycle, DeleteOutcome, InstanceId, InstanceIdentity, JobHandle, JobStatus,
    ProvisioningRequest,
};
use crate::error::{Result, RunnerError};
use crate::signer::Signer;

const SERVICE: &str = "ECS";

/// Derive the regional ECS endpoint from an availability zone (`aa-east-1a` → `aa-east-1`)
pub fn endpoint_for_zone(availability_zone: &str) -> Result<String> {
    let zone = availability_zone.trim();
    let mut chars = zone.chars();
    match chars.next_back() {
        Some(last) if last.is_ascii_alphabetic() && !chars.as_str().is_empty() => Ok(format!(
            "https://ecs.{}.myhuaweicloud.com",
            chars.as_str()
        )),
        _ => Err(RunnerError::Configuration(format!(
            "cannot derive region from availability zone '{}'",
            availability_zone
        ))),
    }
}

/// Connection settings for the ECS API
#[derive(Debug, Clone)]
pub struct EcsConfig {
    pub endpoint: String,
    pub project_id: String,
    pub access_key: String,
    pub secret_key: String,
}

/// ECS API client
#[derive(Clone)]
pub struct EcsClient {
    client: reqwest::Client,
    endpoint: String,
    project_id: String,
    signer: Signer,
}

#[derive(Debug, Serialize)]
struct CreateServersBody<'a> {
    server: PostPaidServer<'a>,
}

#[derive(Debug, Serialize)]
struct PostPaidServer<'a> {
    #[serde(rename = "imageRef")]
    image_ref: &'a str,
    #[serde(rename = "flavorRef")]
    flavor_ref: &'a str,
    name: &'a str,
    user_data: &'a str,
    vpcid: &'a str,
    nics: Vec<Nic<'a>>,
    publicip: PublicIp<'a>,
    count: u32,
    root_volume: RootVolume<'a>,
    security_groups: Vec<SecurityGroup<'a>>,
    availability_zone: &'a str,
    extendparam: ChargingParam,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    server_tags: Vec<Tag<'a>>,
}

#[derive(Debug, Serialize)]
struct Nic<'a> {
    subnet_id: &'a str,
}

#[derive(Debug, Serialize)]
struct PublicIp<'a> {
    eip: Eip<'a>,
}

#[derive(Debug, Serialize)]
struct Eip<'a> {
    iptype: &'a str,
    bandwidth: Bandwidth<'a>,
    extendparam: ChargingParam,
}

#[derive(Debug, Serialize)]
struct Bandwidth<'a> {
    size: u32,
    sharetype: &'a str,
    chargemode: &'a str,
}

#[derive(Debug, Serialize)]
struct ChargingParam {
    #[serde(rename = "chargingMode")]
    charging_mode: &'static str,
}

const POST_PAID: ChargingParam = ChargingParam {
    charging_mode: "postPaid",
};

#[derive(Debug, Serialize)]
struct RootVolume<'a> {
    volumetype: &'a str,
    size: u32,
}

#[derive(Debug, Serialize)]
struct SecurityGroup<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct Tag<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateServersResponse {
    job_id: String,
    #[serde(rename = "serverIds", default)]
    server_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    status: String,
    #[serde(default)]
    fail_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeleteServersBody<'a> {
    servers: Vec<ServerRef<'a>>,
    delete_publicip: bool,
    delete_volume: bool,
}

#[derive(Debug, Serialize)]
struct ServerRef<'a> {
    id: &'a str,
}

impl<'a> CreateServersBody<'a> {
    fn from_request(request: &'a ProvisioningRequest) -> Self {
        let placement = &request.placement;
        let public_ip = &request.public_ip;

        Self {
            server: PostPaidServer {
                image_ref: &placement.image_id,
                flavor_ref: &placement.flavor_id,
                name: &request.name,
                user_data: &request.user_data,
                vpcid: &placement.vpc_id,
                nics: vec![Nic {
                    subnet_id: &placement.subnet_id,
                }],
                publicip: PublicIp {
                    eip: Eip {
                        iptype: &public_ip.ip_type,
                        bandwidth: Bandwidth {
                            size: public_ip.bandwidth_mbit,
                            sharetype: &public_ip.share_type,
                            chargemode: &public_ip.charge_mode,
                        },
                        extendparam: POST_PAID,
                    },
                },
                count: request.count,
                root_volume: RootVolume {
                    volumetype: &request.root_volume.volume_type,
                    size: request.root_volume.size_gb,
                },
                security_groups: vec![SecurityGroup {
                    id: &placement.security_group_id,
                }],
                availability_zone: &placement.availability_zone,
                extendparam: POST_PAID,
                server_tags: request
                    .tags
                    .iter()
                    .map(|tag| Tag {
                        key: &tag.key,
                        value: &tag.value,
                    })
                    .collect(),
            },
        }
    }
}

impl EcsClient {
    /// Create a new ECS API client
    pub fn new(config: EcsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("ecs-runner")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            project_id: config.project_id,
            signer: Signer::new(config.access_key, config.secret_key),
        })
    }

    /// Send a signed request and return the raw response
    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<reqwest::Response> {
        let url = Url::parse(&format!("{}{}", self.endpoint, path)).map_err(|e| {
            RunnerError::Configuration(format!("invalid ECS endpoint '{}': {}", self.endpoint, e))
        })?;
        let payload = match body {
            Some(body) => serde_json::to_vec(body)?,
            None => Vec::new(),
        };

        let extra = [
            ("Content-Type", "application/json"),
            ("X-Project-Id", self.project_id.as_str()),
        ];
        let signed = self
            .signer
            .sign(method.as_str(), &url, &extra, &payload, Utc::now())?;

        debug!("{} {}", method, url);

        let mut request = self.client.request(method, url);
        for (name, value) in extra {
            request = request.header(name, value);
        }
        for (name, value) in signed {
            request = request.header(name, value);
        }
        if body.is_some() {
            request = request.body(payload);
        }

        Ok(request.send().await?)
    }
}

/// Turn a non-success response into the matching error, keeping the raw body
async fn api_error(response: reqwest::Response) -> RunnerError {
    let status = response.status();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RunnerError::Authorization(format!(
            "{} rejected the credential ({}): {}",
            SERVICE, status, message
        )),
        _ => RunnerError::Api {
            service: SERVICE,
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl CloudLifecycle for EcsClient {
    async fn create_instances(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<(InstanceIdentity, JobHandle)> {
        info!(
            "Requesting {} ECS instance(s) named {} in {}",
            request.count, request.name, request.placement.availability_zone
        );

        let body = CreateServersBody::from_request(request);
        let path = format!("/v1.1/{}/cloudservers", self.project_id);
        let response = self.send(Method::POST, &path, Some(&body)).await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let created: CreateServersResponse = response.json().await?;
        let ids = InstanceIdentity::new(created.server_ids.into_iter().map(InstanceId::new).collect());

        Ok((ids, JobHandle::new(created.job_id)))
    }

    async fn job_status(&self, job: &JobHandle) -> Result<JobStatus> {
        let path = format!("/v1/{}/jobs/{}", self.project_id, job);
        let response = self.send::<()>(Method::GET, &path, None).await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let job_response: JobResponse = response.json().await?;
        debug!("Job {} status: {}", job, job_response.status);

        Ok(match job_response.status.as_str() {
            "SUCCESS" => JobStatus::Success,
            "FAIL" => JobStatus::Failed {
                reason: job_response
                    .fail_reason
                    .unwrap_or_else(|| "no failure reason reported".to_string()),
            },
            _ => JobStatus::Pending,
        })
    }

    async fn delete_instances(&self, ids: &InstanceIdentity) -> Result<DeleteOutcome> {
        if ids.is_empty() {
            return Err(RunnerError::Configuration(
                "no instance ids to delete".to_string(),
            ));
        }

        let body = DeleteServersBody {
            servers: ids.ids().iter().map(|id| ServerRef { id: id.as_str() }).collect(),
            delete_publicip: true,
            delete_volume: true,
        };
        let path = format!("/v1/{}/cloudservers/delete", self.project_id);
        let response = self.send(Method::POST, &path, Some(&body)).await?;

        match response.status() {
            status if status.is_success() => {
                info!("Deletion of ECS instance(s) {} accepted", ids.joined());
                Ok(DeleteOutcome::Deleted)
            }
            StatusCode::NOT_FOUND => {
                warn!("ECS instance(s) {} not found, treating as deleted", ids.joined());
                Ok(DeleteOutcome::AlreadyDeleted)
            }
            StatusCode::BAD_REQUEST => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                Err(RunnerError::InvalidInstance(format!(
                    "{}: {}",
                    ids.joined(),
                    message
                )))
            }
            _ => Err(api_error(response).await),
        }
    }
}
