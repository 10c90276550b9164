//! GitHub API client for self-hosted runner registration
//!
//! This module provides the [`RegistrationGateway`] used by the reconciler:
//! issuing registration tokens, checking whether a runner with a given label is
//! online, and removing runners once their instance is gone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{Result, RunnerError};
use crate::label::RunnerLabel;
use crate::registration::{RegistrationGateway, RegistrationToken};

const SERVICE: &str = "GitHub";
const PER_PAGE: usize = 100;

/// Repository-scoped GitHub settings
#[derive(Clone)]
pub struct GitHubConfig {
    /// REST API base, e.g. `https://api.github.com`
    pub api_url: String,
    /// Web base the agent registers against, e.g. `https://github.com`
    pub server_url: String,
    pub token: String,
    pub owner: String,
    pub repo: String,
}

impl std::fmt::Debug for GitHubConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubConfig")
            .field("api_url", &self.api_url)
            .field("server_url", &self.server_url)
            .field("token", &"<redacted>")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish()
    }
}

/// GitHub API client
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    config: GitHubConfig,
}

/// Self-hosted runner as reported by GitHub
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRunner {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub busy: bool,
    #[serde(default)]
    pub labels: Vec<RunnerLabelInfo>,
}

/// Label attached to a runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerLabelInfo {
    pub name: String,
}

impl GitHubRunner {
    pub fn has_label(&self, label: &RunnerLabel) -> bool {
        self.labels.iter().any(|l| l.name == label.as_str())
    }

    pub fn is_online(&self) -> bool {
        self.status == "online"
    }
}

#[derive(Debug, Deserialize)]
struct RunnersResponse {
    runners: Vec<GitHubRunner>,
}

#[derive(Deserialize)]
struct RegistrationTokenResponse {
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

impl GitHubClient {
    /// Create a new GitHub API client
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("ecs-runner"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static("2022-11-28"));

        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| {
                RunnerError::Configuration("GitHub token contains invalid characters".to_string())
            })?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo,
            path
        )
    }

    /// List every self-hosted runner registered to the repository
    pub async fn list_runners(&self) -> Result<Vec<GitHubRunner>> {
        let mut all_runners = Vec::new();
        let mut page = 1;

        loop {
            let url = self.repo_url(&format!(
                "/actions/runners?page={}&per_page={}",
                page, PER_PAGE
            ));

            debug!("Fetching page {} of runners", page);

            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }

            let data: RunnersResponse = response.json().await?;
            let fetched = data.runners.len();
            all_runners.extend(data.runners);

            if fetched < PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!(
            "Fetched {} runners for {}/{}",
            all_runners.len(),
            self.config.owner,
            self.config.repo
        );

        Ok(all_runners)
    }

    /// Runners carrying the given label
    pub async fn find_runners(&self, label: &RunnerLabel) -> Result<Vec<GitHubRunner>> {
        let runners = self.list_runners().await?;
        Ok(runners.into_iter().filter(|r| r.has_label(label)).collect())
    }

    /// Delete a runner by id. A runner that no longer exists counts as deleted.
    pub async fn delete_runner(&self, runner_id: u64) -> Result<()> {
        let url = self.repo_url(&format!("/actions/runners/{}", runner_id));
        let response = self.client.delete(&url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!("Runner {} already removed", runner_id);
                Ok(())
            }
            _ => Err(api_error(response).await),
        }
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
impl RegistrationGateway for GitHubClient {
    async fn issue_registration_token(&self) -> Result<RegistrationToken> {
        let url = self.repo_url("/actions/runners/registration-token");
        let response = self.client.post(&url).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let data: RegistrationTokenResponse = response.json().await?;
        info!(
            "Issued runner registration token for {}/{}",
            self.config.owner, self.config.repo
        );

        Ok(RegistrationToken::new(data.token, data.expires_at))
    }

    async fn runner_online(&self, label: &RunnerLabel) -> Result<bool> {
        let runners = self.find_runners(label).await?;
        Ok(runners.iter().any(GitHubRunner::is_online))
    }

    async fn remove_runner(&self, label: &RunnerLabel) -> Result<()> {
        let runners = self.find_runners(label).await?;

        if runners.is_empty() {
            info!("No runner with label {} found (may have already been removed)", label);
            return Ok(());
        }

        let mut failures = Vec::new();
        for runner in &runners {
            match self.delete_runner(runner.id).await {
                Ok(()) => info!("Removed runner {} (ID {})", runner.name, runner.id),
                Err(e) => {
                    warn!("Failed to remove runner {} (ID {}): {}", runner.name, runner.id, e);
                    failures.push(format!("{}: {}", runner.name, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RunnerError::Teardown(format!(
                "failed to remove runner(s) {}",
                failures.join("; ")
            )))
        }
    }

    fn registration_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.config.server_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo
        )
    }
}
