//! Common test utilities for ecs-runner-common integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use ecs_runner_common::cloud::{
    CloudLifecycle, DeleteOutcome, InstanceId, InstanceIdentity, JobHandle, JobStatus,
    ProvisioningRequest,
};
use ecs_runner_common::{
    RegistrationGateway, RegistrationToken, Result, RunnerError, RunnerLabel,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

/// Initialize tracing once for all tests in the binary, writing through the test harness.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let env_filter = EnvFilter::new("warn").add_directive("ecs_runner_common=debug".parse().unwrap());

        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_test_writer())
            .try_init();
    });
}

pub const FAKE_TOKEN: &str = "AABBCCREGISTRATIONTOKEN";

/// Every remote call made by the reconciler, in order, across both fakes
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    IssueToken,
    RunnerOnline(String),
    RemoveRunner(String),
    CreateInstances(ProvisioningRequest),
    JobStatus(String),
    DeleteInstances(Vec<String>),
}

pub type CallLog = Arc<Mutex<Vec<Call>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn calls(log: &CallLog) -> Vec<Call> {
    log.lock().unwrap().clone()
}

/// How the fake cloud answers a delete request
#[derive(Debug, Clone, Copy)]
pub enum DeleteBehavior {
    Accept,
    NotFound,
    RejectInvalid,
    ServerError,
}

pub struct FakeCloud {
    log: CallLog,
    instance_ids: Vec<String>,
    statuses: Mutex<VecDeque<JobStatus>>,
    delete: DeleteBehavior,
}

impl FakeCloud {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            instance_ids: vec!["i-123".to_string(), "i-456".to_string()],
            statuses: Mutex::new(VecDeque::from([JobStatus::Success])),
            delete: DeleteBehavior::Accept,
        }
    }

    pub fn with_statuses(mut self, statuses: Vec<JobStatus>) -> Self {
        self.statuses = Mutex::new(statuses.into());
        self
    }

    pub fn with_delete(mut self, delete: DeleteBehavior) -> Self {
        self.delete = delete;
        self
    }
}

#[async_trait]
impl CloudLifecycle for FakeCloud {
    async fn create_instances(
        &self,
        request: &ProvisioningRequest,
    ) -> Result<(InstanceIdentity, JobHandle)> {
        self.log
            .lock()
            .unwrap()
            .push(Call::CreateInstances(request.clone()));
        let ids = self
            .instance_ids
            .iter()
            .take(request.count as usize)
            .map(|id| InstanceId::new(id.as_str()))
            .collect();
        Ok((InstanceIdentity::new(ids), JobHandle::new("job-1")))
    }

    async fn job_status(&self, job: &JobHandle) -> Result<JobStatus> {
        self.log
            .lock()
            .unwrap()
            .push(Call::JobStatus(job.to_string()));
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(JobStatus::Pending))
    }

    async fn delete_instances(&self, ids: &InstanceIdentity) -> Result<DeleteOutcome> {
        self.log.lock().unwrap().push(Call::DeleteInstances(
            ids.ids().iter().map(|id| id.to_string()).collect(),
        ));
        match self.delete {
            DeleteBehavior::Accept => Ok(DeleteOutcome::Deleted),
            DeleteBehavior::NotFound => Ok(DeleteOutcome::AlreadyDeleted),
            DeleteBehavior::RejectInvalid => Err(RunnerError::InvalidInstance(format!(
                "{}: Ecs.0005 invalid server id",
                ids.joined()
            ))),
            DeleteBehavior::ServerError => Err(RunnerError::Api {
                service: "ECS",
                status: 500,
                message: "internal error".to_string(),
            }),
        }
    }
}

pub struct FakeGateway {
    log: CallLog,
    online: bool,
    token_denied: bool,
    remove_fails: bool,
}

impl FakeGateway {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            online: true,
            token_denied: false,
            remove_fails: false,
        }
    }

    pub fn never_online(mut self) -> Self {
        self.online = false;
        self
    }

    pub fn denying_tokens(mut self) -> Self {
        self.token_denied = true;
        self
    }

    pub fn failing_removal(mut self) -> Self {
        self.remove_fails = true;
        self
    }
}

#[async_trait]
impl RegistrationGateway for FakeGateway {
    async fn issue_registration_token(&self) -> Result<RegistrationToken> {
        self.log.lock().unwrap().push(Call::IssueToken);
        if self.token_denied {
            return Err(RunnerError::Authorization("Bad credentials".to_string()));
        }
        Ok(RegistrationToken::new(FAKE_TOKEN, None))
    }

    async fn runner_online(&self, label: &RunnerLabel) -> Result<bool> {
        self.log
            .lock()
            .unwrap()
            .push(Call::RunnerOnline(label.to_string()));
        Ok(self.online)
    }

    async fn remove_runner(&self, label: &RunnerLabel) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(Call::RemoveRunner(label.to_string()));
        if self.remove_fails {
            return Err(RunnerError::Teardown("runner busy".to_string()));
        }
        Ok(())
    }

    fn registration_url(&self) -> String {
        "https://github.com/acme/widgets".to_string()
    }
}
