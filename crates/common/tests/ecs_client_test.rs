//! ECS client tests against a mock API server

mod common;

use chrono::NaiveDateTime;
use ecs_runner_common::cloud::{
    CloudLifecycle, DeleteOutcome, InstanceIdentity, JobHandle, JobStatus, Placement,
    ProvisioningRequest, PublicIpSpec, RootVolumeSpec, ServerTag,
};
use ecs_runner_common::signer::Signer;
use ecs_runner_common::{EcsClient, EcsConfig, RunnerError};
use reqwest::Url;
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use common::init_test_tracing;

fn client(server: &MockServer) -> EcsClient {
    EcsClient::new(EcsConfig {
        endpoint: server.uri(),
        project_id: "proj".to_string(),
        access_key: "AK".to_string(),
        secret_key: "SK".to_string(),
    })
    .unwrap()
}

fn request() -> ProvisioningRequest {
    ProvisioningRequest {
        name: "actions-ab12cd34".to_string(),
        placement: Placement {
            availability_zone: "aa-east-1a".to_string(),
            image_id: "img-1".to_string(),
            flavor_id: "f1".to_string(),
            vpc_id: "vpc-1".to_string(),
            subnet_id: "subnet-1".to_string(),
            security_group_id: "sg-1".to_string(),
        },
        root_volume: RootVolumeSpec::default(),
        public_ip: PublicIpSpec::default(),
        tags: vec![ServerTag {
            key: "team".to_string(),
            value: "ci".to_string(),
        }],
        count: 2,
        user_data: "IyEvYmluL2Jhc2gK".to_string(),
    }
}

/// Recompute the signature the way the API gateway does and compare.
/// The signature covers the `Host` header, so the URL is rebuilt from it.
fn correctly_signed(req: &Request) -> bool {
    let header = |name: &str| {
        req.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let (Some(date), Some(auth), Some(host)) = (
        header("x-sdk-date"),
        header("authorization"),
        header("host"),
    ) else {
        return false;
    };
    let Ok(at) = NaiveDateTime::parse_from_str(&date, "%Y%m%dT%H%M%SZ") else {
        return false;
    };
    let Ok(mut url) = Url::parse(&format!("http://{}{}", host, req.url.path())) else {
        return false;
    };
    url.set_query(req.url.query());

    let expected = Signer::new("AK", "SK")
        .sign(
            req.method.as_str(),
            &url,
            &[("Content-Type", "application/json"), ("X-Project-Id", "proj")],
            &req.body,
            at.and_utc(),
        )
        .unwrap();

    expected[1].1 == auth
}

#[tokio::test]
async fn test_create_instances() {
    init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.1/proj/cloudservers"))
        .and(header("x-project-id", "proj"))
        .and(correctly_signed)
        .and(body_partial_json(json!({
            "server": {
                "imageRef": "img-1",
                "flavorRef": "f1",
                "name": "actions-ab12cd34",
                "user_data": "IyEvYmluL2Jhc2gK",
                "vpcid": "vpc-1",
                "count": 2,
                "availability_zone": "aa-east-1a",
                "nics": [{"subnet_id": "subnet-1"}],
                "security_groups": [{"id": "sg-1"}],
                "server_tags": [{"key": "team", "value": "ci"}]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "job_id": "job-9",
            "serverIds": ["i-123", "i-456"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (ids, job) = client(&server).create_instances(&request()).await.unwrap();

    assert_eq!(ids.joined(), "i-123,i-456");
    assert_eq!(job, JobHandle::new("job-9"));
}

#[tokio::test]
async fn test_create_rejection_keeps_provider_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1.1/proj/cloudservers"))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"error":{"code":"Ecs.0023","message":"flavor f1 sold out"}}"#,
        ))
        .mount(&server)
        .await;

    let err = client(&server).create_instances(&request()).await.unwrap_err();

    match err {
        RunnerError::Api {
            service,
            status,
            message,
        } => {
            assert_eq!(service, "ECS");
            assert_eq!(status, 400);
            assert_eq!(
                message,
                r#"{"error":{"code":"Ecs.0023","message":"flavor f1 sold out"}}"#
            );
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("APIGW.0301 incorrect IAM authentication"))
        .mount(&server)
        .await;

    let err = client(&server).create_instances(&request()).await.unwrap_err();
    assert!(matches!(err, RunnerError::Authorization(_)));
}

#[tokio::test]
async fn test_job_status_mapping() {
    let server = MockServer::start().await;
    for (job, body) in [
        ("job-init", json!({"status": "INIT"})),
        ("job-running", json!({"status": "RUNNING"})),
        ("job-ok", json!({"status": "SUCCESS"})),
        ("job-fail", json!({"status": "FAIL", "fail_reason": "Ecs.0039 quota exceeded"})),
    ] {
        Mock::given(method("GET"))
            .and(path(format!("/v1/proj/jobs/{}", job)))
            .and(correctly_signed)
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
    }

    let ecs = client(&server);
    let status = |job: &'static str| {
        let ecs = ecs.clone();
        async move { ecs.job_status(&JobHandle::new(job)).await.unwrap() }
    };

    assert_eq!(status("job-init").await, JobStatus::Pending);
    assert_eq!(status("job-running").await, JobStatus::Pending);
    assert_eq!(status("job-ok").await, JobStatus::Success);
    assert_eq!(
        status("job-fail").await,
        JobStatus::Failed {
            reason: "Ecs.0039 quota exceeded".to_string()
        }
    );
}

#[tokio::test]
async fn test_delete_requests_volume_and_ip_cleanup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/proj/cloudservers/delete"))
        .and(correctly_signed)
        .and(body_json(json!({
            "servers": [{"id": "i-123"}, {"id": "i-456"}],
            "delete_publicip": true,
            "delete_volume": true
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "job-del"})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = client(&server)
        .delete_instances(&InstanceIdentity::parse_list("i-123,i-456"))
        .await
        .unwrap();

    assert_eq!(outcome, DeleteOutcome::Deleted);
}

#[tokio::test]
async fn test_delete_classification() {
    for status in [404u16, 400, 500] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/proj/cloudservers/delete"))
            .respond_with(ResponseTemplate::new(status).set_body_string("Ecs.0114 server not found"))
            .mount(&server)
            .await;

        let result = client(&server)
            .delete_instances(&InstanceIdentity::parse_list("i-123"))
            .await;

        match status {
            404 => assert_eq!(result.unwrap(), DeleteOutcome::AlreadyDeleted),
            400 => assert!(matches!(result, Err(RunnerError::InvalidInstance(_)))),
            _ => assert!(matches!(result, Err(RunnerError::Api { status: 500, .. }))),
        }
    }
}

#[tokio::test]
async fn test_delete_without_ids_makes_no_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .delete_instances(&InstanceIdentity::default())
        .await
        .unwrap_err();

    assert!(err.is_configuration());
}
