//! ECS adapter tests against recorded HTTP exchanges.

use std::time::Duration;

use aws_sdk_ecs::config::retry::RetryConfig;
use aws_sdk_ecs::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_ecs::Client;
use aws_smithy_http_client::test_util::{ReplayEvent, StaticReplayClient};
use aws_smithy_types::body::SdkBody;
use oneshot_core::{
    ConcreteSpecification, FailureReason, InstanceId, JobHandle, TaskService, WaitOutcome,
};
use oneshot_ecs::EcsService;

const TASK_DEF_ARN: &str = "arn:aws:ecs:us-east-1:123456789012:task-definition";
const TASK_ARN: &str = "arn:aws:ecs:us-east-1:123456789012:task/batch/0f4c2d9e";

fn ok(body: &str) -> http::Response<SdkBody> {
    http::Response::builder()
        .status(200)
        .header("content-type", "application/x-amz-json-1.1")
        .body(SdkBody::from(body.to_string()))
        .unwrap()
}

fn client_exception(message: &str) -> http::Response<SdkBody> {
    http::Response::builder()
        .status(400)
        .header("content-type", "application/x-amz-json-1.1")
        .body(SdkBody::from(format!(
            r#"{{"__type":"ClientException","message":"{message}"}}"#
        )))
        .unwrap()
}

fn event(response: http::Response<SdkBody>) -> ReplayEvent {
    let request = http::Request::builder()
        .uri("https://ecs.us-east-1.amazonaws.com/")
        .body(SdkBody::empty())
        .unwrap();
    ReplayEvent::new(request, response)
}

fn service(responses: Vec<http::Response<SdkBody>>) -> (EcsService, StaticReplayClient) {
    let replay = StaticReplayClient::new(responses.into_iter().map(event).collect());
    let conf = aws_sdk_ecs::Config::builder()
        .behavior_version(BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "replay"))
        .http_client(replay.clone())
        .retry_config(RetryConfig::disabled())
        .build();
    (EcsService::from_client(Client::from_conf(conf)), replay)
}

fn targets(replay: &StaticReplayClient) -> Vec<String> {
    replay
        .actual_requests()
        .map(|req| req.headers().get("x-amz-target").unwrap_or_default().to_string())
        .collect()
}

fn request_body(replay: &StaticReplayClient, index: usize) -> serde_json::Value {
    let request = replay.actual_requests().nth(index).unwrap();
    serde_json::from_slice(request.body().bytes().unwrap()).unwrap()
}

#[tokio::test]
async fn test_latest_active_skips_prefix_matches_across_pages() {
    let (service, replay) = service(vec![
        ok(&format!(
            r#"{{"taskDefinitionArns":["{TASK_DEF_ARN}/oneshot-nightly:7"],"nextToken":"t1"}}"#
        )),
        ok(&format!(
            r#"{{"taskDefinitionArns":["{TASK_DEF_ARN}/oneshot:3"]}}"#
        )),
    ]);

    let latest = service.latest_active("oneshot").await.unwrap();

    assert_eq!(latest, Some(JobHandle::new("oneshot", 3)));
    assert_eq!(
        targets(&replay),
        vec![
            "AmazonEC2ContainerServiceV20141113.ListTaskDefinitions",
            "AmazonEC2ContainerServiceV20141113.ListTaskDefinitions",
        ]
    );
    let first = request_body(&replay, 0);
    assert_eq!(first["familyPrefix"], "oneshot");
    assert_eq!(first["status"], "ACTIVE");
    assert_eq!(request_body(&replay, 1)["nextToken"], "t1");
}

#[tokio::test]
async fn test_latest_active_none_when_only_other_families_exist() {
    let (service, _replay) = service(vec![ok(&format!(
        r#"{{"taskDefinitionArns":["{TASK_DEF_ARN}/oneshot-nightly:7","{TASK_DEF_ARN}/oneshot-weekly:2"]}}"#
    ))]);

    assert_eq!(service.latest_active("oneshot").await.unwrap(), None);
}

#[tokio::test]
async fn test_latest_active_rejects_unparseable_arn() {
    let (service, _replay) = service(vec![ok(
        r#"{"taskDefinitionArns":["arn:aws:ecs:us-east-1:123456789012:task-definition/oneshot"]}"#,
    )]);

    let err = service.latest_active("oneshot").await.unwrap_err();
    assert!(err.to_string().contains("family:revision"));
}

#[tokio::test]
async fn test_register_maps_response_to_handle_and_sends_every_field() {
    let (service, replay) = service(vec![ok(&format!(
        r#"{{"taskDefinition":{{"family":"oneshot","revision":4,"taskDefinitionArn":"{TASK_DEF_ARN}/oneshot:4"}}}}"#
    ))]);
    let mut spec = ConcreteSpecification::parse(
        r#"{
            "volumes":[{"name":"scratch","host":{"sourcePath":"/tmp"}}],
            "runtimePlatform":{"cpuArchitecture":"ARM64"},
            "ephemeralStorage":{"sizeInGiB":40},
            "containerDefinitions":[{
                "name":"job","image":"busybox",
                "secrets":[{"name":"TOKEN","valueFrom":"arn:aws:ssm:us-east-1:1:parameter/token"}],
                "mountPoints":[{"sourceVolume":"scratch","containerPath":"/scratch"}]
            }]
        }"#,
    )
    .unwrap();
    spec.family = Some("oneshot".to_string());

    let handle = service.register(&spec).await.unwrap();

    assert_eq!(handle, JobHandle::new("oneshot", 4));
    let body = request_body(&replay, 0);
    assert_eq!(body["family"], "oneshot");
    assert_eq!(body["volumes"][0]["host"]["sourcePath"], "/tmp");
    assert_eq!(body["runtimePlatform"]["cpuArchitecture"], "ARM64");
    assert_eq!(body["ephemeralStorage"]["sizeInGiB"], 40);
    let container = &body["containerDefinitions"][0];
    assert_eq!(container["secrets"][0]["name"], "TOKEN");
    assert_eq!(container["mountPoints"][0]["containerPath"], "/scratch");
}

#[tokio::test]
async fn test_register_without_task_definition_is_invalid_response() {
    let (service, _replay) = service(vec![ok("{}")]);
    let mut spec =
        ConcreteSpecification::parse(r#"{"containerDefinitions":[{"name":"job"}]}"#).unwrap();
    spec.family = Some("oneshot".to_string());

    let err = service.register(&spec).await.unwrap_err();
    assert!(err.to_string().contains("no task definition returned"));
}

#[tokio::test]
async fn test_run_maps_tasks_and_failures() {
    let (service, replay) = service(vec![ok(&format!(
        r#"{{"tasks":[{{"taskArn":"{TASK_ARN}"}}],
            "failures":[{{"arn":"arn:aws:ecs:us-east-1:123456789012:container-instance/i-1","reason":"RESOURCE:MEMORY"}}]}}"#
    ))]);

    let dispatch = service
        .run("batch", &JobHandle::new("oneshot", 4))
        .await
        .unwrap();

    assert_eq!(dispatch.started_instances, vec![InstanceId(TASK_ARN.to_string())]);
    assert_eq!(
        dispatch.failures,
        vec![FailureReason {
            arn: Some("arn:aws:ecs:us-east-1:123456789012:container-instance/i-1".to_string()),
            reason: Some("RESOURCE:MEMORY".to_string()),
            detail: None,
        }]
    );
    let body = request_body(&replay, 0);
    assert_eq!(body["cluster"], "batch");
    assert_eq!(body["taskDefinition"], "oneshot:4");
    assert_eq!(body["count"], 1);
}

#[tokio::test]
async fn test_wait_reports_stopped() {
    let (service, _replay) = service(vec![ok(&format!(
        r#"{{"tasks":[{{"taskArn":"{TASK_ARN}","lastStatus":"STOPPED"}}],"failures":[]}}"#
    ))]);

    let outcome = service
        .wait_until_stopped(
            "batch",
            &[InstanceId(TASK_ARN.to_string())],
            Duration::from_secs(30),
        )
        .await;
    assert_eq!(outcome, WaitOutcome::Stopped);
}

#[tokio::test]
async fn test_wait_service_error_is_transient() {
    let (service, _replay) = service(vec![client_exception("Tasks cannot be empty.")]);

    let outcome = service
        .wait_until_stopped(
            "batch",
            &[InstanceId(TASK_ARN.to_string())],
            Duration::from_secs(30),
        )
        .await;
    match outcome {
        WaitOutcome::TransientError(message) => {
            assert!(message.contains("Tasks cannot be empty."), "{message}")
        }
        other => panic!("expected a transient error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_wait_past_window_is_timed_out() {
    let running = format!(
        r#"{{"tasks":[{{"taskArn":"{TASK_ARN}","lastStatus":"RUNNING"}}],"failures":[]}}"#
    );
    let (service, replay) = service((0..8).map(|_| ok(&running)).collect());

    let outcome = service
        .wait_until_stopped(
            "batch",
            &[InstanceId(TASK_ARN.to_string())],
            Duration::from_secs(1),
        )
        .await;

    assert_eq!(outcome, WaitOutcome::TimedOut);
    assert!(replay.actual_requests().count() >= 2);
}

#[tokio::test]
async fn test_deregister_targets_identifier() {
    let (service, replay) = service(vec![ok(&format!(
        r#"{{"taskDefinition":{{"family":"oneshot","revision":4,"status":"INACTIVE","taskDefinitionArn":"{TASK_DEF_ARN}/oneshot:4"}}}}"#
    ))]);

    service
        .deregister(&JobHandle::new("oneshot", 4))
        .await
        .unwrap();
    assert_eq!(request_body(&replay, 0)["taskDefinition"], "oneshot:4");
}
