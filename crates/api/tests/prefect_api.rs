use std::time::Duration;

use futures_util::future::join_all;
use prefect_mcp_api::{ClientLifecycle, PrefectApi, ServiceConfig};
use prefect_mcp_types::{ErrorKind, ToolOutcome};
use serde_json::{Map, Value, json};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, api_key: Option<&str>) -> ServiceConfig {
    ServiceConfig::new(format!("{}/api/", server.uri()), api_key.map(str::to_string)).expect("valid mock server url")
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

async fn serving(config: ServiceConfig) -> (ClientLifecycle, PrefectApi) {
    let mut lifecycle = ClientLifecycle::new(config).with_release_timeout(Duration::from_secs(1));
    let api = lifecycle.start().expect("start lifecycle");
    (lifecycle, api)
}

#[tokio::test]
async fn list_flows_sends_limit_and_returns_body_unmodified() {
    let server = MockServer::start().await;
    let body = json!([{"id": "2f1b", "name": "etl", "tags": ["production"]}]);
    Mock::given(method("GET"))
        .and(path("/api/flows"))
        .and(query_param("limit", "20"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let (mut lifecycle, api) = serving(config_for(&server, None)).await;
    assert_eq!(api.list_flows(20).await, ToolOutcome::Success(body));
    drop(api);
    lifecycle.stop().await;
}

#[tokio::test]
async fn list_runs_and_deployments_hit_their_collections() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/flow_runs"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "run-1"}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/deployments"))
        .and(query_param("limit", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"deployments": []})))
        .expect(1)
        .mount(&server)
        .await;

    let (_lifecycle, api) = serving(config_for(&server, None)).await;
    assert_eq!(api.list_flow_runs(5).await.into_value(), json!([{"id": "run-1"}]));
    assert_eq!(api.list_deployments(0).await.into_value(), json!({"deployments": []}));
}

#[tokio::test]
async fn filter_operations_post_criteria_as_exact_body() {
    let server = MockServer::start().await;
    let cases = [
        ("/api/flows/filter", json!({"flows": {"tags": {"all_": ["production"]}}})),
        ("/api/flow_runs/filter", json!({"flow_runs": {"state": {"type": {"any_": ["FAILED", "CRASHED"]}}}, "limit": 3})),
        ("/api/deployments/filter", json!({"deployments": {"is_schedule_active": {"eq_": true}}})),
    ];
    for (route, criteria) in &cases {
        Mock::given(method("POST"))
            .and(path(*route))
            .and(body_json(criteria.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"route": route}])))
            .expect(1)
            .mount(&server)
            .await;
    }

    let (_lifecycle, api) = serving(config_for(&server, None)).await;
    let flows = api.filter_flows(object(cases[0].1.clone())).await;
    let runs = api.filter_flow_runs(object(cases[1].1.clone())).await;
    let deployments = api.filter_deployments(object(cases[2].1.clone())).await;

    assert_eq!(flows.into_value(), json!([{"route": "/api/flows/filter"}]));
    assert_eq!(runs.into_value(), json!([{"route": "/api/flow_runs/filter"}]));
    assert_eq!(deployments.into_value(), json!([{"route": "/api/deployments/filter"}]));
}

#[tokio::test]
async fn create_flow_run_posts_parameters_to_deployment() {
    let server = MockServer::start().await;
    let created = json!({"id": "run-42", "deployment_id": "abc-123", "parameters": {"x": 1}});
    Mock::given(method("POST"))
        .and(path("/api/deployments/abc-123/create_flow_run"))
        .and(body_json(json!({"parameters": {"x": 1}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(created.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let (_lifecycle, api) = serving(config_for(&server, None)).await;
    let outcome = api.create_flow_run(Some("abc-123"), Some(object(json!({"x": 1})))).await;
    assert_eq!(outcome, ToolOutcome::Success(created));
}

#[tokio::test]
async fn create_flow_run_sends_identifier_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/deployments/%20abc-123%20/create_flow_run"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"detail":"Not Found"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let (_lifecycle, api) = serving(config_for(&server, None)).await;
    let outcome = api.create_flow_run(Some(" abc-123 "), None).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::RemoteStatusError));
}

#[tokio::test]
async fn create_flow_run_with_blank_id_makes_no_request() {
    let server = MockServer::start().await;
    let (_lifecycle, api) = serving(config_for(&server, None)).await;

    assert_eq!(api.create_flow_run(None, None).await.error_kind(), Some(ErrorKind::MissingArgument));
    assert_eq!(api.create_flow_run(Some(""), None).await.error_kind(), Some(ErrorKind::MissingArgument));

    let received = server.received_requests().await.unwrap_or_default();
    assert!(received.is_empty(), "unexpected requests: {received:?}");
}

#[tokio::test]
async fn not_found_is_reported_and_server_keeps_serving() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/deployments/missing/create_flow_run"))
        .respond_with(ResponseTemplate::new(404).set_body_string(r#"{"detail":"Deployment not found."}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let (_lifecycle, api) = serving(config_for(&server, None)).await;
    let outcome = api.create_flow_run(Some("missing"), None).await;
    let record = outcome.error().expect("404 must be an error record");
    assert_eq!(record.kind, ErrorKind::RemoteStatusError);
    assert!(record.message.contains("404"), "message: {}", record.message);
    assert_eq!(record.details.as_deref(), Some(r#"{"detail":"Deployment not found."}"#));

    assert_eq!(api.list_flows(20).await, ToolOutcome::Success(json!([])));
}

#[tokio::test]
async fn non_json_success_is_internal_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let (_lifecycle, api) = serving(config_for(&server, None)).await;
    assert_eq!(api.list_flows(20).await.error_kind(), Some(ErrorKind::InternalError));
}

#[tokio::test]
async fn empty_success_body_is_internal_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/flows"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let (_lifecycle, api) = serving(config_for(&server, None)).await;
    let outcome = api.list_flows(20).await;
    let record = outcome.error().expect("empty body must not decode");
    assert_eq!(record.kind, ErrorKind::InternalError);
    assert_eq!(record.details.as_deref(), Some("<empty>"));
}

#[tokio::test]
async fn slow_response_times_out_as_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/flow_runs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"id": "late"}]))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let config = config_for(&server, None).with_timeout(Duration::from_millis(200));
    let (_lifecycle, api) = serving(config).await;
    let outcome = api.list_flow_runs(20).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::TransportError));
    assert!(!outcome.into_value().to_string().contains("late"));
}

#[tokio::test]
async fn refused_connection_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
        listener.local_addr().expect("local addr").port()
    };
    let config = ServiceConfig::new(format!("http://127.0.0.1:{port}/api"), None).unwrap();

    let (_lifecycle, api) = serving(config).await;
    let outcome = api.list_deployments(20).await;
    assert_eq!(outcome.error_kind(), Some(ErrorKind::TransportError));
}

#[tokio::test]
async fn bearer_header_is_sent_only_when_key_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/flows"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    let (_with_key, authed) = serving(config_for(&server, Some("pnu_test_key"))).await;
    let (_without_key, anonymous) = serving(config_for(&server, None)).await;
    assert!(authed.list_flows(1).await.is_success());
    assert!(anonymous.list_flows(1).await.is_success());

    let received = server.received_requests().await.expect("request recording enabled");
    let authorization: Vec<Option<String>> = received
        .iter()
        .map(|request| {
            request
                .headers
                .get("authorization")
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        })
        .collect();
    assert_eq!(authorization, vec![Some("Bearer pnu_test_key".to_string()), None]);
}

#[tokio::test]
async fn fifty_concurrent_calls_receive_their_own_responses() {
    let server = MockServer::start().await;
    for marker in 0..25u32 {
        Mock::given(method("GET"))
            .and(path("/api/flows"))
            .and(query_param("limit", marker.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"marker": marker}))
                    .set_delay(Duration::from_millis(u64::from(25 - marker) * 4)),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/flow_runs/filter"))
            .and(body_json(json!({"marker": marker})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"echo": marker})))
            .expect(1)
            .mount(&server)
            .await;
    }

    let (mut lifecycle, api) = serving(config_for(&server, None)).await;
    let calls = (0..25u32).flat_map(|marker| {
        let list_api = api.clone();
        let filter_api = api.clone();
        [
            tokio::spawn(async move { (json!({"marker": marker}), list_api.list_flows(marker).await) }),
            tokio::spawn(async move {
                let criteria = object(json!({"marker": marker}));
                (json!({"echo": marker}), filter_api.filter_flow_runs(criteria).await)
            }),
        ]
    });

    let results = join_all(calls).await;
    assert_eq!(results.len(), 50);
    for joined in results {
        let (expected, outcome) = joined.expect("task completed");
        assert_eq!(outcome, ToolOutcome::Success(expected));
    }

    drop(api);
    assert_eq!(lifecycle.stop().await, prefect_mcp_api::ReleaseOutcome::Released);
    assert_eq!(lifecycle.pool_stats().live(), 0);
}
