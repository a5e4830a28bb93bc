//! BDD Tests for the provider host surface

use agent_status::{AgentStatusState, InMemoryAgentStatusService, Operation, StoredAgentStatus};
use awsext_core::{endpoints, ApiError};
use axum::body::{to_bytes, Body};
use axum::http::Request;
use cucumber::{given, then, when, World};
use provider_server::{app, ProviderState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Debug, World)]
#[world(init = Self::new)]
struct ProviderWorld {
    service: InMemoryAgentStatusService,
    router: axum::Router,
    existing: Option<StoredAgentStatus>,
    response: Value,
}

impl ProviderWorld {
    fn new() -> Self {
        let service = InMemoryAgentStatusService::new();
        let router = app(Arc::new(ProviderState::memory(service.clone())));
        Self {
            service,
            router,
            existing: None,
            response: Value::Null,
        }
    }

    async fn call(&mut self, method: &str, uri: &str, body: Option<Value>) {
        let body = body.map_or_else(Body::empty, |body| Body::from(body.to_string()));
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .expect("valid request");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");
        self.response = serde_json::from_slice(&bytes).expect("JSON response");
    }
}

#[given("a configured provider")]
async fn given_configured(world: &mut ProviderWorld) {
    world.call("POST", endpoints::CONFIGURE, Some(json!({}))).await;
    assert_eq!(world.response["diagnostics"], json!([]));
}

#[given(expr = "an agent status {string} already exists in {string}")]
async fn given_existing(world: &mut ProviderWorld, name: String, instance_id: String) {
    world.existing = Some(
        world
            .service
            .seed(&instance_id, &name, AgentStatusState::Disabled),
    );
}

#[given("Connect rejects updates")]
async fn given_update_failure(world: &mut ProviderWorld) {
    world.service.fail(
        Operation::Update,
        ApiError::Service {
            code: "AccessDeniedException".to_string(),
            status: 403,
            message: "not authorized".to_string(),
        },
    );
}

#[when("the host fetches the schema")]
async fn when_schema(world: &mut ProviderWorld) {
    world.call("GET", endpoints::SCHEMA, None).await;
}

#[when(expr = "the host creates {string} as {word}")]
async fn when_create(world: &mut ProviderWorld, name: String, state: String) {
    let planned = json!({
        "instance_id": "inst-1",
        "name": name,
        "state": state,
        "display_order": 1
    });
    world
        .call(
            "POST",
            endpoints::AGENT_STATUS_CREATE,
            Some(json!({ "planned": planned })),
        )
        .await;
}

#[then(expr = "the schema should describe {string}")]
async fn then_schema(world: &mut ProviderWorld, resource: String) {
    assert_eq!(world.response["type_name"], "awsext");
    assert!(world.response["resources"][resource.as_str()].is_object());
}

#[then("the response should carry an error diagnostic")]
async fn then_error_diagnostic(world: &mut ProviderWorld) {
    let diagnostics = world.response["diagnostics"]
        .as_array()
        .expect("diagnostics array");
    assert!(diagnostics.iter().any(|d| d["severity"] == "error"));
}

#[then("the response should carry no diagnostics")]
async fn then_no_diagnostics(world: &mut ProviderWorld) {
    assert_eq!(world.response["diagnostics"], json!([]));
}

#[then("the response state should be empty")]
async fn then_empty_state(world: &mut ProviderWorld) {
    assert_eq!(world.response["state"], Value::Null);
}

#[then("the response state should track the existing agent status")]
async fn then_tracks_existing(world: &mut ProviderWorld) {
    let existing = world.existing.as_ref().expect("no existing agent status");
    assert_eq!(world.response["state"]["id"], existing.key.to_string());
    assert_eq!(world.response["state"]["arn"], existing.arn);
}

#[tokio::main]
async fn main() {
    ProviderWorld::cucumber()
        .run_and_exit("tests/features")
        .await;
}
