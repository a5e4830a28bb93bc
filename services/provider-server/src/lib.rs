//! # awsext Provider Server
//!
//! Serves the provider lifecycle as JSON over HTTP. Every lifecycle route
//! answers with a [`LifecycleResponse`]: the resulting state (or `null`) and
//! the diagnostics raised while producing it.

use agent_status::{
    agent_status_schema, provider_schema, AgentStatusResource, InMemoryAgentStatusService,
};
use awsext_core::{
    endpoints, has_errors, AgentStatusApi, AgentStatusIdentity, AgentStatusRecord,
    AgentStatusSpec, Diagnostic, ProviderConfig, ProviderError, BUILD_INFO,
};
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use connect_client::ConnectClient;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Handshake protocol version printed on startup
pub const PROTOCOL_VERSION: u32 = 1;

pub fn handshake_line(addr: &std::net::SocketAddr) -> String {
    format!("AWSEXT_PROVIDER|{PROTOCOL_VERSION}|{addr}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    /// Amazon Connect over signed HTTPS
    Aws,
    /// Process-local store, for demos and tests
    Memory,
}

#[derive(Debug, Clone)]
enum Backend {
    Aws,
    Memory(InMemoryAgentStatusService),
}

#[derive(Debug)]
pub struct ProviderState {
    backend: Backend,
    resource: RwLock<Option<AgentStatusResource>>,
}

impl ProviderState {
    pub fn new(kind: BackendKind) -> Self {
        let backend = match kind {
            BackendKind::Aws => Backend::Aws,
            BackendKind::Memory => Backend::Memory(InMemoryAgentStatusService::new()),
        };
        Self {
            backend,
            resource: RwLock::new(None),
        }
    }

    /// State backed by an existing in-memory service.
    pub fn memory(service: InMemoryAgentStatusService) -> Self {
        Self {
            backend: Backend::Memory(service),
            resource: RwLock::new(None),
        }
    }

    fn resource(&self) -> Result<AgentStatusResource, ProviderError> {
        self.resource.read().clone().ok_or(ProviderError::NotConfigured)
    }

    async fn configure(&self, config: &ProviderConfig) -> Result<(), ProviderError> {
        let api: Arc<dyn AgentStatusApi> = match &self.backend {
            Backend::Aws => {
                let resolved = config.resolve()?;
                info!(region = %resolved.region, source = ?resolved.source, "Resolved provider configuration");
                Arc::new(ConnectClient::connect(&resolved).await?)
            }
            Backend::Memory(service) => Arc::new(service.clone()),
        };
        *self.resource.write() = Some(AgentStatusResource::new(api));
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleResponse {
    pub state: Option<AgentStatusRecord>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl LifecycleResponse {
    fn state(record: Option<AgentStatusRecord>) -> Self {
        Self {
            state: record,
            diagnostics: Vec::new(),
        }
    }

    fn diagnostics(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            state: None,
            diagnostics,
        }
    }

    /// Failed operations hand back any record they created, else the record
    /// the host already tracks. Only a successful `None` drops tracking.
    fn failed(error: &ProviderError, tracked: Option<AgentStatusRecord>) -> Self {
        Self {
            state: error.partial_record().cloned().or(tracked),
            diagnostics: vec![Diagnostic::from(error)],
        }
    }

    fn from_result(
        result: Result<Option<AgentStatusRecord>, ProviderError>,
        tracked: Option<AgentStatusRecord>,
    ) -> Self {
        match result {
            Ok(record) => Self::state(record),
            Err(error) => {
                warn!(error = %error, "Lifecycle operation failed");
                Self::failed(&error, tracked)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub config: Value,
}

#[derive(Debug, Deserialize)]
pub struct PlannedRequest {
    pub planned: AgentStatusSpec,
}

#[derive(Debug, Deserialize)]
pub struct StateRequest {
    pub state: AgentStatusRecord,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub prior: AgentStatusRecord,
    pub planned: AgentStatusSpec,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ImportRequest {
    Id { id: String },
    Identity { identity: AgentStatusIdentity },
}

pub fn app(state: Arc<ProviderState>) -> Router {
    Router::new()
        .route(endpoints::HEALTH, get(health_check))
        .route(endpoints::SCHEMA, get(schema))
        .route(endpoints::CONFIGURE, post(configure))
        .route(endpoints::AGENT_STATUS_VALIDATE, post(validate))
        .route(endpoints::AGENT_STATUS_CREATE, post(create))
        .route(endpoints::AGENT_STATUS_READ, post(read))
        .route(endpoints::AGENT_STATUS_UPDATE, post(update))
        .route(endpoints::AGENT_STATUS_DELETE, post(delete))
        .route(endpoints::AGENT_STATUS_IMPORT, post(import))
        .with_state(state)
}

#[instrument]
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "provider-server",
        "version": awsext_core::VERSION,
        "build": BUILD_INFO
    }))
}

#[instrument]
async fn schema() -> Json<Value> {
    Json(json!(provider_schema()))
}

#[instrument(skip(state, config))]
async fn configure(
    State(state): State<Arc<ProviderState>>,
    Json(config): Json<ProviderConfig>,
) -> Json<LifecycleResponse> {
    match state.configure(&config).await {
        Ok(()) => {
            info!("Provider configured");
            Json(LifecycleResponse::default())
        }
        Err(error) => Json(LifecycleResponse::failed(&error, None)),
    }
}

#[instrument(skip(request))]
async fn validate(Json(request): Json<ValidateRequest>) -> Json<LifecycleResponse> {
    Json(LifecycleResponse::diagnostics(
        agent_status_schema().validate_config(&request.config),
    ))
}

#[instrument(skip(state, request), fields(name = %request.planned.name))]
async fn create(
    State(state): State<Arc<ProviderState>>,
    Json(request): Json<PlannedRequest>,
) -> Json<LifecycleResponse> {
    let resource = match state.resource() {
        Ok(resource) => resource,
        Err(error) => return Json(LifecycleResponse::failed(&error, None)),
    };
    let diagnostics = resource.validate(&request.planned);
    if has_errors(&diagnostics) {
        return Json(LifecycleResponse::diagnostics(diagnostics));
    }

    Json(LifecycleResponse::from_result(
        resource.create(&request.planned).await.map(Some),
        None,
    ))
}

#[instrument(skip(state, request), fields(id = %request.state.id))]
async fn read(
    State(state): State<Arc<ProviderState>>,
    Json(request): Json<StateRequest>,
) -> Json<LifecycleResponse> {
    let result = match state.resource() {
        Ok(resource) => resource.read(&request.state).await,
        Err(error) => Err(error),
    };
    Json(LifecycleResponse::from_result(result, Some(request.state)))
}

#[instrument(skip(state, request), fields(id = %request.prior.id))]
async fn update(
    State(state): State<Arc<ProviderState>>,
    Json(request): Json<UpdateRequest>,
) -> Json<LifecycleResponse> {
    let resource = match state.resource() {
        Ok(resource) => resource,
        Err(error) => return Json(LifecycleResponse::failed(&error, Some(request.prior))),
    };
    let diagnostics = resource.validate(&request.planned);
    if has_errors(&diagnostics) {
        return Json(LifecycleResponse {
            state: Some(request.prior),
            diagnostics,
        });
    }

    let result = resource
        .update(&request.prior, &request.planned)
        .await
        .map(Some);
    Json(LifecycleResponse::from_result(result, Some(request.prior)))
}

#[instrument(skip(state, request), fields(id = %request.state.id))]
async fn delete(
    State(state): State<Arc<ProviderState>>,
    Json(request): Json<StateRequest>,
) -> Json<LifecycleResponse> {
    let result = match state.resource() {
        Ok(resource) => resource.delete(&request.state).await.map(|()| None),
        Err(error) => Err(error),
    };
    Json(LifecycleResponse::from_result(result, Some(request.state)))
}

#[instrument(skip(state, request))]
async fn import(
    State(state): State<Arc<ProviderState>>,
    Json(request): Json<ImportRequest>,
) -> Json<LifecycleResponse> {
    let resource = match state.resource() {
        Ok(resource) => resource,
        Err(error) => return Json(LifecycleResponse::failed(&error, None)),
    };
    let result = match &request {
        ImportRequest::Id { id } => resource.import(id).await,
        ImportRequest::Identity { identity } => resource.import_identity(identity).await,
    };
    Json(LifecycleResponse::from_result(result.map(Some), None))
}
