//! In-memory Connect agent status service
//!
//! Behaves like the remote API for the calls the reconciler makes: duplicate
//! names are rejected on create, `DisplayOrder` is rejected for disabled
//! statuses, listing is paginated in creation order. Every call is recorded,
//! and failures or empty responses can be injected per operation.

use async_trait::async_trait;
use awsext_core::{
    AgentStatusApi, AgentStatusKey, AgentStatusState, AgentStatusSummary, AgentStatusType,
    ApiError, ApiResult, CreateAgentStatusOutput, CreateAgentStatusRequest,
    DescribeAgentStatusOutput, ListAgentStatusesOutput, ListAgentStatusesRequest,
    RemoteAgentStatus, UpdateAgentStatusRequest,
};
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Describe,
    Update,
    List,
    Tag,
    Untag,
}

/// A recorded call against the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    Create(CreateAgentStatusRequest),
    Describe {
        instance_id: String,
        agent_status_id: String,
    },
    Update(UpdateAgentStatusRequest),
    List {
        instance_id: String,
        next_token: Option<String>,
    },
    Tag {
        arn: String,
        tags: BTreeMap<String, String>,
    },
    Untag {
        arn: String,
        tag_keys: Vec<String>,
    },
}

impl ApiCall {
    pub fn operation(&self) -> Operation {
        match self {
            ApiCall::Create(_) => Operation::Create,
            ApiCall::Describe { .. } => Operation::Describe,
            ApiCall::Update(_) => Operation::Update,
            ApiCall::List { .. } => Operation::List,
            ApiCall::Tag { .. } => Operation::Tag,
            ApiCall::Untag { .. } => Operation::Untag,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAgentStatus {
    pub key: AgentStatusKey,
    pub arn: String,
    pub name: String,
    pub description: Option<String>,
    pub state: AgentStatusState,
    pub display_order: Option<i32>,
    pub status_type: AgentStatusType,
    pub tags: BTreeMap<String, String>,
}

impl StoredAgentStatus {
    fn to_remote(&self) -> RemoteAgentStatus {
        RemoteAgentStatus {
            agent_status_arn: Some(self.arn.clone()),
            agent_status_id: Some(self.key.agent_status_id.clone()),
            name: Some(self.name.clone()),
            description: self.description.clone(),
            status_type: Some(self.status_type),
            display_order: self.display_order,
            state: Some(self.state),
            tags: Some(self.tags.clone()),
        }
    }

    fn to_summary(&self) -> AgentStatusSummary {
        AgentStatusSummary {
            id: Some(self.key.agent_status_id.clone()),
            arn: Some(self.arn.clone()),
            name: Some(self.name.clone()),
            status_type: Some(self.status_type),
        }
    }
}

#[derive(Clone)]
pub struct InMemoryAgentStatusService {
    region: String,
    account_id: String,
    page_size: usize,
    statuses: Arc<DashMap<AgentStatusKey, StoredAgentStatus>>,
    /// Creation order, used for listing
    order: Arc<RwLock<Vec<AgentStatusKey>>>,
    calls: Arc<RwLock<Vec<ApiCall>>>,
    failures: Arc<DashMap<Operation, ApiError>>,
    empty: Arc<DashSet<Operation>>,
}

impl std::fmt::Debug for InMemoryAgentStatusService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryAgentStatusService")
            .field("region", &self.region)
            .field("statuses_count", &self.statuses.len())
            .field("calls_count", &self.calls.read().len())
            .finish()
    }
}

impl Default for InMemoryAgentStatusService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAgentStatusService {
    pub fn new() -> Self {
        Self {
            region: "us-east-1".to_string(),
            account_id: "123456789012".to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            statuses: Arc::new(DashMap::new()),
            order: Arc::new(RwLock::new(Vec::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            failures: Arc::new(DashMap::new()),
            empty: Arc::new(DashSet::new()),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Insert an agent status directly, as if created out of band.
    pub fn seed(
        &self,
        instance_id: &str,
        name: &str,
        state: AgentStatusState,
    ) -> StoredAgentStatus {
        self.insert(instance_id, name, None, state, None, BTreeMap::new())
    }

    /// Like [`seed`](Self::seed), with a description already set.
    pub fn seed_described(
        &self,
        instance_id: &str,
        name: &str,
        description: &str,
        state: AgentStatusState,
    ) -> StoredAgentStatus {
        self.insert(
            instance_id,
            name,
            Some(description.to_string()),
            state,
            None,
            BTreeMap::new(),
        )
    }

    pub fn get(&self, instance_id: &str, agent_status_id: &str) -> Option<StoredAgentStatus> {
        self.statuses
            .get(&AgentStatusKey::new(instance_id, agent_status_id))
            .map(|entry| entry.value().clone())
    }

    /// Drop an agent status behind the reconciler's back.
    pub fn remove(&self, instance_id: &str, agent_status_id: &str) -> Option<StoredAgentStatus> {
        let key = AgentStatusKey::new(instance_id, agent_status_id);
        self.order.write().retain(|k| k != &key);
        self.statuses.remove(&key).map(|(_, status)| status)
    }

    pub fn statuses_in(&self, instance_id: &str) -> Vec<StoredAgentStatus> {
        self.order
            .read()
            .iter()
            .filter(|key| key.instance_id == instance_id)
            .filter_map(|key| self.statuses.get(key).map(|entry| entry.value().clone()))
            .collect()
    }

    /// Make every call of `operation` fail with `error` until cleared.
    pub fn fail(&self, operation: Operation, error: ApiError) {
        self.failures.insert(operation, error);
    }

    /// Make every call of `operation` succeed with an empty payload.
    pub fn respond_empty(&self, operation: Operation) {
        self.empty.insert(operation);
    }

    pub fn clear_faults(&self) {
        self.failures.clear();
        self.empty.clear();
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.read().clone()
    }

    pub fn call_count(&self, operation: Operation) -> usize {
        self.calls
            .read()
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.write().clear();
    }

    fn record(&self, call: ApiCall) -> ApiResult<bool> {
        let operation = call.operation();
        debug!(?operation, "In-memory Connect call");
        self.calls.write().push(call);

        if let Some(error) = self.failures.get(&operation) {
            return Err(error.value().clone());
        }
        Ok(self.empty.contains(&operation))
    }

    fn insert(
        &self,
        instance_id: &str,
        name: &str,
        description: Option<String>,
        state: AgentStatusState,
        display_order: Option<i32>,
        tags: BTreeMap<String, String>,
    ) -> StoredAgentStatus {
        let key = AgentStatusKey::new(instance_id, Uuid::new_v4().to_string());
        let status = StoredAgentStatus {
            arn: format!(
                "arn:aws:connect:{}:{}:instance/{}/agent-state/{}",
                self.region, self.account_id, key.instance_id, key.agent_status_id
            ),
            key: key.clone(),
            name: name.to_string(),
            description,
            state,
            display_order,
            status_type: AgentStatusType::Custom,
            tags,
        };
        self.statuses.insert(key.clone(), status.clone());
        self.order.write().push(key);
        status
    }

    fn not_found(key: &AgentStatusKey) -> ApiError {
        ApiError::NotFound {
            message: format!(
                "agent status {} not found in instance {}",
                key.agent_status_id, key.instance_id
            ),
        }
    }

    fn reject_display_order(state: AgentStatusState, display_order: Option<i32>) -> ApiResult<()> {
        match (state, display_order) {
            (AgentStatusState::Disabled, Some(_)) => Err(ApiError::Service {
                code: "InvalidRequestException".to_string(),
                status: 400,
                message: "DisplayOrder cannot be set for a DISABLED agent status".to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn key_for_arn(&self, arn: &str) -> ApiResult<AgentStatusKey> {
        AgentStatusKey::from_arn(arn)
            .ok()
            .filter(|key| self.statuses.contains_key(key))
            .ok_or_else(|| ApiError::NotFound {
                message: format!("resource {arn} not found"),
            })
    }
}

#[async_trait]
impl AgentStatusApi for InMemoryAgentStatusService {
    async fn create_agent_status(
        &self,
        request: CreateAgentStatusRequest,
    ) -> ApiResult<CreateAgentStatusOutput> {
        if self.record(ApiCall::Create(request.clone()))? {
            return Ok(CreateAgentStatusOutput::default());
        }
        Self::reject_display_order(request.state, request.display_order)?;

        if self
            .statuses_in(&request.instance_id)
            .iter()
            .any(|status| status.name == request.name)
        {
            return Err(ApiError::Service {
                code: "DuplicateResourceException".to_string(),
                status: 409,
                message: format!("agent status {} already exists", request.name),
            });
        }

        let status = self.insert(
            &request.instance_id,
            &request.name,
            request.description,
            request.state,
            request.display_order,
            request.tags,
        );
        Ok(CreateAgentStatusOutput {
            agent_status_id: Some(status.key.agent_status_id),
            agent_status_arn: Some(status.arn),
        })
    }

    async fn describe_agent_status(
        &self,
        instance_id: &str,
        agent_status_id: &str,
    ) -> ApiResult<DescribeAgentStatusOutput> {
        let empty = self.record(ApiCall::Describe {
            instance_id: instance_id.to_string(),
            agent_status_id: agent_status_id.to_string(),
        })?;

        let key = AgentStatusKey::new(instance_id, agent_status_id);
        let status = self.get(instance_id, agent_status_id);
        match status {
            None => Err(Self::not_found(&key)),
            Some(_) if empty => Ok(DescribeAgentStatusOutput::default()),
            Some(status) => Ok(DescribeAgentStatusOutput {
                agent_status: Some(status.to_remote()),
            }),
        }
    }

    async fn update_agent_status(&self, request: UpdateAgentStatusRequest) -> ApiResult<()> {
        self.record(ApiCall::Update(request.clone()))?;
        Self::reject_display_order(request.state, request.display_order)?;

        let key = AgentStatusKey::new(&request.instance_id, &request.agent_status_id);
        let mut status = self
            .statuses
            .get_mut(&key)
            .ok_or_else(|| Self::not_found(&key))?;

        status.name = request.name;
        status.description = Some(request.description).filter(|d| !d.is_empty());
        status.state = request.state;
        // Connect keeps the previous position when DisplayOrder is omitted.
        if request.display_order.is_some() {
            status.display_order = request.display_order;
        }
        Ok(())
    }

    async fn list_agent_statuses(
        &self,
        request: ListAgentStatusesRequest,
    ) -> ApiResult<ListAgentStatusesOutput> {
        if self.record(ApiCall::List {
            instance_id: request.instance_id.clone(),
            next_token: request.next_token.clone(),
        })? {
            return Ok(ListAgentStatusesOutput::default());
        }

        let start = match request.next_token.as_deref() {
            None => 0,
            Some(token) => token.parse::<usize>().map_err(|_| ApiError::Service {
                code: "InvalidParameterException".to_string(),
                status: 400,
                message: format!("invalid next token {token:?}"),
            })?,
        };
        let page_size = request
            .max_results
            .map(|n| n as usize)
            .unwrap_or(self.page_size)
            .max(1);

        let statuses = self.statuses_in(&request.instance_id);
        let end = (start + page_size).min(statuses.len());
        let page = statuses.get(start..end).unwrap_or_default();

        Ok(ListAgentStatusesOutput {
            agent_status_summary_list: page.iter().map(StoredAgentStatus::to_summary).collect(),
            next_token: (end < statuses.len()).then(|| end.to_string()),
        })
    }

    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> ApiResult<()> {
        self.record(ApiCall::Tag {
            arn: arn.to_string(),
            tags: tags.clone(),
        })?;

        let key = self.key_for_arn(arn)?;
        if let Some(mut status) = self.statuses.get_mut(&key) {
            status.tags.extend(tags.clone());
        }
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, tag_keys: &[String]) -> ApiResult<()> {
        self.record(ApiCall::Untag {
            arn: arn.to_string(),
            tag_keys: tag_keys.to_vec(),
        })?;

        let key = self.key_for_arn(arn)?;
        if let Some(mut status) = self.statuses.get_mut(&key) {
            for tag_key in tag_keys {
                status.tags.remove(tag_key);
            }
        }
        Ok(())
    }
}
