//! The remote agent status service seam
//!
//! Request and response shapes follow the Amazon Connect REST JSON wire
//! format, so HTTP implementations can (de)serialize them directly.
//! Response fields stay optional: Connect may omit any of them, and the
//! reconciler decides which omissions are errors.

use crate::agent_status::{AgentStatusState, AgentStatusType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("ResourceNotFoundException: {message}")]
    NotFound { message: String },

    #[error("{code} (HTTP {status}): {message}")]
    Service {
        code: String,
        status: u16,
        message: String,
    },

    #[error("request failed: {reason}")]
    Transport { reason: String },

    #[error("could not decode response: {reason}")]
    Decode { reason: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateAgentStatusRequest {
    #[serde(skip)]
    pub instance_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: AgentStatusState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAgentStatusOutput {
    #[serde(rename = "AgentStatusId", default)]
    pub agent_status_id: Option<String>,
    #[serde(rename = "AgentStatusARN", default)]
    pub agent_status_arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateAgentStatusRequest {
    #[serde(skip)]
    pub instance_id: String,
    #[serde(skip)]
    pub agent_status_id: String,
    pub name: String,
    /// Always sent; an empty string clears the description.
    pub description: String,
    pub state: AgentStatusState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteAgentStatus {
    #[serde(rename = "AgentStatusARN", default)]
    pub agent_status_arn: Option<String>,
    #[serde(default)]
    pub agent_status_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "Type", default)]
    pub status_type: Option<AgentStatusType>,
    #[serde(default)]
    pub display_order: Option<i32>,
    #[serde(default)]
    pub state: Option<AgentStatusState>,
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribeAgentStatusOutput {
    #[serde(default)]
    pub agent_status: Option<RemoteAgentStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAgentStatusesRequest {
    pub instance_id: String,
    pub next_token: Option<String>,
    pub max_results: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentStatusSummary {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub arn: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "Type", default)]
    pub status_type: Option<AgentStatusType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListAgentStatusesOutput {
    #[serde(default)]
    pub agent_status_summary_list: Vec<AgentStatusSummary>,
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Amazon Connect agent status operations consumed by the reconciler.
#[async_trait]
pub trait AgentStatusApi: Send + Sync {
    async fn create_agent_status(
        &self,
        request: CreateAgentStatusRequest,
    ) -> ApiResult<CreateAgentStatusOutput>;

    async fn describe_agent_status(
        &self,
        instance_id: &str,
        agent_status_id: &str,
    ) -> ApiResult<DescribeAgentStatusOutput>;

    async fn update_agent_status(&self, request: UpdateAgentStatusRequest) -> ApiResult<()>;

    /// One page of summaries; `next_token` continues the listing.
    async fn list_agent_statuses(
        &self,
        request: ListAgentStatusesRequest,
    ) -> ApiResult<ListAgentStatusesOutput>;

    async fn tag_resource(&self, arn: &str, tags: &BTreeMap<String, String>) -> ApiResult<()>;

    async fn untag_resource(&self, arn: &str, tag_keys: &[String]) -> ApiResult<()>;
}
