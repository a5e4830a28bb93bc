//! # awsext Core
//!
//! Core types and traits for the awsext provider.
//!
//! ## Contents
//! - The mirrored Connect agent status model and its composite identifier
//! - The [`AgentStatusApi`] seam over the remote Connect service
//! - Provider configuration and credential resolution
//! - Error and diagnostic types shared by the reconciler and its hosts

pub mod agent_status;
pub mod api;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod id;

pub use agent_status::{
    AgentStatusIdentity, AgentStatusRecord, AgentStatusSpec, AgentStatusState, AgentStatusType,
};
pub use api::{
    AgentStatusApi, AgentStatusSummary, ApiError, ApiResult, CreateAgentStatusOutput,
    CreateAgentStatusRequest, DescribeAgentStatusOutput, ListAgentStatusesOutput,
    ListAgentStatusesRequest, RemoteAgentStatus, UpdateAgentStatusRequest,
};
pub use config::{
    ClientConfig, CredentialSource, Credentials, Environment, ProviderConfig, SystemEnvironment,
};
pub use diagnostic::{has_errors, Diagnostic, Severity};
pub use error::{ProviderError, Result};
pub use id::{decode_id, encode_id, AgentStatusKey};

/// Current provider version, reported in metadata and the handshake
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Provider type name as seen by the host
pub const PROVIDER_TYPE_NAME: &str = "awsext";

/// Resource type name of the agent status resource
pub const AGENT_STATUS_RESOURCE: &str = "awsext_connect_agent_status";

/// Build information for logs and debugging
pub const BUILD_INFO: &str = concat!(
    "awsext ",
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("CARGO_PKG_NAME"),
    ")"
);

/// Routes served by the provider host surface
pub mod endpoints {
    pub const HEALTH: &str = "/health";
    pub const SCHEMA: &str = "/v1/schema";
    pub const CONFIGURE: &str = "/v1/configure";
    pub const AGENT_STATUS_VALIDATE: &str = "/v1/resources/agent_status/validate";
    pub const AGENT_STATUS_CREATE: &str = "/v1/resources/agent_status/create";
    pub const AGENT_STATUS_READ: &str = "/v1/resources/agent_status/read";
    pub const AGENT_STATUS_UPDATE: &str = "/v1/resources/agent_status/update";
    pub const AGENT_STATUS_DELETE: &str = "/v1/resources/agent_status/delete";
    pub const AGENT_STATUS_IMPORT: &str = "/v1/resources/agent_status/import";
}
