//! Amazon Connect agent status resource
//!
//! [`AgentStatusResource`] reconciles planned agent statuses against any
//! [`AgentStatusApi`](awsext_core::AgentStatusApi) implementation.
//! [`InMemoryAgentStatusService`] is one such implementation for tests and
//! local runs.

pub use awsext_core;

pub mod memory;
mod resource;
pub mod schema;

pub use memory::{ApiCall, InMemoryAgentStatusService, Operation, StoredAgentStatus};
pub use resource::AgentStatusResource;
pub use schema::{agent_status_schema, provider_schema, validate, ProviderSchema, ResourceSchema};

// Re-export core types for convenience
pub use awsext_core::{
    AgentStatusIdentity, AgentStatusRecord, AgentStatusSpec, AgentStatusState, ProviderError,
    Result,
};
