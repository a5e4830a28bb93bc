//! Error types for the awsext provider

use crate::agent_status::AgentStatusRecord;
use crate::api::ApiError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("unexpected format of ID ({id}), expected instanceID:agentStatusID")]
    MalformedId { id: String },

    #[error("invalid import identity: {reason}")]
    InvalidIdentity { reason: String },

    #[error("invalid value for {attribute}: {reason}")]
    InvalidAttribute { attribute: String, reason: String },

    #[error("error creating Connect Agent Status ({name}): {source}")]
    Create {
        name: String,
        #[source]
        source: ApiError,
    },

    #[error("error listing Connect Agent Statuses ({instance_id}): {source}")]
    List {
        instance_id: String,
        #[source]
        source: ApiError,
    },

    #[error("error getting Connect Agent Status ({id}): {source}")]
    Read {
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("error updating Connect Agent Status ({id}): {source}")]
    Update {
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("error tagging Connect Agent Status ({arn}): {source}")]
    Tagging {
        arn: String,
        #[source]
        source: ApiError,
    },

    #[error("error {operation} Connect Agent Status ({subject}): empty response")]
    EmptyResponse {
        operation: &'static str,
        subject: String,
    },

    /// Import-on-exists adopted a remote agent status but converging it failed.
    /// The adopted record is kept so the host can still track it.
    #[error("adopted Connect Agent Status ({}) could not be converged: {source}", .record.id)]
    AdoptedUpdate {
        record: Box<AgentStatusRecord>,
        #[source]
        source: Box<ProviderError>,
    },

    #[error("provider configuration error: {reason}")]
    Configuration { reason: String },

    #[error("provider has not been configured")]
    NotConfigured,

    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl ProviderError {
    /// Record that should still be persisted even though the call failed.
    pub fn partial_record(&self) -> Option<&AgentStatusRecord> {
        match self {
            ProviderError::AdoptedUpdate { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Attribute path the error is scoped to, if any
    pub fn attribute(&self) -> Option<&str> {
        match self {
            ProviderError::InvalidAttribute { attribute, .. } => Some(attribute),
            _ => None,
        }
    }

    pub(crate) fn invalid(attribute: &str, reason: impl Into<String>) -> Self {
        ProviderError::InvalidAttribute {
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }
}
