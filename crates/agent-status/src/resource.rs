//! Agent status reconciler
//!
//! Maps host lifecycle calls onto Connect API calls. Connect has no delete
//! operation for agent statuses, so delete only releases the record.

use crate::schema;
use awsext_core::{
    AgentStatusApi, AgentStatusIdentity, AgentStatusKey, AgentStatusRecord, AgentStatusSpec,
    AgentStatusState, AgentStatusSummary, ApiError, CreateAgentStatusRequest, Diagnostic,
    ListAgentStatusesRequest, ProviderError, RemoteAgentStatus, Result, UpdateAgentStatusRequest,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct AgentStatusResource {
    api: Arc<dyn AgentStatusApi>,
    page_size: Option<u32>,
}

impl std::fmt::Debug for AgentStatusResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentStatusResource")
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl AgentStatusResource {
    pub fn new(api: Arc<dyn AgentStatusApi>) -> Self {
        Self {
            api,
            page_size: None,
        }
    }

    /// Page size requested when scanning for an existing name.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn validate(&self, spec: &AgentStatusSpec) -> Vec<Diagnostic> {
        schema::validate(spec)
    }

    /// Create an agent status, or adopt a same-named one when
    /// `import_on_exists` is unset or true.
    #[instrument(skip(self, spec), fields(instance_id = %spec.instance_id, name = %spec.name))]
    pub async fn create(&self, spec: &AgentStatusSpec) -> Result<AgentStatusRecord> {
        if spec.imports_on_exists() {
            if let Some(existing) = self.find_by_name(&spec.instance_id, &spec.name).await? {
                return self.adopt(spec, existing).await;
            }
        }

        let request = CreateAgentStatusRequest {
            instance_id: spec.instance_id.clone(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            state: spec.state,
            display_order: spec.payload_display_order(),
            tags: spec.tags.clone(),
        };
        let output = self
            .api
            .create_agent_status(request)
            .await
            .map_err(|source| ProviderError::Create {
                name: spec.name.clone(),
                source,
            })?;

        let (Some(agent_status_id), Some(arn)) = (output.agent_status_id, output.agent_status_arn)
        else {
            return Err(ProviderError::EmptyResponse {
                operation: "creating",
                subject: spec.name.clone(),
            });
        };

        let record = AgentStatusRecord::from_spec(spec, agent_status_id, arn);
        info!(id = %record.id, "Created Connect Agent Status");
        self.refresh_written(&record).await
    }

    /// Refresh a tracked record. `None` means the agent status no longer exists
    /// and should be dropped from state.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn read(&self, record: &AgentStatusRecord) -> Result<Option<AgentStatusRecord>> {
        self.describe(&record.id, false).await
    }

    /// Push planned changes onto a tracked agent status.
    #[instrument(skip(self, prior, spec), fields(id = %prior.id))]
    pub async fn update(
        &self,
        prior: &AgentStatusRecord,
        spec: &AgentStatusSpec,
    ) -> Result<AgentStatusRecord> {
        if prior.instance_id != spec.instance_id {
            return Err(ProviderError::InvalidAttribute {
                attribute: "instance_id".to_string(),
                reason: format!(
                    "cannot move agent status from instance {} to {}; replace the resource instead",
                    prior.instance_id, spec.instance_id
                ),
            });
        }
        self.apply(prior, spec, false).await
    }

    /// Connect cannot delete agent statuses: the record is released and the
    /// remote agent status is left in place.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn delete(&self, record: &AgentStatusRecord) -> Result<()> {
        info!("Connect Agent Status cannot be deleted, removing from state only");
        Ok(())
    }

    /// Start tracking an existing agent status by its `instance_id:agent_status_id` key.
    #[instrument(skip(self))]
    pub async fn import(&self, id: &str) -> Result<AgentStatusRecord> {
        AgentStatusKey::parse(id)?;
        self.describe_existing(id).await
    }

    /// Start tracking an existing agent status by its identity payload.
    #[instrument(skip(self, identity), fields(arn = %identity.arn))]
    pub async fn import_identity(&self, identity: &AgentStatusIdentity) -> Result<AgentStatusRecord> {
        let key = AgentStatusKey::from_arn(&identity.arn)?;
        if key.agent_status_id != identity.agent_status_id {
            return Err(ProviderError::InvalidIdentity {
                reason: format!(
                    "agent_status_id {} does not match ARN ({})",
                    identity.agent_status_id, identity.arn
                ),
            });
        }
        self.describe_existing(&key.to_string()).await
    }

    async fn adopt(
        &self,
        spec: &AgentStatusSpec,
        existing: AgentStatusSummary,
    ) -> Result<AgentStatusRecord> {
        let (Some(agent_status_id), Some(arn)) = (existing.id, existing.arn) else {
            return Err(ProviderError::EmptyResponse {
                operation: "listing",
                subject: spec.instance_id.clone(),
            });
        };

        // Remote tags are unknown here; desired tags are applied on top of them.
        let adopted = AgentStatusRecord {
            tags: BTreeMap::new(),
            ..AgentStatusRecord::from_spec(spec, agent_status_id, arn)
        };
        info!(id = %adopted.id, "Adopting existing Connect Agent Status with the same name");

        match self.apply(&adopted, spec, true).await {
            Ok(record) => Ok(record),
            Err(source) => {
                warn!(id = %adopted.id, error = %source, "Adopted Connect Agent Status was not converged");
                Err(ProviderError::AdoptedUpdate {
                    record: Box::new(adopted),
                    source: Box::new(source),
                })
            }
        }
    }

    async fn apply(
        &self,
        prior: &AgentStatusRecord,
        spec: &AgentStatusSpec,
        force: bool,
    ) -> Result<AgentStatusRecord> {
        let key = AgentStatusKey::parse(&prior.id)?;

        if force || prior.differs_from(spec) {
            let request = UpdateAgentStatusRequest {
                instance_id: key.instance_id,
                agent_status_id: key.agent_status_id,
                name: spec.name.clone(),
                description: spec.description.clone().unwrap_or_default(),
                state: spec.state,
                display_order: spec.payload_display_order(),
            };
            self.api
                .update_agent_status(request)
                .await
                .map_err(|source| ProviderError::Update {
                    id: prior.id.clone(),
                    source,
                })?;
            info!("Updated Connect Agent Status");
        } else {
            debug!("No agent status attribute changes, skipping UpdateAgentStatus");
        }

        self.reconcile_tags(&prior.arn, &prior.tags, &spec.tags).await?;

        self.refresh_written(prior).await
    }

    async fn reconcile_tags(
        &self,
        arn: &str,
        prior: &BTreeMap<String, String>,
        desired: &BTreeMap<String, String>,
    ) -> Result<()> {
        let removed: Vec<String> = prior
            .keys()
            .filter(|key| !desired.contains_key(*key))
            .cloned()
            .collect();
        let changed: BTreeMap<String, String> = desired
            .iter()
            .filter(|(key, value)| prior.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let tagging_error = |source: ApiError| ProviderError::Tagging {
            arn: arn.to_string(),
            source,
        };
        if !removed.is_empty() {
            debug!(?removed, "Removing tags");
            self.api
                .untag_resource(arn, &removed)
                .await
                .map_err(tagging_error)?;
        }
        if !changed.is_empty() {
            debug!(changed = changed.len(), "Applying tags");
            self.api
                .tag_resource(arn, &changed)
                .await
                .map_err(tagging_error)?;
        }
        Ok(())
    }

    /// Scan the instance's agent statuses for an exact, case-sensitive name
    /// match. The first match in listing order wins.
    async fn find_by_name(
        &self,
        instance_id: &str,
        name: &str,
    ) -> Result<Option<AgentStatusSummary>> {
        let mut next_token = None;
        loop {
            let page = self
                .api
                .list_agent_statuses(ListAgentStatusesRequest {
                    instance_id: instance_id.to_string(),
                    next_token: next_token.take(),
                    max_results: self.page_size,
                })
                .await
                .map_err(|source| ProviderError::List {
                    instance_id: instance_id.to_string(),
                    source,
                })?;

            if let Some(found) = page
                .agent_status_summary_list
                .into_iter()
                .find(|summary| summary.name.as_deref() == Some(name))
            {
                return Ok(Some(found));
            }

            match page.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => return Ok(None),
            }
        }
    }

    /// Read back after a write. The agent status must exist.
    async fn refresh_written(&self, written: &AgentStatusRecord) -> Result<AgentStatusRecord> {
        self.describe_existing(&written.id).await
    }

    async fn describe_existing(&self, id: &str) -> Result<AgentStatusRecord> {
        self.describe(id, true)
            .await?
            .ok_or_else(|| ProviderError::EmptyResponse {
                operation: "getting",
                subject: id.to_string(),
            })
    }

    async fn describe(&self, id: &str, is_new: bool) -> Result<Option<AgentStatusRecord>> {
        let key = AgentStatusKey::parse(id)?;

        let output = match self
            .api
            .describe_agent_status(&key.instance_id, &key.agent_status_id)
            .await
        {
            Err(error) if error.is_not_found() && !is_new => {
                warn!(%id, "Connect Agent Status not found, removing from state");
                return Ok(None);
            }
            Err(source) => {
                return Err(ProviderError::Read {
                    id: id.to_string(),
                    source,
                })
            }
            Ok(output) => output,
        };

        let remote = output.agent_status.ok_or_else(|| ProviderError::EmptyResponse {
            operation: "getting",
            subject: id.to_string(),
        })?;
        record_from_remote(key, remote).map(Some)
    }
}

fn record_from_remote(key: AgentStatusKey, remote: RemoteAgentStatus) -> Result<AgentStatusRecord> {
    let id = key.to_string();
    let empty = || ProviderError::EmptyResponse {
        operation: "getting",
        subject: id.clone(),
    };

    let arn = remote.agent_status_arn.ok_or_else(empty)?;
    let name = remote.name.ok_or_else(empty)?;
    let state = remote.state.ok_or_else(empty)?;

    Ok(AgentStatusRecord {
        agent_status_id: remote.agent_status_id.unwrap_or(key.agent_status_id),
        arn,
        instance_id: key.instance_id,
        name,
        description: remote.description.filter(|d| !d.is_empty()),
        state,
        display_order: match state {
            AgentStatusState::Enabled => remote.display_order,
            AgentStatusState::Disabled => None,
        },
        status_type: remote.status_type,
        tags: remote.tags.unwrap_or_default(),
        id,
    })
}
