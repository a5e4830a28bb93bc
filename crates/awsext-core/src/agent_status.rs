//! Agent status types mirrored from Amazon Connect

use crate::error::{ProviderError, Result};
use crate::id::encode_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatusState {
    Enabled,
    Disabled,
}

impl AgentStatusState {
    pub const ALL: [AgentStatusState; 2] = [AgentStatusState::Enabled, AgentStatusState::Disabled];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatusState::Enabled => "ENABLED",
            AgentStatusState::Disabled => "DISABLED",
        }
    }
}

impl fmt::Display for AgentStatusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentStatusState {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| {
                ProviderError::invalid("state", format!("expected ENABLED or DISABLED, got {s:?}"))
            })
    }
}

/// Kind of agent status as reported by Connect. Only `CUSTOM` statuses are
/// created through this provider; the other two are instance built-ins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AgentStatusType {
    Routable,
    Custom,
    Offline,
    /// Any type Connect reports that this provider does not know yet
    #[serde(other)]
    Unknown,
}

/// Desired configuration of an agent status, as planned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatusSpec {
    pub instance_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub state: AgentStatusState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
    /// Write-only. Never persisted into the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub import_on_exists: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl AgentStatusSpec {
    pub fn new(
        instance_id: impl Into<String>,
        name: impl Into<String>,
        state: AgentStatusState,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            name: name.into(),
            description: None,
            state,
            display_order: None,
            import_on_exists: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_display_order(mut self, display_order: i32) -> Self {
        self.display_order = Some(display_order);
        self
    }

    pub fn with_import_on_exists(mut self, import_on_exists: bool) -> Self {
        self.import_on_exists = Some(import_on_exists);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Unset means adopt.
    pub fn imports_on_exists(&self) -> bool {
        self.import_on_exists.unwrap_or(true)
    }

    /// Display order as sent to Connect: dropped unless the status is enabled.
    pub fn payload_display_order(&self) -> Option<i32> {
        match self.state {
            AgentStatusState::Enabled => self.display_order,
            AgentStatusState::Disabled => None,
        }
    }
}

/// Identity of a tracked agent status, usable for re-association.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatusIdentity {
    pub arn: String,
    pub agent_status_id: String,
}

/// Persisted state of a managed agent status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatusRecord {
    /// Composite tracking key, `instance_id:agent_status_id`
    pub id: String,
    pub agent_status_id: String,
    pub arn: String,
    pub instance_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub state: AgentStatusState,
    #[serde(default)]
    pub display_order: Option<i32>,
    #[serde(default)]
    pub status_type: Option<AgentStatusType>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl AgentStatusRecord {
    /// Record for a freshly created or adopted agent status, before the first refresh.
    pub fn from_spec(
        spec: &AgentStatusSpec,
        agent_status_id: impl Into<String>,
        arn: impl Into<String>,
    ) -> Self {
        let agent_status_id = agent_status_id.into();
        Self {
            id: encode_id(&spec.instance_id, &agent_status_id),
            agent_status_id,
            arn: arn.into(),
            instance_id: spec.instance_id.clone(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            state: spec.state,
            display_order: spec.payload_display_order(),
            status_type: None,
            tags: spec.tags.clone(),
        }
    }

    pub fn identity(&self) -> AgentStatusIdentity {
        AgentStatusIdentity {
            arn: self.arn.clone(),
            agent_status_id: self.agent_status_id.clone(),
        }
    }

    /// True when the mutable Connect attributes differ from `spec`. An unset
    /// display order in `spec` leaves the remote one alone, so it never differs.
    pub fn differs_from(&self, spec: &AgentStatusSpec) -> bool {
        self.name != spec.name
            || self.description != spec.description
            || self.state != spec.state
            || spec
                .payload_display_order()
                .is_some_and(|order| self.display_order != Some(order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_parses_exact_names_only() {
        assert_eq!("ENABLED".parse::<AgentStatusState>().unwrap(), AgentStatusState::Enabled);
        assert_eq!("DISABLED".parse::<AgentStatusState>().unwrap(), AgentStatusState::Disabled);

        let error = "enabled".parse::<AgentStatusState>().unwrap_err();
        assert_eq!(error.attribute(), Some("state"));
    }

    #[test]
    fn state_serializes_in_wire_case() {
        let json = serde_json::to_string(&AgentStatusState::Disabled).unwrap();
        assert_eq!(json, "\"DISABLED\"");
    }

    #[test]
    fn import_on_exists_defaults_to_true() {
        let spec = AgentStatusSpec::new("inst", "Break", AgentStatusState::Enabled);
        assert!(spec.imports_on_exists());
        assert!(!spec.with_import_on_exists(false).imports_on_exists());
    }

    #[test]
    fn display_order_only_travels_with_enabled_state() {
        let enabled =
            AgentStatusSpec::new("inst", "Break", AgentStatusState::Enabled).with_display_order(3);
        assert_eq!(enabled.payload_display_order(), Some(3));

        let disabled = AgentStatusSpec {
            state: AgentStatusState::Disabled,
            ..enabled
        };
        assert_eq!(disabled.payload_display_order(), None);
    }

    #[test]
    fn spec_deserializes_with_optional_fields_missing() {
        let spec: AgentStatusSpec = serde_json::from_value(serde_json::json!({
            "instance_id": "inst",
            "name": "Lunch",
            "state": "ENABLED"
        }))
        .unwrap();

        assert_eq!(spec.description, None);
        assert_eq!(spec.import_on_exists, None);
        assert!(spec.tags.is_empty());
    }

    #[test]
    fn record_from_spec_builds_composite_id() {
        let spec = AgentStatusSpec::new("inst", "Break", AgentStatusState::Disabled)
            .with_display_order(7);
        let record = AgentStatusRecord::from_spec(&spec, "status", "arn:x");

        assert_eq!(record.id, "inst:status");
        assert_eq!(record.display_order, None);
        assert!(!record.differs_from(&spec));
        assert!(record.differs_from(&spec.clone().with_description("Coffee")));
    }

    #[test]
    fn unset_display_order_leaves_the_remote_one_alone() {
        let spec = AgentStatusSpec::new("inst", "Break", AgentStatusState::Enabled);
        let record = AgentStatusRecord {
            display_order: Some(3),
            ..AgentStatusRecord::from_spec(&spec, "status", "arn:x")
        };

        assert!(!record.differs_from(&spec));
        assert!(!record.differs_from(&spec.clone().with_display_order(3)));
        assert!(record.differs_from(&spec.with_display_order(4)));
    }

    #[test]
    fn unrecognised_status_types_still_deserialize() {
        let status_type: AgentStatusType = serde_json::from_str("\"SUPERVISOR_ONLY\"").unwrap();
        assert_eq!(status_type, AgentStatusType::Unknown);
        assert_eq!(
            serde_json::from_str::<AgentStatusType>("\"OFFLINE\"").unwrap(),
            AgentStatusType::Offline
        );
    }
}
