//! Composite tracking key and ARN helpers

use crate::error::{ProviderError, Result};
use std::fmt;
use std::str::FromStr;

pub const ID_SEPARATOR: char = ':';

/// `(instance_id, agent_status_id)` pair, persisted as `instance_id:agent_status_id`.
///
/// The encoding has no escaping, so a colon inside the instance id cannot
/// round-trip. Connect ids are opaque UUIDs and never contain one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentStatusKey {
    pub instance_id: String,
    pub agent_status_id: String,
}

impl AgentStatusKey {
    pub fn new(instance_id: impl Into<String>, agent_status_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            agent_status_id: agent_status_id.into(),
        }
    }

    /// Parse a composite key, splitting on the first colon.
    pub fn parse(id: &str) -> Result<Self> {
        match id.split_once(ID_SEPARATOR) {
            Some((instance_id, agent_status_id))
                if !instance_id.is_empty() && !agent_status_id.is_empty() =>
            {
                Ok(Self::new(instance_id, agent_status_id))
            }
            _ => Err(ProviderError::MalformedId { id: id.to_string() }),
        }
    }

    /// Derive the key from an agent status ARN:
    /// `arn:<partition>:connect:<region>:<account>:instance/<instance_id>/agent-state/<agent_status_id>`
    pub fn from_arn(arn: &str) -> Result<Self> {
        let invalid = |reason: &str| ProviderError::InvalidIdentity {
            reason: format!("{reason} in ARN ({arn})"),
        };

        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" {
            return Err(invalid("unexpected format"));
        }
        if parts[2] != "connect" {
            return Err(invalid("service is not connect"));
        }

        match parts[5].split('/').collect::<Vec<_>>().as_slice() {
            ["instance", instance_id, "agent-state", agent_status_id]
                if !instance_id.is_empty() && !agent_status_id.is_empty() =>
            {
                Ok(Self::new(*instance_id, *agent_status_id))
            }
            _ => Err(invalid("resource is not an agent status")),
        }
    }
}

impl fmt::Display for AgentStatusKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.instance_id, ID_SEPARATOR, self.agent_status_id)
    }
}

impl FromStr for AgentStatusKey {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

pub fn encode_id(instance_id: &str, agent_status_id: &str) -> String {
    format!("{instance_id}{ID_SEPARATOR}{agent_status_id}")
}

pub fn decode_id(id: &str) -> Result<(String, String)> {
    let key = AgentStatusKey::parse(id)?;
    Ok((key.instance_id, key.agent_status_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_splits_on_first_colon() {
        let (instance_id, agent_status_id) = decode_id("inst:status:extra").unwrap();
        assert_eq!(instance_id, "inst");
        assert_eq!(agent_status_id, "status:extra");
    }

    #[test]
    fn decode_rejects_malformed_ids() {
        for id in ["abc", ":abc", "abc:", ":", ""] {
            match decode_id(id) {
                Err(ProviderError::MalformedId { id: reported }) => assert_eq!(reported, id),
                other => panic!("expected malformed id for {id:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn key_display_matches_encode() {
        let key = AgentStatusKey::new("inst", "status");
        assert_eq!(key.to_string(), encode_id("inst", "status"));
        assert_eq!("inst:status".parse::<AgentStatusKey>().unwrap(), key);
    }

    #[test]
    fn key_from_arn() {
        let key = AgentStatusKey::from_arn(
            "arn:aws:connect:eu-west-2:123456789012:instance/1111-2222/agent-state/3333-4444",
        )
        .unwrap();
        assert_eq!(key, AgentStatusKey::new("1111-2222", "3333-4444"));
    }

    #[test]
    fn key_from_arn_rejects_other_resources() {
        for arn in [
            "not-an-arn",
            "arn:aws:s3:::bucket",
            "arn:aws:connect:eu-west-2:123456789012:instance/1111-2222/queue/3333",
            "arn:aws:connect:eu-west-2:123456789012:instance//agent-state/3333",
        ] {
            assert!(
                matches!(
                    AgentStatusKey::from_arn(arn),
                    Err(ProviderError::InvalidIdentity { .. })
                ),
                "{arn} should be rejected"
            );
        }
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(
            instance_id in "[A-Za-z0-9-]{1,40}",
            agent_status_id in "[A-Za-z0-9-]{1,40}",
        ) {
            let (i, a) = decode_id(&encode_id(&instance_id, &agent_status_id)).unwrap();
            prop_assert_eq!(i, instance_id);
            prop_assert_eq!(a, agent_status_id);
        }

        #[test]
        fn decode_rejects_ids_without_separator(id in "[A-Za-z0-9-]{0,40}") {
            prop_assert!(decode_id(&id).is_err());
        }
    }
}
