//! Declarative schema of the provider and its agent status resource
//!
//! Validation is driven by the attribute table, so the schema served to the
//! host and the checks applied before any remote call cannot drift apart.

use awsext_core::{AgentStatusSpec, Diagnostic, AGENT_STATUS_RESOURCE, PROVIDER_TYPE_NAME, VERSION};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Number,
    Bool,
    StringMap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
    LengthBetween { min: usize, max: usize },
    IntBetween { min: i64, max: i64 },
    OneOf { values: &'static [&'static str] },
}

impl Validator {
    /// Reason the value is rejected, if it is
    pub fn check(&self, value: &Value) -> Option<String> {
        match self {
            Validator::LengthBetween { min, max } => {
                let length = value.as_str()?.chars().count();
                (length < *min || length > *max).then(|| {
                    format!("expected length between {min} and {max}, got {length}")
                })
            }
            Validator::IntBetween { min, max } => {
                let n = value.as_i64()?;
                (n < *min || n > *max).then(|| format!("expected between {min} and {max}, got {n}"))
            }
            Validator::OneOf { values } => {
                let s = value.as_str()?;
                (!values.contains(&s)).then(|| format!("expected one of {values:?}, got {s:?}"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: AttributeType,
    pub description: &'static str,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub write_only: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_replace: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub validators: Vec<Validator>,
}

impl Attribute {
    fn new(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            name,
            kind,
            description,
            required: false,
            optional: false,
            computed: false,
            write_only: false,
            requires_replace: false,
            sensitive: false,
            validators: Vec::new(),
        }
    }

    pub fn required(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            required: true,
            ..Self::new(name, kind, description)
        }
    }

    pub fn optional(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            optional: true,
            ..Self::new(name, kind, description)
        }
    }

    pub fn computed(name: &'static str, kind: AttributeType, description: &'static str) -> Self {
        Self {
            computed: true,
            ..Self::new(name, kind, description)
        }
    }

    fn validated(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Optional attribute whose value Connect fills in when the plan leaves it unset.
    fn computed_when_unset(mut self) -> Self {
        self.computed = true;
        self
    }

    fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    fn requires_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }

    fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    fn matches_type(&self, value: &Value) -> bool {
        match self.kind {
            AttributeType::String => value.is_string(),
            AttributeType::Number => value.is_i64() || value.is_u64(),
            AttributeType::Bool => value.is_boolean(),
            AttributeType::StringMap => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceSchema {
    pub type_name: &'static str,
    pub version: u32,
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

impl ResourceSchema {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    /// Check a raw configuration object against the attribute table.
    pub fn validate_config(&self, config: &Value) -> Vec<Diagnostic> {
        let Some(object) = config.as_object() else {
            return vec![Diagnostic::error("configuration must be an object")];
        };

        let mut diagnostics = Vec::new();
        for attribute in &self.attributes {
            let value = object.get(attribute.name).filter(|value| !value.is_null());
            match value {
                None if attribute.required => diagnostics.push(
                    Diagnostic::error(format!("missing required attribute {}", attribute.name))
                        .with_attribute(attribute.name),
                ),
                None => {}
                Some(_) if attribute.computed && !attribute.optional => diagnostics.push(
                    Diagnostic::error(format!("{} is computed and cannot be set", attribute.name))
                        .with_attribute(attribute.name),
                ),
                Some(value) if !attribute.matches_type(value) => diagnostics.push(
                    Diagnostic::error(format!(
                        "invalid type for {}: expected {:?}",
                        attribute.name, attribute.kind
                    ))
                    .with_attribute(attribute.name),
                ),
                Some(value) => diagnostics.extend(
                    attribute
                        .validators
                        .iter()
                        .filter_map(|validator| validator.check(value))
                        .map(|reason| {
                            Diagnostic::error(format!("invalid value for {}", attribute.name))
                                .with_detail(reason)
                                .with_attribute(attribute.name)
                        }),
                ),
            }
        }

        for key in object.keys() {
            if self.attribute(key).is_none() {
                diagnostics.push(
                    Diagnostic::error(format!("unsupported attribute {key}")).with_attribute(key),
                );
            }
        }

        diagnostics
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSchema {
    pub type_name: &'static str,
    pub version: &'static str,
    pub provider: Vec<Attribute>,
    pub resources: BTreeMap<&'static str, ResourceSchema>,
}

pub fn agent_status_schema() -> ResourceSchema {
    use AttributeType::*;

    ResourceSchema {
        type_name: AGENT_STATUS_RESOURCE,
        version: 0,
        description: "Amazon Connect agent status. Connect cannot delete agent statuses, \
                      so destroying this resource only stops tracking it.",
        attributes: vec![
            Attribute::computed("id", String, "Tracking key, instance_id:agent_status_id"),
            Attribute::computed("arn", String, "ARN of the agent status"),
            Attribute::computed("agent_status_id", String, "Identifier of the agent status"),
            Attribute::required("instance_id", String, "Identifier of the Connect instance")
                .requires_replace(),
            Attribute::required("name", String, "Name of the agent status")
                .validated(Validator::LengthBetween { min: 1, max: 127 }),
            Attribute::optional("description", String, "Description of the agent status")
                .validated(Validator::LengthBetween { min: 1, max: 250 }),
            Attribute::required("state", String, "ENABLED or DISABLED").validated(
                Validator::OneOf {
                    values: &["ENABLED", "DISABLED"],
                },
            ),
            Attribute::optional(
                "display_order",
                Number,
                "Position in the agent status list; only applied when state is ENABLED. \
                 Left unset, the current position is kept",
            )
            .computed_when_unset()
            .validated(Validator::IntBetween { min: 1, max: 50 }),
            Attribute::optional(
                "import_on_exists",
                Bool,
                "Adopt an existing agent status with the same name instead of creating one \
                 (default true)",
            )
            .write_only(),
            Attribute::optional("tags", StringMap, "Tags applied to the agent status"),
            Attribute::computed("status_type", String, "ROUTABLE, CUSTOM or OFFLINE"),
        ],
    }
}

pub fn provider_config_schema() -> Vec<Attribute> {
    use AttributeType::String;

    vec![
        Attribute::optional("access_key", String, "AWS access key"),
        Attribute::optional("secret_key", String, "AWS secret key").sensitive(),
        Attribute::optional("token", String, "AWS session token").sensitive(),
        Attribute::optional("region", String, "AWS region"),
        Attribute::optional("profile", String, "AWS profile"),
        Attribute::optional("role_arn", String, "AWS role ARN"),
        Attribute::optional("endpoint", String, "Override for the Connect endpoint URL"),
    ]
}

pub fn provider_schema() -> ProviderSchema {
    let resource = agent_status_schema();
    ProviderSchema {
        type_name: PROVIDER_TYPE_NAME,
        version: VERSION,
        provider: provider_config_schema(),
        resources: BTreeMap::from([(resource.type_name, resource)]),
    }
}

/// Validate a typed spec against the agent status schema.
pub fn validate(spec: &AgentStatusSpec) -> Vec<Diagnostic> {
    match serde_json::to_value(spec) {
        Ok(value) => agent_status_schema().validate_config(&value),
        Err(error) => vec![Diagnostic::error(error.to_string())],
    }
}
