//! Provider configuration and credential resolution
//!
//! The provider block is resolved once, at configure time, into a
//! [`ClientConfig`] that is handed explicitly to the API client and from there
//! into every resource instance.

use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

const DEFAULT_PROFILE: &str = "default";

/// Attributes of the provider configuration block. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub role_arn: Option<String>,
    /// Override for the Connect endpoint, e.g. a local emulator
    #[serde(default)]
    pub endpoint: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: Option<String>,
}

impl Credentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("has_session_token", &self.session_token.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CredentialSource {
    Static,
    Profile(String),
    Environment,
    AssumedRole(String),
}

/// Resolved connection settings for the Connect client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub region: String,
    pub credentials: Credentials,
    pub source: CredentialSource,
    pub endpoint: Option<String>,
    /// Role to assume with `credentials` before talking to Connect
    pub role_arn: Option<String>,
}

/// Ambient lookups used during resolution
pub trait Environment {
    fn var(&self, key: &str) -> Option<String>;

    fn home_dir(&self) -> Option<PathBuf>;

    fn read_file(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.is_empty())
    }

    fn home_dir(&self) -> Option<PathBuf> {
        dirs::home_dir()
    }
}

fn set(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ProviderConfig {
    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<ClientConfig> {
        self.resolve_with(&SystemEnvironment)
    }

    #[instrument(skip(self, env))]
    pub fn resolve_with(&self, env: &dyn Environment) -> Result<ClientConfig> {
        let files = SharedFiles::locate(env);
        let (credentials, source) = self.resolve_credentials(env, &files)?;
        let region = self.resolve_region(env, &files)?;

        debug!(%region, ?source, "Resolved provider credentials");

        Ok(ClientConfig {
            region,
            credentials,
            source,
            endpoint: set(&self.endpoint)
                .map(str::to_string)
                .or_else(|| env.var("AWSEXT_ENDPOINT_URL")),
            role_arn: set(&self.role_arn).map(str::to_string),
        })
    }

    fn resolve_credentials(
        &self,
        env: &dyn Environment,
        files: &SharedFiles,
    ) -> Result<(Credentials, CredentialSource)> {
        if let (Some(access_key), Some(secret_key)) = (set(&self.access_key), set(&self.secret_key))
        {
            let credentials = Credentials::new(
                access_key,
                secret_key,
                set(&self.token).map(str::to_string),
            );
            return Ok((credentials, CredentialSource::Static));
        }

        if let Some(profile) = set(&self.profile) {
            let credentials = files.credentials(env, profile).ok_or_else(|| {
                ProviderError::Configuration {
                    reason: format!("profile {profile:?} has no credentials in the shared files"),
                }
            })?;
            return Ok((credentials, CredentialSource::Profile(profile.to_string())));
        }

        if let (Some(access_key), Some(secret_key)) = (
            env.var("AWS_ACCESS_KEY_ID"),
            env.var("AWS_SECRET_ACCESS_KEY"),
        ) {
            let credentials =
                Credentials::new(access_key, secret_key, env.var("AWS_SESSION_TOKEN"));
            return Ok((credentials, CredentialSource::Environment));
        }

        let profile = env
            .var("AWS_PROFILE")
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        match files.credentials(env, &profile) {
            Some(credentials) => Ok((credentials, CredentialSource::Profile(profile))),
            None => Err(ProviderError::Configuration {
                reason: "no AWS credentials found in provider attributes, environment or shared files"
                    .to_string(),
            }),
        }
    }

    fn resolve_region(&self, env: &dyn Environment, files: &SharedFiles) -> Result<String> {
        if let Some(region) = set(&self.region) {
            return Ok(region.to_string());
        }
        if let Some(region) = env.var("AWS_REGION").or_else(|| env.var("AWS_DEFAULT_REGION")) {
            return Ok(region);
        }

        let profile = set(&self.profile)
            .map(str::to_string)
            .or_else(|| env.var("AWS_PROFILE"))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());
        files
            .config_value(env, &profile, "region")
            .ok_or_else(|| ProviderError::Configuration {
                reason: "no AWS region configured".to_string(),
            })
    }
}

struct SharedFiles {
    credentials: Option<PathBuf>,
    config: Option<PathBuf>,
}

impl SharedFiles {
    fn locate(env: &dyn Environment) -> Self {
        let aws_dir = env.home_dir().map(|home| home.join(".aws"));
        Self {
            credentials: env
                .var("AWS_SHARED_CREDENTIALS_FILE")
                .map(PathBuf::from)
                .or_else(|| aws_dir.as_ref().map(|dir| dir.join("credentials"))),
            config: env
                .var("AWS_CONFIG_FILE")
                .map(PathBuf::from)
                .or_else(|| aws_dir.as_ref().map(|dir| dir.join("config"))),
        }
    }

    fn section(
        env: &dyn Environment,
        path: &Option<PathBuf>,
        section: &str,
    ) -> Option<HashMap<String, String>> {
        let contents = env.read_file(path.as_deref()?)?;
        profile_section(&contents, section)
    }

    /// Config files name non-default profiles `[profile name]`.
    fn config_section(&self, env: &dyn Environment, profile: &str) -> Option<HashMap<String, String>> {
        let section = if profile == DEFAULT_PROFILE {
            DEFAULT_PROFILE.to_string()
        } else {
            format!("profile {profile}")
        };
        Self::section(env, &self.config, &section)
    }

    fn credentials(&self, env: &dyn Environment, profile: &str) -> Option<Credentials> {
        [
            Self::section(env, &self.credentials, profile),
            self.config_section(env, profile),
        ]
        .into_iter()
        .flatten()
        .find_map(|values| {
            Some(Credentials::new(
                values.get("aws_access_key_id")?.clone(),
                values.get("aws_secret_access_key")?.clone(),
                values.get("aws_session_token").cloned(),
            ))
        })
    }

    fn config_value(&self, env: &dyn Environment, profile: &str, key: &str) -> Option<String> {
        self.config_section(env, profile)?.remove(key)
    }
}

/// Key/value pairs of one `[section]` of an AWS shared file.
pub fn profile_section(contents: &str, section: &str) -> Option<HashMap<String, String>> {
    let mut current: Option<&str> = None;
    let mut found: Option<HashMap<String, String>> = None;

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = Some(name.trim());
            if current == Some(section) {
                found.get_or_insert_with(HashMap::new);
            }
            continue;
        }

        if current == Some(section) {
            if let Some((key, value)) = line.split_once('=') {
                found
                    .get_or_insert_with(HashMap::new)
                    .insert(key.trim().to_lowercase(), value.trim().to_string());
            }
        }
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[derive(Default)]
    struct MapEnvironment {
        vars: HashMap<String, String>,
        home: Option<PathBuf>,
    }

    impl MapEnvironment {
        fn with(mut self, key: &str, value: impl Into<String>) -> Self {
            self.vars.insert(key.to_string(), value.into());
            self
        }
    }

    impl Environment for MapEnvironment {
        fn var(&self, key: &str) -> Option<String> {
            self.vars.get(key).cloned()
        }

        fn home_dir(&self) -> Option<PathBuf> {
            self.home.clone()
        }
    }

    fn home_with_files(credentials: &str, config: &str) -> tempfile::TempDir {
        let home = tempfile::tempdir().unwrap();
        let aws = home.path().join(".aws");
        fs::create_dir_all(&aws).unwrap();
        fs::write(aws.join("credentials"), credentials).unwrap();
        fs::write(aws.join("config"), config).unwrap();
        home
    }

    #[test]
    fn static_keys_win_over_everything() {
        let config = ProviderConfig {
            access_key: Some("AKIASTATIC".to_string()),
            secret_key: Some("secret".to_string()),
            token: Some("session".to_string()),
            region: Some("eu-west-2".to_string()),
            profile: Some("ignored".to_string()),
            ..Default::default()
        };
        let env = MapEnvironment::default().with("AWS_ACCESS_KEY_ID", "AKIAENV");

        let resolved = config.resolve_with(&env).unwrap();
        assert_eq!(resolved.source, CredentialSource::Static);
        assert_eq!(resolved.credentials.access_key_id, "AKIASTATIC");
        assert_eq!(resolved.credentials.session_token.as_deref(), Some("session"));
        assert_eq!(resolved.region, "eu-west-2");
    }

    #[test]
    fn empty_attributes_count_as_unset() {
        let config = ProviderConfig {
            access_key: Some(String::new()),
            secret_key: Some("secret".to_string()),
            region: Some(String::new()),
            ..Default::default()
        };
        let env = MapEnvironment::default()
            .with("AWS_ACCESS_KEY_ID", "AKIAENV")
            .with("AWS_SECRET_ACCESS_KEY", "envsecret")
            .with("AWS_DEFAULT_REGION", "us-west-2");

        let resolved = config.resolve_with(&env).unwrap();
        assert_eq!(resolved.source, CredentialSource::Environment);
        assert_eq!(resolved.region, "us-west-2");
    }

    #[test]
    fn named_profile_reads_shared_files() {
        let home = home_with_files(
            "[default]\naws_access_key_id = AKIADEFAULT\naws_secret_access_key = d\n\n\
             [ops]\naws_access_key_id = AKIAOPS\naws_secret_access_key = o\n",
            "[profile ops]\nregion = ap-southeast-2\n",
        );
        let env = MapEnvironment {
            home: Some(home.path().to_path_buf()),
            ..Default::default()
        };
        let config = ProviderConfig {
            profile: Some("ops".to_string()),
            ..Default::default()
        };

        let resolved = config.resolve_with(&env).unwrap();
        assert_eq!(resolved.source, CredentialSource::Profile("ops".to_string()));
        assert_eq!(resolved.credentials.access_key_id, "AKIAOPS");
        assert_eq!(resolved.region, "ap-southeast-2");
    }

    #[test]
    fn missing_profile_is_a_configuration_error() {
        let home = home_with_files("[default]\naws_access_key_id = a\n", "");
        let env = MapEnvironment {
            home: Some(home.path().to_path_buf()),
            ..Default::default()
        };
        let config = ProviderConfig {
            profile: Some("nope".to_string()),
            region: Some("us-east-1".to_string()),
            ..Default::default()
        };

        assert!(matches!(
            config.resolve_with(&env),
            Err(ProviderError::Configuration { .. })
        ));
    }

    #[test]
    fn falls_back_to_default_profile_and_reports_missing_region() {
        let home = home_with_files(
            "[default]\naws_access_key_id = AKIADEFAULT\naws_secret_access_key = d\n",
            "",
        );
        let env = MapEnvironment {
            home: Some(home.path().to_path_buf()),
            ..Default::default()
        };

        let error = ProviderConfig::default().resolve_with(&env).unwrap_err();
        assert!(error.to_string().contains("region"));

        let resolved = ProviderConfig::default()
            .resolve_with(&MapEnvironment {
                home: Some(home.path().to_path_buf()),
                ..Default::default()
            }
            .with("AWS_REGION", "ca-central-1"))
            .unwrap();
        assert_eq!(resolved.source, CredentialSource::Profile("default".to_string()));
    }

    #[test]
    fn endpoint_and_role_are_carried_through() {
        let config = ProviderConfig {
            access_key: Some("a".to_string()),
            secret_key: Some("s".to_string()),
            region: Some("us-east-1".to_string()),
            role_arn: Some("arn:aws:iam::123456789012:role/deployer".to_string()),
            ..Default::default()
        };
        let env = MapEnvironment::default().with("AWSEXT_ENDPOINT_URL", "http://localhost:4566");

        let resolved = config.resolve_with(&env).unwrap();
        assert_eq!(resolved.endpoint.as_deref(), Some("http://localhost:4566"));
        assert_eq!(
            resolved.role_arn.as_deref(),
            Some("arn:aws:iam::123456789012:role/deployer")
        );
    }

    #[test]
    fn debug_output_redacts_the_secret() {
        let credentials = Credentials::new("AKIA", "very-secret", None);
        assert!(!format!("{credentials:?}").contains("very-secret"));
    }

    #[test]
    fn profile_section_ignores_comments_and_other_sections() {
        let contents = "# comment\n[a]\nkey = 1\n[b]\n; note\nKey=2\n";
        let section = profile_section(contents, "b").unwrap();
        assert_eq!(section.get("key").map(String::as_str), Some("2"));
        assert!(profile_section(contents, "c").is_none());
    }
}
