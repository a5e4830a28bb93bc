use agent_status::{provider_schema, AgentStatusResource, InMemoryAgentStatusService};
use anyhow::{bail, Context};
use awsext_core::{
    has_errors, AgentStatusApi, AgentStatusIdentity, AgentStatusRecord, AgentStatusSpec,
    AgentStatusState, Diagnostic, ProviderConfig,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use connect_client::ConnectClient;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "awsext")]
#[command(about = "awsext CLI - Amazon Connect agent status management")]
#[command(version = awsext_core::VERSION)]
struct Cli {
    #[command(flatten)]
    provider: ProviderArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct ProviderArgs {
    #[arg(long, global = true, value_enum, default_value_t = Backend::Aws)]
    backend: Backend,
    #[arg(long, global = true)]
    access_key: Option<String>,
    #[arg(long, global = true)]
    secret_key: Option<String>,
    #[arg(long, global = true)]
    token: Option<String>,
    #[arg(long, global = true)]
    region: Option<String>,
    #[arg(long, global = true)]
    profile: Option<String>,
    #[arg(long, global = true)]
    role_arn: Option<String>,
    /// Connect endpoint override
    #[arg(long, global = true)]
    endpoint: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// Amazon Connect
    #[default]
    Aws,
    /// Process-local store that starts empty on every run; only `create`
    /// and `delete` make sense against it
    Memory,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provider schema
    Schema,
    /// Agent status lifecycle commands
    AgentStatus {
        #[command(subcommand)]
        action: AgentStatusAction,
    },
}

#[derive(Subcommand)]
enum AgentStatusAction {
    /// Create an agent status, adopting a same-named one unless told not to
    Create(PlanArgs),
    /// Refresh a tracked agent status
    Read { state_file: PathBuf },
    /// Apply planned attributes to a tracked agent status
    Update {
        state_file: PathBuf,
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Release a tracked agent status (Connect keeps it)
    Delete { state_file: PathBuf },
    /// Track an existing agent status by id or by ARN
    Import {
        /// Composite `instance_id:agent_status_id`
        #[arg(long, conflicts_with_all = ["arn", "agent_status_id"], required_unless_present = "arn")]
        id: Option<String>,
        #[arg(long, requires = "agent_status_id")]
        arn: Option<String>,
        #[arg(long, requires = "arn")]
        agent_status_id: Option<String>,
    },
}

#[derive(Args, Debug)]
struct PlanArgs {
    #[arg(long)]
    instance_id: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    state: AgentStatusState,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    display_order: Option<i32>,
    /// Always create, even when the name is already taken
    #[arg(long)]
    no_import_on_exists: bool,
    /// Tag as KEY=VALUE, repeatable
    #[arg(long = "tag", value_parser = parse_tag)]
    tags: Vec<(String, String)>,
}

impl AgentStatusAction {
    /// Actions that look up an agent status created by an earlier run.
    fn needs_existing(&self) -> bool {
        matches!(
            self,
            AgentStatusAction::Read { .. }
                | AgentStatusAction::Update { .. }
                | AgentStatusAction::Import { .. }
        )
    }
}

fn check_backend(backend: Backend, action: &AgentStatusAction) -> anyhow::Result<()> {
    if backend == Backend::Memory && action.needs_existing() {
        bail!("--backend memory starts empty on every run; use it with create or delete only");
    }
    Ok(())
}

impl PlanArgs {
    fn spec(&self) -> AgentStatusSpec {
        let mut spec = AgentStatusSpec::new(&self.instance_id, &self.name, self.state);
        if let Some(description) = &self.description {
            spec = spec.with_description(description);
        }
        if let Some(display_order) = self.display_order {
            spec = spec.with_display_order(display_order);
        }
        if self.no_import_on_exists {
            spec = spec.with_import_on_exists(false);
        }
        for (key, value) in &self.tags {
            spec = spec.with_tag(key, value);
        }
        spec
    }
}

impl ProviderArgs {
    fn config(&self) -> ProviderConfig {
        ProviderConfig {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            token: self.token.clone(),
            region: self.region.clone(),
            profile: self.profile.clone(),
            role_arn: self.role_arn.clone(),
            endpoint: self.endpoint.clone(),
        }
    }

    async fn resource(&self) -> anyhow::Result<AgentStatusResource> {
        let api: Arc<dyn AgentStatusApi> = match self.backend {
            Backend::Aws => {
                let resolved = self.config().resolve()?;
                Arc::new(ConnectClient::connect(&resolved).await?)
            }
            Backend::Memory => Arc::new(InMemoryAgentStatusService::new()),
        };
        Ok(AgentStatusResource::new(api))
    }
}

fn parse_tag(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {value}")),
    }
}

fn load_state(path: &Path) -> anyhow::Result<AgentStatusRecord> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading state file {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing state file {}", path.display()))
}

fn print_outcome(
    state: Option<&AgentStatusRecord>,
    diagnostics: &[Diagnostic],
) -> anyhow::Result<()> {
    let outcome = json!({ "state": state, "diagnostics": diagnostics });
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if has_errors(diagnostics) {
        bail!("agent status operation failed");
    }
    Ok(())
}

fn print_result(result: awsext_core::Result<Option<AgentStatusRecord>>) -> anyhow::Result<()> {
    match result {
        Ok(record) => print_outcome(record.as_ref(), &[]),
        Err(error) => print_outcome(error.partial_record(), &[Diagnostic::from(&error)]),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&provider_schema())?);
            Ok(())
        }
        Commands::AgentStatus { action } => handle_agent_status_action(&cli.provider, action).await,
    }
}

async fn handle_agent_status_action(
    provider: &ProviderArgs,
    action: AgentStatusAction,
) -> anyhow::Result<()> {
    check_backend(provider.backend, &action)?;
    let resource = provider.resource().await?;

    match action {
        AgentStatusAction::Create(plan) => {
            let spec = plan.spec();
            let diagnostics = resource.validate(&spec);
            if has_errors(&diagnostics) {
                return print_outcome(None, &diagnostics);
            }
            print_result(resource.create(&spec).await.map(Some))
        }
        AgentStatusAction::Read { state_file } => {
            let record = load_state(&state_file)?;
            print_result(resource.read(&record).await)
        }
        AgentStatusAction::Update { state_file, plan } => {
            let prior = load_state(&state_file)?;
            let spec = plan.spec();
            let diagnostics = resource.validate(&spec);
            if has_errors(&diagnostics) {
                return print_outcome(Some(&prior), &diagnostics);
            }
            print_result(resource.update(&prior, &spec).await.map(Some))
        }
        AgentStatusAction::Delete { state_file } => {
            let record = load_state(&state_file)?;
            print_result(resource.delete(&record).await.map(|()| None))
        }
        AgentStatusAction::Import {
            id,
            arn,
            agent_status_id,
        } => {
            let result = match (id, arn, agent_status_id) {
                (Some(id), _, _) => resource.import(&id).await,
                (None, Some(arn), Some(agent_status_id)) => {
                    resource
                        .import_identity(&AgentStatusIdentity {
                            arn,
                            agent_status_id,
                        })
                        .await
                }
                _ => bail!("import needs --id or both --arn and --agent-status-id"),
            };
            print_result(result.map(Some))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn create_flags_build_a_spec() {
        let cli = Cli::try_parse_from([
            "awsext",
            "--backend",
            "memory",
            "agent-status",
            "create",
            "--instance-id",
            "inst",
            "--name",
            "Break",
            "--state",
            "ENABLED",
            "--display-order",
            "3",
            "--no-import-on-exists",
            "--tag",
            "team=support",
        ])
        .unwrap();

        assert_eq!(cli.provider.backend, Backend::Memory);
        let Commands::AgentStatus {
            action: AgentStatusAction::Create(plan),
        } = cli.command
        else {
            panic!("expected agent-status create");
        };
        let spec = plan.spec();
        assert_eq!(spec.name, "Break");
        assert_eq!(spec.display_order, Some(3));
        assert!(!spec.imports_on_exists());
        assert_eq!(spec.tags.get("team").map(String::as_str), Some("support"));
    }

    #[test]
    fn provider_flags_map_onto_the_provider_block() {
        let cli = Cli::try_parse_from([
            "awsext",
            "schema",
            "--region",
            "eu-west-2",
            "--profile",
            "ops",
        ])
        .unwrap();
        let config = cli.provider.config();
        assert_eq!(config.region.as_deref(), Some("eu-west-2"));
        assert_eq!(config.profile.as_deref(), Some("ops"));
        assert_eq!(config.access_key, None);
    }

    #[test]
    fn import_requires_an_id_or_identity() {
        assert!(Cli::try_parse_from(["awsext", "agent-status", "import"]).is_err());
        assert!(Cli::try_parse_from([
            "awsext",
            "agent-status",
            "import",
            "--arn",
            "arn:aws:connect:us-east-1:1:instance/i/agent-state/s"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["awsext", "agent-status", "import", "--id", "i:s"]).is_ok());
    }

    #[test]
    fn malformed_tags_are_rejected() {
        assert_eq!(parse_tag("a=b"), Ok(("a".to_string(), "b".to_string())));
        assert!(parse_tag("novalue").is_err());
        assert!(parse_tag("=x").is_err());
    }

    #[test]
    fn memory_backend_only_runs_self_contained_actions() {
        let parse = |args: &[&str]| match Cli::try_parse_from(args).unwrap().command {
            Commands::AgentStatus { action } => action,
            Commands::Schema => panic!("expected an agent-status action"),
        };

        let read = parse(&["awsext", "agent-status", "read", "state.json"]);
        assert!(check_backend(Backend::Memory, &read).is_err());
        assert!(check_backend(Backend::Aws, &read).is_ok());

        let import = parse(&["awsext", "agent-status", "import", "--id", "i:s"]);
        assert!(check_backend(Backend::Memory, &import).is_err());

        let delete = parse(&["awsext", "agent-status", "delete", "state.json"]);
        assert!(check_backend(Backend::Memory, &delete).is_ok());
    }
}
