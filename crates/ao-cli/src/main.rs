mod cli;
mod config;
mod repl;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ao_domain::config::ConfigSeverity;
use ao_orchestrator::{Orchestrator, OrchestratorConfig};
use ao_policy::approval::ApprovalStore;
use ao_policy::audit::AuditWriter;
use ao_policy::PolicyEngine;
use ao_providers::openai_compat::OpenAiCompatProvider;
use ao_providers::LlmProvider;
use ao_store::{ArtifactStore, ExportFormat, SessionStore};
use ao_tools::backend::LocalBackend;
use ao_tools::builtin::{ResolveTarget, RunDiagnostic, RunShell};
use ao_tools::ToolRegistryBuilder;

use cli::{Cli, Command, ConfigCommand};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::Version) => {
            println!("ao {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _path) = config::load_config(&cli)?;
            config::show(&config);
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            init_tracing();
            let (config, path) = config::load_config(&cli)?;
            if !config::validate(&config, &path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Sessions) => {
            let store = SessionStore::open(config::data_dir(&cli).join("sessions.db"))?;
            for session in store.list_sessions()? {
                println!("{}  created {}  updated {}", session.session_id, session.created_at, session.updated_at);
            }
            Ok(())
        }
        Some(Command::Export { session, format }) => {
            let store = SessionStore::open(config::data_dir(&cli).join("sessions.db"))?;
            let rendered = store.export(session, (*format).into())?;
            print!("{rendered}");
            Ok(())
        }
        Some(Command::Run { session }) | None => {
            init_tracing();
            run_interactive(&cli, session.clone()).await
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ao_cli=debug")))
        .with_target(false)
        .init();
}

async fn run_interactive(cli: &Cli, resume_session: Option<String>) -> anyhow::Result<()> {
    let (config, config_path) = config::load_config(cli)?;
    tracing::info!(path = %config_path.display(), "config loaded");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("{issue}"),
            ConfigSeverity::Error => tracing::error!("{issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!("config validation failed with {} error(s)", issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count());
    }

    let data_dir = config::data_dir(cli);
    std::fs::create_dir_all(&data_dir).with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let store = Arc::new(SessionStore::open(data_dir.join("sessions.db")).context("opening session store")?);
    let artifacts = Arc::new(ArtifactStore::open(data_dir.join("artifacts")).context("opening artifact store")?);

    let audit = AuditWriter::open(data_dir.join("audit.jsonl"), config.policy.audit_rotate_bytes).context("opening audit log")?;
    let policy = Arc::new(PolicyEngine::new(&config.policy, audit).context("building policy engine")?);
    let approvals = Arc::new(ApprovalStore::new(Duration::from_secs(300)));

    let backend = Arc::new(LocalBackend::new(Duration::from_secs(config.llm.timeout_seconds)));
    let tools = ToolRegistryBuilder::new()
        .register(Arc::new(ResolveTarget::new(backend.clone())))
        .register(Arc::new(RunDiagnostic::new(backend.clone())))
        .register(Arc::new(RunShell::new(backend)))
        .build();

    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatProvider::from_config(&config.llm).context("building LLM provider")?);

    let orch_config = OrchestratorConfig {
        system_prompt: "You are an operations and diagnostics assistant with access to read-only, diagnostic, and shell tools on a target host. Use them when asked to inspect or act on a target.".to_string(),
        token_budget: config.session.token_budget,
        reserve_for_response: config.session.reserve_for_response,
        max_turns: config.session.max_turns,
        temperature: None,
        max_tokens: None,
        model: None,
        ..Default::default()
    };
    let orchestrator = Orchestrator::new(store.clone(), provider, tools, policy, approvals.clone(), orch_config).with_artifacts(artifacts);

    let session_id = match resume_session {
        Some(id) => {
            store.get_session(&id).context("looking up session")?.with_context(|| format!("no such session: {id}"))?;
            id
        }
        None => store.start_session().context("starting session")?,
    };

    repl::run(orchestrator, approvals, session_id).await
}
