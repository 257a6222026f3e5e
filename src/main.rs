//! Agent-Forge CLI entry point.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use agent_forge::domain::ports::clock::SystemClock;
use agent_forge::infrastructure::config::ConfigLoader;
use agent_forge::infrastructure::credentials::FileCredentialStore;
use agent_forge::infrastructure::forge::github::GitHubForgeClient;
use agent_forge::infrastructure::llm::AnthropicProvider;
use agent_forge::infrastructure::logging;
use agent_forge::infrastructure::persistence::{PipelineStore, ProfileLoader, RateLogMirror};
use agent_forge::services::account_manager::AccountIdentity;
use agent_forge::services::{
    AccountManager, AgentRegistry, CoordinatorGateway, CoreContext, ExecutionDispatcher, ForgeClient, MonitoringBus,
    PipelineOrchestrator, PollingEngine, RateLimiter, ServiceSupervisor,
};

#[derive(Parser)]
#[command(name = "agent-forge", version, about = "Autonomous issue-resolution orchestration core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the Service Supervisor and run until terminated.
    Run,
    /// Validate configuration and agent profiles, then exit.
    CheckConfig,
    /// Print a one-shot health snapshot after a single poll cycle.
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load().context("failed to load configuration")?;

    if matches!(cli.command, Commands::CheckConfig) {
        ProfileLoader::load_dir(&config.persistence.agent_profile_dir).context("failed to load agent profiles")?;
        println!("configuration and agent profiles are valid");
        return Ok(());
    }

    let _logger_guard = logging::init(&config.logging).context("failed to initialize logging")?;

    let credential_store = Arc::new(
        FileCredentialStore::load(&config.persistence.secret_dir).context("failed to load credential store")?,
    );
    let profiles: Vec<Arc<_>> = ProfileLoader::load_dir(&config.persistence.agent_profile_dir)
        .context("failed to load agent profiles")?
        .into_iter()
        .map(Arc::new)
        .collect();

    let mut identities_by_ref: HashMap<String, AccountIdentity> = HashMap::new();
    for profile in &profiles {
        identities_by_ref
            .entry(profile.forge_identity_ref.clone())
            .or_insert_with(|| AccountIdentity {
                forge_identity_ref: profile.forge_identity_ref.clone(),
                display_name: profile.forge_identity_ref.clone(),
                email: String::new(),
                capabilities: Default::default(),
            })
            .capabilities
            .extend(profile.capabilities.iter().cloned());
    }
    let accounts = Arc::new(AccountManager::new(credential_store.clone(), identities_by_ref.into_values().collect()));

    let bot_credential = accounts
        .credential_for(&config.forge.bot_identity)
        .context("failed to resolve bot credential")?;

    let clock = Arc::new(SystemClock);
    let bus = Arc::new(MonitoringBus::new());

    let rate_log = match &config.persistence.rate_log_mirror_path {
        Some(path) => RateLogMirror::new(path.clone()),
        None => RateLogMirror::disabled(),
    };
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone(), clock.clone(), rate_log));

    let github = Arc::new(GitHubForgeClient::new(
        config.forge.base_url.clone(),
        bot_credential,
        config.retry.forge_retry_attempts,
    ));
    let forge = Arc::new(ForgeClient::new(github, rate_limiter.clone()));

    let agents = Arc::new(
        AgentRegistry::boot(
            profiles,
            config.concurrency.global_ceiling,
            config.concurrency.heartbeat_interval_secs,
            clock.clone(),
        )
        .await,
    );

    // Every cross-cutting singleton is bundled once here rather than
    // threaded as a growing list of loose `Arc`s into whichever component
    // happens to need one next.
    let ctx = CoreContext::new(rate_limiter.clone(), accounts.clone(), agents.clone(), bus.clone(), Arc::new(config.clone()));

    let mut llm_providers: HashMap<String, Arc<dyn agent_forge::domain::ports::LlmProvider>> = HashMap::new();
    llm_providers.insert(
        "anthropic".to_string(),
        Arc::new(AnthropicProvider::new(config.llm.endpoint.clone(), ctx.accounts.credential_for("anthropic")?)),
    );

    let gateway = Arc::new(CoordinatorGateway::new(
        forge.clone(),
        ctx.agents.clone(),
        llm_providers,
        Duration::from_secs(config.timeouts.coordinator_llm_secs),
    ));

    let pipeline_store = PipelineStore::new(&config.persistence.pipeline_state_path);
    let orchestrator = Arc::new(
        PipelineOrchestrator::boot(
            pipeline_store,
            config.retry.clone(),
            config.polling.claim_ttl_minutes,
            clock.clone(),
            ctx.bus.clone(),
        )
        .await
        .context("failed to boot pipeline orchestrator")?,
    );

    let dispatcher = Arc::new(ExecutionDispatcher::new(
        ctx.agents.clone(),
        orchestrator.clone(),
        config.concurrency.dispatch_queue_capacity,
    ));

    let polling = Arc::new(PollingEngine::new(
        forge,
        orchestrator.clone(),
        gateway,
        dispatcher,
        config.forge.bot_identity.clone(),
        config.forge.repo_id.clone(),
    ));

    let supervisor = ServiceSupervisor::new(
        polling,
        orchestrator,
        ctx.bus.clone(),
        Duration::from_secs(config.polling.interval_secs),
        Duration::from_secs(config.timeouts.shutdown_grace_secs),
    );

    match cli.command {
        Commands::Run => supervisor.run().await,
        Commands::Health => {
            let snapshot = supervisor.health_snapshot().await;
            println!("{snapshot:#?}");
            Ok(())
        }
        Commands::CheckConfig => unreachable!("handled above"),
    }
}
