//! Business logic. Every service here depends only on `domain::ports`
//! traits, never directly on a concrete `infrastructure` adapter.

pub mod account_manager;
pub mod agent_registry;
pub mod complexity_analyzer;
pub mod context;
pub mod coordinator_gateway;
pub mod escalator;
pub mod execution_dispatcher;
pub mod forge_client;
pub mod monitoring_bus;
pub mod pipeline_orchestrator;
pub mod polling_engine;
pub mod rate_limiter;
pub mod service_supervisor;
pub mod workspace_manager;

pub use account_manager::AccountManager;
pub use agent_registry::AgentRegistry;
pub use complexity_analyzer::ComplexityAnalyzer;
pub use context::CoreContext;
pub use coordinator_gateway::CoordinatorGateway;
pub use escalator::Escalator;
pub use execution_dispatcher::ExecutionDispatcher;
pub use forge_client::ForgeClient;
pub use monitoring_bus::MonitoringBus;
pub use pipeline_orchestrator::PipelineOrchestrator;
pub use polling_engine::PollingEngine;
pub use rate_limiter::RateLimiter;
pub use service_supervisor::ServiceSupervisor;
pub use workspace_manager::WorkspaceManager;
