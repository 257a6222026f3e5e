//! Core Context (`spec.md` §9 Design Notes: "pass a small context value
//! explicitly into every component at construction; forbid implicit
//! globals"). Bundles the cross-cutting singletons every service needs —
//! the Rate Limiter, Account Manager, Agent Registry, and Monitoring Bus —
//! so wiring them stays a single explicit step in `main.rs` rather than
//! each service reaching for ambient state.

use std::sync::Arc;

use crate::domain::models::config::Config;

use super::account_manager::AccountManager;
use super::agent_registry::AgentRegistry;
use super::monitoring_bus::MonitoringBus;
use super::rate_limiter::RateLimiter;

#[derive(Clone)]
pub struct CoreContext {
    pub rate_limiter: Arc<RateLimiter>,
    pub accounts: Arc<AccountManager>,
    pub agents: Arc<AgentRegistry>,
    pub bus: Arc<MonitoringBus>,
    pub config: Arc<Config>,
}

impl CoreContext {
    pub fn new(
        rate_limiter: Arc<RateLimiter>,
        accounts: Arc<AccountManager>,
        agents: Arc<AgentRegistry>,
        bus: Arc<MonitoringBus>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            rate_limiter,
            accounts,
            agents,
            bus,
            config,
        }
    }
}
