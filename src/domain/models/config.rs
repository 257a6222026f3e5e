//! System configuration (`spec.md` §6, "Environment/config").
//!
//! Shape and defaulting convention grounded on the teacher's
//! `domain/models/config.rs`: every field has a `#[serde(default = ...)]`
//! so a completely empty YAML file still produces a usable `Config`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::OpKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub forge: ForgeConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            forge: ForgeConfig::default(),
            polling: PollingConfig::default(),
            rate_limit: RateLimitConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            timeouts: TimeoutsConfig::default(),
            retry: RetryConfig::default(),
            persistence: PersistenceConfig::default(),
            llm: LlmConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ForgeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_bot_identity")]
    pub bot_identity: String,
    #[serde(default = "default_repo_id")]
    pub repo_id: String,
}

fn default_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_bot_identity() -> String {
    "agent-forge-bot".to_string()
}

fn default_repo_id() -> String {
    String::new()
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            bot_identity: default_bot_identity(),
            repo_id: default_repo_id(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_claim_ttl_minutes")]
    pub claim_ttl_minutes: i64,
}

const fn default_poll_interval_secs() -> u64 {
    300
}

const fn default_claim_ttl_minutes() -> i64 {
    60
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval_secs(),
            claim_ttl_minutes: default_claim_ttl_minutes(),
        }
    }
}

/// Per-op-kind quota across the three counting windows plus its own
/// cooldown (`spec.md` §4.1: "Configurable limits per op-kind across four
/// windows"). An op-kind absent from `RateLimitConfig::per_op` falls back
/// to `OpWindowLimits::default()` — every op-kind is checked against its
/// own counters, never pooled with another kind's.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OpWindowLimits {
    #[serde(default = "default_per_minute")]
    pub per_minute: u32,
    #[serde(default = "default_per_hour")]
    pub per_hour: u32,
    #[serde(default = "default_per_day")]
    pub per_day: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for OpWindowLimits {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
            per_day: default_per_day(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Overrides keyed by `OpKind`; any write kind not present here uses
    /// `OpWindowLimits::default()`.
    #[serde(default)]
    pub per_op: HashMap<OpKind, OpWindowLimits>,
    /// Max operations of *any* kind within `burst_window_secs` — the one
    /// check that is deliberately pooled across op-kinds (`spec.md` §4.1).
    #[serde(default = "default_burst_cap")]
    pub burst_cap: u32,
    #[serde(default = "default_burst_window_secs")]
    pub burst_window_secs: u64,
    #[serde(default = "default_max_duplicate_operations")]
    pub max_duplicate_operations: u32,
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: u64,
    #[serde(default = "default_safety_threshold")]
    pub forge_budget_safety_threshold: u32,
    #[serde(default = "default_ring_capacity")]
    pub event_log_capacity: usize,
}

const fn default_per_minute() -> u32 {
    3
}
const fn default_per_hour() -> u32 {
    100
}
const fn default_per_day() -> u32 {
    500
}
const fn default_cooldown_secs() -> u64 {
    5
}
const fn default_burst_cap() -> u32 {
    10
}
const fn default_burst_window_secs() -> u64 {
    60
}
const fn default_max_duplicate_operations() -> u32 {
    2
}
const fn default_duplicate_window_secs() -> u64 {
    3600
}
const fn default_safety_threshold() -> u32 {
    500
}
const fn default_ring_capacity() -> usize {
    10_000
}

impl RateLimitConfig {
    pub fn limits_for(&self, op_kind: OpKind) -> OpWindowLimits {
        self.per_op.get(&op_kind).copied().unwrap_or_default()
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_op: HashMap::new(),
            burst_cap: default_burst_cap(),
            burst_window_secs: default_burst_window_secs(),
            max_duplicate_operations: default_max_duplicate_operations(),
            duplicate_window_secs: default_duplicate_window_secs(),
            forge_budget_safety_threshold: default_safety_threshold(),
            event_log_capacity: default_ring_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConcurrencyConfig {
    #[serde(default = "default_ceiling")]
    pub global_ceiling: usize,
    #[serde(default = "default_queue_capacity")]
    pub dispatch_queue_capacity: usize,
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_idle_timeout_secs")]
    pub on_demand_idle_timeout_secs: u64,
}

const fn default_ceiling() -> usize {
    1
}
const fn default_queue_capacity() -> usize {
    100
}
const fn default_heartbeat_interval_secs() -> u64 {
    30
}
const fn default_idle_timeout_secs() -> u64 {
    600
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            global_ceiling: default_ceiling(),
            dispatch_queue_capacity: default_queue_capacity(),
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            on_demand_idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TimeoutsConfig {
    #[serde(default = "default_analyze_timeout_secs")]
    pub analyze_secs: u64,
    #[serde(default = "default_execute_timeout_secs")]
    pub execute_secs: u64,
    #[serde(default = "default_review_timeout_secs")]
    pub review_secs: u64,
    #[serde(default = "default_coordinator_llm_timeout_secs")]
    pub coordinator_llm_secs: u64,
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

const fn default_analyze_timeout_secs() -> u64 {
    60
}
const fn default_execute_timeout_secs() -> u64 {
    1800
}
const fn default_review_timeout_secs() -> u64 {
    600
}
const fn default_coordinator_llm_timeout_secs() -> u64 {
    30
}
const fn default_shutdown_grace_secs() -> u64 {
    30
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            analyze_secs: default_analyze_timeout_secs(),
            execute_secs: default_execute_timeout_secs(),
            review_secs: default_review_timeout_secs(),
            coordinator_llm_secs: default_coordinator_llm_timeout_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,
    #[serde(default = "default_backoff_cap_secs")]
    pub backoff_cap_secs: u64,
    #[serde(default = "default_forge_retry_attempts")]
    pub forge_retry_attempts: u32,
}

const fn default_max_attempts() -> u32 {
    3
}
const fn default_backoff_base_secs() -> u64 {
    30
}
const fn default_backoff_cap_secs() -> u64 {
    600
}
const fn default_forge_retry_attempts() -> u32 {
    3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_cap_secs: default_backoff_cap_secs(),
            forge_retry_attempts: default_forge_retry_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PersistenceConfig {
    #[serde(default = "default_pipeline_state_path")]
    pub pipeline_state_path: String,
    #[serde(default = "default_profile_dir")]
    pub agent_profile_dir: String,
    #[serde(default = "default_secret_dir")]
    pub secret_dir: String,
    #[serde(default)]
    pub rate_log_mirror_path: Option<String>,
}

fn default_pipeline_state_path() -> String {
    ".agent-forge/pipelines.json".to_string()
}
fn default_profile_dir() -> String {
    ".agent-forge/agents".to_string()
}
fn default_secret_dir() -> String {
    ".agent-forge/secrets".to_string()
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            pipeline_state_path: default_pipeline_state_path(),
            agent_profile_dir: default_profile_dir(),
            secret_dir: default_secret_dir(),
            rate_log_mirror_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_llm_max_tokens")]
    pub default_max_tokens: u32,
}

fn default_llm_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}
const fn default_llm_max_tokens() -> u32 {
    4096
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            default_max_tokens: default_llm_max_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}
