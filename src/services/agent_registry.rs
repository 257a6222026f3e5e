//! Agent Registry (C4, `spec.md` §4.4). Owns every Agent Instance. Boots
//! `always_on` profiles eagerly, constructs `on_demand` instances lazily up
//! to their profile's `concurrency_limit`, and enforces the process-wide
//! concurrency ceiling with a single `tokio::sync::Semaphore` so "at most
//! `concurrency_ceiling` instances working at any instant" (`spec.md` §8,
//! invariant 2) holds regardless of which profile is asking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Duration as ChronoDuration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, RwLock, Semaphore};

use crate::domain::models::{AgentInstance, AgentProfile, AgentRole, AgentState, IssueRef};
use crate::domain::ports::Clock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentHandle {
    pub instance_key: String,
    pub agent_id: String,
    pub role: AgentRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired(AgentHandle),
    Busy,
    NoneAvailable,
}

pub struct AgentRegistry {
    profiles: Vec<Arc<AgentProfile>>,
    instances: RwLock<HashMap<String, AgentInstance>>,
    permits: Mutex<HashMap<String, OwnedSemaphorePermit>>,
    semaphore: Arc<Semaphore>,
    clock: Arc<dyn Clock>,
    heartbeat_interval_secs: u64,
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired(_))
    }
}

impl AgentRegistry {
    pub async fn boot(
        profiles: Vec<Arc<AgentProfile>>,
        global_ceiling: usize,
        heartbeat_interval_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let registry = Self {
            profiles,
            instances: RwLock::new(HashMap::new()),
            permits: Mutex::new(HashMap::new()),
            semaphore: Arc::new(Semaphore::new(global_ceiling)),
            clock,
            heartbeat_interval_secs,
        };

        let now = registry.clock.now();
        let always_on: Vec<Arc<AgentProfile>> = registry
            .profiles
            .iter()
            .filter(|p| p.lifecycle == crate::domain::models::AgentLifecycle::AlwaysOn)
            .cloned()
            .collect();

        let mut instances = registry.instances.write().await;
        for profile in always_on {
            instances.insert(profile.agent_id.clone(), AgentInstance::new(profile, now));
        }
        drop(instances);
        registry
    }

    fn candidates(&self, role: AgentRole, capabilities_needed: &HashSet<String>) -> Vec<Arc<AgentProfile>> {
        self.profiles
            .iter()
            .filter(|p| p.role == role && capabilities_needed.is_subset(&p.capabilities))
            .cloned()
            .collect()
    }

    pub async fn acquire(&self, role: AgentRole, capabilities_needed: &HashSet<String>) -> AcquireOutcome {
        let candidates = self.candidates(role, capabilities_needed);
        if candidates.is_empty() {
            return AcquireOutcome::NoneAvailable;
        }

        let mut saw_busy = false;
        for profile in &candidates {
            match profile.lifecycle {
                crate::domain::models::AgentLifecycle::AlwaysOn => {
                    let mut instances = self.instances.write().await;
                    let Some(instance) = instances.get_mut(&profile.agent_id) else {
                        continue;
                    };
                    if instance.state != AgentState::Idle {
                        saw_busy = true;
                        continue;
                    }
                    let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                        saw_busy = true;
                        continue;
                    };
                    instance.state = AgentState::Working;
                    instance.last_heartbeat = self.clock.now();
                    self.permits.lock().await.insert(profile.agent_id.clone(), permit);
                    return AcquireOutcome::Acquired(AgentHandle {
                        instance_key: profile.agent_id.clone(),
                        agent_id: profile.agent_id.clone(),
                        role,
                    });
                }
                crate::domain::models::AgentLifecycle::OnDemand => {
                    let mut instances = self.instances.write().await;
                    let prefix = format!("{}#", profile.agent_id);
                    let idle_key = instances
                        .iter()
                        .find(|(k, i)| k.starts_with(&prefix) && i.state == AgentState::Idle)
                        .map(|(k, _)| k.clone());

                    if let Some(instance_key) = idle_key {
                        let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                            saw_busy = true;
                            continue;
                        };
                        let instance = instances.get_mut(&instance_key).expect("just looked up");
                        instance.state = AgentState::Working;
                        instance.last_heartbeat = self.clock.now();
                        self.permits.lock().await.insert(instance_key.clone(), permit);
                        return AcquireOutcome::Acquired(AgentHandle {
                            instance_key,
                            agent_id: profile.agent_id.clone(),
                            role,
                        });
                    }

                    let live_count = instances.keys().filter(|k| k.starts_with(&prefix)).count() as u32;
                    if live_count >= profile.concurrency_limit {
                        saw_busy = true;
                        continue;
                    }
                    let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() else {
                        saw_busy = true;
                        continue;
                    };
                    let instance_key = format!("{prefix}{live_count}");
                    let mut instance = AgentInstance::new(profile.clone(), self.clock.now());
                    instance.state = AgentState::Working;
                    instances.insert(instance_key.clone(), instance);
                    self.permits.lock().await.insert(instance_key.clone(), permit);
                    return AcquireOutcome::Acquired(AgentHandle {
                        instance_key,
                        agent_id: profile.agent_id.clone(),
                        role,
                    });
                }
            }
        }

        if saw_busy {
            AcquireOutcome::Busy
        } else {
            AcquireOutcome::NoneAvailable
        }
    }

    pub async fn release(&self, handle: &AgentHandle) {
        let mut instances = self.instances.write().await;
        if let Some(instance) = instances.get_mut(&handle.instance_key) {
            if instance.can_transition(&AgentState::Idle) {
                instance.state = AgentState::Idle;
            }
            instance.current_task = None;
        }
        drop(instances);
        self.permits.lock().await.remove(&handle.instance_key);
    }

    pub async fn heartbeat(&self, instance_key: &str) {
        let mut instances = self.instances.write().await;
        if let Some(instance) = instances.get_mut(instance_key) {
            instance.last_heartbeat = self.clock.now();
        }
    }

    pub async fn assign_task(&self, instance_key: &str, issue_ref: IssueRef) {
        let mut instances = self.instances.write().await;
        if let Some(instance) = instances.get_mut(instance_key) {
            instance.current_task = Some(issue_ref);
        }
    }

    /// Instances `working` with a heartbeat older than `3 * heartbeat_interval`
    /// transition to `error` and release their concurrency slot
    /// (`spec.md` §4.4).
    pub async fn sweep_stale_heartbeats(&self) -> Vec<String> {
        let stale_after = ChronoDuration::seconds(3 * self.heartbeat_interval_secs as i64);
        let now = self.clock.now();
        let mut instances = self.instances.write().await;
        let mut transitioned = Vec::new();
        for (key, instance) in instances.iter_mut() {
            if instance.state == AgentState::Working && now - instance.last_heartbeat > stale_after {
                instance.state = AgentState::Error;
                transitioned.push(key.clone());
            }
        }
        drop(instances);
        let mut permits = self.permits.lock().await;
        for key in &transitioned {
            permits.remove(key);
        }
        transitioned
    }

    pub async fn reset_to_idle(&self, instance_key: &str) -> bool {
        let mut instances = self.instances.write().await;
        if let Some(instance) = instances.get_mut(instance_key) {
            if instance.can_transition(&AgentState::Idle) {
                instance.state = AgentState::Idle;
                return true;
            }
        }
        false
    }

    pub async fn snapshot(&self) -> Vec<AgentInstance> {
        self.instances.read().await.values().cloned().collect()
    }
}
