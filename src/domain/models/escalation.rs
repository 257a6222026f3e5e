//! Escalation Context value (`spec.md` §3, §4.7).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Built incrementally by a running agent; consulted by the Escalator (C7).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EscalationContext {
    pub files_touched: u32,
    pub components_touched: HashSet<String>,
    pub elapsed_minutes: f64,
    pub failed_attempts: u32,
    pub architecture_changes: bool,
    pub coordination_requested: bool,
}

impl EscalationContext {
    pub fn new() -> Self {
        Self::default()
    }
}
