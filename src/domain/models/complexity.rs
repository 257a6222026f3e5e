//! Complexity Analysis value (`spec.md` §3, §4.5).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Closed classification bands. `score <= 10` is `Simple`,
/// `11..=25` is `Uncertain`, `> 25` is `Complex`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityCategory {
    Simple,
    Uncertain,
    Complex,
}

impl ComplexityCategory {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=10 => Self::Simple,
            11..=25 => Self::Uncertain,
            _ => Self::Complex,
        }
    }
}

/// Pure value, never mutated after construction. `score` is bounded to
/// `[0, 65]` by construction in `services::complexity_analyzer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    pub score: u8,
    pub category: ComplexityCategory,
    pub confidence: f64,
    pub signals: BTreeMap<String, i32>,
    pub reasoning: String,
}
