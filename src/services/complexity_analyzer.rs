//! Complexity Analyzer (C5, `spec.md` §4.5). A pure, deterministic scoring
//! function over an issue's title, body, and labels — no I/O, no shared
//! state. Consulted by C6 (initial routing) and, indirectly, informs the
//! signals an escalating agent reports to C7.

use std::collections::BTreeMap;

use crate::domain::models::{ComplexityAnalysis, ComplexityCategory, Issue};

const REFACTOR_KEYWORDS: &[&str] = &[
    "refactor", "redesign", "rewrite", "restructure", "migrate", "upgrade", "modernize",
];
const ARCHITECTURE_KEYWORDS: &[&str] = &[
    "architecture",
    "system design",
    "infrastructure",
    "framework",
    "platform",
    "integration",
];
const MULTI_COMPONENT_KEYWORDS: &[&str] = &[
    "multiple", "several", "across", "throughout", "coordinate", "orchestrate", "synchronize",
];
const DEPENDENCY_KEYWORDS: &[&str] = &[
    "dependency", "dependencies", "package", "library", "module", "import",
];
const COMPLEXITY_LABELS: &[&str] = &[
    "refactor",
    "architecture",
    "multi-agent",
    "infrastructure",
    "breaking-change",
    "epic",
];

pub struct ComplexityAnalyzer;

impl ComplexityAnalyzer {
    pub fn analyze(issue: &Issue) -> ComplexityAnalysis {
        let haystack = format!("{} {}", issue.title, issue.body).to_lowercase();
        let mut signals = BTreeMap::new();

        let description_points = description_length_points(&haystack);
        signals.insert("description_length".to_string(), description_points);

        let task_item_points = task_item_points(&haystack);
        signals.insert("task_item_count".to_string(), task_item_points);

        let file_mention_points = file_mention_points(&issue.body);
        signals.insert("file_mentions".to_string(), file_mention_points);

        let code_fence_points = code_fence_points(&issue.body);
        signals.insert("code_fence_count".to_string(), code_fence_points);

        let dependency_points = keyword_count_points(&haystack, DEPENDENCY_KEYWORDS, 2, 5);
        signals.insert("dependency_mentions".to_string(), dependency_points);

        let refactor_points = any_present_points(&haystack, REFACTOR_KEYWORDS, 8);
        signals.insert("refactor_keywords".to_string(), refactor_points);

        let architecture_points = any_present_points(&haystack, ARCHITECTURE_KEYWORDS, 10);
        signals.insert("architecture_keywords".to_string(), architecture_points);

        let multi_component_points = any_present_points(&haystack, MULTI_COMPONENT_KEYWORDS, 6);
        signals.insert("multi_component_keywords".to_string(), multi_component_points);

        let complexity_label_points = any_label_present_points(&issue.labels, COMPLEXITY_LABELS, 10);
        signals.insert("complexity_labels".to_string(), complexity_label_points);

        let score: i32 = signals.values().sum();
        let score = score.clamp(0, 65) as u8;
        let category = ComplexityCategory::from_score(score);
        let confidence = confidence_for(score);
        let reasoning = reasoning_for(&signals, category);

        ComplexityAnalysis {
            score,
            category,
            confidence,
            signals,
            reasoning,
        }
    }
}

fn description_length_points(haystack: &str) -> i32 {
    let len = haystack.chars().count().min(2000);
    // Piecewise, saturating at 2000 chars for the full 5 points.
    ((len as f64 / 2000.0) * 5.0).round() as i32
}

fn task_item_points(haystack: &str) -> i32 {
    let count = haystack
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with("- [ ]") || trimmed.starts_with("- [x]") || trimmed.starts_with("* [ ]")
        })
        .count();
    count.min(10) as i32
}

fn file_mention_points(body: &str) -> i32 {
    let count = body.matches('`').count() / 2;
    count.min(8) as i32
}

fn code_fence_points(body: &str) -> i32 {
    let fences = body.matches("```").count() / 2;
    (fences.min(6) as f64 / 6.0 * 3.0).round() as i32
}

fn keyword_count_points(haystack: &str, keywords: &[&str], points_per: i32, cap: i32) -> i32 {
    let matches = keywords.iter().filter(|kw| haystack.contains(*kw)).count() as i32;
    (matches * points_per).min(cap)
}

fn any_present_points(haystack: &str, keywords: &[&str], full_points: i32) -> i32 {
    if keywords.iter().any(|kw| haystack.contains(kw)) {
        full_points
    } else {
        0
    }
}

fn any_label_present_points(labels: &[String], closed_set: &[&str], full_points: i32) -> i32 {
    let has_match = labels
        .iter()
        .any(|label| closed_set.iter().any(|c| label.eq_ignore_ascii_case(c)));
    if has_match {
        full_points
    } else {
        0
    }
}

fn confidence_for(score: u8) -> f64 {
    let score = f64::from(score);
    let distance = if score <= 10.0 {
        10.0 - score
    } else if score <= 25.0 {
        (score - 10.0).min(25.0 - score)
    } else {
        score - 25.0
    };
    (distance / 15.0).clamp(0.0, 1.0)
}

fn reasoning_for(signals: &BTreeMap<String, i32>, category: ComplexityCategory) -> String {
    let contributing: Vec<&str> = signals
        .iter()
        .filter(|(_, points)| **points > 0)
        .map(|(name, _)| name.as_str())
        .collect();
    if contributing.is_empty() {
        format!("no scoring signals present; classified {category:?}")
    } else {
        format!("classified {category:?} on signals: {}", contributing.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(title: &str, body: &str, labels: &[&str]) -> Issue {
        Issue {
            issue_ref: crate::domain::models::IssueRef::new("acme/widgets", 1),
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.iter().map(|s| s.to_string()).collect(),
            is_pull_request: false,
            assignee_logins: Vec::new(),
        }
    }

    #[test]
    fn typo_fix_is_simple() {
        let i = issue("Fix typo in README", "Change 'teh' to 'the'", &["agent-ready", "documentation"]);
        let analysis = ComplexityAnalyzer::analyze(&i);
        assert_eq!(analysis.category, ComplexityCategory::Simple);
        assert!(analysis.score <= 10);
    }

    #[test]
    fn auth_redesign_is_complex() {
        let body = "Redesign OAuth2 and MFA across 6 microservices, touching \
            `auth/login.rs`, `auth/mfa.rs`, `auth/session.rs`, `auth/oauth.rs`, \
            `auth/tokens.rs`, `auth/middleware.rs`. This requires architecture \
            changes coordinated across several services.";
        let i = issue(
            "Redesign authentication system architecture",
            body,
            &["agent-ready", "architecture", "refactor"],
        );
        let analysis = ComplexityAnalyzer::analyze(&i);
        assert_eq!(analysis.category, ComplexityCategory::Complex);
        assert!(analysis.score > 25);
    }

    #[test]
    fn uncertain_login_fix() {
        let body = "The login form does not validate empty passwords, see \
            `auth/login.rs` and `auth/validate.rs`.";
        let i = issue("Fix user login validation", body, &["agent-ready"]);
        let analysis = ComplexityAnalyzer::analyze(&i);
        assert_eq!(analysis.category, ComplexityCategory::Uncertain);
    }

    #[test]
    fn deterministic_for_same_input() {
        let i = issue("Fix typo", "trivial change", &["agent-ready"]);
        let a1 = ComplexityAnalyzer::analyze(&i);
        let a2 = ComplexityAnalyzer::analyze(&i);
        assert_eq!(a1.score, a2.score);
        assert_eq!(a1.category, a2.category);
    }

    #[test]
    fn boundary_scores_classify_exactly() {
        assert_eq!(ComplexityCategory::from_score(10), ComplexityCategory::Simple);
        assert_eq!(ComplexityCategory::from_score(11), ComplexityCategory::Uncertain);
        assert_eq!(ComplexityCategory::from_score(26), ComplexityCategory::Complex);
    }
}
