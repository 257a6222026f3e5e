//! Agent profile directory loading (`spec.md` §6, §9). Read-only at boot;
//! one YAML file per profile. Unknown `role` is a hard load error — no
//! reflection-based tolerance of unknown values, per the Design Notes.

use std::fs;
use std::path::Path;

use crate::domain::errors::BootError;
use crate::domain::models::agent::{AgentLifecycle, AgentRole};
use crate::domain::models::AgentProfile;

#[derive(serde::Deserialize)]
struct RawProfile {
    agent_id: String,
    role: String,
    provider: String,
    model: String,
    #[serde(default)]
    capabilities: Vec<String>,
    lifecycle: String,
    #[serde(default = "default_concurrency_limit")]
    concurrency_limit: u32,
    forge_identity_ref: String,
}

const fn default_concurrency_limit() -> u32 {
    1
}

pub struct ProfileLoader;

impl ProfileLoader {
    pub fn load_dir(dir: impl AsRef<Path>) -> Result<Vec<AgentProfile>, BootError> {
        let dir = dir.as_ref();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(dir)
            .map_err(|e| BootError::ProfileDirIo(format!("{}: {e}", dir.display())))?;

        let mut profiles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| BootError::ProfileDirIo(e.to_string()))?;
            let path = entry.path();
            let is_profile_file = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml");
            if !path.is_file() || !is_profile_file {
                continue;
            }

            let contents = fs::read_to_string(&path)
                .map_err(|e| BootError::ProfileDirIo(format!("{}: {e}", path.display())))?;
            let raw: RawProfile = serde_yaml::from_str(&contents)
                .map_err(|e| BootError::ProfileDirIo(format!("{}: {e}", path.display())))?;

            profiles.push(Self::validate(raw)?);
        }
        Ok(profiles)
    }

    fn validate(raw: RawProfile) -> Result<AgentProfile, BootError> {
        let role = AgentRole::parse(&raw.role)
            .ok_or_else(|| BootError::UnknownRole(raw.role.clone(), raw.agent_id.clone()))?;

        let lifecycle = match raw.lifecycle.as_str() {
            "always_on" => AgentLifecycle::AlwaysOn,
            "on_demand" => AgentLifecycle::OnDemand,
            other => {
                return Err(BootError::Config(format!(
                    "unknown lifecycle '{other}' in profile '{}'",
                    raw.agent_id
                )))
            }
        };

        // providers are an open string set at this layer (validated against
        // the registered LLM adapters by the caller), but must be non-empty.
        if raw.provider.trim().is_empty() {
            return Err(BootError::UnknownProvider(raw.provider, raw.agent_id));
        }

        Ok(AgentProfile {
            agent_id: raw.agent_id,
            role,
            provider: raw.provider,
            model: raw.model,
            capabilities: raw.capabilities.into_iter().collect(),
            lifecycle,
            concurrency_limit: raw.concurrency_limit,
            forge_identity_ref: raw.forge_identity_ref,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn loads_valid_profile() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("dev.yaml"),
            r#"
agent_id: dev-1
role: developer
provider: anthropic
model: claude-sonnet
lifecycle: on_demand
concurrency_limit: 2
forge_identity_ref: bot-account
"#,
        )
        .unwrap();

        let profiles = ProfileLoader::load_dir(dir.path()).unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].agent_id, "dev-1");
        assert_eq!(profiles[0].role, AgentRole::Developer);
    }

    #[test]
    fn rejects_unknown_role() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("bad.yaml"),
            r#"
agent_id: bad-1
role: overlord
provider: anthropic
model: m
lifecycle: on_demand
forge_identity_ref: bot-account
"#,
        )
        .unwrap();

        let result = ProfileLoader::load_dir(dir.path());
        assert!(matches!(result, Err(BootError::UnknownRole(_, _))));
    }

    #[test]
    fn missing_dir_is_empty_not_error() {
        let profiles = ProfileLoader::load_dir("/nonexistent/path/for/sure").unwrap();
        assert!(profiles.is_empty());
    }
}
