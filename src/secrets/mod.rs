//! Secret requirement schema, reference resolution, and redaction.

pub mod redact;
pub mod reference;
pub mod resolver;
pub mod schema;

pub use resolver::{resolve, validate, ResolvedSecrets, ValidatorWarning};
pub use schema::{build_schema, overlay_existing, AgentSeed, SecretSchema};

use std::collections::BTreeMap;

/// Accumulator of secrets filled in by resolve hooks (and operator-collected
/// hook inputs) during a single pass.
///
/// Passed by `&mut` through the pipeline stages: written by the hook runner,
/// read by the assembler and by later plugins in the same pass, so a value
/// resolved once is never re-resolved.
#[derive(Debug, Clone, Default)]
pub struct AutoResolved {
    per_agent: BTreeMap<String, BTreeMap<String, String>>,
    by_env_var: BTreeMap<String, String>,
}

impl AutoResolved {
    pub fn insert(&mut self, agent: &str, key: &str, env_var: &str, value: String) {
        self.per_agent
            .entry(agent.to_string())
            .or_default()
            .insert(key.to_string(), value.clone());
        self.by_env_var.insert(env_var.to_string(), value);
    }

    pub fn get(&self, agent: &str, key: &str) -> Option<&str> {
        self.per_agent
            .get(agent)
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }

    /// Cross-agent lookup by env var name, so a value one plugin resolved
    /// can satisfy a different plugin on a different agent.
    pub fn lookup_env(&self, env_var: &str) -> Option<&str> {
        self.by_env_var.get(env_var).map(String::as_str)
    }

    /// All values resolved for one agent.
    pub fn agent_values(&self, agent: &str) -> Option<&BTreeMap<String, String>> {
        self.per_agent.get(agent)
    }

    pub fn all_values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.per_agent
            .values()
            .flat_map(|m| m.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    pub fn is_empty(&self) -> bool {
        self.per_agent.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulator_lookup_paths() {
        let mut acc = AutoResolved::default();
        acc.insert("agent-eng", "slackTeamId", "SLACK_TEAM_ID", "T123".to_string());

        assert_eq!(acc.get("agent-eng", "slackTeamId"), Some("T123"));
        assert_eq!(acc.get("agent-ops", "slackTeamId"), None);
        // Cross-agent env var sharing
        assert_eq!(acc.lookup_env("SLACK_TEAM_ID"), Some("T123"));
        assert!(!acc.is_empty());
    }
}
