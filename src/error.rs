use std::path::PathBuf;
use thiserror::Error;

/// A required secret that could not be resolved from any source.
///
/// Collected exhaustively during a resolution pass so the operator sees
/// every gap at once instead of fixing them one failure at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSecret {
    /// Schema key, e.g. `slackAppToken`
    pub key: String,
    /// Environment variable that would satisfy it, e.g. `ENG_SLACK_APP_TOKEN`
    pub env_var: String,
    /// Owning agent for agent-scoped secrets; `None` for global secrets
    pub agent: Option<String>,
}

fn format_secret_gaps(missing: &[MissingSecret]) -> String {
    let mut out = format!(
        "{} required secret(s) could not be resolved:\n",
        missing.len()
    );
    for gap in missing {
        match &gap.agent {
            Some(agent) => out.push_str(&format!(
                "  - {} (agent {}): set {}\n",
                gap.key, agent, gap.env_var
            )),
            None => out.push_str(&format!("  - {}: set {}\n", gap.key, gap.env_var)),
        }
    }
    out.push_str("Add the variables to your environment file and re-run setup.");
    out
}

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("Failed to resolve identity '{reference}': {message}")]
    IdentityResolution { reference: String, message: String },

    #[error("{}", format_secret_gaps(.0))]
    SecretGaps(Vec<MissingSecret>),

    #[error(
        "Hook for plugin '{plugin}' on agent '{agent}' failed: {message}\n\
         Fix the underlying issue, or bypass hook resolution by exporting \
         the plugin's environment variables directly."
    )]
    HookFailure {
        plugin: String,
        agent: String,
        message: String,
    },

    #[error("Hook runtime not available: {0}. Install it and re-run setup.")]
    HookRuntimeMissing(String),

    #[error("Cancelled by operator")]
    Cancelled,

    #[error("Manifest not found: {0}")]
    ManifestNotFound(PathBuf),

    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Invalid environment file: {0}")]
    InvalidEnvFile(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_gaps_message_lists_every_gap() {
        let err = FleetError::SecretGaps(vec![
            MissingSecret {
                key: "slackAppToken".to_string(),
                env_var: "ENG_SLACK_APP_TOKEN".to_string(),
                agent: Some("agent-eng".to_string()),
            },
            MissingSecret {
                key: "hcloudToken".to_string(),
                env_var: "HCLOUD_TOKEN".to_string(),
                agent: None,
            },
        ]);

        let msg = err.to_string();
        assert!(msg.contains("2 required secret(s)"));
        assert!(msg.contains("slackAppToken (agent agent-eng): set ENG_SLACK_APP_TOKEN"));
        assert!(msg.contains("hcloudToken: set HCLOUD_TOKEN"));
    }
}
