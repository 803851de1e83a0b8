//! Persisted fleet manifest: the structured document read at the start of
//! every setup/repair pass and rewritten at the end.

pub mod assembler;
pub mod example_env;

use crate::error::{FleetError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Provisioning backend the fleet targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Aws,
    Hetzner,
    Local,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Aws => "aws",
            Provider::Hetzner => "hetzner",
            Provider::Local => "local",
        }
    }
}

/// Top-level fleet manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetManifest {
    pub stack_name: String,
    pub provider: Provider,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Global secrets as reference strings (`${env:VAR}`)
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,

    #[serde(default)]
    pub agents: Vec<AgentDefinition>,
}

/// One fleet member as declared in the manifest. Created at init time,
/// mutated during repair/setup, never deleted except by manifest edit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDefinition {
    pub name: String,
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Identity source reference (local path or remote locator)
    pub identity: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,

    /// Per-agent secrets as reference strings
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,

    /// Resolved inline plugin configs, keyed by plugin id
    #[serde(default)]
    pub plugins: BTreeMap<String, serde_json::Value>,
}

/// Default agent name derived from an identity's declared name.
pub fn derived_agent_name(identity_name: &str) -> String {
    format!("agent-{}", identity_name)
}

impl FleetManifest {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FleetError::ManifestNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        let manifest: FleetManifest = toml::from_str(&contents)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Write atomically: serialize to a sibling temp file, then rename.
    /// Callers only invoke this after a pass completes without a fatal
    /// error, so no partial manifest ever lands on disk.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.stack_name.is_empty() {
            return Err(FleetError::InvalidManifest(
                "stackName cannot be empty".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for agent in &self.agents {
            if agent.name.is_empty() {
                return Err(FleetError::InvalidManifest(
                    "agent name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(agent.name.as_str()) {
                return Err(FleetError::InvalidManifest(format!(
                    "duplicate agent name '{}'",
                    agent.name
                )));
            }
        }
        Ok(())
    }

    pub fn agent(&self, name: &str) -> Option<&AgentDefinition> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn agent_mut(&mut self, name: &str) -> Option<&mut AgentDefinition> {
        self.agents.iter_mut().find(|a| a.name == name)
    }
}
