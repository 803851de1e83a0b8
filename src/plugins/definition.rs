//! Data structures for parsing plugin and dep descriptor TOML files.
//!
//! The engine consumes these descriptors generically. Any plugin-specific
//! behavior (config section, internal bookkeeping keys, hook scripts) is
//! expressed here, never as branches in the engine.

use serde::Deserialize;
use std::collections::BTreeMap;

/// A plugin descriptor loaded from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginManifest {
    /// Plugin metadata (id, name, description, config routing)
    pub plugin: PluginMeta,

    /// Declared secrets, keyed by internal key (camelCase of the env var)
    #[serde(default)]
    pub secrets: BTreeMap<String, SecretSpec>,

    /// Lifecycle hooks
    #[serde(default)]
    pub hooks: HooksSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PluginMeta {
    pub id: String,
    pub name: String,
    pub description: String,

    /// Config section this plugin's inline config is deployed under
    #[serde(default)]
    pub config_path: Option<String>,

    /// Keys kept for assembler bookkeeping only, never deployed
    #[serde(default)]
    pub internal_keys: Vec<String>,
}

/// A dep descriptor: a non-plugin capability with its own install and
/// secret handling (e.g. a CLI tool needing a token).
#[derive(Debug, Clone, Deserialize)]
pub struct DepManifest {
    pub dep: DepMeta,

    #[serde(default)]
    pub secrets: BTreeMap<String, SecretSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DepMeta {
    pub id: String,
    pub name: String,
    pub description: String,

    /// Package or command installed on the agent workload
    #[serde(default)]
    pub install: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecretSpec {
    /// Environment variable the secret resolves from
    pub env_var: String,

    /// Whether the value is sensitive (redacted from hook output)
    #[serde(default = "default_true")]
    pub is_secret: bool,

    /// Expected value prefix; mismatches produce a non-fatal warning
    #[serde(default)]
    pub prefix: Option<String>,

    /// Derivable without operator input (via a resolve hook)
    #[serde(default)]
    pub auto_resolvable: bool,

    pub scope: SecretScope,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretScope {
    /// One value shared by the whole fleet
    Global,
    /// One value per agent, under a role-prefixed env var
    Agent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HooksSpec {
    #[serde(default)]
    pub onboard: Option<OnboardHook>,

    #[serde(default)]
    pub resolve: Option<ResolveHook>,
}

/// Interactive first-time setup hook, run per agent.
#[derive(Debug, Clone, Deserialize)]
pub struct OnboardHook {
    pub description: String,

    /// Skip the hook once all of the plugin's required secrets are satisfied
    #[serde(default)]
    pub run_once: bool,

    /// Inputs collected before invocation, prompted in declared order
    #[serde(default)]
    pub inputs: Vec<HookInput>,

    /// Script file name within the plugin's directory
    pub script: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    /// Env var the input is exported under for the script (and checked
    /// against before prompting)
    pub env_var: String,

    /// Prompt shown to the operator
    pub prompt: String,

    /// Required value prefix, enforced on interactive input
    #[serde(default)]
    pub prefix: Option<String>,

    /// Instructional text shown once per plugin before the first prompt
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Non-interactive hook deriving auto-resolvable secrets from known ones.
#[derive(Debug, Clone, Deserialize)]
pub struct ResolveHook {
    pub script: String,
}
