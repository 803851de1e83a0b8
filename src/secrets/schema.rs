//! Secret requirement schema builder.
//!
//! Derives the full set of required secrets (global and per-agent) from the
//! provider choice, each agent's declared plugins/deps, and identity-declared
//! ad-hoc requirements. Pure and deterministic: identical inputs yield
//! identical output, so it is re-run on every setup/repair pass to pick up
//! newly added plugins without a reset.

use super::reference::{camel_case_key, env_reference, role_env_var};
use crate::error::{FleetError, Result};
use crate::manifest::{FleetManifest, Provider};
use crate::plugins::{PluginRegistry, SecretScope};
use std::collections::{BTreeMap, BTreeSet};

/// Per-agent inputs to the schema builder: the agent's manifest entry merged
/// with its resolved identity's declarations.
#[derive(Debug, Clone, Default)]
pub struct AgentSeed {
    pub name: String,
    pub role: String,
    pub plugins: Vec<String>,
    pub deps: Vec<String>,
    pub required_secrets: Vec<String>,
    /// Primary and backup model names
    pub models: Vec<String>,
}

/// Required secrets as reference-string templates, keyed by secret key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretSchema {
    pub global: BTreeMap<String, String>,
    pub per_agent: BTreeMap<String, BTreeMap<String, String>>,
    /// Global keys that may be left unset without failing the pass
    pub optional: BTreeSet<String>,
    /// Keys flagged auto-resolvable by a covering plugin; never demanded
    /// from the operator
    pub auto_resolvable: BTreeSet<String>,
}

/// Map a model name to its provider API key, if the provider is known.
fn model_api_key(model: &str) -> Option<(&'static str, &'static str)> {
    let m = model.to_lowercase();
    if m.starts_with("claude") {
        Some(("anthropicApiKey", "ANTHROPIC_API_KEY"))
    } else if m.starts_with("gpt") || m.starts_with("codex") || m.starts_with("o1") || m.starts_with("o3") || m.starts_with("o4") {
        Some(("openaiApiKey", "OPENAI_API_KEY"))
    } else if m.starts_with("gemini") {
        Some(("geminiApiKey", "GEMINI_API_KEY"))
    } else {
        None
    }
}

/// Build the secret requirement schema for one pass.
pub fn build_schema(
    provider: Provider,
    agents: &[AgentSeed],
    registry: &PluginRegistry,
) -> Result<SecretSchema> {
    let mut schema = SecretSchema::default();

    // 1. Model-provider API keys, only for providers actually in use
    for agent in agents {
        for model in &agent.models {
            if let Some((key, env_var)) = model_api_key(model) {
                schema
                    .global
                    .insert(key.to_string(), env_reference(env_var));
            }
        }
    }

    // 2. Transport secrets, unless running locally
    if provider != Provider::Local {
        schema
            .global
            .insert("tsAuthKey".to_string(), env_reference("TS_AUTH_KEY"));
        schema
            .global
            .insert("tsDnsName".to_string(), env_reference("TS_DNS_NAME"));
        schema
            .global
            .insert("tsApiKey".to_string(), env_reference("TS_API_KEY"));
        schema.optional.insert("tsApiKey".to_string());
    }

    // 3. Provider-specific secrets. AWS uses the ambient credential chain.
    if provider == Provider::Hetzner {
        schema
            .global
            .insert("hcloudToken".to_string(), env_reference("HCLOUD_TOKEN"));
    }

    // 4. Global dep secrets, added once if any agent declares the dep
    for agent in agents {
        for dep_name in &agent.deps {
            let dep = registry.get_dep(dep_name).ok_or_else(|| {
                FleetError::InvalidManifest(format!(
                    "agent '{}' declares unknown dep '{}'",
                    agent.name, dep_name
                ))
            })?;
            for spec in dep.manifest.secrets.values() {
                if spec.scope == SecretScope::Global {
                    schema.global.insert(
                        camel_case_key(&spec.env_var),
                        env_reference(&spec.env_var),
                    );
                }
            }
        }
    }

    // 5. Per-agent plugin and dep secrets, role-prefixed
    for agent in agents {
        let entries = schema.per_agent.entry(agent.name.clone()).or_default();

        for plugin_name in &agent.plugins {
            let plugin = registry.get_plugin(plugin_name).ok_or_else(|| {
                FleetError::InvalidManifest(format!(
                    "agent '{}' declares unknown plugin '{}'",
                    agent.name, plugin_name
                ))
            })?;
            for spec in plugin.manifest.secrets.values() {
                if spec.scope != SecretScope::Agent {
                    continue;
                }
                let key = camel_case_key(&spec.env_var);
                entries.insert(
                    key.clone(),
                    env_reference(&role_env_var(&agent.role, &spec.env_var)),
                );
                if spec.auto_resolvable {
                    schema.auto_resolvable.insert(key);
                }
            }
        }

        for dep_name in &agent.deps {
            // Validated in step 4
            let Some(dep) = registry.get_dep(dep_name) else {
                continue;
            };
            for spec in dep.manifest.secrets.values() {
                if spec.scope == SecretScope::Agent {
                    entries.insert(
                        camel_case_key(&spec.env_var),
                        env_reference(&role_env_var(&agent.role, &spec.env_var)),
                    );
                }
            }
        }

        // 6. Identity ad-hoc secrets, skipped when a plugin/dep already
        // populated the key (avoids duplicate prompts)
        for env_var in &agent.required_secrets {
            let key = camel_case_key(env_var);
            if entries.contains_key(&key) || schema.global.contains_key(&key) {
                continue;
            }
            entries.insert(key, env_reference(&role_env_var(&agent.role, env_var)));
        }
    }

    Ok(schema)
}

/// Carry forward reference strings already recorded in the manifest.
///
/// The builder emits fresh `${env:...}` templates; an operator may have
/// pinned a literal or pointed a key at a different variable. Any schema key
/// the manifest already holds keeps the manifest's value. Keys no longer in
/// the schema are dropped with the rebuild.
pub fn overlay_existing(schema: &mut SecretSchema, manifest: &FleetManifest) {
    for (key, value) in &manifest.secrets {
        if let Some(slot) = schema.global.get_mut(key) {
            *slot = value.clone();
        }
    }
    for agent in &manifest.agents {
        let Some(entries) = schema.per_agent.get_mut(&agent.name) else {
            continue;
        };
        for (key, value) in &agent.secrets {
            if let Some(slot) = entries.get_mut(key) {
                *slot = value.clone();
            }
        }
    }
}
