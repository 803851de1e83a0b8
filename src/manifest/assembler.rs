//! Manifest assembler: merges the schema, auto-resolved values, and
//! identity plugin defaults into the final persisted manifest.
//!
//! Only called after a resolution pass completes without a fatal error, so
//! a half-resolved state never reaches disk.

use super::FleetManifest;
use crate::error::{FleetError, Result};
use crate::identity::FetchedIdentity;
use crate::plugins::{Plugin, PluginRegistry};
use crate::secrets::{AutoResolved, SecretSchema};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key recorded on every inline plugin config so the assembler can track
/// which agent a row belongs to. Declared internal by the plugins that use
/// it, so it never reaches deployed configuration.
pub const AGENT_ID_KEY: &str = "agentId";

/// Merge resolved state into the manifest's secrets maps and inline plugin
/// configs.
pub fn assemble(
    manifest: &mut FleetManifest,
    identities: &BTreeMap<String, Arc<FetchedIdentity>>,
    schema: &SecretSchema,
    acc: &AutoResolved,
    registry: &PluginRegistry,
) -> Result<()> {
    manifest.secrets = schema.global.clone();

    for agent in &mut manifest.agents {
        if let Some(entries) = schema.per_agent.get(&agent.name) {
            agent.secrets = entries.clone();
        }

        let Some(identity) = identities.get(&agent.name) else {
            continue;
        };

        for plugin_name in &identity.manifest.plugins {
            let plugin = registry.get_plugin(plugin_name).ok_or_else(|| {
                FleetError::InvalidManifest(format!(
                    "agent '{}' declares unknown plugin '{}'",
                    agent.name, plugin_name
                ))
            })?;

            let defaults = identity
                .manifest
                .plugin_defaults
                .get(plugin_name)
                .cloned()
                .unwrap_or_else(|| json!({}));
            let config = inline_config(&agent.name, &plugin, &defaults, acc)?;
            agent.plugins.insert(plugin_name.clone(), config);
        }
    }

    Ok(())
}

/// `{...pluginDefaults, ...autoResolvedFieldsForThatPlugin, agentId}`.
fn inline_config(
    agent_name: &str,
    plugin: &Plugin,
    defaults: &Value,
    acc: &AutoResolved,
) -> Result<Value> {
    let mut config: Map<String, Value> = match defaults {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            return Err(FleetError::InvalidManifest(format!(
                "plugin defaults for '{}' must be a table, got {}",
                plugin.id(),
                other
            )))
        }
    };

    for (key, spec) in &plugin.manifest.secrets {
        if !spec.auto_resolvable {
            continue;
        }
        if let Some(value) = acc.get(agent_name, key) {
            config.insert(key.clone(), Value::String(value.to_string()));
        }
    }

    config.insert(AGENT_ID_KEY.to_string(), Value::String(agent_name.to_string()));
    Ok(Value::Object(config))
}

/// The view of an inline config handed to the provisioning backend:
/// internal keys stripped, routed under the plugin's config section when it
/// declares one.
pub fn deployed_config(plugin: &Plugin, config: &Value) -> (Option<String>, Value) {
    let stripped = match config {
        Value::Object(map) => {
            let mut out = map.clone();
            for key in &plugin.manifest.plugin.internal_keys {
                out.remove(key);
            }
            Value::Object(out)
        }
        other => other.clone(),
    };
    (plugin.manifest.plugin.config_path.clone(), stripped)
}
