//! Registry of plugin and dep descriptors, loaded from embedded TOML.
//!
//! The schema builder and hook runner consume descriptors generically;
//! nothing in the engine branches on a specific plugin id.

use super::definition::{DepManifest, PluginManifest, SecretScope};
use crate::error::{FleetError, Result};
use crate::secrets::reference::camel_case_key;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

/// A plugin descriptor together with its embedded hook scripts.
pub struct Plugin {
    pub manifest: PluginManifest,
    scripts: HashMap<String, &'static str>,
}

impl Plugin {
    /// Script content by the file name a hook declares.
    pub fn script(&self, name: &str) -> Option<&'static str> {
        self.scripts.get(name).copied()
    }

    pub fn id(&self) -> &str {
        &self.manifest.plugin.id
    }
}

pub struct Dep {
    pub manifest: DepManifest,
}

impl Dep {
    pub fn id(&self) -> &str {
        &self.manifest.dep.id
    }
}

/// Registry of available plugins and deps.
pub struct PluginRegistry {
    plugins: HashMap<String, Arc<Plugin>>,
    deps: HashMap<String, Arc<Dep>>,
}

impl PluginRegistry {
    /// Load all embedded descriptors.
    pub fn load() -> Result<Self> {
        let mut plugins = HashMap::new();
        let mut deps = HashMap::new();

        for plugin in [
            load_plugin(
                include_str!("../../plugins/slack/plugin.toml"),
                &[
                    ("onboard.sh", include_str!("../../plugins/slack/onboard.sh")),
                    ("resolve.sh", include_str!("../../plugins/slack/resolve.sh")),
                ],
            )?,
            load_plugin(
                include_str!("../../plugins/linear/plugin.toml"),
                &[(
                    "resolve.sh",
                    include_str!("../../plugins/linear/resolve.sh"),
                )],
            )?,
        ] {
            plugins.insert(plugin.id().to_string(), Arc::new(plugin));
        }

        for dep in [
            load_dep(include_str!("../../deps/github/dep.toml"))?,
            load_dep(include_str!("../../deps/exa/dep.toml"))?,
        ] {
            deps.insert(dep.id().to_string(), Arc::new(dep));
        }

        Ok(Self { plugins, deps })
    }

    pub fn get_plugin(&self, id: &str) -> Option<Arc<Plugin>> {
        self.plugins.get(id).cloned()
    }

    pub fn get_dep(&self, id: &str) -> Option<Arc<Dep>> {
        self.deps.get(id).cloned()
    }

    pub fn list_plugins(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.plugins.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn list_deps(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.deps.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Prefix validators declared by any plugin or dep, keyed by secret key.
    pub fn validator_prefixes(&self) -> BTreeMap<String, String> {
        let mut prefixes = BTreeMap::new();
        let plugin_secrets = self
            .plugins
            .values()
            .flat_map(|p| p.manifest.secrets.iter());
        let dep_secrets = self.deps.values().flat_map(|d| d.manifest.secrets.iter());

        for (key, spec) in plugin_secrets.chain(dep_secrets) {
            if let Some(prefix) = &spec.prefix {
                prefixes.insert(key.clone(), prefix.clone());
            }
        }
        prefixes
    }

    /// Keys every descriptor naming them declares non-sensitive. A key
    /// marked sensitive anywhere stays sensitive.
    pub fn non_secret_keys(&self) -> BTreeSet<String> {
        let mut non_secret = BTreeSet::new();
        let mut sensitive = BTreeSet::new();

        let plugin_secrets = self
            .plugins
            .values()
            .flat_map(|p| p.manifest.secrets.iter());
        let dep_secrets = self.deps.values().flat_map(|d| d.manifest.secrets.iter());
        for (key, spec) in plugin_secrets.chain(dep_secrets) {
            if spec.is_secret {
                sensitive.insert(key.clone());
            } else {
                non_secret.insert(key.clone());
            }
        }

        non_secret.retain(|key| !sensitive.contains(key));
        non_secret
    }

    /// Keys flagged auto-resolvable by any plugin covering them. Such keys
    /// are never demanded from the operator.
    pub fn auto_resolvable_keys(&self) -> BTreeMap<String, String> {
        let mut keys = BTreeMap::new();
        for plugin in self.plugins.values() {
            for (key, spec) in &plugin.manifest.secrets {
                if spec.auto_resolvable {
                    keys.insert(key.clone(), spec.env_var.clone());
                }
            }
        }
        keys
    }
}

pub(crate) fn load_plugin(
    toml_content: &str,
    scripts: &[(&'static str, &'static str)],
) -> Result<Plugin> {
    let manifest: PluginManifest = toml::from_str(toml_content)
        .map_err(|e| FleetError::InvalidManifest(format!("plugin descriptor: {}", e)))?;
    let scripts: HashMap<String, &'static str> = scripts
        .iter()
        .map(|(name, content)| (name.to_string(), *content))
        .collect();

    validate_plugin(&manifest, &scripts)?;
    Ok(Plugin { manifest, scripts })
}

fn load_dep(toml_content: &str) -> Result<Dep> {
    let manifest: DepManifest = toml::from_str(toml_content)
        .map_err(|e| FleetError::InvalidManifest(format!("dep descriptor: {}", e)))?;

    if manifest.dep.id.is_empty() {
        return Err(FleetError::InvalidManifest(
            "dep id cannot be empty".to_string(),
        ));
    }
    validate_secret_keys(&manifest.dep.id, &manifest.secrets)?;
    Ok(Dep { manifest })
}

fn validate_plugin(manifest: &PluginManifest, scripts: &HashMap<String, &'static str>) -> Result<()> {
    let id = &manifest.plugin.id;
    if id.is_empty() {
        return Err(FleetError::InvalidManifest(
            "plugin id cannot be empty".to_string(),
        ));
    }

    validate_secret_keys(id, &manifest.secrets)?;

    if let Some(onboard) = &manifest.hooks.onboard {
        if !scripts.contains_key(&onboard.script) {
            return Err(FleetError::InvalidManifest(format!(
                "plugin '{}' onboard hook references unknown script '{}'",
                id, onboard.script
            )));
        }
    }
    if let Some(resolve) = &manifest.hooks.resolve {
        if !scripts.contains_key(&resolve.script) {
            return Err(FleetError::InvalidManifest(format!(
                "plugin '{}' resolve hook references unknown script '{}'",
                id, resolve.script
            )));
        }
    }

    // Auto-resolvable secrets need a resolve hook to fill them
    let has_auto = manifest.secrets.values().any(|s| s.auto_resolvable);
    if has_auto && manifest.hooks.resolve.is_none() {
        return Err(FleetError::InvalidManifest(format!(
            "plugin '{}' declares auto-resolvable secrets but no resolve hook",
            id
        )));
    }

    Ok(())
}

/// Secret keys are the mechanical camelCase of their env var. Enforced at
/// load so the schema builder can derive keys without consulting the map.
fn validate_secret_keys(
    owner: &str,
    secrets: &BTreeMap<String, super::definition::SecretSpec>,
) -> Result<()> {
    for (key, spec) in secrets {
        let derived = camel_case_key(&spec.env_var);
        if key != &derived {
            return Err(FleetError::InvalidManifest(format!(
                "'{}' secret key '{}' does not match env var '{}' (expected '{}')",
                owner, key, spec.env_var, derived
            )));
        }
        if spec.scope == SecretScope::Global && spec.auto_resolvable {
            return Err(FleetError::InvalidManifest(format!(
                "'{}' secret '{}': global secrets cannot be auto-resolvable",
                owner, key
            )));
        }
    }
    Ok(())
}
