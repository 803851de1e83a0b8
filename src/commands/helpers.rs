//! Shared helpers for command implementations.

use crate::error::Result;
use crate::identity::{FetchedIdentity, IdentityFetcher, IdentitySource, LocalIdentitySource};
use crate::manifest::FleetManifest;
use crate::secrets::AgentSeed;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Cache directory for remote identity fetches.
pub fn identity_cache_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
        .join(".fleetctl")
        .join("identities")
}

pub fn default_fetcher() -> IdentityFetcher<LocalIdentitySource> {
    IdentityFetcher::new(LocalIdentitySource, identity_cache_dir())
}

/// Fetch every agent's identity and derive the schema-builder inputs.
pub fn build_seeds<S: IdentitySource>(
    manifest: &FleetManifest,
    fetcher: &mut IdentityFetcher<S>,
) -> Result<(Vec<AgentSeed>, BTreeMap<String, Arc<FetchedIdentity>>)> {
    let mut seeds = Vec::new();
    let mut identities = BTreeMap::new();

    for agent in &manifest.agents {
        let fetched = fetcher.fetch(&agent.identity)?;
        seeds.push(AgentSeed {
            name: agent.name.clone(),
            role: agent.role.clone(),
            plugins: fetched.manifest.plugins.clone(),
            deps: fetched.manifest.deps.clone(),
            required_secrets: fetched.manifest.required_secrets.clone(),
            models: fetched.manifest.models(),
        });
        identities.insert(agent.name.clone(), fetched);
    }

    Ok((seeds, identities))
}
