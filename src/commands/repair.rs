//! Repair pass: reconcile discovered identity sources with the existing
//! manifest, then run the normal setup pass on the updated state.
//!
//! Nothing is written until the setup pass itself succeeds; a repair that
//! hits a fatal resolution error leaves the manifest file untouched.

use super::setup;
use crate::error::Result;
use crate::hooks::Prompter;
use crate::identity::discover_identities;
use crate::manifest::FleetManifest;
use crate::matcher::{match_identities, MatchTier};
use std::path::Path;

pub fn execute(
    manifest_path: &Path,
    env_file: Option<&Path>,
    identities_root: &Path,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let mut manifest = FleetManifest::load(manifest_path)?;

    let discovered = discover_identities(identities_root)?;
    println!(
        "Discovered {} identity source(s) under {}",
        discovered.len(),
        identities_root.display()
    );

    let outcome = match_identities(&manifest.agents, &discovered);

    for m in &outcome.matched {
        let tier = match m.tier {
            MatchTier::ExactReference => "reference",
            MatchTier::DerivedName => "name",
            MatchTier::UniqueRole => "role",
        };
        if let Some(agent) = manifest.agent_mut(&m.agent_name) {
            if agent.identity != m.reference {
                println!(
                    "✓ {} -> {} (matched by {})",
                    m.agent_name, m.reference, tier
                );
                agent.identity = m.reference.clone();
            }
        }
    }

    for name in &outcome.stale_agents {
        eprintln!(
            "⚠ Warning: agent '{}' matched no discovered identity; keeping its current reference",
            name
        );
    }
    for reference in &outcome.orphaned_sources {
        eprintln!(
            "⚠ Warning: identity source '{}' is not claimed by any agent; add it manually if wanted",
            reference
        );
    }

    setup::run_pass(&mut manifest, manifest_path, env_file, prompter)
}
