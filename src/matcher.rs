//! Identity-to-agent matcher, used only during manifest repair.
//!
//! Reconciles discovered on-disk identity sources against existing agent
//! entries with three strictly ordered tiers, each operating only on the
//! remaining unmatched sets. A wrong auto-match would overwrite a
//! production agent's persisted plugin config, so ambiguity always loses
//! to leaving things unmatched.

use crate::identity::FetchedIdentity;
use crate::manifest::{derived_agent_name, AgentDefinition};
use std::collections::{BTreeMap, BTreeSet};

/// One accepted pairing of an existing agent and a discovered source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub agent_name: String,
    pub reference: String,
    pub tier: MatchTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Stored identity reference equals a source's reference verbatim
    ExactReference,
    /// Agent name equals `agent-<identity name>`
    DerivedName,
    /// Exactly one unmatched agent and one unmatched source share a role
    UniqueRole,
}

#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub matched: Vec<Match>,
    /// Agents with no matching source; they keep their (possibly stale)
    /// identity reference and are flagged for the operator
    pub stale_agents: Vec<String>,
    /// Discovered sources no agent claims; the operator adds them manually
    pub orphaned_sources: Vec<String>,
}

/// Run the tiered matching algorithm.
pub fn match_identities(
    agents: &[AgentDefinition],
    discovered: &[FetchedIdentity],
) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();
    let mut free_agents: BTreeSet<usize> = (0..agents.len()).collect();
    let mut free_sources: BTreeSet<usize> = (0..discovered.len()).collect();

    let accept = |outcome: &mut MatchOutcome,
                  free_agents: &mut BTreeSet<usize>,
                  free_sources: &mut BTreeSet<usize>,
                  a: usize,
                  s: usize,
                  tier: MatchTier| {
        free_agents.remove(&a);
        free_sources.remove(&s);
        outcome.matched.push(Match {
            agent_name: agents[a].name.clone(),
            reference: discovered[s].reference.clone(),
            tier,
        });
    };

    // Tier 1: exact reference match
    for a in free_agents.clone() {
        if let Some(s) = free_sources
            .iter()
            .copied()
            .find(|&s| discovered[s].reference == agents[a].identity)
        {
            accept(
                &mut outcome,
                &mut free_agents,
                &mut free_sources,
                a,
                s,
                MatchTier::ExactReference,
            );
        }
    }

    // Tier 2: derived-name match
    for a in free_agents.clone() {
        if let Some(s) = free_sources
            .iter()
            .copied()
            .find(|&s| derived_agent_name(&discovered[s].manifest.name) == agents[a].name)
        {
            accept(
                &mut outcome,
                &mut free_agents,
                &mut free_sources,
                a,
                s,
                MatchTier::DerivedName,
            );
        }
    }

    // Tier 3: unique-role match. Only when exactly one unmatched agent and
    // exactly one unmatched source share the role; multi-candidate roles
    // are left unmatched rather than guessed.
    let mut agents_by_role: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for &a in &free_agents {
        agents_by_role.entry(&agents[a].role).or_default().push(a);
    }
    let mut sources_by_role: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for &s in &free_sources {
        sources_by_role
            .entry(&discovered[s].manifest.role)
            .or_default()
            .push(s);
    }

    for (role, agent_idxs) in agents_by_role {
        if agent_idxs.len() != 1 {
            continue;
        }
        let Some(source_idxs) = sources_by_role.get(role) else {
            continue;
        };
        if source_idxs.len() != 1 {
            continue;
        }
        accept(
            &mut outcome,
            &mut free_agents,
            &mut free_sources,
            agent_idxs[0],
            source_idxs[0],
            MatchTier::UniqueRole,
        );
    }

    outcome.stale_agents = free_agents.iter().map(|&a| agents[a].name.clone()).collect();
    outcome.orphaned_sources = free_sources
        .iter()
        .map(|&s| discovered[s].reference.clone())
        .collect();
    outcome
}
