//! Setup pass: resolve secrets, run lifecycle hooks, assemble and write the
//! manifest and the example env artifact.

use super::helpers::{build_seeds, default_fetcher};
use crate::env::EnvDict;
use crate::error::{FleetError, MissingSecret, Result};
use crate::hooks::{HookRunner, OnboardOutcome, Prompter};
use crate::manifest::{assembler, example_env, FleetManifest};
use crate::plugins::PluginRegistry;
use crate::secrets::{self, AutoResolved};
use std::path::Path;

pub fn execute(manifest_path: &Path, env_file: Option<&Path>, prompter: &mut dyn Prompter) -> Result<()> {
    let mut manifest = FleetManifest::load(manifest_path)?;
    run_pass(&mut manifest, manifest_path, env_file, prompter)
}

/// Run one full resolution pass over an already-loaded manifest.
///
/// The manifest and example env are written only after the pass completes
/// without a fatal error; any failure leaves the on-disk state untouched.
pub fn run_pass(
    manifest: &mut FleetManifest,
    manifest_path: &Path,
    env_file: Option<&Path>,
    prompter: &mut dyn Prompter,
) -> Result<()> {
    let env = EnvDict::load(env_file)?;
    let registry = PluginRegistry::load()?;

    println!("Resolving {} agent(s) for stack '{}'...", manifest.agents.len(), manifest.stack_name);

    let mut fetcher = default_fetcher();
    let (seeds, identities) = build_seeds(manifest, &mut fetcher)?;

    let mut schema = secrets::build_schema(manifest.provider, &seeds, &registry)?;
    secrets::overlay_existing(&mut schema, manifest);
    let resolved = secrets::resolve(&schema, &env);

    for warning in secrets::validate(&resolved, &registry.validator_prefixes()) {
        match &warning.agent {
            Some(agent) => eprintln!("⚠ Warning: {} ({}): {}", warning.key, agent, warning.message),
            None => eprintln!("⚠ Warning: {}: {}", warning.key, warning.message),
        }
    }

    let mut acc = AutoResolved::default();
    let runner = HookRunner::new(&registry, &env);
    let reports = runner.run_all(&seeds, &resolved, &mut acc, prompter)?;

    for report in &reports {
        match &report.outcome {
            OnboardOutcome::Skipped => {
                println!("⊘ {} on {}: skipped, already configured", report.plugin, report.agent);
            }
            OnboardOutcome::Completed { instructions } => {
                println!("✓ {} on {}: onboarded", report.plugin, report.agent);
                if let Some(text) = instructions {
                    println!("{}", text);
                }
            }
        }
    }

    let gaps = remaining_gaps(&schema, &resolved.missing, &acc);
    if !gaps.is_empty() {
        return Err(FleetError::SecretGaps(gaps));
    }

    assembler::assemble(manifest, &identities, &schema, &acc, &registry)?;
    manifest.save(manifest_path)?;

    let example_path = manifest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(example_env::EXAMPLE_ENV_FILE);
    example_env::write(&example_path, &schema, &seeds)?;

    println!("Manifest written to {}", manifest_path.display());
    println!("Example env written to {}", example_path.display());
    Ok(())
}

/// Gaps still open after hooks ran: optional keys and anything the
/// accumulator filled are dropped, everything else is reported at once.
fn remaining_gaps(
    schema: &secrets::SecretSchema,
    missing: &[MissingSecret],
    acc: &AutoResolved,
) -> Vec<MissingSecret> {
    missing
        .iter()
        .filter(|gap| {
            if gap.agent.is_none() && schema.optional.contains(&gap.key) {
                return false;
            }
            let satisfied = match &gap.agent {
                Some(agent) => acc.get(agent, &gap.key).is_some(),
                None => acc.lookup_env(&gap.env_var).is_some(),
            };
            !satisfied
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretSchema;

    #[test]
    fn test_remaining_gaps_filters_optional_and_accumulated() {
        let mut schema = SecretSchema::default();
        schema.optional.insert("tsApiKey".to_string());

        let mut acc = AutoResolved::default();
        acc.insert("agent-eng", "slackTeamId", "ENG_SLACK_TEAM_ID", "T1".to_string());

        let missing = vec![
            MissingSecret {
                key: "tsApiKey".to_string(),
                env_var: "TS_API_KEY".to_string(),
                agent: None,
            },
            MissingSecret {
                key: "slackTeamId".to_string(),
                env_var: "ENG_SLACK_TEAM_ID".to_string(),
                agent: Some("agent-eng".to_string()),
            },
            MissingSecret {
                key: "slackAppToken".to_string(),
                env_var: "ENG_SLACK_APP_TOKEN".to_string(),
                agent: Some("agent-eng".to_string()),
            },
        ];

        let gaps = remaining_gaps(&schema, &missing, &acc);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].key, "slackAppToken");
    }
}
