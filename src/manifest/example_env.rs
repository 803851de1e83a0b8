//! Generated example environment file: one line per required variable,
//! grouped by global vs. per-agent ownership, with auto-resolvable and
//! optional variables commented out and annotated.

use crate::error::Result;
use crate::secrets::reference::parse_env_reference;
use crate::secrets::{AgentSeed, SecretSchema};
use chrono::Utc;
use std::path::Path;

/// Default artifact file name, written next to the manifest.
pub const EXAMPLE_ENV_FILE: &str = ".env.example";

/// Render the artifact for the operator to copy into their real env file.
pub fn render(schema: &SecretSchema, agents: &[AgentSeed]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "# Environment variables required by this fleet.\n\
         # Generated by fleetctl on {}; copy what you need into your .env.\n",
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    ));

    if !schema.global.is_empty() {
        out.push_str("\n# Global\n");
        for (key, reference) in &schema.global {
            push_entry(&mut out, schema, key, reference);
        }
    }

    for (agent_name, entries) in &schema.per_agent {
        if entries.is_empty() {
            continue;
        }
        let role = agents
            .iter()
            .find(|a| &a.name == agent_name)
            .map(|a| a.role.as_str())
            .unwrap_or("?");
        out.push_str(&format!("\n# Agent: {} (role {})\n", agent_name, role));
        for (key, reference) in entries {
            push_entry(&mut out, schema, key, reference);
        }
    }

    out
}

fn push_entry(out: &mut String, schema: &SecretSchema, key: &str, reference: &str) {
    // Literal values need no env var; nothing for the operator to supply
    let Some(env_var) = parse_env_reference(reference) else {
        return;
    };

    if schema.auto_resolvable.contains(key) {
        out.push_str(&format!(
            "# {} is auto-resolvable; setup fills it via the plugin's resolve hook\n# {}=\n",
            key, env_var
        ));
    } else if schema.optional.contains(key) {
        out.push_str(&format!("# {} is optional\n# {}=\n", key, env_var));
    } else {
        out.push_str(&format!("{}=\n", env_var));
    }
}

pub fn write(path: &Path, schema: &SecretSchema, agents: &[AgentSeed]) -> Result<()> {
    std::fs::write(path, render(schema, agents))?;
    Ok(())
}
