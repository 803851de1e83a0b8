//! Secret reference resolver.
//!
//! Resolves a built schema against the environment dictionary in a single
//! exhaustive pass: every declared key lands in exactly one of `resolved`
//! or `missing`. Resolution never raises; the caller decides how to report.

use super::reference::parse_env_reference;
use super::schema::SecretSchema;
use crate::env::EnvDict;
use crate::error::MissingSecret;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
pub struct ResolvedSecrets {
    pub global: BTreeMap<String, String>,
    pub per_agent: BTreeMap<String, BTreeMap<String, String>>,
    pub missing: Vec<MissingSecret>,
}

impl ResolvedSecrets {
    /// Value for an agent-scoped key, falling back to the global map.
    pub fn get(&self, agent: &str, key: &str) -> Option<&str> {
        self.per_agent
            .get(agent)
            .and_then(|m| m.get(key))
            .or_else(|| self.global.get(key))
            .map(String::as_str)
    }

    /// Every resolved value with its key, for redaction passes.
    pub fn all_values(&self) -> Vec<(&str, &str)> {
        let mut values: Vec<(&str, &str)> = self
            .global
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        for entries in self.per_agent.values() {
            values.extend(entries.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        values
    }
}

/// Resolve every key in the schema against the environment dictionary.
pub fn resolve(schema: &SecretSchema, env: &EnvDict) -> ResolvedSecrets {
    let mut out = ResolvedSecrets::default();

    for (key, reference) in &schema.global {
        match resolve_reference(reference, env) {
            Resolution::Value(value) => {
                out.global.insert(key.clone(), value);
            }
            Resolution::Missing(env_var) => out.missing.push(MissingSecret {
                key: key.clone(),
                env_var,
                agent: None,
            }),
        }
    }

    for (agent, entries) in &schema.per_agent {
        let resolved = out.per_agent.entry(agent.clone()).or_default();
        for (key, reference) in entries {
            match resolve_reference(reference, env) {
                Resolution::Value(value) => {
                    resolved.insert(key.clone(), value);
                }
                Resolution::Missing(env_var) => out.missing.push(MissingSecret {
                    key: key.clone(),
                    env_var,
                    agent: Some(agent.clone()),
                }),
            }
        }
    }

    out
}

enum Resolution {
    Value(String),
    Missing(String),
}

fn resolve_reference(reference: &str, env: &EnvDict) -> Resolution {
    match parse_env_reference(reference) {
        Some(var) => match env.get(var) {
            Some(value) => Resolution::Value(value.to_string()),
            None => Resolution::Missing(var.to_string()),
        },
        // Literal escape hatch: the value is used verbatim
        None => Resolution::Value(reference.to_string()),
    }
}

/// Non-fatal finding from the validator pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorWarning {
    pub key: String,
    pub agent: Option<String>,
    pub message: String,
}

/// Check resolved values against registered prefix validators. Warnings
/// only surface likely mistakes; they never block resolution.
pub fn validate(
    resolved: &ResolvedSecrets,
    prefixes: &BTreeMap<String, String>,
) -> Vec<ValidatorWarning> {
    let mut warnings = Vec::new();

    let mut check = |key: &str, value: &str, agent: Option<&str>| {
        if let Some(prefix) = prefixes.get(key) {
            if !value.starts_with(prefix.as_str()) {
                warnings.push(ValidatorWarning {
                    key: key.to_string(),
                    agent: agent.map(str::to_string),
                    message: format!("value does not start with expected prefix '{}'", prefix),
                });
            }
        }
    };

    for (key, value) in &resolved.global {
        check(key, value, None);
    }
    for (agent, entries) in &resolved.per_agent {
        for (key, value) in entries {
            check(key, value, Some(agent));
        }
    }

    warnings
}
