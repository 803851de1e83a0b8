//! Environment dictionary: a `.env`-style file merged with the live
//! process environment. Process environment wins on conflict.

use crate::error::{FleetError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Merged environment dictionary. Read-only once constructed.
#[derive(Debug, Clone, Default)]
pub struct EnvDict {
    vars: HashMap<String, String>,
}

impl EnvDict {
    /// Load the dictionary from an optional env file plus the process
    /// environment. A missing file path is an error; pass `None` to use the
    /// process environment alone.
    pub fn load(env_file: Option<&Path>) -> Result<Self> {
        let mut vars = match env_file {
            Some(path) => parse_env_file(path)?,
            None => HashMap::new(),
        };

        // Process environment wins over file entries
        for (key, value) in std::env::vars() {
            vars.insert(key, value);
        }

        Ok(Self { vars })
    }

    /// Build a dictionary from an explicit map (tests, fixtures).
    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}

/// Parse a `KEY=value` env file. Supports `#` comments, blank lines, and
/// values wrapped in matching single or double quotes.
pub fn parse_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let content = fs::read_to_string(path).map_err(|e| {
        FleetError::InvalidEnvFile(format!("failed to read {}: {}", path.display(), e))
    })?;

    let mut vars = HashMap::new();
    for (line_num, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            return Err(FleetError::InvalidEnvFile(format!(
                "invalid line at {}:{}: {}",
                path.display(),
                line_num + 1,
                line
            )));
        };

        vars.insert(key.trim().to_string(), unquote(value.trim()).to_string());
    }

    Ok(vars)
}

/// Strip one layer of matching single or double quotes.
fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}
