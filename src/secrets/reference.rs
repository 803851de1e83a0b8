//! Secret reference grammar and mechanical key derivation.
//!
//! A secret value in a manifest is either a literal string (back-compat
//! escape hatch) or a token of the exact form `${env:VAR_NAME}`. Anything
//! else is treated as a literal.

/// Build an environment reference string for a variable.
pub fn env_reference(var: &str) -> String {
    format!("${{env:{}}}", var)
}

/// Extract the variable name from a `${env:VAR}` reference. Returns `None`
/// for any other shape, which callers treat as a literal value.
pub fn parse_env_reference(value: &str) -> Option<&str> {
    let inner = value.strip_prefix("${env:")?.strip_suffix('}')?;
    if inner.is_empty() || inner.contains(['$', '{', '}']) {
        return None;
    }
    Some(inner)
}

/// Derive the camelCase secret key from an env var name:
/// `SLACK_BOT_TOKEN` -> `slackBotToken`.
pub fn camel_case_key(env_var: &str) -> String {
    let mut out = String::with_capacity(env_var.len());
    for (i, segment) in env_var.split('_').filter(|s| !s.is_empty()).enumerate() {
        let lower = segment.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    out
}

/// Env var prefix for a role: uppercased, non-alphanumerics collapsed to
/// underscores. `eng` -> `ENG`, `on-call` -> `ON_CALL`.
pub fn role_env_prefix(role: &str) -> String {
    role.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Role-prefixed env var name: `eng` + `SLACK_BOT_TOKEN` ->
/// `ENG_SLACK_BOT_TOKEN`.
pub fn role_env_var(role: &str, env_var: &str) -> String {
    format!("{}_{}", role_env_prefix(role), env_var)
}
