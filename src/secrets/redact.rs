//! Secret redaction for hook output.
//!
//! Literal substring matching against already-known secret values. Encoded
//! or transformed variants of a secret are not caught; this is best-effort
//! scrubbing before text reaches a terminal.

/// Values shorter than this are never redacted; replacing substrings like
/// "1" or "true" would shred unrelated output.
const MIN_SECRET_LEN: usize = 6;

/// Replace every occurrence of a known secret value with a keyed
/// placeholder.
pub fn redact<'a>(text: &str, secrets: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = text.to_string();
    for (key, value) in secrets {
        if value.len() < MIN_SECRET_LEN {
            continue;
        }
        if out.contains(value) {
            out = out.replace(value, &format!("[redacted:{}]", key));
        }
    }
    out
}
