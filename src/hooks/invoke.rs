//! External hook invocation: write the embedded script to a temp file, run
//! it under bash with a composed environment, capture stdout, bound the
//! wait with a generous timeout.
//!
//! The pipeline treats this as a synchronous invoke-and-await-result call;
//! there is no cancellation once the process is running.

use crate::error::{FleetError, Result};
use std::collections::BTreeMap;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Default upper bound on a single hook script.
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_secs(300);

/// Outcome of one script invocation. Exit-code-to-result mapping is the
/// script's responsibility; the engine only distinguishes ok from not.
#[derive(Debug)]
pub enum HookInvocation {
    /// Exit 0. `stdout` carries follow-up instructions or `KEY=VALUE`
    /// resolution lines, depending on the hook kind.
    Ok { stdout: String },
    /// Non-zero exit or timeout.
    Failed { detail: String },
}

fn drain_pipe<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut out = String::new();
        pipe.read_to_string(&mut out).ok();
        out
    })
}

/// Keep only characters safe for a temp file name.
fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect()
}

/// Run a hook script with the given environment on top of the process
/// environment (scripts still need PATH and HOME).
pub fn invoke(
    script_content: &str,
    script_name: &str,
    env: &BTreeMap<String, String>,
    timeout: Duration,
) -> Result<HookInvocation> {
    which::which("bash").map_err(|_| FleetError::HookRuntimeMissing("bash".to_string()))?;

    let safe_name = sanitize_filename(script_name);
    let temp_path = std::env::temp_dir().join(format!(
        "fleetctl-hook-{}-{}",
        std::process::id(),
        if safe_name.is_empty() { "script.sh" } else { &safe_name }
    ));
    std::fs::write(&temp_path, script_content)?;

    let mut child = Command::new("bash")
        .arg(&temp_path)
        .envs(env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    // Drain both pipes while waiting. A script writing more than the pipe
    // buffer would otherwise block forever and trip the timeout.
    let stdout_reader = child.stdout.take().map(drain_pipe);
    let stderr_reader = child.stderr.take().map(drain_pipe);

    let status = match child.wait_timeout(timeout)? {
        Some(status) => status,
        None => {
            child.kill().ok();
            child.wait().ok();
            if let Some(reader) = stdout_reader {
                reader.join().ok();
            }
            if let Some(reader) = stderr_reader {
                reader.join().ok();
            }
            std::fs::remove_file(&temp_path).ok();
            return Ok(HookInvocation::Failed {
                detail: format!("timed out after {}s", timeout.as_secs()),
            });
        }
    };

    let stdout = stdout_reader
        .and_then(|r| r.join().ok())
        .unwrap_or_default();
    let stderr = stderr_reader
        .and_then(|r| r.join().ok())
        .unwrap_or_default();

    std::fs::remove_file(&temp_path).ok();

    if status.success() {
        Ok(HookInvocation::Ok { stdout })
    } else {
        let detail = if stderr.trim().is_empty() {
            format!("exited with status {}", status.code().unwrap_or(-1))
        } else {
            format!(
                "exited with status {}: {}",
                status.code().unwrap_or(-1),
                stderr.trim()
            )
        };
        Ok(HookInvocation::Failed { detail })
    }
}

/// Parse `KEY=VALUE` lines from a resolve hook's stdout. Other lines are
/// ignored so scripts can log freely.
pub fn parse_resolution_lines(stdout: &str) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();
    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                values.insert(key.to_string(), value.trim().to_string());
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str, env: &[(&str, &str)]) -> HookInvocation {
        let env: BTreeMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        invoke(script, "test.sh", &env, Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_successful_invocation_captures_stdout() {
        let result = run("echo hello from hook", &[]);
        match result {
            HookInvocation::Ok { stdout } => assert_eq!(stdout.trim(), "hello from hook"),
            HookInvocation::Failed { detail } => panic!("unexpected failure: {}", detail),
        }
    }

    #[test]
    fn test_environment_passed_to_script() {
        let result = run("echo \"token=$MY_TOKEN\"", &[("MY_TOKEN", "secret-value")]);
        match result {
            HookInvocation::Ok { stdout } => assert_eq!(stdout.trim(), "token=secret-value"),
            HookInvocation::Failed { detail } => panic!("unexpected failure: {}", detail),
        }
    }

    #[test]
    fn test_failure_captures_stderr() {
        let result = run("echo broken >&2; exit 3", &[]);
        match result {
            HookInvocation::Failed { detail } => {
                assert!(detail.contains("status 3"));
                assert!(detail.contains("broken"));
            }
            HookInvocation::Ok { .. } => panic!("expected failure"),
        }
    }

    #[test]
    fn test_large_output_does_not_stall_the_wait() {
        // Well past the pipe buffer on any platform we run on
        let result = run("yes output-line | head -n 100000", &[]);
        match result {
            HookInvocation::Ok { stdout } => {
                assert!(stdout.len() > 65536);
                assert!(stdout.starts_with("output-line\n"));
            }
            HookInvocation::Failed { detail } => panic!("unexpected failure: {}", detail),
        }
    }

    #[test]
    fn test_timeout_reported_as_failure() {
        let env = BTreeMap::new();
        let result = invoke("sleep 30", "slow.sh", &env, Duration::from_millis(200)).unwrap();
        match result {
            HookInvocation::Failed { detail } => assert!(detail.contains("timed out")),
            HookInvocation::Ok { .. } => panic!("expected timeout"),
        }
    }

    #[test]
    fn test_parse_resolution_lines() {
        let stdout = "\n# log line\nchecking api...\nSLACK_TEAM_ID=T0123\nLINEAR_TEAM_ID = abc \nbad key=x\n";
        let values = parse_resolution_lines(stdout);
        assert_eq!(values.get("SLACK_TEAM_ID").map(String::as_str), Some("T0123"));
        assert_eq!(values.get("LINEAR_TEAM_ID").map(String::as_str), Some("abc"));
        assert_eq!(values.len(), 2);
    }
}
