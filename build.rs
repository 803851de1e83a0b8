use std::env;
use std::process::Command;

/// Run a git subcommand, returning trimmed stdout on success.
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn main() {
    let base = env::var("CARGO_PKG_VERSION").unwrap();

    // Release builds report the bare crate version; debug builds carry the
    // commit so a bug report pins the exact tree.
    let version = if env::var("PROFILE").as_deref() == Ok("debug") {
        let hash = git(&["rev-parse", "--short=8", "HEAD"]);
        let dirty = git(&["status", "--porcelain"]).is_some_and(|s| !s.is_empty());
        match (hash, dirty) {
            (Some(hash), true) => format!("{}-dev+{}.dirty", base, hash),
            (Some(hash), false) => format!("{}-dev+{}", base, hash),
            (None, _) => format!("{}-dev", base),
        }
    } else {
        base
    };

    println!("cargo:rustc-env=FLEETCTL_VERSION={}", version);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads/");
}
