//! Identity manifests and the repository adapter.
//!
//! An identity is a reusable, versioned definition of one agent's persona
//! and requirements. The adapter turns a reference (local path or remote
//! locator) into a validated manifest plus a file set, cached by reference.

use crate::error::{FleetError, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name an identity directory must contain.
pub const IDENTITY_FILE: &str = "identity.toml";

/// Identity manifest. Immutable once fetched; identified by its source
/// reference.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityManifest {
    pub name: String,
    pub role: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub emoji: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub volume_size: Option<u32>,

    #[serde(default)]
    pub skills: Vec<String>,

    /// Template variable names the identity's files expect
    #[serde(default)]
    pub template_vars: Vec<String>,

    #[serde(default)]
    pub plugins: Vec<String>,

    #[serde(default)]
    pub deps: Vec<String>,

    /// Ad-hoc secret env vars not covered by a plugin or dep
    #[serde(default)]
    pub required_secrets: Vec<String>,

    /// Default inline config per plugin, merged by the assembler
    #[serde(default)]
    pub plugin_defaults: BTreeMap<String, serde_json::Value>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub backup_model: Option<String>,

    #[serde(default)]
    pub coding_agent: Option<String>,
}

impl IdentityManifest {
    pub fn models(&self) -> Vec<String> {
        self.model
            .iter()
            .chain(self.backup_model.iter())
            .cloned()
            .collect()
    }
}

/// An identity manifest plus its file set.
#[derive(Debug, Clone)]
pub struct FetchedIdentity {
    pub reference: String,
    pub manifest: IdentityManifest,
    pub files: BTreeMap<String, String>,
}

/// Adapter over identity storage. Remote mechanics are a black box behind
/// this trait; the engine only sees manifest + files.
pub trait IdentitySource {
    fn fetch(&self, reference: &str, cache_dir: &Path) -> Result<FetchedIdentity>;
}

/// Reads identities from local directories; remote references are served
/// from a cache directory keyed by reference hash, populated out of band.
pub struct LocalIdentitySource;

impl IdentitySource for LocalIdentitySource {
    fn fetch(&self, reference: &str, cache_dir: &Path) -> Result<FetchedIdentity> {
        let dir = if is_remote_reference(reference) {
            let cached = cache_dir.join(format!("{:x}", md5::compute(reference)));
            if !cached.is_dir() {
                return Err(FleetError::IdentityResolution {
                    reference: reference.to_string(),
                    message: format!(
                        "remote identity not present in cache ({})",
                        cached.display()
                    ),
                });
            }
            cached
        } else {
            PathBuf::from(reference)
        };

        read_identity_dir(reference, &dir)
    }
}

fn is_remote_reference(reference: &str) -> bool {
    reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("github:")
}

fn read_identity_dir(reference: &str, dir: &Path) -> Result<FetchedIdentity> {
    let manifest_path = dir.join(IDENTITY_FILE);
    if !manifest_path.exists() {
        return Err(FleetError::IdentityResolution {
            reference: reference.to_string(),
            message: format!("no {} under {}", IDENTITY_FILE, dir.display()),
        });
    }

    let contents = fs::read_to_string(&manifest_path).map_err(|e| FleetError::IdentityResolution {
        reference: reference.to_string(),
        message: e.to_string(),
    })?;
    let manifest: IdentityManifest =
        toml::from_str(&contents).map_err(|e| FleetError::IdentityResolution {
            reference: reference.to_string(),
            message: format!("invalid manifest: {}", e),
        })?;
    validate_identity(reference, &manifest)?;

    let mut files = BTreeMap::new();
    collect_files(dir, dir, &mut files)?;

    Ok(FetchedIdentity {
        reference: reference.to_string(),
        manifest,
        files,
    })
}

fn validate_identity(reference: &str, manifest: &IdentityManifest) -> Result<()> {
    if manifest.name.is_empty() {
        return Err(FleetError::IdentityResolution {
            reference: reference.to_string(),
            message: "identity name cannot be empty".to_string(),
        });
    }
    if manifest.role.is_empty() {
        return Err(FleetError::IdentityResolution {
            reference: reference.to_string(),
            message: format!("identity '{}' has no role", manifest.name),
        });
    }
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else if let Ok(content) = fs::read_to_string(&path) {
            // Binary files are skipped; identities carry text templates
            let rel = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .to_string();
            files.insert(rel, content);
        }
    }
    Ok(())
}

/// Caches fetches per reference within one pass.
pub struct IdentityFetcher<S: IdentitySource> {
    source: S,
    cache_dir: PathBuf,
    cache: HashMap<String, Arc<FetchedIdentity>>,
}

impl<S: IdentitySource> IdentityFetcher<S> {
    pub fn new(source: S, cache_dir: PathBuf) -> Self {
        Self {
            source,
            cache_dir,
            cache: HashMap::new(),
        }
    }

    pub fn fetch(&mut self, reference: &str) -> Result<Arc<FetchedIdentity>> {
        if let Some(cached) = self.cache.get(reference) {
            return Ok(cached.clone());
        }
        let fetched = Arc::new(self.source.fetch(reference, &self.cache_dir)?);
        self.cache.insert(reference.to_string(), fetched.clone());
        Ok(fetched)
    }
}

/// Discover identity directories under a root: every child directory
/// containing an `identity.toml`. Used during manifest repair.
pub fn discover_identities(root: &Path) -> Result<Vec<FetchedIdentity>> {
    let mut found = Vec::new();
    if !root.is_dir() {
        return Ok(found);
    }

    let mut dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir() && p.join(IDENTITY_FILE).exists())
        .collect();
    dirs.sort();

    for dir in dirs {
        let reference = dir.to_string_lossy().to_string();
        found.push(read_identity_dir(&reference, &dir)?);
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDENTITY: &str = r##"
        name = "eng"
        role = "eng"
        displayName = "Engineer"
        emoji = ":wrench:"
        plugins = ["slack"]
        deps = ["github"]
        requiredSecrets = ["CUSTOM_TOKEN"]
        model = "claude-sonnet-4"
        backupModel = "gpt-5"

        [pluginDefaults.slack]
        channel = "#eng"
    "##;

    fn write_identity(dir: &Path, content: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(IDENTITY_FILE), content).unwrap();
        fs::write(dir.join("SOUL.md"), "# eng\n").unwrap();
    }

    #[test]
    fn test_fetch_local_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("eng");
        write_identity(&dir, IDENTITY);

        let source = LocalIdentitySource;
        let fetched = source
            .fetch(dir.to_str().unwrap(), tmp.path())
            .unwrap();

        assert_eq!(fetched.manifest.name, "eng");
        assert_eq!(fetched.manifest.plugins, vec!["slack"]);
        assert_eq!(fetched.manifest.models(), vec!["claude-sonnet-4", "gpt-5"]);
        assert!(fetched.files.contains_key("SOUL.md"));
        assert!(fetched.manifest.plugin_defaults.contains_key("slack"));
    }

    #[test]
    fn test_fetch_missing_identity() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LocalIdentitySource
            .fetch(tmp.path().join("missing").to_str().unwrap(), tmp.path())
            .unwrap_err();
        assert!(matches!(err, FleetError::IdentityResolution { .. }));
    }

    #[test]
    fn test_fetch_invalid_identity_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("bad");
        write_identity(&dir, "name = \"bad\"\nrole = \"\"\n");

        let err = LocalIdentitySource
            .fetch(dir.to_str().unwrap(), tmp.path())
            .unwrap_err();
        assert!(err.to_string().contains("no role"));
    }

    #[test]
    fn test_remote_reference_requires_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LocalIdentitySource
            .fetch("https://example.com/identities/eng", tmp.path())
            .unwrap_err();
        assert!(err.to_string().contains("cache"));
    }

    #[test]
    fn test_fetcher_caches_by_reference() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("eng");
        write_identity(&dir, IDENTITY);
        let reference = dir.to_string_lossy().to_string();

        let mut fetcher =
            IdentityFetcher::new(LocalIdentitySource, tmp.path().to_path_buf());
        let first = fetcher.fetch(&reference).unwrap();

        // Delete the directory; the cached fetch must still serve it
        fs::remove_dir_all(&dir).unwrap();
        let second = fetcher.fetch(&reference).unwrap();
        assert_eq!(first.manifest.name, second.manifest.name);
    }

    #[test]
    fn test_discover_identities() {
        let tmp = tempfile::tempdir().unwrap();
        write_identity(&tmp.path().join("eng"), IDENTITY);
        write_identity(
            &tmp.path().join("ops"),
            "name = \"ops\"\nrole = \"ops\"\n",
        );
        fs::create_dir_all(tmp.path().join("not-an-identity")).unwrap();

        let found = discover_identities(tmp.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].manifest.name, "eng");
        assert_eq!(found[1].manifest.name, "ops");
    }
}
