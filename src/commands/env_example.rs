//! Write the example environment artifact without resolving or running
//! hooks.

use super::helpers::{build_seeds, default_fetcher};
use crate::error::Result;
use crate::manifest::{example_env, FleetManifest};
use crate::plugins::PluginRegistry;
use crate::secrets;
use std::path::Path;

pub fn execute(manifest_path: &Path, output: Option<&Path>) -> Result<()> {
    let manifest = FleetManifest::load(manifest_path)?;
    let registry = PluginRegistry::load()?;

    let mut fetcher = default_fetcher();
    let (seeds, _identities) = build_seeds(&manifest, &mut fetcher)?;
    let mut schema = secrets::build_schema(manifest.provider, &seeds, &registry)?;
    secrets::overlay_existing(&mut schema, &manifest);

    let default_path = manifest_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(example_env::EXAMPLE_ENV_FILE);
    let path = output.unwrap_or(&default_path);

    example_env::write(path, &schema, &seeds)?;
    println!("Example env written to {}", path.display());
    Ok(())
}
