use crate::error::EngineError;
use anyhow::{Context, Result};
use std::{collections::BTreeMap, fs, path::Path};

/// Root-relative path (forward slashes) to content fingerprint.
/// A `BTreeMap` keeps the serialized form stable between installs.
pub type Manifest = BTreeMap<String, String>;

/// Writes the manifest beside the game executable, replacing any
/// previous one.
pub fn save(root: &Path, name: &str, manifest: &Manifest) -> Result<()> {
    let raw = serde_json::to_string_pretty(manifest).context("serialize manifest")?;
    fs::write(root.join(name), raw).context("write manifest")?;
    Ok(())
}

pub fn load(root: &Path, name: &str) -> Result<Manifest> {
    let path = root.join(name);
    if !path.exists() {
        return Err(EngineError::ManifestMissing.into());
    }
    let raw = fs::read_to_string(&path).context("read manifest")?;
    let manifest =
        serde_json::from_str(&raw).map_err(|err| EngineError::ManifestCorrupt(err.to_string()))?;
    Ok(manifest)
}
