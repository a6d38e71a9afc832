use crate::{
    archive,
    error::EngineError,
    events::EventSink,
    fsops, hash,
    manifest::{self, Manifest},
    pal,
    plan::ModPlan,
};
use anyhow::{Context, Result};
use std::path::Path;

/// Unpacks a mod package into the installation root and records a
/// fresh manifest. The package must contain a directory named after
/// the plan's content marker; its contents land at `<root>/<marker>`,
/// overwriting whatever is there. Returns the number of files copied.
pub fn install(
    root: &Path,
    archive_path: &Path,
    plan: &ModPlan,
    sink: &dyn EventSink,
) -> Result<usize> {
    pal::validate_root(root)?;

    // Staging is removed when the guard drops, on every exit path.
    let staging = archive::extract(archive_path)?;
    sink.log("Extracted mod package.".to_string());

    let content_root = archive::locate_content_root(staging.path(), &plan.content_marker)
        .ok_or_else(|| {
            EngineError::InvalidArchive(format!(
                "package lacks a '{}' folder",
                plan.content_marker
            ))
        })?;

    let files = fsops::collect_files(&content_root)?;
    let total = files.len();
    let dest_root = root.join(&plan.content_marker);
    for (index, file) in files.iter().enumerate() {
        let rel = file.strip_prefix(&content_root).context("strip content root")?;
        fsops::copy_file(file, &dest_root.join(rel))?;
        let logged = Path::new(&plan.content_marker).join(rel);
        sink.log(format!("Copy file {}", fsops::rel_key(&logged)));
        sink.progress(index + 1, total);
    }

    let manifest = build_manifest(root, plan)?;
    manifest::save(root, &plan.manifest_name, &manifest)?;
    sink.log("Manifest saved.".to_string());
    sink.log("Installation finished.".to_string());
    Ok(total)
}

/// Re-hashes every file now present under the installed content path,
/// excluding the vanilla base-game archive wherever it appears.
pub fn build_manifest(root: &Path, plan: &ModPlan) -> Result<Manifest> {
    let mut manifest = Manifest::new();
    let content_dir = root.join(&plan.content_marker);
    if !content_dir.is_dir() {
        return Ok(manifest);
    }
    for file in fsops::collect_files(&content_dir)? {
        let Some(name) = file.file_name() else {
            continue;
        };
        if plan.is_vanilla(name) {
            continue;
        }
        let rel = file.strip_prefix(root).context("strip root prefix")?;
        manifest.insert(fsops::rel_key(rel), hash::fingerprint(&file)?);
    }
    Ok(manifest)
}
