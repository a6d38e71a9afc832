use crate::{
    backup::{self, BackupGate, BackupOutcome},
    events::EventSink,
    fsops, pal,
    plan::ModPlan,
};
use anyhow::{bail, Context, Result};
use std::{fs, io, path::Path};

#[derive(Debug)]
pub enum RollbackOutcome {
    Completed {
        restored: usize,
        /// Where the pre-rollback state went, so a bad snapshot choice
        /// is itself recoverable.
        safety: BackupOutcome,
    },
    /// The caller declined to stop the running game; the installation
    /// root was not touched.
    Skipped,
}

/// Replays a snapshot onto the installation root. The current state is
/// backed up first, then every mod-relevant path and every non-vanilla
/// loose file is cleared so the snapshot is the sole source of truth.
pub fn rollback(
    root: &Path,
    snapshot_dir: &Path,
    plan: &ModPlan,
    gate: BackupGate,
    sink: &dyn EventSink,
) -> Result<RollbackOutcome> {
    pal::validate_root(root)?;
    if !snapshot_dir.is_dir() {
        bail!("backup directory {:?} does not exist", snapshot_dir);
    }

    let safety = backup::backup(root, plan, gate, sink)?;
    if matches!(safety, BackupOutcome::Skipped) {
        sink.log("Rollback skipped: Palworld still running.".to_string());
        return Ok(RollbackOutcome::Skipped);
    }

    // The safety backup already moved everything it could; clear what
    // its best-effort deletes left behind. Removal failures here are
    // tolerated for the same reason they are during backup.
    for rel in &plan.mod_paths {
        let path = root.join(rel);
        if !path.exists() {
            continue;
        }
        sink.log(format!("Delete {}", fsops::rel_key(rel)));
        if !fsops::remove_best_effort(&path) {
            sink.log(format!("Could not remove {}", fsops::rel_key(rel)));
        }
    }
    clear_loose_files(root, plan, sink)?;

    let files = fsops::collect_files(snapshot_dir)?;
    let total = files.len();
    for (index, file) in files.iter().enumerate() {
        let rel = file.strip_prefix(snapshot_dir).context("strip snapshot prefix")?;
        fsops::copy_file(file, &root.join(rel))?;
        sink.log(format!("Restore file {}", fsops::rel_key(rel)));
        sink.progress(index + 1, total);
    }

    sink.log("Rollback finished.".to_string());
    Ok(RollbackOutcome::Completed {
        restored: total,
        safety,
    })
}

fn clear_loose_files(root: &Path, plan: &ModPlan, sink: &dyn EventSink) -> Result<()> {
    let loose = root.join(&plan.loose_dir);
    if !loose.is_dir() {
        return Ok(());
    }

    let entries: Vec<fs::DirEntry> = fs::read_dir(&loose)
        .context("read loose pak dir")?
        .collect::<io::Result<Vec<_>>>()
        .context("read loose pak dir entry")?;

    for entry in entries {
        let path = entry.path();
        if !path.is_file() || plan.is_vanilla(&entry.file_name()) {
            continue;
        }
        let rel = plan.loose_dir.join(entry.file_name());
        sink.log(format!("Delete file {}", fsops::rel_key(&rel)));
        if !fsops::remove_best_effort(&path) {
            sink.log(format!("Could not remove {}", fsops::rel_key(&rel)));
        }
    }

    Ok(())
}
