use crate::{events::EventSink, fsops, pal, plan::ModPlan};
use anyhow::{Context, Result};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use time::{macros::format_description, OffsetDateTime};

/// Backup is deliberately copy-then-delete, never a directory rename:
/// it survives cross-volume backup roots and bulk-rename heuristics.
/// A source that cannot be removed after a successful copy is recorded
/// as a leftover instead of failing the operation.
#[derive(Debug)]
pub enum BackupOutcome {
    Completed {
        snapshot_dir: PathBuf,
        /// Root-relative paths copied into the snapshot but still
        /// present in the installation root.
        leftovers: Vec<String>,
    },
    /// The caller declined to stop the running game; nothing was
    /// copied or removed.
    Skipped,
}

/// The collaborator owns the "Palworld is running, close it?" prompt;
/// the engine only receives the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupGate {
    Proceed,
    Declined,
}

pub fn backup(
    root: &Path,
    plan: &ModPlan,
    gate: BackupGate,
    sink: &dyn EventSink,
) -> Result<BackupOutcome> {
    pal::validate_root(root)?;
    if gate == BackupGate::Declined {
        sink.log("Backup skipped: Palworld still running.".to_string());
        return Ok(BackupOutcome::Skipped);
    }

    let name = snapshot_name();
    let mut snapshot_dir = plan.backup_root.join(&name);
    if snapshot_dir.exists() {
        // Two backups within the same second; keep the name sortable.
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        snapshot_dir = plan.backup_root.join(format!("{name}-{nanos}"));
    }
    fs::create_dir_all(&snapshot_dir).context("create snapshot dir")?;
    let mut leftovers = Vec::new();

    for rel in &plan.mod_paths {
        let source = root.join(rel);
        if source.is_file() {
            fsops::copy_file(&source, &snapshot_dir.join(rel))?;
            sink.log(format!("Copy file {}", fsops::rel_key(rel)));
            if !fsops::remove_best_effort(&source) {
                leftovers.push(fsops::rel_key(rel));
            }
        } else if source.is_dir() {
            copy_tree_out(root, rel, &snapshot_dir, sink)?;
            sink.log(format!("Copy folder {}", fsops::rel_key(rel)));
            if !fsops::remove_best_effort(&source) {
                leftovers.push(fsops::rel_key(rel));
            }
        }
    }

    backup_loose_files(root, plan, &snapshot_dir, &mut leftovers, sink)?;

    sink.log("Backup complete.".to_string());
    Ok(BackupOutcome::Completed {
        snapshot_dir,
        leftovers,
    })
}

/// Sortable snapshot name; lexicographic order equals creation order.
fn snapshot_name() -> String {
    let format = format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
    OffsetDateTime::now_utc()
        .format(format)
        .unwrap_or_else(|_| "snapshot".to_string())
}

fn copy_tree_out(
    root: &Path,
    rel: &Path,
    snapshot_dir: &Path,
    sink: &dyn EventSink,
) -> Result<()> {
    let source = root.join(rel);
    for file in fsops::collect_files(&source)? {
        let rel_file = file.strip_prefix(root).context("strip root prefix")?;
        fsops::copy_file(&file, &snapshot_dir.join(rel_file))?;
        sink.log(format!("Copy file {}", fsops::rel_key(rel_file)));
    }
    Ok(())
}

/// Loose pak files sit directly in the loose area; everything but the
/// vanilla base-game archive is backed up the same copy-then-delete
/// way.
fn backup_loose_files(
    root: &Path,
    plan: &ModPlan,
    snapshot_dir: &Path,
    leftovers: &mut Vec<String>,
    sink: &dyn EventSink,
) -> Result<()> {
    let loose = root.join(&plan.loose_dir);
    if !loose.is_dir() {
        return Ok(());
    }

    let mut entries: Vec<fs::DirEntry> = fs::read_dir(&loose)
        .context("read loose pak dir")?
        .collect::<io::Result<Vec<_>>>()
        .context("read loose pak dir entry")?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if !path.is_file() || plan.is_vanilla(&entry.file_name()) {
            continue;
        }
        let rel = plan.loose_dir.join(entry.file_name());
        fsops::copy_file(&path, &snapshot_dir.join(&rel))?;
        sink.log(format!("Copy file {}", fsops::rel_key(&rel)));
        if !fsops::remove_best_effort(&path) {
            leftovers.push(fsops::rel_key(&rel));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullSink;
    use crate::plan::MARKER_EXE;
    use tempfile::TempDir;

    fn test_plan(temp: &TempDir) -> ModPlan {
        ModPlan {
            mod_paths: vec![PathBuf::from("mods"), PathBuf::from("loader.dll")],
            loose_dir: PathBuf::from("paks"),
            vanilla_pak: "Vanilla.pak".to_string(),
            manifest_name: "mod_manifest.json".to_string(),
            content_marker: "Pal".to_string(),
            backup_root: temp.path().join("backups"),
        }
    }

    fn make_root(temp: &TempDir) -> PathBuf {
        let root = temp.path().join("game");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join(MARKER_EXE), b"mz").unwrap();
        root
    }

    #[test]
    fn moves_mod_paths_and_loose_files_into_snapshot() {
        let temp = TempDir::new().unwrap();
        let root = make_root(&temp);
        let plan = test_plan(&temp);
        fs::create_dir_all(root.join("mods")).unwrap();
        fs::write(root.join("mods/a.bin"), b"mod a").unwrap();
        fs::write(root.join("loader.dll"), b"shim").unwrap();
        fs::create_dir_all(root.join("paks")).unwrap();
        fs::write(root.join("paks/custom1.pak"), b"custom").unwrap();
        fs::write(root.join("paks/Vanilla.pak"), b"vanilla").unwrap();

        let outcome = backup(&root, &plan, BackupGate::Proceed, &NullSink).unwrap();
        let BackupOutcome::Completed {
            snapshot_dir,
            leftovers,
        } = outcome
        else {
            panic!("expected completed backup");
        };

        assert!(leftovers.is_empty());
        assert_eq!(fs::read(snapshot_dir.join("mods/a.bin")).unwrap(), b"mod a");
        assert_eq!(fs::read(snapshot_dir.join("loader.dll")).unwrap(), b"shim");
        assert_eq!(
            fs::read(snapshot_dir.join("paks/custom1.pak")).unwrap(),
            b"custom"
        );
        // Moved, not copied: the originals are gone.
        assert!(!root.join("mods").exists());
        assert!(!root.join("loader.dll").exists());
        assert!(!root.join("paks/custom1.pak").exists());
        // The vanilla archive is never touched.
        assert!(root.join("paks/Vanilla.pak").exists());
        assert!(!snapshot_dir.join("paks/Vanilla.pak").exists());
    }

    #[test]
    fn declined_gate_is_an_explicit_skip() {
        let temp = TempDir::new().unwrap();
        let root = make_root(&temp);
        let plan = test_plan(&temp);
        fs::create_dir_all(root.join("mods")).unwrap();
        fs::write(root.join("mods/a.bin"), b"mod a").unwrap();

        let outcome = backup(&root, &plan, BackupGate::Declined, &NullSink).unwrap();
        assert!(matches!(outcome, BackupOutcome::Skipped));
        assert!(root.join("mods/a.bin").exists());
        assert!(!plan.backup_root.exists());
    }

    #[test]
    fn empty_root_still_completes_with_a_snapshot_dir() {
        let temp = TempDir::new().unwrap();
        let root = make_root(&temp);
        let plan = test_plan(&temp);

        let outcome = backup(&root, &plan, BackupGate::Proceed, &NullSink).unwrap();
        let BackupOutcome::Completed { snapshot_dir, .. } = outcome else {
            panic!("expected completed backup");
        };
        assert!(snapshot_dir.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn undeletable_source_is_reported_as_leftover() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let root = make_root(&temp);
        let mut plan = test_plan(&temp);
        plan.mod_paths = vec![PathBuf::from("lock/pinned.bin")];
        let lock_dir = root.join("lock");
        fs::create_dir_all(&lock_dir).unwrap();
        fs::write(lock_dir.join("pinned.bin"), b"stuck").unwrap();

        // Removing pinned.bin needs write permission on its parent.
        fs::set_permissions(&lock_dir, fs::Permissions::from_mode(0o555)).unwrap();
        if fs::write(lock_dir.join("permcheck"), b"").is_ok() {
            // Running with privileges that ignore the permission bits.
            fs::set_permissions(&lock_dir, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let outcome = backup(&root, &plan, BackupGate::Proceed, &NullSink).unwrap();
        fs::set_permissions(&lock_dir, fs::Permissions::from_mode(0o755)).unwrap();

        let BackupOutcome::Completed {
            snapshot_dir,
            leftovers,
        } = outcome
        else {
            panic!("expected completed backup");
        };
        assert_eq!(leftovers, vec!["lock/pinned.bin".to_string()]);
        // The snapshot copy is intact; only the source removal failed.
        assert_eq!(
            fs::read(snapshot_dir.join("lock/pinned.bin")).unwrap(),
            b"stuck"
        );
        assert!(root.join("lock/pinned.bin").exists());
    }

    #[test]
    fn invalid_root_refuses_to_start() {
        let temp = TempDir::new().unwrap();
        let plan = test_plan(&temp);
        let root = temp.path().join("not-a-game");
        fs::create_dir_all(&root).unwrap();
        assert!(backup(&root, &plan, BackupGate::Proceed, &NullSink).is_err());
    }

    #[test]
    fn log_events_name_root_relative_paths() {
        use crate::events::{ChannelSink, EngineEvent};
        use std::sync::mpsc;

        let temp = TempDir::new().unwrap();
        let root = make_root(&temp);
        let plan = test_plan(&temp);
        fs::create_dir_all(root.join("mods/sub")).unwrap();
        fs::write(root.join("mods/sub/deep.bin"), b"deep").unwrap();

        let (tx, rx) = mpsc::channel();
        let sink = ChannelSink::new(tx);
        backup(&root, &plan, BackupGate::Proceed, &sink).unwrap();
        drop(sink);

        let logs: Vec<String> = rx
            .iter()
            .filter_map(|event| match event {
                EngineEvent::Log(message) => Some(message),
                _ => None,
            })
            .collect();
        let file_line = logs
            .iter()
            .position(|line| line == "Copy file mods/sub/deep.bin")
            .unwrap();
        let folder_line = logs
            .iter()
            .position(|line| line == "Copy folder mods")
            .unwrap();
        // Per-file lines first, then the folder summary.
        assert!(file_line < folder_line);
        assert_eq!(logs.last().unwrap(), "Backup complete.");
    }
}
