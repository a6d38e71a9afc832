use anyhow::{Context, Result};
use filetime::{set_file_mtime, FileTime};
use std::{
    fs,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};
use walkdir::WalkDir;

/// Forward-slash form of a root-relative path, used for manifest keys
/// and log lines so they read the same on every platform.
pub fn rel_key(rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .map(|part| part.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

/// Copies one file, creating parent directories and carrying the
/// source mtime over.
pub fn copy_file(source: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).context("create file dir")?;
    }
    fs::copy(source, dest).with_context(|| format!("copy {:?} -> {:?}", source, dest))?;
    preserve_mtime(source, dest);
    Ok(())
}

/// Every file under `root`, depth first, sorted by file name so
/// callers see a deterministic order.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = entry.with_context(|| format!("walk {:?}", root))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Removes a file or directory tree. Best effort: the caller decides
/// whether a `false` return matters.
pub fn remove_best_effort(path: &Path) -> bool {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.is_ok()
}

pub fn preserve_mtime(source: &Path, dest: &Path) {
    let Ok(meta) = fs::metadata(source) else {
        return;
    };
    let Ok(modified) = meta.modified() else {
        return;
    };
    let Ok(duration) = modified.duration_since(UNIX_EPOCH) else {
        return;
    };
    let mtime = FileTime::from_unix_time(duration.as_secs() as i64, 0);
    let _ = set_file_mtime(dest, mtime);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rel_key_uses_forward_slashes() {
        assert_eq!(rel_key(Path::new("Pal/mods/a.bin")), "Pal/mods/a.bin");
        assert_eq!(rel_key(Path::new("a.bin")), "a.bin");
    }

    #[test]
    fn copy_file_creates_parents() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("a.bin");
        fs::write(&source, b"payload").unwrap();
        let dest = temp.path().join("deep/nested/a.bin");
        copy_file(&source, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), b"payload");
    }

    #[test]
    fn collect_files_is_sorted_and_recursive() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("b/sub")).unwrap();
        fs::write(temp.path().join("b/sub/z.bin"), b"z").unwrap();
        fs::write(temp.path().join("a.bin"), b"a").unwrap();
        let files = collect_files(temp.path()).unwrap();
        let rels: Vec<String> = files
            .iter()
            .map(|file| rel_key(file.strip_prefix(temp.path()).unwrap()))
            .collect();
        assert_eq!(rels, vec!["a.bin", "b/sub/z.bin"]);
    }

    #[test]
    fn remove_best_effort_handles_files_and_dirs() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.bin");
        fs::write(&file, b"x").unwrap();
        let dir = temp.path().join("tree");
        fs::create_dir_all(dir.join("inner")).unwrap();
        assert!(remove_best_effort(&file));
        assert!(remove_best_effort(&dir));
        assert!(!file.exists());
        assert!(!dir.exists());
    }
}
