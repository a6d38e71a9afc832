use crate::{error::EngineError, plan::MARKER_EXE};
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

pub const GAME_NAME: &str = "Palworld";

/// Every operation anchors its relative paths on the directory that
/// holds the marker executable.
pub fn validate_root(root: &Path) -> Result<()> {
    if looks_like_game_root(root) {
        Ok(())
    } else {
        Err(EngineError::InvalidRoot(root.to_path_buf()).into())
    }
}

pub fn looks_like_game_root(path: &Path) -> bool {
    path.join(MARKER_EXE).is_file()
}

/// Best-effort scan of the local Steam libraries for the Palworld
/// install directory. Returns `None` when nothing plausible is found;
/// the caller then has to pass `--root` explicitly.
pub fn find_game_root() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(home) = dirs_home() {
        candidates.push(home.join(".local/share/Steam"));
        candidates.push(home.join(".steam/steam"));
    }

    let mut libraries = Vec::new();
    for base in candidates {
        let vdf = base.join("steamapps/libraryfolders.vdf");
        if vdf.exists() {
            if let Ok(paths) = parse_steam_library_paths(&vdf) {
                libraries.extend(paths);
            }
        }
        libraries.push(base);
    }

    for lib in libraries {
        let candidate = lib.join("steamapps/common").join(GAME_NAME);
        if looks_like_game_root(&candidate) {
            return Some(candidate);
        }
    }

    None
}

fn parse_steam_library_paths(path: &Path) -> Result<Vec<PathBuf>> {
    let raw = fs::read_to_string(path).context("read libraryfolders.vdf")?;
    let mut paths = Vec::new();

    for line in raw.lines() {
        let line = line.trim();
        if !line.contains("\"path\"") {
            continue;
        }

        let parts: Vec<&str> = line.split('"').collect();
        if parts.len() >= 4 {
            let path = parts[3].replace("\\\\", "\\");
            paths.push(PathBuf::from(path));
        }
    }

    Ok(paths)
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}
