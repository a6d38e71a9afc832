use directories::UserDirs;
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};

pub const MARKER_EXE: &str = "Palworld.exe";
pub const PROCESS_NAME: &str = "Palworld";

/// Relative paths under the installation root that belong to the
/// installed mod set: the UE4SS loader, its signatures, the injector
/// shim and the two plugin pak folders.
const MOD_PATHS: &[&str] = &[
    "Pal/Binaries/Win64/mods",
    "Pal/Binaries/Win64/ue4ss",
    "Pal/Binaries/Win64/UE4SS_Signatures",
    "Pal/Binaries/Win64/dwmapi.dll",
    "Pal/Content/Paks/~mods",
    "Pal/Content/Paks/LogicMods",
];

const LOOSE_DIR: &str = "Pal/Content/Paks";
const VANILLA_PAK: &str = "Pal-Windows.pak";
const MANIFEST_NAME: &str = "mod_manifest.json";
const CONTENT_MARKER: &str = "Pal";
const BACKUP_DIR_NAME: &str = "Palworld Mods Backup";

/// Which paths the engine treats as mod-relevant, where loose pak files
/// live, and what is deliberately left alone. The engines take this as
/// a value so tests can run against a small substitute layout.
#[derive(Debug, Clone)]
pub struct ModPlan {
    pub mod_paths: Vec<PathBuf>,
    /// Top-level directory scanned for loose pak files.
    pub loose_dir: PathBuf,
    /// Base-game archive excluded from backup, manifest and rollback.
    pub vanilla_pak: String,
    pub manifest_name: String,
    /// Directory name inside a package that marks its content root.
    pub content_marker: String,
    pub backup_root: PathBuf,
}

impl ModPlan {
    pub fn palworld() -> Self {
        Self {
            mod_paths: MOD_PATHS.iter().map(PathBuf::from).collect(),
            loose_dir: PathBuf::from(LOOSE_DIR),
            vanilla_pak: VANILLA_PAK.to_string(),
            manifest_name: MANIFEST_NAME.to_string(),
            content_marker: CONTENT_MARKER.to_string(),
            backup_root: default_backup_root(),
        }
    }

    /// The vanilla archive is matched by file name alone, case
    /// insensitively, wherever it appears under the loose area.
    pub fn is_vanilla(&self, name: &OsStr) -> bool {
        name.to_string_lossy().eq_ignore_ascii_case(&self.vanilla_pak)
    }

    pub fn manifest_path(&self, root: &Path) -> PathBuf {
        root.join(&self.manifest_name)
    }
}

fn default_backup_root() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(|dir| dir.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(BACKUP_DIR_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vanilla_match_is_case_insensitive() {
        let plan = ModPlan::palworld();
        assert!(plan.is_vanilla(OsStr::new("Pal-Windows.pak")));
        assert!(plan.is_vanilla(OsStr::new("pal-windows.PAK")));
        assert!(!plan.is_vanilla(OsStr::new("custom1.pak")));
    }

    #[test]
    fn default_plan_covers_loader_and_pak_folders() {
        let plan = ModPlan::palworld();
        assert_eq!(plan.mod_paths.len(), 6);
        assert!(plan
            .mod_paths
            .contains(&PathBuf::from("Pal/Content/Paks/~mods")));
        assert_eq!(plan.loose_dir, PathBuf::from("Pal/Content/Paks"));
    }
}
