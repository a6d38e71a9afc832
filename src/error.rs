use std::path::PathBuf;
use thiserror::Error;

/// Failures the caller is expected to distinguish. Everything else
/// travels as a plain `anyhow` error with context attached.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no Palworld.exe found in {0:?}")]
    InvalidRoot(PathBuf),
    #[error("invalid mod package: {0}")]
    InvalidArchive(String),
    #[error("no mod manifest found; install a mod pack first")]
    ManifestMissing,
    #[error("mod manifest is corrupt: {0}")]
    ManifestCorrupt(String),
}
