use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::{fs::File, io::Read, path::Path};

const CHUNK_SIZE: usize = 1 << 20;

/// Streamed SHA-256 of a file, as 64 lowercase hex characters. Used
/// purely as an equality oracle for change detection.
pub fn fingerprint(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("open {:?} for hashing", path))?;
    let mut hasher = Sha256::new();
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut chunk)
            .with_context(|| format!("read {:?}", path))?;
        if read == 0 {
            break;
        }
        hasher.update(&chunk[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
