use crate::error::EngineError;
use anyhow::{Context, Result};
use filetime::{set_file_mtime, FileTime};
use std::{
    ffi::OsStr,
    fs, io,
    io::Read,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use time::{Date, Month, PrimitiveDateTime, Time as TimeOfDay};
use walkdir::WalkDir;

const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Cheap signature check so garbage input fails before extraction.
pub fn is_zip(path: &Path) -> Result<bool> {
    let mut file = fs::File::open(path).with_context(|| format!("open archive {:?}", path))?;
    let mut magic = [0u8; 4];
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == ZIP_MAGIC),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err).context("read archive header"),
    }
}

/// Staging directory that removes itself when dropped, success or not.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}

static STAGING_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn make_staging_dir(archive: &Path) -> Result<StagingDir> {
    // Colocated with the archive so extraction stays on one volume.
    let parent = match archive.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let counter = STAGING_COUNTER.fetch_add(1, Ordering::Relaxed);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let stem = archive
        .file_stem()
        .unwrap_or_else(|| OsStr::new("package"))
        .to_string_lossy()
        .into_owned();
    let path = parent.join(format!("{stem}-staging-{nanos}-{counter}"));
    fs::create_dir_all(&path).context("create staging dir")?;
    Ok(StagingDir { path })
}

/// Validates the signature, then unpacks the package next to itself.
/// The returned guard owns the staging tree.
pub fn extract(path: &Path) -> Result<StagingDir> {
    if !is_zip(path)? {
        return Err(
            EngineError::InvalidArchive("not a ZIP archive (bad signature)".to_string()).into(),
        );
    }
    let staging = make_staging_dir(path)?;
    extract_zip(path, staging.path())?;
    Ok(staging)
}

fn extract_zip(path: &Path, dest: &Path) -> Result<()> {
    let file = fs::File::open(path).context("open zip")?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|err| EngineError::InvalidArchive(format!("unreadable ZIP: {err}")))?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i).context("zip entry")?;
        let Some(out_path) = file.enclosed_name() else {
            continue;
        };

        let out_path = dest.join(out_path);
        if file.is_dir() {
            fs::create_dir_all(&out_path).context("create zip dir")?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).context("create zip dir")?;
        }

        let mut out_file = fs::File::create(&out_path).context("write zip entry")?;
        io::copy(&mut file, &mut out_file).context("extract zip entry")?;
        if let Some(dt) = file.last_modified() {
            if let Some(mtime) = zip_time_to_unix(dt) {
                let mtime = FileTime::from_unix_time(mtime, 0);
                let _ = set_file_mtime(&out_path, mtime);
            }
        }
    }

    Ok(())
}

fn zip_time_to_unix(dt: zip::DateTime) -> Option<i64> {
    let month = Month::try_from(dt.month()).ok()?;
    let date = Date::from_calendar_date(dt.year() as i32, month, dt.day()).ok()?;
    let time = TimeOfDay::from_hms(dt.hour(), dt.minute(), dt.second()).ok()?;
    let datetime = PrimitiveDateTime::new(date, time).assume_utc();
    Some(datetime.unix_timestamp())
}

/// Finds the directory named `marker` anywhere under the staging tree.
/// The walk is sorted by file name, so when several candidates exist
/// the first one in depth-first lexicographic order wins.
pub fn locate_content_root(staging: &Path, marker: &str) -> Option<PathBuf> {
    WalkDir::new(staging)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_dir() && entry.file_name() == OsStr::new(marker))
        .map(|entry| entry.into_path())
}
