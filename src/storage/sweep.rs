//! Startup sweep for stale temp files.
//!
//! A crash mid-upload leaves a `<key>.tmp` file next to where the blob
//! would have landed (or in the S3 spool directory).  Every startup is a
//! recovery: the sweep walks the storage tree and removes temp files
//! older than the cutoff.  Committed blobs without a metadata row are
//! left alone -- they are invisible and their cost is bounded by the
//! rate of crashed uploads.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Temp-file suffix shared with the blob sinks.
const TEMP_SUFFIX: &str = ".tmp";

/// Default cutoff: temp files younger than this may belong to an
/// in-flight upload and are spared.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Remove `*.tmp` files under `root` older than `max_age`.
///
/// Returns the number of files removed.  A missing root is not an error
/// (the backend may not have written anything yet).
pub fn sweep_stale_temp(root: &Path, max_age: Duration) -> io::Result<usize> {
    if !root.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    sweep_dir(root, max_age, &mut removed)?;
    if removed > 0 {
        info!(count = removed, root = %root.display(), "swept stale temp files");
    }
    Ok(removed)
}

fn sweep_dir(dir: &Path, max_age: Duration, removed: &mut usize) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            sweep_dir(&path, max_age, removed)?;
            continue;
        }

        let is_temp = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(TEMP_SUFFIX));
        if !is_temp {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|t| t.elapsed().unwrap_or_default())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => *removed += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove stale temp file"),
        }
    }
    Ok(())
}
