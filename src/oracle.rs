use std::fs;
use std::path::Path;

use tracing::debug;

/// True when `path` is a regular, non-empty file.
///
/// A zero-length file is what an interrupted tool leaves behind, so it does
/// not count as a completed artifact.
pub fn exists(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}

/// True when every path exists.
pub fn all_exist<'a>(paths: impl IntoIterator<Item = &'a Path>) -> bool {
    for path in paths {
        if !exists(path) {
            return false;
        }
        debug!(path = %path.display(), "artifact present");
    }
    true
}
