//! Discovery of dated snapshot directories.
//!
//! A match stands for a whole dated subtree, so the walk never descends into
//! a matched directory.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::RotateError;
use crate::template::TierPattern;

/// Find directories under `base/search` whose path relative to `base`
/// matches `pattern`.
///
/// Returned paths are relative to `base`, sorted by file name at each level.
/// A missing search directory yields no matches.
pub fn find_matches(
    base: &Path,
    search: &Path,
    pattern: &TierPattern,
) -> Result<Vec<PathBuf>, RotateError> {
    let start = base.join(search);
    let search_depth = search.components().count();
    if !start.is_dir() || search_depth >= pattern.depth() {
        return Ok(vec![]);
    }

    let mut matches = Vec::new();
    let mut walker = WalkDir::new(&start)
        .min_depth(1)
        .max_depth(pattern.depth() - search_depth)
        .sort_by_file_name()
        .into_iter();

    while let Some(entry) = walker.next() {
        let entry = entry?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
        if pattern.is_match(relative) {
            matches.push(relative.to_path_buf());
            walker.skip_current_dir();
        }
    }

    Ok(matches)
}
