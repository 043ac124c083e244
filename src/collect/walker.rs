use crate::error::{EesError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::ignore::IgnoreMatcher;
use super::CollectOptions;

/// A filesystem entry that survived ignore filtering during a directory walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    pub absolute_path: PathBuf,
    pub relative_path: String,
    pub size: u64,
}

/// Walk `root` and collect every file that survives ignore filtering.
///
/// The walk is depth-first; a directory rejected by the matcher is pruned and
/// never descended into. Unreadable entries are skipped with a warning rather
/// than aborting the walk. With `max_depth` set, files at the boundary depth
/// are still included but directories there are not descended into. The
/// result is sorted by relative path so repeated collections over an
/// unchanged tree compare equal.
///
/// A missing or non-directory root fails the whole call; no partial
/// collection is attempted.
pub fn collect_files(root: &Path, options: &CollectOptions) -> Result<Vec<CollectedFile>> {
    let meta = std::fs::metadata(root).map_err(|_| {
        EesError::DirectoryNotFound(root.display().to_string())
    })?;
    if !meta.is_dir() {
        return Err(EesError::DirectoryNotFound(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let matcher = IgnoreMatcher::new(root, &options.additional_ignore_patterns);

    let mut walker = WalkDir::new(root).follow_links(false);
    if let Some(depth) = options.max_depth {
        walker = walker.max_depth(depth);
    }

    let root_owned = root.to_path_buf();
    let iter = walker.into_iter().filter_entry(move |entry| {
        // The root itself is never filtered
        if entry.depth() == 0 {
            return true;
        }
        let rel = match entry.path().strip_prefix(&root_owned) {
            Ok(r) => r.to_string_lossy().to_string(),
            Err(_) => return true,
        };
        !matcher.matches(&rel, entry.file_type().is_dir())
    });

    let mut files = Vec::new();
    for entry in iter {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Skipping {} (no metadata): {}", entry.path().display(), e);
                continue;
            }
        };

        let relative_path = entry
            .path()
            .strip_prefix(root)
            .map_err(|_| {
                EesError::Config(format!(
                    "Failed to compute relative path for: {}",
                    entry.path().display()
                ))
            })?
            .to_string_lossy()
            .to_string();

        files.push(CollectedFile {
            absolute_path: entry.path().to_path_buf(),
            relative_path,
            size: metadata.len(),
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    log::debug!("Collected {} files in {}", files.len(), root.display());
    Ok(files)
}
