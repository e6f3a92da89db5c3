//! Folder analysis: partition input paths into albums and singles
//!
//! An album is a leaf directory whose audio content is one flat set of
//! files. Directories matching a singles pattern contribute every
//! audio file beneath them to the singles list instead. Audio files
//! stranded next to subdirectories belong to no album; they are
//! surfaced to the operator and dropped rather than guessed at.

use super::format_classifier::supported_extension;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use tracing::warn;
use walkdir::WalkDir;

/// Result of analyzing the input paths.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Album directory -> member audio files, in discovery order.
    pub albums: BTreeMap<PathBuf, Vec<PathBuf>>,
    /// Files processed individually, outside any album.
    pub singles: Vec<PathBuf>,
}

impl Classification {
    pub fn is_empty(&self) -> bool {
        self.albums.is_empty() && self.singles.is_empty()
    }

    /// Total number of audio files across albums and singles.
    pub fn file_count(&self) -> usize {
        self.albums.values().map(Vec::len).sum::<usize>() + self.singles.len()
    }
}

/// Match a path against the configured singles patterns.
///
/// Three modes, any match wins: whole-path equality, suffix match at a
/// path-segment boundary, and plain substring containment.
pub fn matches_singles_pattern(path: &Path, patterns: &[String]) -> bool {
    let path_str = path.to_string_lossy();
    for pattern in patterns {
        if pattern.is_empty() {
            continue;
        }
        if path_str == pattern.as_str() {
            return true;
        }
        if path_str.ends_with(&format!("{}{}", MAIN_SEPARATOR, pattern)) {
            return true;
        }
        if path_str.contains(pattern.as_str()) {
            return true;
        }
    }
    false
}

/// Partition the input paths into albums and singles.
///
/// Input errors (missing paths, unsupported extensions) are reported
/// per item and never abort the batch.
pub fn analyze(paths: &[PathBuf], singles_patterns: &[String]) -> Classification {
    let mut result = Classification::default();

    for path in paths {
        let metadata = match std::fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Input path not accessible, skipping");
                continue;
            }
        };

        if metadata.is_file() {
            if supported_extension(path).is_some() {
                result.singles.push(path.clone());
            } else {
                warn!(path = %path.display(), "Unsupported file extension, skipping");
            }
        } else if metadata.is_dir() {
            if matches_singles_pattern(path, singles_patterns) {
                collect_singles(path, &mut result.singles);
            } else {
                analyze_dir(path, singles_patterns, &mut result);
            }
        } else {
            warn!(path = %path.display(), "Not a regular file or directory, skipping");
        }
    }

    result
}

/// Recurse into a non-singles directory.
fn analyze_dir(dir: &Path, patterns: &[String], result: &mut Classification) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "Cannot list directory, skipping");
            return;
        }
    };

    let mut subdirs = Vec::new();
    let mut audio_files = Vec::new();
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if supported_extension(&path).is_some() {
            audio_files.push(path);
        }
    }
    subdirs.sort();
    audio_files.sort();

    if subdirs.is_empty() {
        // Leaf directory: an album iff it holds audio. Empty leaves
        // produce nothing.
        if !audio_files.is_empty() {
            result.albums.insert(dir.to_path_buf(), audio_files);
        }
        return;
    }

    // Mixed content: audio files sitting beside subdirectories belong
    // to no album. Surface them and drop them.
    for stray in &audio_files {
        warn!(
            file = %stray.display(),
            "Audio file sits beside subfolders and belongs to no album, skipping"
        );
    }

    for sub in subdirs {
        if matches_singles_pattern(&sub, patterns) {
            collect_singles(&sub, &mut result.singles);
        } else {
            analyze_dir(&sub, patterns, result);
        }
    }
}

/// Recursively collect every audio file under a singles directory,
/// nested subfolders included.
fn collect_singles(dir: &Path, singles: &mut Vec<PathBuf>) {
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
    {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let path = entry.path();
                if supported_extension(path).is_some() {
                    singles.push(path.to_path_buf());
                }
            }
            Ok(_) => {}
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "Error while walking singles directory");
            }
        }
    }
}
