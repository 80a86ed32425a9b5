//! Duplicate reporting
//!
//! Every group with more than one member is a duplicate in the strict sense,
//! but most of those are the same photo imported from several backup trees
//! under the same name. Those are expected and not reported. A group is
//! reported only when its members do not all share one file name (compared
//! case-insensitively), which usually means the same picture was saved twice
//! under different names.
//!
//! # Example
//!
//! ```rust,no_run
//! use photo_store::core::cache::MetadataCache;
//! use photo_store::duplicate::{find_duplicates, Fingerprinter};
//! use std::path::Path;
//!
//! let store = MetadataCache::in_output_dir(Path::new("/backup/by-date"))
//!     .load(Fingerprinter::default());
//! for group in find_duplicates(&store) {
//!     println!("possible duplicates for {}", group.hash);
//!     for path in &group.files {
//!         println!("  {}", path.display());
//!     }
//! }
//! ```

use crate::core::store::{FingerprintGroup, PhotoStore};
use log::info;
use std::path::Path;

/// Totals for a duplicate report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuplicateStats {
    /// Number of reported groups
    pub groups: usize,
    /// Number of files in reported groups
    pub files: usize,
    /// Files beyond the first in each reported group
    pub redundant_files: usize,
    /// Bytes held by the redundant files
    pub redundant_bytes: u64,
}

impl DuplicateStats {
    /// Summarize a set of reported groups
    pub fn from_groups(groups: &[&FingerprintGroup]) -> Self {
        let mut stats = Self::default();
        for group in groups {
            let extra = group.files.len().saturating_sub(1);
            stats.groups += 1;
            stats.files += group.files.len();
            stats.redundant_files += extra;
            stats.redundant_bytes += group.size * extra as u64;
        }
        stats
    }
}

/// Groups that look like unintended duplicates, in store order
pub fn find_duplicates(store: &PhotoStore) -> Vec<&FingerprintGroup> {
    store
        .groups()
        .iter()
        .filter(|group| is_reportable(group))
        .collect()
}

/// True if `group` has several members with differing file names
pub fn is_reportable(group: &FingerprintGroup) -> bool {
    let Some((first, rest)) = group.files.split_first() else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }

    let first_name = normalized_name(first);
    rest.iter().any(|path| normalized_name(path) != first_name)
}

/// Lowercased final path component
fn normalized_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Report text: a heading per group, its member paths, then the count
///
/// Empty when nothing is reported.
pub fn report_lines(groups: &[&FingerprintGroup]) -> Vec<String> {
    let mut lines = Vec::new();
    for group in groups {
        lines.push(format!("possible duplicates for {}", group.hash));
        lines.extend(group.files.iter().map(|path| path.display().to_string()));
    }
    if !groups.is_empty() {
        lines.push(format!("found {} possible duplicates", groups.len()));
    }
    lines
}

/// Log the report at info level so it shows without `--verbose`
///
/// Returns the report's totals for the caller to present.
pub fn log_duplicates(groups: &[&FingerprintGroup]) -> DuplicateStats {
    for line in report_lines(groups) {
        info!("{}", line);
    }
    DuplicateStats::from_groups(groups)
}
