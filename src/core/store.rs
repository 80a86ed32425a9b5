//! Fingerprint-keyed metadata store
//!
//! The store maps each fingerprint to a [`FingerprintGroup`]: every path seen
//! with that fingerprint, in first-seen order, plus the size and date of the
//! most recently added member. A reverse index from path to group makes
//! ingestion idempotent: adding a known path returns without touching disk.
//!
//! The first path in a group is its representative. It never changes once
//! set and is the only member linked into the output tree.
//!
//! # Example
//!
//! ```rust,no_run
//! use photo_store::core::store::PhotoStore;
//! use photo_store::duplicate::Fingerprinter;
//! use std::ops::ControlFlow;
//! use std::path::Path;
//!
//! let mut store = PhotoStore::new(Fingerprinter::default());
//! let summary = store
//!     .add_directory(Path::new("/photos/2020"), false, |_| ControlFlow::Continue(()))
//!     .unwrap();
//! println!("added {} files, {} groups", summary.added, store.group_count());
//! ```

use crate::core::date::resolve_date;
use crate::core::error::{Result, StoreError};
use crate::duplicate::fingerprint::Fingerprinter;
use log::{debug, trace, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// All files sharing one fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintGroup {
    /// Fingerprint of every member
    #[serde(default)]
    pub hash: String,
    /// Size of the most recently added member
    #[serde(default)]
    pub size: u64,
    /// Date of the most recently added member; may be empty
    #[serde(default, deserialize_with = "nullable_string")]
    pub date: String,
    /// Member paths in first-seen order; the first is the representative
    pub files: Vec<PathBuf>,
}

impl FingerprintGroup {
    /// The member linked into the output tree
    pub fn representative(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }
}

/// Treat a JSON `null` date as empty
fn nullable_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// What `add_file` did with a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The path was fingerprinted and recorded
    Added,
    /// The path was already in the store; nothing was read
    AlreadyKnown,
}

/// Progress information for ingestion
#[derive(Debug, Clone)]
pub struct IngestProgress<'a> {
    /// Number of files handled so far, including this one
    pub current: usize,
    /// Total files in this batch
    pub total: usize,
    /// File just handled
    pub path: &'a Path,
}

/// Outcome of ingesting a batch of files
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// Files fingerprinted and recorded
    pub added: usize,
    /// Files skipped because they were already known
    pub already_known: usize,
    /// Files that could not be read, with the reason
    pub failures: Vec<(PathBuf, StoreError)>,
    /// True if the progress callback stopped the batch early
    pub interrupted: bool,
}

impl IngestSummary {
    /// Fold another batch's counts into this one
    pub fn merge(&mut self, other: IngestSummary) {
        self.added += other.added;
        self.already_known += other.already_known;
        self.failures.extend(other.failures);
        self.interrupted |= other.interrupted;
    }
}

/// In-memory fingerprint store
#[derive(Debug, Default)]
pub struct PhotoStore {
    /// Groups in the order their fingerprints were first seen
    groups: Vec<FingerprintGroup>,

    /// Fingerprint -> index into `groups`
    hash_index: HashMap<String, usize>,

    /// Path -> index into `groups`
    path_index: HashMap<PathBuf, usize>,

    fingerprinter: Fingerprinter,
}

impl PhotoStore {
    /// Create an empty store
    pub fn new(fingerprinter: Fingerprinter) -> Self {
        Self {
            groups: Vec::new(),
            hash_index: HashMap::new(),
            path_index: HashMap::new(),
            fingerprinter,
        }
    }

    /// Fingerprinter used for new files
    pub fn fingerprinter(&self) -> Fingerprinter {
        self.fingerprinter
    }

    /// Record one file
    ///
    /// Known paths return `AlreadyKnown` immediately. Otherwise the file is
    /// fingerprinted and dated, appended to its group (creating it if
    /// needed), and the group's size and date are overwritten with this
    /// file's values. A read failure leaves the store unchanged.
    ///
    /// Paths that are not valid UTF-8 are refused, since the cache stores
    /// paths as JSON strings.
    pub fn add_file(&mut self, path: &Path) -> Result<AddOutcome> {
        if self.is_known(path) {
            return Ok(AddOutcome::AlreadyKnown);
        }
        if path.to_str().is_none() {
            return Err(StoreError::read(path, "path is not valid UTF-8"));
        }

        let fingerprint = self.fingerprinter.fingerprint(path)?;
        let date = resolve_date(path);
        trace!(
            "{} -> {} ({} bytes, {:?})",
            path.display(),
            fingerprint.hash,
            fingerprint.size,
            date
        );

        let idx = match self.hash_index.get(&fingerprint.hash) {
            Some(&idx) => idx,
            None => {
                let idx = self.groups.len();
                self.groups.push(FingerprintGroup {
                    hash: fingerprint.hash.clone(),
                    size: 0,
                    date: String::new(),
                    files: Vec::new(),
                });
                self.hash_index.insert(fingerprint.hash, idx);
                idx
            }
        };

        let group = &mut self.groups[idx];
        group.files.push(path.to_path_buf());
        group.size = fingerprint.size;
        group.date = date.into_string();
        self.path_index.insert(path.to_path_buf(), idx);

        Ok(AddOutcome::Added)
    }

    /// Record a batch of files
    ///
    /// Unreadable files are collected in the summary and logged; they never
    /// stop the batch. `progress` is called after each file and may return
    /// `ControlFlow::Break` to stop early.
    pub fn add_files<I, F>(&mut self, paths: I, mut progress: F) -> IngestSummary
    where
        I: IntoIterator<Item = PathBuf>,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(IngestProgress<'_>) -> ControlFlow<()>,
    {
        let paths = paths.into_iter();
        let total = paths.len();
        let mut summary = IngestSummary::default();

        for (i, path) in paths.enumerate() {
            match self.add_file(&path) {
                Ok(AddOutcome::Added) => summary.added += 1,
                Ok(AddOutcome::AlreadyKnown) => summary.already_known += 1,
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    summary.failures.push((path.clone(), e));
                }
            }

            let flow = progress(IngestProgress {
                current: i + 1,
                total,
                path: &path,
            });
            if flow.is_break() {
                summary.interrupted = true;
                break;
            }
        }

        summary
    }

    /// Record every non-directory entry under `root`
    ///
    /// Paths are made absolute before ingestion so the store and cache key
    /// on stable names. Entries the walker cannot read are logged and
    /// skipped.
    pub fn add_directory<F>(
        &mut self,
        root: &Path,
        follow_symlinks: bool,
        progress: F,
    ) -> Result<IngestSummary>
    where
        F: FnMut(IngestProgress<'_>) -> ControlFlow<()>,
    {
        debug!("Adding directory {}", root.display());
        let files = collect_files(root, follow_symlinks)?;
        debug!("adding {} files", files.len());
        Ok(self.add_files(files, progress))
    }

    /// True if `path` has been recorded
    pub fn is_known(&self, path: &Path) -> bool {
        self.path_index.contains_key(path)
    }

    /// All groups in first-seen order
    pub fn groups(&self) -> &[FingerprintGroup] {
        &self.groups
    }

    /// Look up a group by fingerprint
    pub fn group(&self, hash: &str) -> Option<&FingerprintGroup> {
        self.hash_index.get(hash).map(|&idx| &self.groups[idx])
    }

    /// The group a known path belongs to
    pub fn group_for_path(&self, path: &Path) -> Option<&FingerprintGroup> {
        self.path_index.get(path).map(|&idx| &self.groups[idx])
    }

    /// Number of known paths
    pub fn len(&self) -> usize {
        self.path_index.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.path_index.is_empty()
    }

    /// Number of distinct fingerprints
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Insert a group loaded from the cache
    ///
    /// Paths already claimed by an earlier group stay with that group, and a
    /// group left with no paths is dropped. If the fingerprint is already
    /// present, the new paths are appended to the existing group.
    pub(crate) fn insert_group(&mut self, group: FingerprintGroup) {
        let idx = self
            .hash_index
            .get(&group.hash)
            .copied()
            .unwrap_or(self.groups.len());

        let mut files = Vec::with_capacity(group.files.len());
        for path in group.files {
            if self.path_index.contains_key(&path) {
                warn!(
                    "Cache lists {} more than once; keeping the first occurrence",
                    path.display()
                );
                continue;
            }
            self.path_index.insert(path.clone(), idx);
            files.push(path);
        }
        if files.is_empty() {
            return;
        }

        if idx == self.groups.len() {
            self.hash_index.insert(group.hash.clone(), idx);
            self.groups.push(FingerprintGroup { files, ..group });
        } else {
            let existing = &mut self.groups[idx];
            existing.files.extend(files);
            existing.size = group.size;
            existing.date = group.date;
        }
    }
}

/// Collect every non-directory entry under `root` as an absolute path
fn collect_files(root: &Path, follow_symlinks: bool) -> Result<Vec<PathBuf>> {
    let root = std::path::absolute(root).map_err(|e| StoreError::read(root, e))?;
    if !root.exists() {
        return Err(StoreError::read(&root, "directory does not exist"));
    }

    let mut files = Vec::new();
    // Sorted so a new group's representative does not depend on readdir order
    let walker = WalkDir::new(&root)
        .follow_links(follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        match entry {
            Ok(entry) if !entry.file_type().is_dir() => files.push(entry.into_path()),
            Ok(_) => {}
            Err(e) => warn!("Skipping unreadable entry under {}: {}", root.display(), e),
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn keep_going(_: IngestProgress<'_>) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    #[test]
    fn test_empty_store() {
        let store = PhotoStore::new(Fingerprinter::default());
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.group_count(), 0);
        assert!(store.groups().is_empty());
    }

    #[test]
    fn test_add_file_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IMG_1.jpg");
        fs::write(&path, b"photo bytes").unwrap();

        let mut store = PhotoStore::new(Fingerprinter::default());
        assert_eq!(store.add_file(&path).unwrap(), AddOutcome::Added);
        assert_eq!(store.add_file(&path).unwrap(), AddOutcome::AlreadyKnown);

        assert_eq!(store.len(), 1);
        assert_eq!(store.group_count(), 1);
        assert_eq!(store.groups()[0].files, vec![path]);
    }

    #[test]
    fn test_known_path_is_not_reread() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("IMG_1.jpg");
        fs::write(&path, b"photo bytes").unwrap();

        let mut store = PhotoStore::new(Fingerprinter::default());
        store.add_file(&path).unwrap();
        fs::remove_file(&path).unwrap();

        // Would be a read error if the file were touched again
        assert_eq!(store.add_file(&path).unwrap(), AddOutcome::AlreadyKnown);
    }

    #[test]
    fn test_same_prefix_same_group() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("sunset.jpg");
        fs::write(&a, b"shared content").unwrap();
        fs::write(&b, b"shared content").unwrap();

        let mut store = PhotoStore::new(Fingerprinter::default());
        store.add_file(&a).unwrap();
        store.add_file(&b).unwrap();

        assert_eq!(store.group_count(), 1);
        let group = &store.groups()[0];
        assert_eq!(group.files, vec![a.clone(), b.clone()]);
        assert_eq!(group.representative(), Some(a.as_path()));
        assert_eq!(store.group_for_path(&b), Some(group));
    }

    #[test]
    fn test_different_content_different_groups() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a").join("IMG_1.jpg");
        let b = dir.path().join("b").join("IMG_1.jpg");
        fs::create_dir_all(a.parent().unwrap()).unwrap();
        fs::create_dir_all(b.parent().unwrap()).unwrap();
        fs::write(&a, b"first").unwrap();
        fs::write(&b, b"second").unwrap();

        let mut store = PhotoStore::new(Fingerprinter::default());
        store.add_file(&a).unwrap();
        store.add_file(&b).unwrap();

        assert_eq!(store.group_count(), 2);
        assert_ne!(store.group_for_path(&a), store.group_for_path(&b));
    }

    #[test]
    fn test_group_takes_latest_size_and_date() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        fs::write(&a, b"abcd").unwrap();
        fs::write(&b, b"abcd plus a longer tail").unwrap();

        let mut store = PhotoStore::new(Fingerprinter::new(4));
        store.add_file(&a).unwrap();
        store.add_file(&b).unwrap();

        let group = &store.groups()[0];
        assert_eq!(group.size, 23);
        assert_eq!(group.representative(), Some(a.as_path()));
        assert!(!group.date.is_empty());
    }

    #[test]
    fn test_unreadable_file_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.jpg");
        let missing = dir.path().join("missing.jpg");
        let other = dir.path().join("other.jpg");
        fs::write(&good, b"good").unwrap();
        fs::write(&other, b"other").unwrap();

        let mut store = PhotoStore::new(Fingerprinter::default());
        let summary = store.add_files(vec![good.clone(), missing.clone(), other.clone()], keep_going);

        assert_eq!(summary.added, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, missing);
        assert!(!store.is_known(&missing));
        assert!(store.is_known(&good));
        assert!(store.is_known(&other));
    }

    #[test]
    fn test_progress_can_stop_batch() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..5)
            .map(|i| {
                let p = dir.path().join(format!("file{}.jpg", i));
                fs::write(&p, format!("content {}", i)).unwrap();
                p
            })
            .collect();

        let mut store = PhotoStore::new(Fingerprinter::default());
        let summary = store.add_files(paths, |p| {
            if p.current == 2 {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert!(summary.interrupted);
        assert_eq!(summary.added, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_add_directory_walks_recursively() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("2020").join("trip");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("top.jpg"), b"top").unwrap();
        fs::write(nested.join("deep.mov"), b"deep").unwrap();
        fs::write(nested.join("notes.txt"), b"notes").unwrap();

        let mut store = PhotoStore::new(Fingerprinter::default());
        let summary = store.add_directory(dir.path(), false, keep_going).unwrap();

        assert_eq!(summary.added, 3);
        assert!(summary.failures.is_empty());
        assert!(store.is_known(&nested.join("deep.mov")));
        assert!(store.is_known(&nested.join("notes.txt")));

        let again = store.add_directory(dir.path(), false, keep_going).unwrap();
        assert_eq!(again.added, 0);
        assert_eq!(again.already_known, 3);
    }

    #[test]
    fn test_walk_order_is_sorted_by_name() {
        let dir = TempDir::new().unwrap();
        for name in ["zebra.jpg", "apple.jpg", "mango.jpg"] {
            fs::write(dir.path().join(name), b"same picture").unwrap();
        }

        let mut store = PhotoStore::new(Fingerprinter::default());
        store.add_directory(dir.path(), false, keep_going).unwrap();

        let group = &store.groups()[0];
        let names: Vec<_> = group
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["apple.jpg", "mango.jpg", "zebra.jpg"]);
        assert_eq!(group.representative(), Some(dir.path().join("apple.jpg").as_path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_path_is_a_per_file_failure() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.jpg");
        let bad = dir.path().join(OsStr::from_bytes(b"caf\xe9.jpg"));
        fs::write(&good, b"good").unwrap();
        // Some filesystems (e.g. APFS) refuse names that are not UTF-8
        if fs::write(&bad, b"bad").is_err() {
            return;
        }

        let mut store = PhotoStore::new(Fingerprinter::default());
        let summary = store.add_directory(dir.path(), false, keep_going).unwrap();

        assert_eq!(summary.added, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, bad);
        assert!(matches!(summary.failures[0].1, StoreError::ReadError { .. }));
        assert!(store.is_known(&good));
        assert!(!store.is_known(&bad));
    }

    #[test]
    fn test_add_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let mut store = PhotoStore::new(Fingerprinter::default());
        assert!(store
            .add_directory(&dir.path().join("nope"), false, keep_going)
            .is_err());
    }

    #[test]
    fn test_insert_group_rebuilds_reverse_index() {
        let mut store = PhotoStore::new(Fingerprinter::default());
        store.insert_group(FingerprintGroup {
            hash: "abc".to_string(),
            size: 10,
            date: "2020-05-14 10:00:00".to_string(),
            files: vec![PathBuf::from("/a/IMG_1.jpg"), PathBuf::from("/b/IMG_1.jpg")],
        });
        store.insert_group(FingerprintGroup {
            hash: "def".to_string(),
            size: 3,
            date: String::new(),
            files: vec![PathBuf::from("/a/IMG_1.jpg"), PathBuf::from("/c/other.jpg")],
        });
        store.insert_group(FingerprintGroup {
            hash: "empty".to_string(),
            size: 0,
            date: String::new(),
            files: vec![],
        });

        assert_eq!(store.group_count(), 2);
        assert_eq!(store.len(), 3);
        assert_eq!(store.group("def").unwrap().files, vec![PathBuf::from("/c/other.jpg")]);
        assert_eq!(
            store.group_for_path(Path::new("/a/IMG_1.jpg")).unwrap().hash,
            "abc"
        );
        assert!(store.group("empty").is_none());
    }
}
