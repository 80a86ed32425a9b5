//! Date-partitioned hard link tree
//!
//! For every fingerprint group, the representative file is hard linked into
//! `<output_root>/<bucket>/<file name>`, where the bucket is `YYYY/MM` for a
//! parsable date, `Unknown` for an empty one, and `Invalid` otherwise.
//!
//! Existing destinations are never replaced, which makes rebuilding the tree
//! safe and cheap. With the default [`CollisionPolicy::Skip`], two groups
//! whose representatives share a file name and a bucket collide: the first
//! one processed is linked and the other never appears in the tree.
//! [`CollisionPolicy::Fingerprint`] avoids this by suffixing every name with
//! a short fingerprint, at the cost of names that differ from trees built
//! with the default policy.
//!
//! A failed link (cross-device, permissions, ...) is a warning, not an
//! error; the remaining groups are still processed.

use crate::core::date::parse_date;
use crate::core::error::{Result, StoreError};
use crate::core::store::{FingerprintGroup, PhotoStore};
use chrono::Datelike;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Length of the fingerprint suffix used by `CollisionPolicy::Fingerprint`
const SUFFIX_LEN: usize = 8;

/// Output subdirectory for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// `YYYY/MM`
    Dated { year: i32, month: u32 },
    /// No date was recorded
    Unknown,
    /// A date was recorded but could not be parsed
    Invalid,
}

impl Bucket {
    /// Bucket for a stored date string
    pub fn for_date(date: &str) -> Self {
        if date.trim().is_empty() {
            return Bucket::Unknown;
        }
        match parse_date(date) {
            Some(dt) => Bucket::Dated {
                year: dt.year(),
                month: dt.month(),
            },
            None => Bucket::Invalid,
        }
    }

    /// Path of the bucket relative to the output root
    pub fn relative_path(&self) -> PathBuf {
        match self {
            Bucket::Dated { year, month } => {
                Path::new(&format!("{:04}", year)).join(format!("{:02}", month))
            }
            Bucket::Unknown => PathBuf::from("Unknown"),
            Bucket::Invalid => PathBuf::from("Invalid"),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::Dated { year, month } => write!(f, "{:04}/{:02}", year, month),
            Bucket::Unknown => write!(f, "Unknown"),
            Bucket::Invalid => write!(f, "Invalid"),
        }
    }
}

/// How destination file names are chosen
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Use the representative's file name; later groups with the same name
    /// in the same bucket are skipped
    #[default]
    Skip,
    /// Append a short fingerprint to every file name
    Fingerprint,
}

/// A non-fatal problem found while building the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeWarning {
    /// The group's date could not be parsed; it went to `Invalid`
    InvalidDate { file: PathBuf, value: String },
    /// The bucket directory could not be created
    DirectoryFailed { directory: PathBuf, message: String },
    /// The hard link could not be created
    LinkFailed {
        source: PathBuf,
        destination: PathBuf,
        message: String,
    },
}

impl fmt::Display for TreeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeWarning::InvalidDate { file, value } => write!(
                f,
                "Invalid date for file {} ({})",
                file.display(),
                value
            ),
            TreeWarning::DirectoryFailed { directory, message } => write!(
                f,
                "Unable to create directory {}: {}",
                directory.display(),
                message
            ),
            TreeWarning::LinkFailed {
                destination,
                message,
                ..
            } => write!(
                f,
                "Unable to create link for file {}: {}",
                destination.display(),
                message
            ),
        }
    }
}

/// Progress information for tree building
#[derive(Debug, Clone, Copy)]
pub struct TreeProgress {
    /// Groups handled so far
    pub current: usize,
    /// Total groups
    pub total: usize,
}

/// Outcome of a tree build
#[derive(Debug, Clone, Default)]
pub struct TreeReport {
    /// Links created
    pub linked: usize,
    /// Groups whose destination already existed
    pub already_present: usize,
    /// Groups placed in `Unknown`
    pub unknown: usize,
    /// Groups placed in `Invalid`
    pub invalid: usize,
    /// Groups that could not be linked
    pub failed: usize,
    /// Every warning emitted, in order
    pub warnings: Vec<TreeWarning>,
}

impl TreeReport {
    fn warn(&mut self, warning: TreeWarning) {
        warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// Builds the hard link tree under an output root
#[derive(Debug, Clone)]
pub struct TreeBuilder {
    output_root: PathBuf,
    collision_policy: CollisionPolicy,
}

impl TreeBuilder {
    /// Builder for `output_root` using the default collision policy
    pub fn new(output_root: PathBuf) -> Self {
        Self {
            output_root,
            collision_policy: CollisionPolicy::default(),
        }
    }

    /// Set the collision policy
    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    /// Output root directory
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Destination for a group's representative in `bucket`
    ///
    /// Returns `None` if the group is empty or its representative has no
    /// file name.
    pub fn destination(&self, group: &FingerprintGroup, bucket: Bucket) -> Option<PathBuf> {
        let name = group.representative()?.file_name()?;
        let name = match self.collision_policy {
            CollisionPolicy::Skip => PathBuf::from(name),
            CollisionPolicy::Fingerprint => {
                let original = Path::new(name);
                let stem = original.file_stem().unwrap_or(name).to_string_lossy();
                let suffix: String = group.hash.chars().take(SUFFIX_LEN).collect();
                match original.extension() {
                    Some(ext) => {
                        PathBuf::from(format!("{}-{}.{}", stem, suffix, ext.to_string_lossy()))
                    }
                    None => PathBuf::from(format!("{}-{}", stem, suffix)),
                }
            }
        };
        Some(self.output_root.join(bucket.relative_path()).join(name))
    }

    /// Link every group's representative into the tree
    ///
    /// Only failure to create the output root itself is an error.
    pub fn build<F>(&self, store: &PhotoStore, mut progress: F) -> Result<TreeReport>
    where
        F: FnMut(TreeProgress),
    {
        debug!("Writing directory tree to {}", self.output_root.display());
        fs::create_dir_all(&self.output_root).map_err(|e| StoreError::TreeError {
            path: self.output_root.display().to_string(),
            message: e.to_string(),
        })?;

        let total = store.group_count();
        let mut report = TreeReport::default();

        for (i, group) in store.groups().iter().enumerate() {
            self.link_group(group, &mut report);
            progress(TreeProgress {
                current: i + 1,
                total,
            });
        }

        info!(
            "Output tree: {} linked, {} already present, {} unknown, {} invalid, {} failed",
            report.linked, report.already_present, report.unknown, report.invalid, report.failed
        );
        Ok(report)
    }

    fn link_group(&self, group: &FingerprintGroup, report: &mut TreeReport) {
        let Some(source) = group.representative() else {
            return;
        };

        let bucket = Bucket::for_date(&group.date);
        match bucket {
            Bucket::Unknown => report.unknown += 1,
            Bucket::Invalid => {
                report.invalid += 1;
                report.warn(TreeWarning::InvalidDate {
                    file: source.to_path_buf(),
                    value: group.date.clone(),
                });
            }
            Bucket::Dated { .. } => {}
        }

        let Some(destination) = self.destination(group, bucket) else {
            report.failed += 1;
            report.warn(TreeWarning::LinkFailed {
                source: source.to_path_buf(),
                destination: self.output_root.join(bucket.relative_path()),
                message: "source has no file name".to_string(),
            });
            return;
        };

        let directory = self.output_root.join(bucket.relative_path());
        if let Err(e) = fs::create_dir_all(&directory) {
            report.failed += 1;
            report.warn(TreeWarning::DirectoryFailed {
                directory,
                message: e.to_string(),
            });
            return;
        }

        // symlink_metadata so a dangling link at the destination counts as taken
        if fs::symlink_metadata(&destination).is_ok() {
            report.already_present += 1;
            return;
        }

        match fs::hard_link(source, &destination) {
            Ok(()) => report.linked += 1,
            Err(e) => {
                report.failed += 1;
                report.warn(TreeWarning::LinkFailed {
                    source: source.to_path_buf(),
                    destination,
                    message: e.to_string(),
                });
            }
        }
    }
}
