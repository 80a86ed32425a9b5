//! Fingerprinting and duplicate reporting
//!
//! # Submodules
//!
//! - `fingerprint` - Prefix digest used as the deduplication key
//! - `detector` - Selection of groups worth reporting as duplicates

pub mod detector;
pub mod fingerprint;

pub use detector::{find_duplicates, log_duplicates, report_lines, DuplicateStats};
pub use fingerprint::{Fingerprint, Fingerprinter, DEFAULT_PREFIX_LEN};
