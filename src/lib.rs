//! Photo Store Library
//!
//! Ingests directories of photos, groups files whose leading bytes hash the
//! same, and links one representative of each group into a tree sorted by
//! capture date. A JSON cache in the output directory lets later runs skip
//! files they have already seen.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - [`core`] - Configuration, error handling, date resolution, the store,
//!   its cache, and the output tree
//! - [`duplicate`] - Fingerprinting and duplicate reporting
//! - [`cli`] - Command-line interface (only used by the binary)
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use photo_store::core::cache::MetadataCache;
//! use photo_store::core::tree::TreeBuilder;
//! use photo_store::duplicate::Fingerprinter;
//! use std::ops::ControlFlow;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let output = Path::new("/backup/by-date");
//!     let cache = MetadataCache::in_output_dir(output);
//!
//!     // Start from what earlier runs recorded
//!     let mut store = cache.load(Fingerprinter::default());
//!
//!     store.add_directory(Path::new("/photos/phone"), false, |_| ControlFlow::Continue(()))?;
//!     cache.save(&store)?;
//!
//!     let report = TreeBuilder::new(output.to_path_buf()).build(&store, |_| {})?;
//!     println!("linked {} files", report.linked);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Incremental Runs** - Files already in the cache are never re-read
//! - **Prefix Fingerprints** - MD5 of the first 10,000 bytes identifies a file
//! - **Date Tree** - `YYYY/MM`, `Unknown` and `Invalid` buckets of hard links
//! - **Duplicate Report** - Identical files saved under different names

pub mod cli;
pub mod core;
pub mod duplicate;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
