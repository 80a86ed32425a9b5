//! Core functionality module
//!
//! This module contains the store and everything that reads or writes it.
//!
//! # Submodules
//!
//! - `cache` - JSON cache persistence for incremental runs
//! - `config` - Configuration loading, saving, and management
//! - `date` - Capture date resolution with modification-time fallback
//! - `error` - Error types and result aliases
//! - `store` - Fingerprint groups and idempotent ingestion
//! - `tree` - Date-partitioned hard link tree

pub mod cache;
pub mod config;
pub mod date;
pub mod error;
pub mod store;
pub mod tree;
