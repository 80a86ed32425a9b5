//! On-disk metadata cache
//!
//! The cache is a single JSON object stored at
//! `<output_dir>/picture-data-cache.json`, mapping each fingerprint to its
//! group:
//!
//! ```json
//! {"3f2a...": {"hash": "3f2a...", "size": 482113, "date": "2020-05-14 10:00:00",
//!              "files": ["/photos/a/IMG_1.jpg", "/backup/IMG_1.jpg"]}}
//! ```
//!
//! The `hash` field is written for compatibility but optional on read; the
//! object key is authoritative. Unknown fields are ignored. Group order in
//! the file is the store's first-seen order and is preserved on load.
//!
//! Every save rewrites the whole file. There is no incremental update and no
//! atomic replace, so an interrupted save can leave a truncated cache; the
//! next load then starts empty and files are re-fingerprinted.

use crate::core::error::{Result, StoreError};
use crate::core::store::{FingerprintGroup, PhotoStore};
use crate::duplicate::fingerprint::Fingerprinter;
use log::{debug, info, warn};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// File name of the cache inside the output directory
pub const CACHE_FILE_NAME: &str = "picture-data-cache.json";

/// Serializes groups as a fingerprint-keyed object
struct CacheDocument<'a>(&'a [FingerprintGroup]);

impl Serialize for CacheDocument<'_> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for group in self.0 {
            map.serialize_entry(&group.hash, group)?;
        }
        map.end()
    }
}

/// Groups read back from a cache file, in file order
struct LoadedDocument(Vec<FingerprintGroup>);

impl<'de> Deserialize<'de> for LoadedDocument {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DocumentVisitor;

        impl<'de> Visitor<'de> for DocumentVisitor {
            type Value = LoadedDocument;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping fingerprints to file groups")
            }

            fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut groups = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((hash, mut group)) =
                    access.next_entry::<String, FingerprintGroup>()?
                {
                    group.hash = hash;
                    groups.push(group);
                }
                Ok(LoadedDocument(groups))
            }
        }

        deserializer.deserialize_map(DocumentVisitor)
    }
}

/// Reads and writes the metadata cache file
#[derive(Debug, Clone)]
pub struct MetadataCache {
    path: PathBuf,
}

impl MetadataCache {
    /// Cache stored at an explicit path
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Cache stored in its fixed location under `output_dir`
    pub fn in_output_dir(output_dir: &Path) -> Self {
        Self::new(output_dir.join(CACHE_FILE_NAME))
    }

    /// Location of the cache file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a store from the cache
    ///
    /// A missing, unreadable, or unparsable cache yields an empty store.
    pub fn load(&self, fingerprinter: Fingerprinter) -> PhotoStore {
        let mut store = PhotoStore::new(fingerprinter);
        self.load_into(&mut store);
        store
    }

    /// Add cached groups to `store`, returning the number of groups read
    ///
    /// The reverse path index is rebuilt from each group's file list. This
    /// never fails; problems are logged and the store is left as it was.
    pub fn load_into(&self, store: &mut PhotoStore) -> usize {
        let groups = match self.read() {
            Ok(Some(groups)) => groups,
            Ok(None) => {
                debug!("No metadata cache at {}", self.path.display());
                return 0;
            }
            Err(e) => {
                warn!("Ignoring metadata cache: {}", e);
                return 0;
            }
        };

        let count = groups.len();
        for group in groups {
            store.insert_group(group);
        }
        info!(
            "Loaded {} files in {} groups from cache: {}",
            store.len(),
            store.group_count(),
            self.path.display()
        );
        count
    }

    fn read(&self) -> Result<Option<Vec<FingerprintGroup>>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path).map_err(|e| {
            StoreError::CacheError(format!(
                "Failed to read cache file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let document: LoadedDocument = serde_json::from_str(&json).map_err(|e| {
            StoreError::CacheError(format!(
                "Failed to parse cache file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(document.0))
    }

    /// Write every group in `store`, replacing the file
    pub fn save(&self, store: &PhotoStore) -> Result<()> {
        let json = serde_json::to_string(&CacheDocument(store.groups()))
            .map_err(|e| StoreError::CacheError(format!("Failed to serialize cache: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                StoreError::CacheError(format!("Failed to create cache directory: {}", e))
            })?;
        }

        fs::write(&self.path, json)
            .map_err(|e| StoreError::CacheError(format!("Failed to write cache file: {}", e)))?;

        debug!(
            "Saved {} groups to {}",
            store.group_count(),
            self.path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;
    use tempfile::TempDir;

    fn populated_store(dir: &Path) -> PhotoStore {
        let mut store = PhotoStore::new(Fingerprinter::default());
        for (name, content) in [
            ("a.jpg", "alpha"),
            ("b.jpg", "beta"),
            ("copy_of_a.jpg", "alpha"),
            ("c.mov", "gamma"),
        ] {
            fs::write(dir.join(name), content).unwrap();
        }
        store
            .add_directory(dir, false, |_| ControlFlow::Continue(()))
            .unwrap();
        store
    }

    #[test]
    fn test_cache_path_in_output_dir() {
        let cache = MetadataCache::in_output_dir(Path::new("/backup/by-date"));
        assert_eq!(
            cache.path(),
            Path::new("/backup/by-date/picture-data-cache.json")
        );
    }

    #[test]
    fn test_missing_cache_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        let cache = MetadataCache::in_output_dir(dir.path());
        let store = cache.load(Fingerprinter::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_cache_yields_empty_store() {
        let dir = TempDir::new().unwrap();
        let cache = MetadataCache::in_output_dir(dir.path());
        fs::write(cache.path(), "{ not json").unwrap();

        let store = cache.load(Fingerprinter::default());
        assert!(store.is_empty());
    }

    #[test]
    fn test_save_and_load_preserves_known_paths() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let store = populated_store(input.path());
        let cache = MetadataCache::in_output_dir(output.path());

        cache.save(&store).unwrap();
        let loaded = cache.load(Fingerprinter::default());

        assert_eq!(loaded.len(), store.len());
        assert_eq!(loaded.groups(), store.groups());
        for group in store.groups() {
            for path in &group.files {
                assert!(loaded.is_known(path), "{} lost", path.display());
            }
        }
    }

    #[test]
    fn test_save_writes_hash_field_and_key() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let store = populated_store(input.path());
        let cache = MetadataCache::in_output_dir(output.path());
        cache.save(&store).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(cache.path()).unwrap()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), store.group_count());
        for group in store.groups() {
            let entry = &object[&group.hash];
            assert_eq!(entry["hash"], group.hash.as_str());
            assert_eq!(entry["size"], group.size);
            assert_eq!(entry["date"], group.date.as_str());
            assert_eq!(entry["files"].as_array().unwrap().len(), group.files.len());
        }
    }

    #[test]
    fn test_load_cache_without_hash_field() {
        let dir = TempDir::new().unwrap();
        let cache = MetadataCache::in_output_dir(dir.path());
        fs::write(
            cache.path(),
            r#"{
                "bbb": {"size": 12, "date": "2020-05-14 10:00:00 +0200", "files": ["/b/sunset.jpg"]},
                "aaa": {"size": 7, "date": null, "files": ["/a/IMG_1.jpg", "/b/IMG_1.jpg"], "extra": true}
            }"#,
        )
        .unwrap();

        let store = cache.load(Fingerprinter::default());

        assert_eq!(store.group_count(), 2);
        // File order is kept, not key order
        assert_eq!(store.groups()[0].hash, "bbb");
        assert_eq!(store.groups()[1].hash, "aaa");
        assert_eq!(store.groups()[1].date, "");
        assert!(store.is_known(Path::new("/b/IMG_1.jpg")));
        assert_eq!(
            store.group_for_path(Path::new("/a/IMG_1.jpg")).unwrap().size,
            7
        );
    }

    #[test]
    fn test_save_overwrites_previous_cache() {
        let dir = TempDir::new().unwrap();
        let cache = MetadataCache::in_output_dir(dir.path());
        fs::write(
            cache.path(),
            r#"{"old": {"size": 1, "date": "", "files": ["/gone.jpg"]}}"#,
        )
        .unwrap();

        cache.save(&PhotoStore::new(Fingerprinter::default())).unwrap();

        assert_eq!(fs::read_to_string(cache.path()).unwrap(), "{}");
        assert!(cache.load(Fingerprinter::default()).is_empty());
    }

    #[test]
    fn test_loaded_paths_are_not_refingerprinted() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let store = populated_store(input.path());
        let cache = MetadataCache::in_output_dir(output.path());
        cache.save(&store).unwrap();

        // Replace the content; a cached path keeps its original fingerprint
        let a = std::path::absolute(input.path().join("a.jpg")).unwrap();
        let original = store.group_for_path(&a).unwrap().hash.clone();
        fs::write(&a, "rewritten").unwrap();

        let mut loaded = cache.load(Fingerprinter::default());
        let summary = loaded
            .add_directory(input.path(), false, |_| ControlFlow::Continue(()))
            .unwrap();

        assert_eq!(summary.added, 0);
        assert_eq!(summary.already_known, 4);
        assert_eq!(loaded.group_for_path(&a).unwrap().hash, original);
    }
}
