//! Per-source artifact cache: a directory of produced files plus a sidecar manifest
//! (`cache_info.json`) validated on every read by size, content hash, and TTL.
//!
//! A cache entry is all-or-nothing: if any recorded file is missing, resized, or hash-mismatched,
//! the whole entry is treated as a miss rather than served partially.

use crate::core::atomic_file::atomic_write;
use crate::core::error::{AppError, ErrorKind};
use crate::core::fingerprint::hash_file;
use crate::core::model::{CacheEntry, CacheFileRecord};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MANIFEST_NAME: &str = "cache_info.json";

/// A content-addressed, TTL-bounded cache of artifacts produced by task functions.
pub struct ArtifactCache {
    root: PathBuf,
}

impl ArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ArtifactCache { root: root.into() }
    }

    fn entry_dir(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn manifest_path(&self, key: &str) -> PathBuf {
        self.entry_dir(key).join(MANIFEST_NAME)
    }

    /// Look up a cache entry by key. Returns `None` on any miss: absent manifest, expired TTL,
    /// or a file whose recorded size/hash no longer matches what's on disk.
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>, AppError> {
        let manifest_path = self.manifest_path(key);
        let bytes = match fs::read(&manifest_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(AppError::from(err)),
        };
        let entry: CacheEntry = serde_json::from_slice(&bytes)?;

        if entry.is_expired(Utc::now()) {
            return Ok(None);
        }

        let dir = self.entry_dir(key);
        for record in &entry.files {
            if !self.file_is_valid(&dir, record)? {
                return Ok(None);
            }
        }
        Ok(Some(entry))
    }

    fn file_is_valid(&self, dir: &Path, record: &CacheFileRecord) -> Result<bool, AppError> {
        let path = dir.join(&record.path);
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(AppError::from(err)),
        };
        if metadata.len() != record.size_bytes {
            return Ok(false);
        }
        let actual_hash = hash_file(&path)?;
        Ok(actual_hash == record.sha256)
    }

    /// Store `files` (each an absolute path that already exists under the cache root for this
    /// key) as a new cache entry, replacing any previous manifest for `key`.
    pub fn put(
        &self,
        key: &str,
        source: impl Into<String>,
        ttl: Duration,
        file_paths: &[PathBuf],
    ) -> Result<CacheEntry, AppError> {
        let dir = self.entry_dir(key);
        fs::create_dir_all(&dir).map_err(AppError::from)?;

        let mut files = Vec::with_capacity(file_paths.len());
        for path in file_paths {
            if !path.starts_with(&dir) {
                return Err(AppError::new(
                    ErrorKind::Validation,
                    format!(
                        "cache artifact {} escapes its entry directory {}",
                        path.display(),
                        dir.display()
                    ),
                )
                .with_code("PIPE-CACHE-001"));
            }
            let relative = path
                .strip_prefix(&dir)
                .map_err(|_| AppError::internal("cache artifact path strip_prefix failed"))?
                .to_string_lossy()
                .to_string();
            let metadata = fs::metadata(path).map_err(AppError::from)?;
            files.push(CacheFileRecord {
                path: relative,
                size_bytes: metadata.len(),
                sha256: hash_file(path)?,
            });
        }

        let entry = CacheEntry {
            source: source.into(),
            timestamp: Utc::now(),
            ttl,
            files,
            metadata: serde_json::Map::new(),
        };
        let encoded = serde_json::to_vec_pretty(&entry)?;
        atomic_write(&self.manifest_path(key), &encoded)?;
        Ok(entry)
    }

    /// Return the directory a task function should write artifacts into before calling `put`.
    pub fn entry_dir_for_write(&self, key: &str) -> PathBuf {
        self.entry_dir(key)
    }

    /// Remove a single cache entry by key, regardless of TTL or validity. Best-effort: a
    /// missing entry is not an error.
    pub fn invalidate(&self, key: &str) -> Result<(), AppError> {
        match fs::remove_dir_all(self.entry_dir(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AppError::from(err)),
        }
    }

    /// Remove cache entries whose manifest is missing, corrupt, or expired past `older_than`.
    /// Returns the number of entries removed.
    pub fn sweep(&self, older_than: Duration) -> Result<usize, AppError> {
        let mut removed = 0;
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(AppError::from(err)),
        };
        for entry in entries {
            let entry = entry.map_err(AppError::from)?;
            if !entry.file_type().map_err(AppError::from)?.is_dir() {
                continue;
            }
            let manifest = entry.path().join(MANIFEST_NAME);
            let should_remove = match fs::read(&manifest) {
                Ok(bytes) => match serde_json::from_slice::<CacheEntry>(&bytes) {
                    Ok(cache_entry) => {
                        let age = Utc::now().signed_duration_since(cache_entry.timestamp);
                        let limit = chrono::Duration::from_std(older_than)
                            .unwrap_or_else(|_| chrono::Duration::zero());
                        age > limit
                    }
                    Err(_) => true,
                },
                Err(_) => true,
            };
            if should_remove {
                fs::remove_dir_all(entry.path()).map_err(AppError::from)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
