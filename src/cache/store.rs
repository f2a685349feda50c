//! On-disk tag cache files
//!
//! Each repository gets one JSON file in the cache directory, named by the
//! SHA-256 of its canonical path:
//!
//! ```json
//! {
//!   "formatTag": "git-autover-tag-cache/v1",
//!   "createdAtEpochMs": 1760000000000,
//!   "repositoryPath": "/home/me/project",
//!   "validation": { "tagListDigest": "…", "tagCount": 2, "refStorageTimestamps": { … } },
//!   "tagCache": { "<commit>": [ { "name": "v1.0.0", "targetCommitHash": "<commit>", "version": { … } } ] }
//! }
//! ```
//!
//! Reading never fails: a missing, unreadable, corrupt, or foreign-format
//! file is simply "no snapshot". Writing goes through a uniquely named
//! temporary file in the same directory and an atomic rename, so readers only
//! ever see a complete file. A failed write removes the temporary file and is
//! reported to the caller.

use crate::cache::{TagCache, Validation};
use crate::error::{AutoverError, Result};
use crate::refs::FastTagResolver;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Format marker; files carrying anything else are discarded
pub const FORMAT_TAG: &str = "git-autover-tag-cache/v1";

/// Default age after which cache files are swept
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

const CACHE_EXTENSION: &str = "json";
const TEMP_MARKER: &str = ".tmp-";

/// Whole-second timestamps may come from a filesystem that truncates mtimes,
/// so they must predate the snapshot by this much to count as older
const COARSE_MTIME_SLACK_MS: i64 = 2_000;

/// A persisted snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheFile {
    pub format_tag: String,
    pub created_at_epoch_ms: i64,
    /// Recorded for debugging only; the file name is what keys the cache
    pub repository_path: String,
    pub validation: Validation,
    pub tag_cache: TagCache,
}

impl CacheFile {
    /// Time since the snapshot was written
    pub fn age(&self) -> Duration {
        let elapsed = Utc::now().timestamp_millis() - self.created_at_epoch_ms;
        Duration::from_millis(elapsed.max(0) as u64)
    }

    /// Whether the snapshot still describes the repository's tags
    ///
    /// The tag count and the digest of the tag names must match, and the ref
    /// storage must not have been touched since the snapshot was taken:
    /// every timestamp equals the recorded one and none is newer than the
    /// snapshot itself. The last check catches tags moved to another commit,
    /// which leaves the name list unchanged.
    ///
    /// A timestamp with no sub-second part may have been truncated by the
    /// filesystem, so it only counts as older when it predates the snapshot
    /// by at least two seconds. Anything closer takes the differential path,
    /// which is correct, just slower.
    pub fn is_fresh(&self, tag_names: &[String], stamps: &BTreeMap<String, i64>) -> bool {
        let validation = &self.validation;
        if validation.tag_count != tag_names.len() {
            return false;
        }
        if validation.tag_list_digest != super::digest_tag_names(tag_names) {
            return false;
        }
        if &validation.ref_storage_timestamps != stamps {
            return false;
        }
        stamps.values().all(|&nanos| {
            let millis = nanos / 1_000_000;
            if nanos % 1_000_000_000 == 0 {
                millis + COARSE_MTIME_SLACK_MS <= self.created_at_epoch_ms
            } else {
                millis <= self.created_at_epoch_ms
            }
        })
    }
}

/// Directory of per-repository cache files
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
    retention: Duration,
}

/// Removes a temporary file unless disarmed
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = fs::remove_file(&self.path) {
                debug!("cannot remove temp file {}: {}", self.path.display(), e);
            }
        }
    }
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        CacheStore {
            dir: dir.into(),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Cache file for a repository
    pub fn cache_path(&self, repo_path: &Path) -> PathBuf {
        self.dir
            .join(format!("{}.{}", repository_key(repo_path), CACHE_EXTENSION))
    }

    /// Read the snapshot for a repository, if there is a usable one
    pub fn load(&self, repo_path: &Path) -> Option<CacheFile> {
        let path = self.cache_path(repo_path);
        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("cannot read tag cache {}: {}", path.display(), e);
                return None;
            }
        };

        let snapshot: CacheFile = match serde_json::from_slice(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("discarding unparsable tag cache {}: {}", path.display(), e);
                return None;
            }
        };

        if snapshot.format_tag != FORMAT_TAG {
            debug!(
                "discarding tag cache {} with format '{}'",
                path.display(),
                snapshot.format_tag
            );
            return None;
        }
        Some(snapshot)
    }

    /// Atomically write a snapshot for a repository
    ///
    /// # Returns
    /// * `Ok(CacheFile)` - The snapshot as written
    /// * `Err(Cache)` - If the directory, temp file, or rename failed; no
    ///   temporary file is left behind
    pub fn save(
        &self,
        repo_path: &Path,
        cache: &TagCache,
        validation: &Validation,
    ) -> Result<CacheFile> {
        let snapshot = CacheFile {
            format_tag: FORMAT_TAG.to_string(),
            created_at_epoch_ms: Utc::now().timestamp_millis(),
            repository_path: canonical_path(repo_path).display().to_string(),
            validation: validation.clone(),
            tag_cache: cache.clone(),
        };
        let content = serde_json::to_vec_pretty(&snapshot)?;

        fs::create_dir_all(&self.dir)
            .map_err(|e| AutoverError::cache(format!("cannot create cache directory: {}", e)))?;

        let target = self.cache_path(repo_path);
        let mut guard = TempFileGuard {
            path: self.dir.join(format!(
                "{}{}{}",
                repository_key(repo_path),
                TEMP_MARKER,
                uuid::Uuid::new_v4().simple()
            )),
            armed: true,
        };

        {
            let mut file = File::create(&guard.path)
                .map_err(|e| AutoverError::cache(format!("cannot create temp file: {}", e)))?;
            file.write_all(&content)
                .map_err(|e| AutoverError::cache(format!("cannot write tag cache: {}", e)))?;
            file.sync_all()
                .map_err(|e| AutoverError::cache(format!("cannot sync tag cache: {}", e)))?;
        }

        fs::rename(&guard.path, &target)
            .map_err(|e| AutoverError::cache(format!("cannot rename temp file: {}", e)))?;
        guard.armed = false;

        debug!("wrote tag cache {}", target.display());
        Ok(snapshot)
    }

    /// Check a snapshot against the repository's current ref storage
    ///
    /// Any failure while inspecting the repository counts as invalid.
    pub fn validate(&self, snapshot: &CacheFile, repo_path: &Path) -> bool {
        let check = || -> Result<bool> {
            let resolver = FastTagResolver::open(repo_path)?;
            let names = resolver.list_tags()?;
            Ok(snapshot.is_fresh(&names, &resolver.ref_storage_timestamps()))
        };
        check().unwrap_or_else(|e| {
            debug!("tag cache validation failed: {}", e);
            false
        })
    }

    /// Delete cache and leftover temp files older than `older_than`
    ///
    /// Only files this store writes are touched: `<key>.json` and
    /// `<key>.tmp-<id>`. Best effort: unreadable entries and failed deletions
    /// are skipped. Returns the number of files removed.
    pub fn cleanup_stale(&self, older_than: Duration) -> usize {
        self.sweep(older_than, None)
    }

    /// Like [`cleanup_stale`](Self::cleanup_stale), but keeps the cache file
    /// of `repo_path` whatever its age
    pub fn cleanup_stale_except(&self, older_than: Duration, repo_path: &Path) -> usize {
        self.sweep(older_than, Some(self.cache_path(repo_path).as_path()))
    }

    fn sweep(&self, older_than: Duration, keep: Option<&Path>) -> usize {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };
        let now = SystemTime::now();
        let mut removed = 0;

        for entry in entries.flatten() {
            let path = entry.path();
            if !is_store_file(&path) || keep == Some(path.as_path()) {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|meta| meta.modified()) else {
                continue;
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age < older_than {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => debug!("cannot remove stale cache {}: {}", path.display(), e),
            }
        }
        removed
    }

    /// Delete every cache file regardless of age
    pub fn clear(&self) -> usize {
        self.cleanup_stale(Duration::ZERO)
    }
}

fn is_store_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let (Some(key), Some(rest)) = (name.get(..64), name.get(64..)) else {
        return false;
    };
    if !is_hex(key) {
        return false;
    }
    match rest.strip_prefix(TEMP_MARKER) {
        Some(id) => !id.is_empty() && is_hex(id),
        None => rest.strip_prefix('.') == Some(CACHE_EXTENSION),
    }
}

fn is_hex(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn canonical_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    })
}

/// Hex SHA-256 of the repository's canonical absolute path
pub fn repository_key(repo_path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_path(repo_path).to_string_lossy().as_bytes());
    hex::encode(hasher.finalize())
}
