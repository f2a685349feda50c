//! Persistent commit → tags cache
//!
//! Resolving every tag of a large repository on each build is wasteful when
//! usually nothing, or only a handful of tags, changed since the last run.
//! The cache keeps the last known mapping on disk, one JSON file per
//! repository, and [load_or_build_tag_cache] decides per call how much work
//! is needed:
//!
//! - no usable snapshot: resolve everything and write a fresh file
//! - snapshot whose validation still matches the ref storage: use as is
//! - otherwise: patch the snapshot with [diff::apply_diff] and rewrite it
//!
//! See [store::CacheStore] for the on-disk format and its guarantees.

pub mod diff;
pub mod store;

pub use diff::{apply_diff, DiffStats};
pub use store::{CacheFile, CacheStore, FORMAT_TAG};

use crate::error::Result;
use crate::refs::{FastTagResolver, TagTargetSource};
use crate::version::Version;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info};

/// One tag and the commit it resolves to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInfo {
    pub name: String,
    pub target_commit_hash: String,
    /// Parsed version, when the name is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
}

impl TagInfo {
    pub fn new(name: impl Into<String>, target_commit_hash: impl Into<String>) -> Self {
        let name = name.into();
        TagInfo {
            version: Version::parse(&name),
            name,
            target_commit_hash: target_commit_hash.into(),
        }
    }
}

/// Commit hash → tags on that commit, each list sorted by tag name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagCache {
    commits: BTreeMap<String, Vec<TagInfo>>,
}

impl TagCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(tag name, commit hash)` pairs
    pub fn from_targets(targets: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut cache = TagCache::new();
        for (name, commit) in targets {
            cache.insert(TagInfo::new(name, commit));
        }
        cache
    }

    /// Add a tag under its target commit, keeping the list sorted by name
    ///
    /// A tag with the same name already on that commit is replaced.
    pub fn insert(&mut self, tag: TagInfo) {
        let tags = self
            .commits
            .entry(tag.target_commit_hash.clone())
            .or_default();
        match tags.binary_search_by(|t| t.name.as_str().cmp(&tag.name)) {
            Ok(index) => tags[index] = tag,
            Err(index) => tags.insert(index, tag),
        }
    }

    /// Remove a tag from a commit, dropping the commit once it has no tags
    pub fn remove(&mut self, name: &str, commit: &str) -> bool {
        let Some(tags) = self.commits.get_mut(commit) else {
            return false;
        };
        let before = tags.len();
        tags.retain(|t| t.name != name);
        let removed = tags.len() != before;
        if tags.is_empty() {
            self.commits.remove(commit);
        }
        removed
    }

    /// Tags on a commit, sorted by name
    pub fn tags_at(&self, commit: &str) -> &[TagInfo] {
        self.commits.get(commit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Commit a tag currently points at
    pub fn commit_of(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|tag| tag.name == name)
            .map(|tag| tag.target_commit_hash.as_str())
    }

    /// Tag name → commit hash for every cached tag
    pub fn targets(&self) -> HashMap<String, String> {
        self.iter()
            .map(|tag| (tag.name.clone(), tag.target_commit_hash.clone()))
            .collect()
    }

    /// Every cached tag name, sorted
    pub fn tag_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.iter().map(|tag| tag.name.clone()).collect();
        names.sort();
        names
    }

    /// Commit → tag names, the shape version resolution consumes
    pub fn names_by_commit(&self) -> HashMap<String, Vec<String>> {
        self.commits
            .iter()
            .map(|(commit, tags)| {
                (
                    commit.clone(),
                    tags.iter().map(|tag| tag.name.clone()).collect(),
                )
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagInfo> {
        self.commits.values().flatten()
    }

    pub fn commits(&self) -> impl Iterator<Item = (&str, &[TagInfo])> {
        self.commits
            .iter()
            .map(|(commit, tags)| (commit.as_str(), tags.as_slice()))
    }

    pub fn tag_count(&self) -> usize {
        self.commits.values().map(Vec::len).sum()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// What a snapshot was built against, used to detect staleness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    /// SHA-256 of the sorted, newline-joined tag names
    pub tag_list_digest: String,
    pub tag_count: usize,
    /// Ref storage modification times, nanoseconds since the Unix epoch
    pub ref_storage_timestamps: BTreeMap<String, i64>,
}

impl Validation {
    pub fn compute(tag_names: &[String], ref_storage_timestamps: BTreeMap<String, i64>) -> Self {
        Validation {
            tag_list_digest: digest_tag_names(tag_names),
            tag_count: tag_names.len(),
            ref_storage_timestamps,
        }
    }
}

/// Hex SHA-256 of the sorted tag names joined by newlines
pub fn digest_tag_names(tag_names: &[String]) -> String {
    let mut sorted: Vec<&str> = tag_names.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut hasher = Sha256::new();
    hasher.update(sorted.join("\n").as_bytes());
    hex::encode(hasher.finalize())
}

/// Outcome of a [load_or_build_tag_cache] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub unchanged: usize,
    pub full_rebuild: bool,
}

impl From<DiffStats> for CacheStats {
    fn from(diff: DiffStats) -> Self {
        CacheStats {
            added: diff.added,
            deleted: diff.deleted,
            modified: diff.modified,
            unchanged: diff.unchanged,
            full_rebuild: false,
        }
    }
}

/// Load the tag cache for a repository, building or patching it as needed
///
/// # Returns
/// * `Ok((cache, stats))` - The current commit → tags mapping
/// * `Err(NotARepository)` - If `repo_path` has no git ref storage
/// * `Err(Cache)` - If a rebuilt or patched cache could not be written
pub fn load_or_build_tag_cache(
    repo_path: &Path,
    store: &CacheStore,
) -> Result<(TagCache, CacheStats)> {
    let resolver = FastTagResolver::open(repo_path)?;
    let names = resolver.list_tags()?;
    let stamps = resolver.ref_storage_timestamps();

    let Some(snapshot) = store.load(repo_path) else {
        return full_rebuild(repo_path, store, &resolver, &names, stamps);
    };

    // The snapshot in hand is as old as the files being swept; keep it
    if snapshot.age() > store.retention() {
        let swept = store.cleanup_stale_except(store.retention(), repo_path);
        debug!("swept {} stale cache files from {}", swept, store.dir().display());
    }

    if snapshot.is_fresh(&names, &stamps) {
        debug!(
            "tag cache for {} is current ({} tags)",
            repo_path.display(),
            names.len()
        );
        let stats = CacheStats {
            unchanged: names.len(),
            ..CacheStats::default()
        };
        return Ok((snapshot.tag_cache, stats));
    }

    let mut cache = snapshot.tag_cache;
    let diff = apply_diff(&mut cache, &names, &resolver);
    info!(
        "patched tag cache for {}: {} added, {} deleted, {} modified, {} unchanged",
        repo_path.display(),
        diff.added,
        diff.deleted,
        diff.modified,
        diff.unchanged
    );
    store.save(repo_path, &cache, &Validation::compute(&names, stamps))?;
    Ok((cache, diff.into()))
}

fn full_rebuild(
    repo_path: &Path,
    store: &CacheStore,
    resolver: &FastTagResolver,
    names: &[String],
    stamps: BTreeMap<String, i64>,
) -> Result<(TagCache, CacheStats)> {
    let cache = TagCache::from_targets(resolver.resolve_targets(names));
    info!(
        "built tag cache for {}: {} tags on {} commits",
        repo_path.display(),
        cache.tag_count(),
        cache.commit_count()
    );
    store.save(repo_path, &cache, &Validation::compute(names, stamps))?;

    let stats = CacheStats {
        added: cache.tag_count(),
        full_rebuild: true,
        ..CacheStats::default()
    };
    Ok((cache, stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_names_sorted() {
        let mut cache = TagCache::new();
        cache.insert(TagInfo::new("v2.0", "c1"));
        cache.insert(TagInfo::new("release", "c1"));
        cache.insert(TagInfo::new("alpha", "c1"));

        let names: Vec<_> = cache.tags_at("c1").iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "release", "v2.0"]);
        assert_eq!(cache.tag_count(), 3);
        assert_eq!(cache.commit_count(), 1);
    }

    #[test]
    fn test_insert_same_name_replaces() {
        let mut cache = TagCache::new();
        cache.insert(TagInfo::new("v1.0", "c1"));
        cache.insert(TagInfo::new("v1.0", "c1"));
        assert_eq!(cache.tag_count(), 1);
    }

    #[test]
    fn test_remove_drops_empty_commits() {
        let mut cache = TagCache::from_targets(vec![
            ("v1.0".to_string(), "c1".to_string()),
            ("v1.1".to_string(), "c2".to_string()),
        ]);
        assert!(cache.remove("v1.0", "c1"));
        assert!(!cache.remove("v1.0", "c1"));
        assert!(cache.tags_at("c1").is_empty());
        assert_eq!(cache.commit_count(), 1);
        assert_eq!(cache.commit_of("v1.1"), Some("c2"));
    }

    #[test]
    fn test_tag_info_parses_version() {
        assert_eq!(
            TagInfo::new("v1.5.0", "c1").version.map(|v| v.to_string()),
            Some("1.5.0".to_string())
        );
        assert!(TagInfo::new("release", "c1").version.is_none());
    }

    #[test]
    fn test_digest_is_order_independent() {
        let a = vec!["b".to_string(), "a".to_string()];
        let b = vec!["a".to_string(), "b".to_string()];
        assert_eq!(digest_tag_names(&a), digest_tag_names(&b));
        assert_ne!(digest_tag_names(&a), digest_tag_names(&["a".to_string()]));
        assert_eq!(digest_tag_names(&a).len(), 64);
    }

    #[test]
    fn test_names_by_commit() {
        let cache = TagCache::from_targets(vec![
            ("v1.0".to_string(), "c1".to_string()),
            ("latest".to_string(), "c1".to_string()),
        ]);
        let map = cache.names_by_commit();
        assert_eq!(map["c1"], vec!["latest".to_string(), "v1.0".to_string()]);
    }

    #[test]
    fn test_cache_serializes_as_commit_map() {
        let cache = TagCache::from_targets(vec![("v1.0".to_string(), "c1".to_string())]);
        let json = serde_json::to_value(&cache).unwrap();
        assert_eq!(json["c1"][0]["name"], "v1.0");
        assert_eq!(json["c1"][0]["targetCommitHash"], "c1");
        assert_eq!(json["c1"][0]["version"]["minor"], 0);
    }
}
