//! Top-level entry points: the version of a revision, with or without the
//! surrounding commit metadata.
//!
//! Both functions answer `None` rather than an error when no version can be
//! determined (the path is not a repository, the revision does not exist),
//! so build tooling can carry on without one.

use crate::cache::{load_or_build_tag_cache, CacheStore};
use crate::git::{Git2Repository, Repository};
use crate::resolver::VersionResolver;
use crate::version::Version;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::path::Path;
use tracing::{debug, warn};

/// How [describe] picks and post-processes the commit
#[derive(Debug, Clone, Default)]
pub struct DescribeOptions<'a> {
    /// Revision expression, `HEAD` when absent
    pub revision: Option<String>,
    /// Bump the version once more when the working tree has changes
    pub check_working_tree: bool,
    /// Answer tag lookups from the persistent tag cache in this store
    pub cache: Option<&'a CacheStore>,
}

/// A commit's version together with what identifies the commit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    #[serde(serialize_with = "as_display")]
    pub version: Version,
    pub commit: String,
    pub short_hash: String,
    pub author_date: DateTime<Utc>,
    pub summary: String,
    /// Every tag on the commit, version or not
    pub tags: Vec<String>,
    /// Local branches whose tip is the commit or descends from it
    pub branches: Vec<String>,
    /// Working tree state, present only when it was checked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dirty: Option<bool>,
}

fn as_display<S: Serializer>(version: &Version, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(version)
}

/// Version of a revision (`HEAD` when `revision` is `None`)
///
/// With `check_working_tree`, uncommitted changes on top of the checked-out
/// commit add one more increment.
pub fn resolve_version(
    repo_path: &Path,
    revision: Option<&str>,
    check_working_tree: bool,
) -> Option<Version> {
    let repo = open_repository(repo_path, None)?;
    let commit = target_commit(&repo, revision)?;
    let dirty = check_working_tree && working_tree_dirty(&repo, &commit);
    Some(version_of(&repo, &commit, dirty))
}

/// Version of a revision plus the commit's hash, date, summary, tags and
/// branches
pub fn describe(repo_path: &Path, options: &DescribeOptions) -> Option<VersionMetadata> {
    let repo = open_repository(repo_path, options.cache)?;
    let commit = target_commit(&repo, options.revision.as_deref())?;

    let info = match repo.find_commit(&commit) {
        Ok(Some(info)) => info,
        Ok(None) => {
            debug!("commit {} vanished while describing it", commit);
            return None;
        }
        Err(e) => {
            warn!("cannot read commit {}: {}", commit, e);
            return None;
        }
    };

    let dirty = options
        .check_working_tree
        .then(|| working_tree_dirty(&repo, &commit));
    let version = version_of(&repo, &commit, dirty.unwrap_or(false));

    let tags = repo.tags_at(&commit).unwrap_or_else(|e| {
        warn!("cannot read tags of {}: {}", commit, e);
        Vec::new()
    });
    let branches = repo.branches_containing(&commit).unwrap_or_else(|e| {
        warn!("cannot list branches containing {}: {}", commit, e);
        Vec::new()
    });

    Some(VersionMetadata {
        version,
        summary: info.summary().to_string(),
        commit: info.hash,
        short_hash: info.short_hash,
        author_date: info.author_date,
        tags,
        branches,
        dirty,
    })
}

fn open_repository(repo_path: &Path, cache: Option<&CacheStore>) -> Option<Git2Repository> {
    let repo = match Git2Repository::open(repo_path) {
        Ok(repo) => repo,
        Err(e) => {
            debug!("no version metadata for {}: {}", repo_path.display(), e);
            return None;
        }
    };

    let Some(store) = cache else {
        return Some(repo);
    };
    match load_or_build_tag_cache(repo.root(), store) {
        Ok((tags, stats)) => {
            debug!("tag cache ready: {:?}", stats);
            Some(repo.with_tag_cache(&tags))
        }
        Err(e) => {
            warn!("tag cache unavailable, reading tags directly: {}", e);
            Some(repo)
        }
    }
}

fn target_commit(repo: &Git2Repository, revision: Option<&str>) -> Option<String> {
    let resolved = match revision {
        Some(spec) => repo.resolve_revision(spec),
        None => repo.current_commit(),
    };
    match resolved {
        Ok(Some(commit)) => Some(commit),
        Ok(None) => {
            debug!("revision {} does not name a commit", revision.unwrap_or("HEAD"));
            None
        }
        Err(e) => {
            warn!("cannot resolve {}: {}", revision.unwrap_or("HEAD"), e);
            None
        }
    }
}

/// Whether `commit` is checked out with uncommitted changes on top
///
/// A revision other than the checked-out commit is never dirty: the working
/// tree says nothing about it.
fn working_tree_dirty(repo: &Git2Repository, commit: &str) -> bool {
    match repo.current_commit() {
        Ok(Some(head)) if head == commit => {}
        _ => return false,
    }
    repo.is_dirty().unwrap_or_else(|e| {
        warn!("cannot read working tree status: {}", e);
        false
    })
}

fn version_of(repo: &Git2Repository, commit: &str, dirty: bool) -> Version {
    let version = VersionResolver::new(repo).resolve(commit);
    if dirty {
        version.increment()
    } else {
        version
    }
}
