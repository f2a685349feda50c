//! Git repository access
//!
//! This module provides a trait-based abstraction over the read-only git
//! operations version resolution needs, allowing for a real repository
//! implementation and a mock implementation for testing.
//!
//! # Overview
//!
//! The primary abstraction is the [Repository] trait. The concrete
//! implementations include:
//!
//! - [repository::Git2Repository]: A real implementation using the `git2` crate
//! - [mock::MockRepository]: An in-memory commit graph for tests
//!
//! # Soft misses
//!
//! Lookups that can legitimately find nothing (an unknown hash, an unborn
//! `HEAD`, a tag that points nowhere) return `Ok(None)` or an empty list. An
//! `Err` is reserved for unexpected storage failures, and callers such as
//! [crate::resolver::VersionResolver] are free to downgrade those to a miss.

pub mod mock;
pub mod repository;

pub use mock::MockRepository;
pub use repository::Git2Repository;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Length of the abbreviated hash shown to users.
pub const SHORT_HASH_LEN: usize = 7;

/// Immutable snapshot of a commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitInfo {
    /// The full commit hash
    pub hash: String,
    /// The abbreviated commit hash
    pub short_hash: String,
    /// When the commit was authored
    pub author_date: DateTime<Utc>,
    /// The commit message
    pub message: String,
    /// Parent hashes; index 0 is the primary parent
    pub parent_hashes: Vec<String>,
}

impl CommitInfo {
    /// The mainline parent, if the commit is not a root commit
    pub fn primary_parent(&self) -> Option<&str> {
        self.parent_hashes.first().map(String::as_str)
    }

    /// Whether this commit joins two or more histories
    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() > 1
    }

    /// First line of the commit message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Abbreviate a full hash for display.
pub fn short_hash(hash: &str) -> String {
    hash.chars().take(SHORT_HASH_LEN).collect()
}

/// Read-only git operations used by version resolution
///
/// ## Error Handling
///
/// Every method returns [crate::error::Result]. A value that simply does not
/// exist is `Ok(None)` or an empty `Vec`; implementations map real failures
/// (like `git2::Error`) into [crate::error::AutoverError].
///
/// ## Implementations
///
/// - [Git2Repository](repository::Git2Repository): Real Git implementation using the `git2` crate
/// - [MockRepository](mock::MockRepository): Test implementation for mocking Git operations
pub trait Repository {
    /// Resolve the commit currently checked out
    ///
    /// # Returns
    /// * `Ok(Some(hash))` - Full hash of the `HEAD` commit
    /// * `Ok(None)` - If `HEAD` is unborn (no commits yet)
    fn current_commit(&self) -> Result<Option<String>>;

    /// Fetch a commit by its full hash
    ///
    /// # Returns
    /// * `Ok(Some(CommitInfo))` - The commit snapshot
    /// * `Ok(None)` - If no commit with that hash exists
    fn find_commit(&self, hash: &str) -> Result<Option<CommitInfo>>;

    /// List every tag name in the repository, sorted
    fn tag_names(&self) -> Result<Vec<String>>;

    /// Resolve a tag to the commit it ultimately points at
    ///
    /// Annotated tags are de-referenced through to their target commit.
    ///
    /// # Returns
    /// * `Ok(Some(hash))` - The target commit hash
    /// * `Ok(None)` - If the tag doesn't exist or doesn't lead to a commit
    fn resolve_tag(&self, name: &str) -> Result<Option<String>>;

    /// All tag names that resolve to the given commit, sorted by name
    fn tags_at(&self, hash: &str) -> Result<Vec<String>>;

    /// Local branches whose tip is the given commit or descends from it
    fn branches_containing(&self, hash: &str) -> Result<Vec<String>>;

    /// Whether the working tree has staged, unstaged, deleted, or
    /// untracked-and-not-ignored changes
    fn is_dirty(&self) -> Result<bool>;
}
