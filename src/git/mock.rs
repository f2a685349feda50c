use crate::error::Result;
use crate::git::{short_hash, CommitInfo, Repository};
use chrono::{DateTime, Utc};
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};

/// In-memory commit graph for testing without actual git operations
pub struct MockRepository {
    commits: HashMap<String, CommitInfo>,
    tags: BTreeMap<String, String>,
    branch_heads: BTreeMap<String, String>,
    head: Option<String>,
    dirty: bool,
    commit_lookups: Cell<usize>,
}

impl MockRepository {
    /// Create a new empty mock repository
    pub fn new() -> Self {
        MockRepository {
            commits: HashMap::new(),
            tags: BTreeMap::new(),
            branch_heads: BTreeMap::new(),
            head: None,
            dirty: false,
            commit_lookups: Cell::new(0),
        }
    }

    /// Add a commit with the given parents; the newest commit becomes `HEAD`
    pub fn add_commit(&mut self, hash: impl Into<String>, parents: &[&str]) {
        let hash = hash.into();
        let info = CommitInfo {
            short_hash: short_hash(&hash),
            author_date: DateTime::<Utc>::default(),
            message: format!("commit {}", hash),
            parent_hashes: parents.iter().map(|p| p.to_string()).collect(),
            hash: hash.clone(),
        };
        self.commits.insert(hash.clone(), info);
        self.head = Some(hash);
    }

    /// Add a tag pointing to a commit, replacing any tag with the same name
    pub fn add_tag(&mut self, name: impl Into<String>, hash: impl Into<String>) {
        self.tags.insert(name.into(), hash.into());
    }

    /// Set a branch head
    pub fn set_branch_head(&mut self, branch: impl Into<String>, hash: impl Into<String>) {
        self.branch_heads.insert(branch.into(), hash.into());
    }

    /// Point `HEAD` at a commit
    pub fn set_head(&mut self, hash: impl Into<String>) {
        self.head = Some(hash.into());
    }

    /// Mark the working tree as having local changes
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    /// Number of `find_commit` calls served so far
    pub fn commit_lookups(&self) -> usize {
        self.commit_lookups.get()
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        let mut pending = vec![descendant.to_string()];
        let mut seen = std::collections::HashSet::new();
        while let Some(hash) = pending.pop() {
            if hash == ancestor {
                return true;
            }
            if !seen.insert(hash.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&hash) {
                pending.extend(commit.parent_hashes.iter().cloned());
            }
        }
        false
    }
}

impl Default for MockRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for MockRepository {
    fn current_commit(&self) -> Result<Option<String>> {
        Ok(self.head.clone())
    }

    fn find_commit(&self, hash: &str) -> Result<Option<CommitInfo>> {
        self.commit_lookups.set(self.commit_lookups.get() + 1);
        Ok(self.commits.get(hash).cloned())
    }

    fn tag_names(&self) -> Result<Vec<String>> {
        Ok(self.tags.keys().cloned().collect())
    }

    fn resolve_tag(&self, name: &str) -> Result<Option<String>> {
        Ok(self.tags.get(name).cloned())
    }

    fn tags_at(&self, hash: &str) -> Result<Vec<String>> {
        Ok(self
            .tags
            .iter()
            .filter(|(_, target)| target.as_str() == hash)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn branches_containing(&self, hash: &str) -> Result<Vec<String>> {
        Ok(self
            .branch_heads
            .iter()
            .filter(|(_, tip)| self.is_ancestor(hash, tip))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(self.dirty)
    }
}
