//! Version resolution over the commit graph
//!
//! A commit's version is derived from the nearest version tags in its
//! ancestry:
//!
//! 1. Walk first parents until a commit that is already resolved, carries a
//!    version tag with at least `major.minor`, or has no parents.
//! 2. Walk back towards the starting commit. At a merge, every non-primary
//!    parent is resolved the same way and the highest version seen wins.
//!    Each commit then adds one to the right-most component.
//!
//! Results are memoized per commit for the duration of one call, so shared
//! history behind repeated merges is walked once.

use crate::git::Repository;
use crate::version::Version;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Versions already computed during one resolution, keyed by commit hash
pub type Memo = HashMap<String, Version>;

/// Computes versions for commits of one repository
pub struct VersionResolver<'r, R: Repository + ?Sized> {
    repo: &'r R,
}

impl<'r, R: Repository + ?Sized> VersionResolver<'r, R> {
    pub fn new(repo: &'r R) -> Self {
        VersionResolver { repo }
    }

    /// Version of a commit
    ///
    /// Never fails: lookups that miss or error fall through to the default
    /// `0.0.1` for that part of the history.
    pub fn resolve(&self, commit: &str) -> Version {
        let mut memo = Memo::new();
        self.resolve_with(commit, &mut memo)
    }

    /// Version of a commit, sharing already resolved commits through `memo`
    pub fn resolve_with(&self, commit: &str, memo: &mut Memo) -> Version {
        let mut on_stack: HashSet<String> = HashSet::new();
        self.walk(commit, memo, &mut on_stack)
    }

    /// `on_stack` holds every commit still waiting to be unwound, across
    /// merge-parent recursion, so a malformed graph cannot loop
    fn walk(&self, commit: &str, memo: &mut Memo, on_stack: &mut HashSet<String>) -> Version {
        let mut pending: Vec<(String, Vec<String>)> = Vec::new();
        let mut current = commit.to_string();
        let mut carried = Version::initial();

        loop {
            if let Some(known) = memo.get(&current) {
                carried = known.clone();
                break;
            }
            if on_stack.contains(&current) {
                debug!("commit {} is its own ancestor", current);
                break;
            }
            if let Some(anchor) = self.anchor_version(&current) {
                memo.insert(current, anchor.clone());
                carried = anchor;
                break;
            }

            let parents = self.parents(&current);
            match parents.first() {
                Some(primary) if !on_stack.contains(primary) => {
                    let primary = primary.clone();
                    on_stack.insert(current.clone());
                    pending.push((current, parents));
                    current = primary;
                }
                _ => {
                    memo.insert(current, carried.clone());
                    break;
                }
            }
        }

        while let Some((hash, parents)) = pending.pop() {
            for merged in parents.iter().skip(1) {
                let branch = self.walk(merged, memo, on_stack);
                if branch > carried {
                    carried = branch;
                }
            }
            carried = carried.increment();
            on_stack.remove(&hash);
            memo.insert(hash, carried.clone());
        }

        carried
    }

    /// Highest tag on the commit that parses as a version with a minor part
    fn anchor_version(&self, commit: &str) -> Option<Version> {
        let tags = match self.repo.tags_at(commit) {
            Ok(tags) => tags,
            Err(e) => {
                debug!("cannot read tags of {}: {}", commit, e);
                return None;
            }
        };
        tags.iter()
            .filter_map(|tag| Version::parse(tag))
            .filter(Version::has_minor)
            .max()
    }

    fn parents(&self, commit: &str) -> Vec<String> {
        match self.repo.find_commit(commit) {
            Ok(Some(info)) => info.parent_hashes,
            Ok(None) => {
                debug!("commit {} not found", commit);
                Vec::new()
            }
            Err(e) => {
                debug!("cannot read commit {}: {}", commit, e);
                Vec::new()
            }
        }
    }
}
