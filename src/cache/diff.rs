use crate::cache::{TagCache, TagInfo};
use crate::refs::TagTargetSource;
use std::collections::HashSet;

/// Counts produced by one differential update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffStats {
    pub added: usize,
    pub deleted: usize,
    pub modified: usize,
    pub unchanged: usize,
}

/// Bring a cached commit → tags map up to date with the current tag names
///
/// Names only in the cache are removed, names only in `current` are resolved
/// and inserted. Names in both are re-resolved and, when their commit moved,
/// counted as modified and re-filed under the new commit. A name that no
/// longer resolves to a commit is dropped and counted as deleted.
pub fn apply_diff<S>(cache: &mut TagCache, current: &[String], source: &S) -> DiffStats
where
    S: TagTargetSource + ?Sized,
{
    let cached = cache.targets();
    let current_set: HashSet<&str> = current.iter().map(String::as_str).collect();
    let mut stats = DiffStats::default();

    let mut deleted: Vec<(&String, &String)> = cached
        .iter()
        .filter(|(name, _)| !current_set.contains(name.as_str()))
        .collect();
    deleted.sort();
    for (name, commit) in deleted {
        cache.remove(name, commit);
        stats.deleted += 1;
    }

    let (kept, added): (Vec<String>, Vec<String>) = current
        .iter()
        .cloned()
        .partition(|name| cached.contains_key(name));

    if !added.is_empty() {
        let resolved = source.resolve_targets(&added);
        for name in added {
            if let Some(commit) = resolved.get(&name) {
                cache.insert(TagInfo::new(name, commit.clone()));
                stats.added += 1;
            }
        }
    }

    if !kept.is_empty() {
        let resolved = source.resolve_targets(&kept);
        for name in kept {
            let old_commit = &cached[&name];
            match resolved.get(&name) {
                Some(commit) if commit == old_commit => stats.unchanged += 1,
                Some(commit) => {
                    cache.remove(&name, old_commit);
                    cache.insert(TagInfo::new(name, commit.clone()));
                    stats.modified += 1;
                }
                None => {
                    cache.remove(&name, old_commit);
                    stats.deleted += 1;
                }
            }
        }
    }

    stats
}
