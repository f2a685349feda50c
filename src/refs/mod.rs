//! Fast tag resolution straight from ref storage
//!
//! Listing and resolving thousands of tags through libgit2 one reference at a
//! time is slow. [FastTagResolver] reads the two places git keeps tag refs
//! directly:
//!
//! - the `packed-refs` flat file (see [packed])
//! - one loose file per tag under `refs/tags/`, which overrides a packed entry
//!   of the same name
//!
//! Only annotated tags that carry no peel information need an object lookup,
//! and those are handed to libgit2 in one sequential pass.

pub mod gitdir;
pub mod packed;

pub use gitdir::GitDirs;
pub use packed::{PackedRef, PackedRefs};

use crate::error::{AutoverError, Result};
use chrono::{DateTime, Utc};
use git2::{ObjectType, Oid, Repository as Git2Repo};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

const MAX_SYMREF_DEPTH: usize = 5;

/// Timestamp key for the newest loose tag file.
pub const LOOSE_REFS_KEY: &str = "refs/tags/*";

/// A tag resolved as far as ref storage allows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTag {
    /// Short tag name (`v1.0.0`)
    pub name: String,
    /// Object the ref names directly; a tag object for annotated tags
    pub object: String,
    /// Commit the tag ultimately points at, if it leads to one
    pub commit: Option<String>,
}

/// Something that can map tag names to their target commits in bulk
///
/// Names that do not resolve to a commit are left out of the result.
pub trait TagTargetSource {
    fn resolve_targets(&self, names: &[String]) -> HashMap<String, String>;
}

/// Reader for a repository's tag refs that bypasses libgit2's ref database
#[derive(Debug, Clone)]
pub struct FastTagResolver {
    dirs: GitDirs,
}

/// Direct ref lookup before any peeling
struct DirectRef {
    hash: String,
    peeled: Option<String>,
    /// Whether a fully-peeled `packed-refs` vouches that `hash` is not an
    /// annotated tag; used only when the object database cannot be read
    peel_known: bool,
}

impl FastTagResolver {
    /// Open the ref storage of the repository at `path`
    ///
    /// `path` may be a working tree, a `.git` file or a git directory.
    pub fn open(path: &Path) -> Result<Self> {
        GitDirs::locate(path)
            .map(|dirs| FastTagResolver { dirs })
            .ok_or_else(|| AutoverError::NotARepository(path.to_path_buf()))
    }

    /// Build from an already-known git directory
    pub fn from_git_dir(git_dir: &Path) -> Self {
        FastTagResolver {
            dirs: GitDirs::from_git_dir(git_dir.to_path_buf()),
        }
    }

    pub fn git_dirs(&self) -> &GitDirs {
        &self.dirs
    }

    fn tags_dir(&self) -> PathBuf {
        self.dirs.common_dir.join("refs").join("tags")
    }

    fn packed_refs_path(&self) -> PathBuf {
        self.dirs.common_dir.join("packed-refs")
    }

    fn packed_refs(&self) -> Result<PackedRefs> {
        Ok(PackedRefs::read(&self.packed_refs_path())?)
    }

    /// Every tag name, packed and loose, sorted and de-duplicated
    pub fn list_tags(&self) -> Result<Vec<String>> {
        let packed = self.packed_refs()?;
        let mut names: Vec<String> = packed.tag_names().map(str::to_string).collect();
        collect_loose_names(&self.tags_dir(), "", &mut names)?;
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Resolve one tag to the object its ref names
    ///
    /// For an annotated tag this is the tag object, not the commit; use
    /// [FastTagResolver::resolve_batch_with_target_commit] to peel.
    pub fn resolve_one(&self, name: &str) -> Result<Option<String>> {
        let packed = self.packed_refs()?;
        Ok(self.lookup(&packed, name).map(|direct| direct.hash))
    }

    /// Resolve many tags at once; loose refs are read in parallel
    pub fn resolve_batch(&self, names: &[String]) -> Result<Vec<(String, Option<String>)>> {
        let packed = self.packed_refs()?;
        Ok(names
            .par_iter()
            .map(|name| {
                let hash = self.lookup(&packed, name).map(|direct| direct.hash);
                (name.clone(), hash)
            })
            .collect())
    }

    /// Resolve many tags through to the commits they ultimately point at
    ///
    /// Peel lines from `packed-refs` are used when present. Every other ref
    /// has its object type checked and annotated tags are peeled with
    /// libgit2; tags on trees or blobs resolve to no commit.
    pub fn resolve_batch_with_target_commit(&self, names: &[String]) -> Result<Vec<ResolvedTag>> {
        let packed = self.packed_refs()?;
        let direct: Vec<(String, Option<DirectRef>)> = names
            .par_iter()
            .map(|name| (name.clone(), self.lookup(&packed, name)))
            .collect();

        let needs_odb = direct
            .iter()
            .any(|(_, d)| matches!(d, Some(d) if d.peeled.is_none()));
        let repo = if needs_odb {
            match Git2Repo::open(&self.dirs.git_dir) {
                Ok(repo) => Some(repo),
                Err(e) => {
                    debug!("cannot open object database for peeling: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(direct
            .into_iter()
            .filter_map(|(name, direct)| {
                let direct = direct?;
                let commit = match (&direct.peeled, &repo) {
                    (Some(peeled), _) => Some(peeled.clone()),
                    (None, Some(repo)) => peel_to_commit(repo, &direct.hash),
                    (None, None) => direct.peel_known.then(|| direct.hash.clone()),
                };
                Some(ResolvedTag {
                    name,
                    object: direct.hash,
                    commit,
                })
            })
            .collect())
    }

    /// Modification times of everything that stores tag refs, in nanoseconds
    /// since the Unix epoch
    ///
    /// Keys are `packed-refs`, each directory under `refs/tags` and
    /// [LOOSE_REFS_KEY] for the newest loose tag file. Moving a tag rewrites
    /// at least one of these.
    pub fn ref_storage_timestamps(&self) -> BTreeMap<String, i64> {
        let mut stamps = BTreeMap::new();
        if let Some(nanos) = mtime_nanos(&self.packed_refs_path()) {
            stamps.insert("packed-refs".to_string(), nanos);
        }

        let mut newest_loose: Option<i64> = None;
        collect_dir_stamps(
            &self.tags_dir(),
            "refs/tags",
            &mut stamps,
            &mut newest_loose,
        );
        if let Some(nanos) = newest_loose {
            stamps.insert(LOOSE_REFS_KEY.to_string(), nanos);
        }
        stamps
    }

    fn lookup(&self, packed: &PackedRefs, name: &str) -> Option<DirectRef> {
        self.lookup_ref(packed, &format!("{}{}", packed::TAGS_PREFIX, name), 0)
    }

    fn lookup_ref(&self, packed: &PackedRefs, refname: &str, depth: usize) -> Option<DirectRef> {
        if depth > MAX_SYMREF_DEPTH {
            debug!("symbolic ref chain too deep at {}", refname);
            return None;
        }

        match read_loose_ref(&self.dirs.common_dir.join(refname)) {
            Ok(Some(LooseRef::Direct(hash))) => Some(DirectRef {
                hash,
                peeled: None,
                peel_known: false,
            }),
            Ok(Some(LooseRef::Symbolic(target))) => self.lookup_ref(packed, &target, depth + 1),
            Ok(None) => packed.get(refname).map(|entry| DirectRef {
                hash: entry.hash.clone(),
                peeled: entry.peeled.clone(),
                peel_known: packed.peel_complete(),
            }),
            Err(e) => {
                debug!("cannot read loose ref {}: {}", refname, e);
                None
            }
        }
    }
}

impl TagTargetSource for FastTagResolver {
    fn resolve_targets(&self, names: &[String]) -> HashMap<String, String> {
        match self.resolve_batch_with_target_commit(names) {
            Ok(resolved) => resolved
                .into_iter()
                .filter_map(|tag| tag.commit.map(|commit| (tag.name, commit)))
                .collect(),
            Err(e) => {
                debug!("batch tag resolution failed: {}", e);
                HashMap::new()
            }
        }
    }
}

enum LooseRef {
    Direct(String),
    Symbolic(String),
}

fn read_loose_ref(path: &Path) -> io::Result<Option<LooseRef>> {
    if !path.is_file() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let content = content.trim();

    if let Some(target) = content.strip_prefix("ref:") {
        return Ok(Some(LooseRef::Symbolic(target.trim().to_string())));
    }
    if packed::is_object_hash(content) {
        return Ok(Some(LooseRef::Direct(content.to_ascii_lowercase())));
    }
    Ok(None)
}

fn peel_to_commit(repo: &Git2Repo, hash: &str) -> Option<String> {
    let oid = Oid::from_str(hash).ok()?;
    let kind = match repo.odb().and_then(|odb| odb.read_header(oid)) {
        Ok((_, kind)) => kind,
        Err(e) => {
            debug!("cannot read object header {}: {}", hash, e);
            return None;
        }
    };

    match kind {
        ObjectType::Commit => Some(hash.to_string()),
        ObjectType::Tag => repo
            .find_object(oid, Some(ObjectType::Tag))
            .and_then(|object| object.peel_to_commit())
            .map(|commit| commit.id().to_string())
            .ok(),
        _ => None,
    }
}

fn is_lock_file(name: &str) -> bool {
    name.ends_with(".lock")
}

fn collect_loose_names(dir: &Path, prefix: &str, names: &mut Vec<String>) -> io::Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let name = format!("{}{}", prefix, file_name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_loose_names(&entry.path(), &format!("{}/", name), names)?;
        } else if file_type.is_file() && !is_lock_file(&file_name) {
            if let Ok(Some(_)) = read_loose_ref(&entry.path()) {
                names.push(name);
            }
        }
    }
    Ok(())
}

fn mtime_nanos(path: &Path) -> Option<i64> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(system_time_nanos)
}

fn system_time_nanos(time: SystemTime) -> Option<i64> {
    DateTime::<Utc>::from(time).timestamp_nanos_opt()
}

fn collect_dir_stamps(
    dir: &Path,
    key: &str,
    stamps: &mut BTreeMap<String, i64>,
    newest_loose: &mut Option<i64>,
) {
    let Some(nanos) = mtime_nanos(dir) else {
        return;
    };
    stamps.insert(key.to_string(), nanos);

    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if meta.is_dir() {
            collect_dir_stamps(
                &entry.path(),
                &format!("{}/{}", key, file_name),
                stamps,
                newest_loose,
            );
        } else if !is_lock_file(&file_name) {
            if let Some(nanos) = meta.modified().ok().and_then(system_time_nanos) {
                *newest_loose = Some(newest_loose.map_or(nanos, |n| n.max(nanos)));
            }
        }
    }
}
