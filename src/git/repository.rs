use crate::cache::TagCache;
use crate::error::{AutoverError, Result};
use crate::git::{short_hash, CommitInfo};
use crate::refs::{FastTagResolver, TagTargetSource};
use chrono::{DateTime, Utc};
use git2::{BranchType, ErrorCode, Oid, Repository as Git2Repo, StatusOptions};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Wrapper around git2::Repository with our trait interface
///
/// Tag lookups by commit go through an index built on first use, from the
/// repository's ref storage via [FastTagResolver], or seeded from a loaded
/// [TagCache] with [Git2Repository::with_tag_cache].
pub struct Git2Repository {
    repo: Git2Repo,
    tag_index: OnceCell<HashMap<String, Vec<String>>>,
}

fn soft_miss<T>(result: std::result::Result<T, git2::Error>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Git2Repository {
    /// Open or discover a git repository
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Git2Repo::discover(path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                AutoverError::NotARepository(path.to_path_buf())
            } else {
                AutoverError::Git(e)
            }
        })?;

        Ok(Self::from_git2(repo))
    }

    /// Create from existing git2::Repository
    pub fn from_git2(repo: Git2Repo) -> Self {
        Git2Repository {
            repo,
            tag_index: OnceCell::new(),
        }
    }

    /// Answer tag lookups from an already loaded tag cache
    pub fn with_tag_cache(self, cache: &TagCache) -> Self {
        let tag_index = OnceCell::new();
        let _ = tag_index.set(cache.names_by_commit());
        Git2Repository { tag_index, ..self }
    }

    /// The working tree, or the git directory for a bare repository
    pub fn root(&self) -> &Path {
        self.repo.workdir().unwrap_or_else(|| self.repo.path())
    }

    /// Resolve a revision expression (`HEAD~2`, a branch, a tag, a hash)
    ///
    /// # Returns
    /// * `Ok(Some(hash))` - The commit the revision names
    /// * `Ok(None)` - If the revision doesn't exist or isn't a commit
    pub fn resolve_revision(&self, spec: &str) -> Result<Option<String>> {
        let object = match self.repo.revparse_single(spec) {
            Ok(object) => object,
            Err(e)
                if matches!(
                    e.code(),
                    ErrorCode::NotFound
                        | ErrorCode::UnbornBranch
                        | ErrorCode::InvalidSpec
                        | ErrorCode::Ambiguous
                ) =>
            {
                debug!("revision '{}' not found: {}", spec, e);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Ok(object.peel_to_commit().ok().map(|c| c.id().to_string()))
    }

    fn tag_index(&self) -> &HashMap<String, Vec<String>> {
        self.tag_index.get_or_init(|| self.build_tag_index())
    }

    fn build_tag_index(&self) -> HashMap<String, Vec<String>> {
        let resolver = FastTagResolver::from_git_dir(self.repo.path());
        let targets = match resolver.list_tags() {
            Ok(names) => resolver.resolve_targets(&names),
            Err(e) => {
                debug!("reading ref storage failed, enumerating tags via libgit2: {}", e);
                self.targets_via_git2()
            }
        };

        let mut index: HashMap<String, Vec<String>> = HashMap::new();
        for (name, commit) in targets {
            index.entry(commit).or_default().push(name);
        }
        for names in index.values_mut() {
            names.sort();
        }
        index
    }

    fn targets_via_git2(&self) -> HashMap<String, String> {
        let names = match self.repo.tag_names(None) {
            Ok(names) => names,
            Err(e) => {
                debug!("cannot list tags: {}", e);
                return HashMap::new();
            }
        };
        names
            .iter()
            .flatten()
            .filter_map(|name| {
                let commit = self.peel_tag(name).ok().flatten()?;
                Some((name.to_string(), commit))
            })
            .collect()
    }

    fn peel_tag(&self, name: &str) -> Result<Option<String>> {
        let Some(reference) = soft_miss(self.repo.find_reference(&format!("refs/tags/{}", name)))?
        else {
            return Ok(None);
        };
        Ok(reference.peel_to_commit().ok().map(|c| c.id().to_string()))
    }
}

impl super::Repository for Git2Repository {
    fn current_commit(&self) -> Result<Option<String>> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        };
        match head.peel_to_commit() {
            Ok(commit) => Ok(Some(commit.id().to_string())),
            Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_commit(&self, hash: &str) -> Result<Option<CommitInfo>> {
        let Ok(oid) = Oid::from_str(hash) else {
            return Ok(None);
        };
        let Some(commit) = soft_miss(self.repo.find_commit(oid))? else {
            return Ok(None);
        };

        let author_date = DateTime::<Utc>::from_timestamp(commit.author().when().seconds(), 0)
            .unwrap_or_default();

        Ok(Some(CommitInfo {
            hash: oid.to_string(),
            short_hash: short_hash(&oid.to_string()),
            author_date,
            message: commit.message().unwrap_or("(empty message)").to_string(),
            parent_hashes: commit.parent_ids().map(|id| id.to_string()).collect(),
        }))
    }

    fn tag_names(&self) -> Result<Vec<String>> {
        let tags = self.repo.tag_names(None)?;
        let mut names: Vec<String> = tags.iter().flatten().map(|s| s.to_string()).collect();
        names.sort();
        Ok(names)
    }

    fn resolve_tag(&self, name: &str) -> Result<Option<String>> {
        self.peel_tag(name)
    }

    fn tags_at(&self, hash: &str) -> Result<Vec<String>> {
        Ok(self.tag_index().get(hash).cloned().unwrap_or_default())
    }

    fn branches_containing(&self, hash: &str) -> Result<Vec<String>> {
        let Ok(oid) = Oid::from_str(hash) else {
            return Ok(Vec::new());
        };

        let mut names = Vec::new();
        for branch in self.repo.branches(Some(BranchType::Local))? {
            let (branch, _) = branch?;
            let Some(tip) = branch.get().target() else {
                continue;
            };
            if tip == oid || self.repo.graph_descendant_of(tip, oid)? {
                if let Some(name) = branch.name()? {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn is_dirty(&self) -> Result<bool> {
        if self.repo.is_bare() {
            return Ok(false);
        }

        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .include_ignored(false)
            .recurse_untracked_dirs(false)
            .exclude_submodules(true);
        let statuses = self.repo.statuses(Some(&mut opts))?;

        Ok(statuses.iter().any(|entry| {
            let status = entry.status();
            !status.is_empty() && !status.contains(git2::Status::IGNORED)
        }))
    }
}
