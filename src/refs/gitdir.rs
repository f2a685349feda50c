use std::fs;
use std::path::{Path, PathBuf};

/// Where a repository keeps its metadata
///
/// For an ordinary clone both paths are `<worktree>/.git`. A linked worktree
/// has a private `git_dir` (under `.git/worktrees/<name>`) that points back to
/// the shared `common_dir` holding refs and objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitDirs {
    pub git_dir: PathBuf,
    pub common_dir: PathBuf,
}

impl GitDirs {
    /// Locate the git directories for a working tree, `.git` file, or bare
    /// repository path. Returns `None` when the path is not a repository.
    pub fn locate(path: &Path) -> Option<Self> {
        let dotgit = path.join(".git");
        let git_dir = if dotgit.is_dir() {
            dotgit
        } else if dotgit.is_file() {
            read_gitdir_pointer(&dotgit)?
        } else if path.is_file() {
            read_gitdir_pointer(path)?
        } else if looks_like_git_dir(path) {
            path.to_path_buf()
        } else {
            return None;
        };

        Some(Self::from_git_dir(git_dir))
    }

    /// Build from a known git directory, following its `commondir` file
    pub fn from_git_dir(git_dir: PathBuf) -> Self {
        let common_dir = fs::read_to_string(git_dir.join("commondir"))
            .ok()
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .map(|content| git_dir.join(content))
            .unwrap_or_else(|| git_dir.clone());

        GitDirs {
            git_dir,
            common_dir,
        }
    }
}

/// Follow a `gitdir: <path>` file, as written for linked worktrees and
/// submodules. Relative targets are relative to the file's directory.
fn read_gitdir_pointer(file: &Path) -> Option<PathBuf> {
    let content = fs::read_to_string(file).ok()?;
    let target = content
        .lines()
        .find_map(|line| line.strip_prefix("gitdir:"))?
        .trim();
    if target.is_empty() {
        return None;
    }

    let base = file.parent().unwrap_or_else(|| Path::new("."));
    let resolved = base.join(target);
    resolved.is_dir().then_some(resolved)
}

fn looks_like_git_dir(path: &Path) -> bool {
    path.join("HEAD").is_file() && (path.join("refs").is_dir() || path.join("commondir").is_file())
}
