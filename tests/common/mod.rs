//! Throwaway git repositories built with git2 for integration tests
#![allow(dead_code)]

use git2::{Oid, Repository, Signature};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub struct TestRepo {
    dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test User").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        TestRepo { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn signature(&self) -> Signature<'static> {
        Signature::now("Test User", "test@example.com").unwrap()
    }

    fn write_commit(&self, update_ref: Option<&str>, message: &str, parents: &[Oid]) -> Oid {
        let tree_id = self.repo.treebuilder(None).unwrap().write().unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();
        let parents: Vec<git2::Commit> = parents
            .iter()
            .map(|oid| self.repo.find_commit(*oid).unwrap())
            .collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        let sig = self.signature();
        self.repo
            .commit(update_ref, &sig, &sig, message, &tree, &parent_refs)
            .unwrap()
    }

    pub fn head(&self) -> Option<Oid> {
        self.repo.head().ok().and_then(|h| h.target())
    }

    /// Commit on the checked-out branch
    pub fn commit(&self, message: &str) -> Oid {
        let parents: Vec<Oid> = self.head().into_iter().collect();
        self.write_commit(Some("HEAD"), message, &parents)
    }

    /// Commit off to the side, without moving any ref
    pub fn commit_with_parents(&self, message: &str, parents: &[Oid]) -> Oid {
        self.write_commit(None, message, parents)
    }

    /// Merge commit on the checked-out branch, HEAD first
    pub fn merge(&self, message: &str, other: Oid) -> Oid {
        let head = self.head().unwrap();
        self.write_commit(Some("HEAD"), message, &[head, other])
    }

    pub fn branch(&self, name: &str, target: Oid) {
        let commit = self.repo.find_commit(target).unwrap();
        self.repo.branch(name, &commit, true).unwrap();
    }

    pub fn current_branch(&self) -> String {
        self.repo.head().unwrap().shorthand().unwrap().to_string()
    }

    pub fn tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }

    pub fn annotated_tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).unwrap();
        let sig = self.signature();
        self.repo
            .tag(name, &object, &sig, &format!("Release {}", name), false)
            .unwrap();
    }

    /// Point an existing tag at another commit
    pub fn move_tag(&self, name: &str, target: Oid) {
        let object = self.repo.find_object(target, None).unwrap();
        self.repo.tag_lightweight(name, &object, true).unwrap();
    }

    pub fn delete_tag(&self, name: &str) {
        self.repo.tag_delete(name).unwrap();
    }

    pub fn write_file(&self, name: &str, content: &str) {
        fs::write(self.path().join(name), content).unwrap();
    }
}
