// tests/resolve_test.rs
mod common;

use common::TestRepo;
use git_autover::{describe, resolve_version, CacheStore, DescribeOptions};

fn version_at_head(repo: &TestRepo) -> Option<String> {
    resolve_version(repo.path(), None, false).map(|v| v.to_string())
}

#[test]
fn test_root_commit_without_tags() {
    let repo = TestRepo::new();
    repo.commit("Initial commit");
    assert_eq!(version_at_head(&repo).as_deref(), Some("0.0.1"));
}

#[test]
fn test_child_of_tagged_root() {
    let repo = TestRepo::new();
    let root = repo.commit("Initial commit");
    repo.tag("v1.2.3", root);
    repo.commit("Second commit");
    assert_eq!(version_at_head(&repo).as_deref(), Some("1.2.4"));
}

#[test]
fn test_merged_branch_with_higher_tag_wins() {
    let repo = TestRepo::new();
    let base = repo.commit("Base");
    repo.tag("v1.0.0", base);
    repo.commit("Work on A");
    let b = repo.commit_with_parents("Work on B", &[base]);
    repo.tag("v2.0.0", b);
    repo.merge("Merge B into A", b);

    assert_eq!(version_at_head(&repo).as_deref(), Some("2.0.1"));
}

#[test]
fn test_version_and_plain_tag_on_same_commit() {
    let repo = TestRepo::new();
    let commit = repo.commit("Release");
    repo.tag("release", commit);
    repo.tag("v1.5.0", commit);

    let metadata = describe(repo.path(), &DescribeOptions::default()).unwrap();
    assert_eq!(metadata.version.to_string(), "1.5.0");
    assert_eq!(metadata.tags, vec!["release".to_string(), "v1.5.0".to_string()]);
}

#[test]
fn test_annotated_tag_anchors_lineage() {
    let repo = TestRepo::new();
    let root = repo.commit("Initial commit");
    repo.annotated_tag("v4.1", root);
    repo.commit("Next");
    assert_eq!(version_at_head(&repo).as_deref(), Some("4.2"));
}

#[test]
fn test_major_only_tag_does_not_anchor() {
    let repo = TestRepo::new();
    let root = repo.commit("Initial commit");
    repo.tag("v1.0", root);
    let next = repo.commit("Next");
    repo.tag("v9", next);
    repo.commit("Tip");
    assert_eq!(version_at_head(&repo).as_deref(), Some("1.2"));
}

#[test]
fn test_explicit_revision() {
    let repo = TestRepo::new();
    let root = repo.commit("Initial commit");
    repo.tag("v1.0.0", root);
    repo.commit("Second");
    repo.commit("Third");

    let at = |rev: &str| resolve_version(repo.path(), Some(rev), false).map(|v| v.to_string());
    assert_eq!(at("HEAD").as_deref(), Some("1.0.2"));
    assert_eq!(at("HEAD~1").as_deref(), Some("1.0.1"));
    assert_eq!(at("v1.0.0").as_deref(), Some("1.0.0"));
    assert_eq!(at(&root.to_string()).as_deref(), Some("1.0.0"));
    assert_eq!(at("no-such-branch"), None);
}

#[test]
fn test_dirty_working_tree_adds_increment() {
    let repo = TestRepo::new();
    let root = repo.commit("Initial commit");
    repo.tag("v1.2.3", root);

    assert_eq!(
        resolve_version(repo.path(), None, true).map(|v| v.to_string()).as_deref(),
        Some("1.2.3")
    );

    repo.write_file("scratch.txt", "uncommitted");
    assert_eq!(
        resolve_version(repo.path(), None, true).map(|v| v.to_string()).as_deref(),
        Some("1.2.4")
    );
    assert_eq!(version_at_head(&repo).as_deref(), Some("1.2.3"));
}

#[test]
fn test_dirty_tree_does_not_affect_other_revisions() {
    let repo = TestRepo::new();
    let root = repo.commit("Initial commit");
    repo.tag("v1.0.0", root);
    repo.commit("Second");
    repo.write_file("scratch.txt", "uncommitted");

    let version = resolve_version(repo.path(), Some("HEAD~1"), true).unwrap();
    assert_eq!(version.to_string(), "1.0.0");
}

#[test]
fn test_ignored_files_are_not_dirty() {
    let repo = TestRepo::new();
    repo.commit("Initial commit");
    repo.write_file(".gitignore", "*.log\n");

    // .gitignore itself would count as untracked, so commit it
    let mut index = repo.repo.index().unwrap();
    index.add_path(std::path::Path::new(".gitignore")).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.repo.find_tree(tree_id).unwrap();
    let sig = git2::Signature::now("Test User", "test@example.com").unwrap();
    let parent = repo.repo.head().unwrap().peel_to_commit().unwrap();
    repo.repo
        .commit(Some("HEAD"), &sig, &sig, "Ignore logs", &tree, &[&parent])
        .unwrap();

    repo.write_file("build.log", "noise");
    let metadata = describe(
        repo.path(),
        &DescribeOptions {
            check_working_tree: true,
            ..DescribeOptions::default()
        },
    )
    .unwrap();
    assert_eq!(metadata.dirty, Some(false));
    assert_eq!(metadata.version.to_string(), "0.0.2");
}

#[test]
fn test_describe_reports_commit_metadata() {
    let repo = TestRepo::new();
    let root = repo.commit("Initial commit\n\nWith a body");
    repo.tag("v0.1", root);

    let metadata = describe(repo.path(), &DescribeOptions::default()).unwrap();
    assert_eq!(metadata.commit, root.to_string());
    assert_eq!(metadata.short_hash, root.to_string()[..7]);
    assert_eq!(metadata.summary, "Initial commit");
    assert_eq!(metadata.branches, vec![repo.current_branch()]);
    assert_eq!(metadata.dirty, None);
}

#[test]
fn test_describe_lists_containing_branches() {
    let repo = TestRepo::new();
    let root = repo.commit("Initial commit");
    let side = repo.commit_with_parents("Side work", &[root]);
    repo.branch("feature", side);
    repo.commit("Main work");

    let metadata = describe(
        repo.path(),
        &DescribeOptions {
            revision: Some(root.to_string()),
            ..DescribeOptions::default()
        },
    )
    .unwrap();
    let mut expected = vec!["feature".to_string(), repo.current_branch()];
    expected.sort();
    assert_eq!(metadata.branches, expected);
}

#[test]
fn test_describe_through_tag_cache() {
    let repo = TestRepo::new();
    let cache_dir = tempfile::tempdir().unwrap();
    let store = CacheStore::new(cache_dir.path());
    let root = repo.commit("Initial commit");
    repo.annotated_tag("v3.0.0", root);
    repo.commit("Second");

    let options = DescribeOptions {
        cache: Some(&store),
        ..DescribeOptions::default()
    };
    let first = describe(repo.path(), &options).unwrap();
    assert_eq!(first.version.to_string(), "3.0.1");
    assert!(store.cache_path(repo.path()).exists());

    let second = describe(repo.path(), &options).unwrap();
    assert_eq!(second.version.to_string(), "3.0.1");
}

#[test]
fn test_not_a_repository() {
    let dir = tempfile::tempdir().unwrap();
    assert!(resolve_version(dir.path(), None, false).is_none());
    assert!(describe(dir.path(), &DescribeOptions::default()).is_none());
}

#[test]
fn test_repository_without_commits() {
    let repo = TestRepo::new();
    assert!(version_at_head(&repo).is_none());
}

#[test]
fn test_resolution_is_idempotent() {
    let repo = TestRepo::new();
    let base = repo.commit("Base");
    repo.tag("v0.9", base);
    let side = repo.commit_with_parents("Side", &[base]);
    repo.commit("Main");
    repo.merge("Merge", side);

    let first = version_at_head(&repo);
    assert_eq!(first, version_at_head(&repo));
    assert_eq!(first.as_deref(), Some("0.11"));
}
