// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::process::Command as StdCommand;
use tempfile::TempDir;

fn init_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let run = |args: &[&str]| {
        let status = StdCommand::new("git")
            .args(args)
            .current_dir(dir.path())
            .env("GIT_AUTHOR_NAME", "t")
            .env("GIT_AUTHOR_EMAIL", "t@t")
            .env("GIT_COMMITTER_NAME", "t")
            .env("GIT_COMMITTER_EMAIL", "t@t")
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?}");
    };
    run(&["init", "-q", "-b", "main"]);
    std::fs::write(dir.path().join("README"), "hi\n").unwrap();
    run(&["add", "."]);
    run(&["commit", "-q", "-m", "init"]);
    dir
}

#[tokio::test]
async fn clean_tree_yields_bare_sha() {
    let repo = init_repo();
    let sha = capture_sha(repo.path()).await;
    assert_eq!(sha.len(), 40);
    assert!(!sha.ends_with("-dirty"));
}

#[tokio::test]
async fn uncommitted_changes_add_dirty_suffix() {
    let repo = init_repo();
    std::fs::write(repo.path().join("new.txt"), "x").unwrap();
    let sha = capture_sha(repo.path()).await;
    assert!(sha.ends_with("-dirty"), "got {sha}");
}

#[tokio::test]
async fn non_repo_is_unknown() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(capture_sha(dir.path()).await, "unknown");
}

#[tokio::test]
async fn commit_changes_the_sha() {
    let repo = init_repo();
    let before = capture_sha(repo.path()).await;

    std::fs::write(repo.path().join("hello.txt"), "hello\n").unwrap();
    let run = |args: &[&str]| {
        let status = StdCommand::new("git")
            .args(args)
            .current_dir(repo.path())
            .env("GIT_AUTHOR_NAME", "t")
            .env("GIT_AUTHOR_EMAIL", "t@t")
            .env("GIT_COMMITTER_NAME", "t")
            .env("GIT_COMMITTER_EMAIL", "t@t")
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?}");
    };
    run(&["add", "."]);
    run(&["commit", "-q", "-m", "hello"]);

    let after = capture_sha(repo.path()).await;
    assert_ne!(before, after);
    assert!(!after.ends_with("-dirty"));
}
