// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::super::fake::FakeUnixHost;
use super::*;

#[tokio::test]
async fn ensure_group_is_idempotent() {
    let host = FakeUnixHost::new();
    ensure_group(&host, "agor_wt_0192f0c1").await.unwrap();
    ensure_group(&host, "agor_wt_0192f0c1").await.unwrap();

    // Second call saw the group and skipped groupadd.
    let adds = host.commands().iter().filter(|c| c.starts_with("groupadd")).count();
    assert_eq!(adds, 1);
}

#[tokio::test]
async fn ensure_member_adds_once() {
    let host = FakeUnixHost::new();
    host.add_user("alice");
    ensure_group(&host, "agor_users").await.unwrap();

    ensure_member(&host, "agor_users", "alice").await.unwrap();
    ensure_member(&host, "agor_users", "alice").await.unwrap();

    assert_eq!(host.members("agor_users"), vec!["alice"]);
    let mods = host.commands().iter().filter(|c| c.starts_with("usermod")).count();
    assert_eq!(mods, 1);
}

#[tokio::test]
async fn group_members_parses_getent() {
    let host = FakeUnixHost::new();
    ensure_group(&host, "g").await.unwrap();
    ensure_member(&host, "g", "a").await.unwrap();
    ensure_member(&host, "g", "b").await.unwrap();

    let members = group_members(&host, "g").await.unwrap();
    assert_eq!(members, vec!["a", "b"]);
    assert!(group_members(&host, "missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_group_tolerates_absence() {
    let host = FakeUnixHost::new();
    remove_group(&host, "ghost").await.unwrap();
    ensure_group(&host, "g").await.unwrap();
    remove_group(&host, "g").await.unwrap();
    assert!(!group_exists(&host, "g").await.unwrap());
}

#[tokio::test]
async fn password_goes_through_stdin() {
    let host = FakeUnixHost::new();
    host.add_user("bob");
    set_password(&host, "bob", "hunter2").await.unwrap();

    assert_eq!(host.model().passwords.get("bob").map(String::as_str), Some("hunter2"));
    // argv never contains the secret.
    assert!(host.commands().iter().all(|c| !c.contains("hunter2")));
}

#[tokio::test]
async fn acl_modes_map_to_setfacl_specs() {
    let host = FakeUnixHost::new();
    let path = std::path::Path::new("/srv/wt");

    set_group_acl(&host, "agor_users", path, agor_core::OthersFsAccess::Read).await.unwrap();
    assert_eq!(
        host.model().acls["/srv/wt"].get("agor_users").map(String::as_str),
        Some("rX")
    );

    set_group_acl(&host, "agor_users", path, agor_core::OthersFsAccess::Write).await.unwrap();
    assert_eq!(
        host.model().acls["/srv/wt"].get("agor_users").map(String::as_str),
        Some("rwX")
    );

    set_group_acl(&host, "agor_users", path, agor_core::OthersFsAccess::None).await.unwrap();
    assert!(host.model().acls.get("/srv/wt").is_none());
}

#[tokio::test]
async fn symlinks_are_replaced_not_duplicated() {
    let host = FakeUnixHost::new();
    let target = std::path::Path::new("/srv/worktrees/feat-x");
    let link = std::path::Path::new("/home/alice/agor/feat-x");

    ensure_symlink(&host, target, link).await.unwrap();
    ensure_symlink(&host, target, link).await.unwrap();

    let model = host.model();
    assert_eq!(model.symlinks.len(), 1);
    assert_eq!(model.symlinks["/home/alice/agor/feat-x"], "/srv/worktrees/feat-x");
}
