// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory Unix host for sync-protocol tests.
//!
//! Interprets the same command lines the real runners execute, against a
//! model of groups, users, ACLs, and symlinks — so idempotence tests
//! exercise the actual sync logic end to end.

use super::{UnixCommandOutput, UnixRunner};
use agor_core::AgorError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostModel {
    pub groups: BTreeMap<String, BTreeSet<String>>,
    pub users: BTreeSet<String>,
    pub passwords: BTreeMap<String, String>,
    /// path → (group perms by group name)
    pub acls: BTreeMap<String, BTreeMap<String, String>>,
    pub group_owners: BTreeMap<String, String>,
    pub modes: BTreeMap<String, String>,
    pub symlinks: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct FakeUnixHost {
    model: Mutex<HostModel>,
    commands: Mutex<Vec<String>>,
}

impl FakeUnixHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(&self) -> HostModel {
        self.model.lock().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn add_user(&self, user: &str) {
        self.model.lock().users.insert(user.to_string());
    }

    pub fn members(&self, group: &str) -> Vec<String> {
        self.model
            .lock()
            .groups
            .get(group)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn ok(stdout: impl Into<String>) -> UnixCommandOutput {
        UnixCommandOutput { exit_code: 0, stdout: stdout.into(), stderr: String::new() }
    }

    fn fail(code: i32, stderr: impl Into<String>) -> UnixCommandOutput {
        UnixCommandOutput { exit_code: code, stdout: String::new(), stderr: stderr.into() }
    }

    fn exec(&self, program: &str, args: &[&str], stdin: Option<&[u8]>) -> UnixCommandOutput {
        self.commands.lock().push(format!("{program} {}", args.join(" ")));
        let mut model = self.model.lock();
        match (program, args) {
            ("getent", ["group", group]) => match model.groups.get(*group) {
                Some(members) => {
                    let joined: Vec<&str> = members.iter().map(String::as_str).collect();
                    Self::ok(format!("{group}:x:1000:{}\n", joined.join(",")))
                }
                None => Self::fail(2, ""),
            },
            ("getent", ["passwd", user]) => {
                if model.users.contains(*user) {
                    Self::ok(format!("{user}:x:1000:1000::/home/{user}:/bin/bash\n"))
                } else {
                    Self::fail(2, "")
                }
            }
            ("groupadd", [group]) => {
                if model.groups.contains_key(*group) {
                    Self::fail(9, format!("groupadd: group '{group}' already exists"))
                } else {
                    model.groups.insert(group.to_string(), BTreeSet::new());
                    Self::ok("")
                }
            }
            ("groupdel", [group]) => {
                if model.groups.remove(*group).is_some() {
                    Self::ok("")
                } else {
                    Self::fail(6, format!("groupdel: group '{group}' does not exist"))
                }
            }
            ("usermod", ["-aG", group, user]) => match model.groups.get_mut(*group) {
                Some(members) => {
                    members.insert(user.to_string());
                    Self::ok("")
                }
                None => Self::fail(6, format!("usermod: group '{group}' does not exist")),
            },
            ("gpasswd", ["-d", user, group]) => match model.groups.get_mut(*group) {
                Some(members) => {
                    members.remove(*user);
                    Self::ok("")
                }
                None => Self::fail(3, ""),
            },
            ("useradd", ["-m", "-s", _shell, user]) => {
                if model.users.insert(user.to_string()) {
                    Self::ok("")
                } else {
                    Self::fail(9, format!("useradd: user '{user}' already exists"))
                }
            }
            ("userdel", rest) => {
                let user = rest.last().copied().unwrap_or("");
                model.users.remove(user);
                model.passwords.remove(user);
                Self::ok("")
            }
            ("chpasswd", []) => {
                let input = String::from_utf8_lossy(stdin.unwrap_or_default()).into_owned();
                for line in input.lines() {
                    if let Some((user, password)) = line.split_once(':') {
                        model.passwords.insert(user.to_string(), password.to_string());
                    }
                }
                Self::ok("")
            }
            ("chgrp", ["-R", group, path]) => {
                model.group_owners.insert(path.to_string(), group.to_string());
                Self::ok("")
            }
            ("chmod", [mode, path]) => {
                model.modes.insert(path.to_string(), mode.to_string());
                Self::ok("")
            }
            ("setfacl", ["-R", "-b", path]) => {
                model.acls.remove(*path);
                Self::ok("")
            }
            ("setfacl", ["-R", "-m", spec, "-m", _default_spec, path]) => {
                // g:<group>:<perms>
                let mut parts = spec.splitn(3, ':');
                let (_, group, perms) =
                    (parts.next(), parts.next().unwrap_or(""), parts.next().unwrap_or(""));
                model
                    .acls
                    .entry(path.to_string())
                    .or_default()
                    .insert(group.to_string(), perms.to_string());
                Self::ok("")
            }
            ("mkdir", ["-p", _path]) => Self::ok(""),
            ("ln", ["-sfn", target, link]) => {
                model.symlinks.insert(link.to_string(), target.to_string());
                Self::ok("")
            }
            ("rm", ["-rf", path]) => {
                model.symlinks.retain(|link, _| !link.starts_with(*path));
                model.acls.remove(*path);
                model.group_owners.remove(*path);
                Self::ok("")
            }
            _ => Self::fail(127, format!("fake host: unhandled command {program} {args:?}")),
        }
    }
}

#[async_trait]
impl UnixRunner for FakeUnixHost {
    async fn run(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError> {
        Ok(self.exec(program, args, None))
    }

    async fn inspect(&self, program: &str, args: &[&str]) -> Result<UnixCommandOutput, AgorError> {
        Ok(self.exec(program, args, None))
    }

    async fn run_with_input(
        &self,
        program: &str,
        args: &[&str],
        input: &[u8],
    ) -> Result<UnixCommandOutput, AgorError> {
        Ok(self.exec(program, args, Some(input)))
    }
}
