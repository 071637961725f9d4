// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Primitive host operations composed by the sync protocols.
//!
//! Each helper is idempotent on its own: "ensure" semantics, not "do".

use super::{UnixCommandOutput, UnixRunner};
use agor_core::{AgorError, ErrorKind, OthersFsAccess};
use std::path::Path;

fn op_failed(what: &str, output: &UnixCommandOutput) -> AgorError {
    AgorError::new(
        ErrorKind::UnixOpFailed,
        format!("{what} failed (exit {}): {}", output.exit_code, output.stderr.trim()),
    )
}

/// True when `getent group <name>` resolves.
pub async fn group_exists(runner: &dyn UnixRunner, group: &str) -> Result<bool, AgorError> {
    let output = runner.inspect("getent", &["group", group]).await?;
    Ok(output.success())
}

/// Members of a group per `getent group` (empty when absent).
pub async fn group_members(runner: &dyn UnixRunner, group: &str) -> Result<Vec<String>, AgorError> {
    let output = runner.inspect("getent", &["group", group]).await?;
    if !output.success() {
        return Ok(Vec::new());
    }
    // name:x:gid:member1,member2
    let members = output
        .stdout
        .trim()
        .rsplit(':')
        .next()
        .unwrap_or("")
        .split(',')
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect();
    Ok(members)
}

pub async fn ensure_group(runner: &dyn UnixRunner, group: &str) -> Result<(), AgorError> {
    if group_exists(runner, group).await? {
        return Ok(());
    }
    let output = runner.run("groupadd", &[group]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("groupadd {group}"), &output))
    }
}

pub async fn remove_group(runner: &dyn UnixRunner, group: &str) -> Result<(), AgorError> {
    if !group_exists(runner, group).await? {
        return Ok(());
    }
    let output = runner.run("groupdel", &[group]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("groupdel {group}"), &output))
    }
}

pub async fn ensure_member(
    runner: &dyn UnixRunner,
    group: &str,
    user: &str,
) -> Result<(), AgorError> {
    if group_members(runner, group).await?.iter().any(|m| m == user) {
        return Ok(());
    }
    let output = runner.run("usermod", &["-aG", group, user]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("usermod -aG {group} {user}"), &output))
    }
}

pub async fn remove_member(
    runner: &dyn UnixRunner,
    group: &str,
    user: &str,
) -> Result<(), AgorError> {
    if !group_members(runner, group).await?.iter().any(|m| m == user) {
        return Ok(());
    }
    let output = runner.run("gpasswd", &["-d", user, group]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("gpasswd -d {user} {group}"), &output))
    }
}

pub async fn user_exists(runner: &dyn UnixRunner, user: &str) -> Result<bool, AgorError> {
    let output = runner.inspect("getent", &["passwd", user]).await?;
    Ok(output.success())
}

/// Create the account with a home dir and the given shell.
pub async fn ensure_user(
    runner: &dyn UnixRunner,
    user: &str,
    shell: &str,
) -> Result<(), AgorError> {
    if user_exists(runner, user).await? {
        return Ok(());
    }
    let output = runner.run("useradd", &["-m", "-s", shell, user]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("useradd {user}"), &output))
    }
}

pub async fn remove_user(
    runner: &dyn UnixRunner,
    user: &str,
    delete_home: bool,
) -> Result<(), AgorError> {
    if !user_exists(runner, user).await? {
        return Ok(());
    }
    let args: &[&str] = if delete_home { &["-r", user] } else { &[user] };
    let output = runner.run("userdel", args).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("userdel {user}"), &output))
    }
}

/// Password sync via chpasswd stdin — never argv.
pub async fn set_password(
    runner: &dyn UnixRunner,
    user: &str,
    password: &str,
) -> Result<(), AgorError> {
    let input = format!("{user}:{password}\n");
    let output = runner.run_with_input("chpasswd", &[], input.as_bytes()).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("chpasswd for {user}"), &output))
    }
}

pub async fn chgrp_recursive(
    runner: &dyn UnixRunner,
    group: &str,
    path: &Path,
) -> Result<(), AgorError> {
    let path = path.to_string_lossy();
    let output = runner.run("chgrp", &["-R", group, &path]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("chgrp -R {group} {path}"), &output))
    }
}

pub async fn chmod(runner: &dyn UnixRunner, mode: &str, path: &Path) -> Result<(), AgorError> {
    let path = path.to_string_lossy();
    let output = runner.run("chmod", &[mode, &path]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("chmod {mode} {path}"), &output))
    }
}

/// Apply the group ACL matching `access` (and the matching default ACL
/// so new files inherit it). `None` strips ACLs back to plain modes.
pub async fn set_group_acl(
    runner: &dyn UnixRunner,
    group: &str,
    path: &Path,
    access: OthersFsAccess,
) -> Result<(), AgorError> {
    let path_str = path.to_string_lossy();
    let perms = match access {
        OthersFsAccess::None => {
            let output = runner.run("setfacl", &["-R", "-b", &path_str]).await?;
            if output.success() {
                return Ok(());
            }
            return Err(op_failed(&format!("setfacl -b {path_str}"), &output));
        }
        OthersFsAccess::Read => "rX",
        OthersFsAccess::Write => "rwX",
    };
    let spec = format!("g:{group}:{perms}");
    let default_spec = format!("d:g:{group}:{perms}");
    let output = runner.run("setfacl", &["-R", "-m", &spec, "-m", &default_spec, &path_str]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("setfacl -m {spec} {path_str}"), &output))
    }
}

/// Symlink `link` → `target` (replacing a stale link) as the link owner.
pub async fn ensure_symlink(
    runner: &dyn UnixRunner,
    target: &Path,
    link: &Path,
) -> Result<(), AgorError> {
    if let Some(parent) = link.parent() {
        let parent_str = parent.to_string_lossy();
        let output = runner.run("mkdir", &["-p", &parent_str]).await?;
        if !output.success() {
            return Err(op_failed(&format!("mkdir -p {parent_str}"), &output));
        }
    }
    let target_str = target.to_string_lossy();
    let link_str = link.to_string_lossy();
    let output = runner.run("ln", &["-sfn", &target_str, &link_str]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("ln -sfn {target_str} {link_str}"), &output))
    }
}

pub async fn remove_path(runner: &dyn UnixRunner, path: &Path) -> Result<(), AgorError> {
    let path_str = path.to_string_lossy();
    let output = runner.run("rm", &["-rf", &path_str]).await?;
    if output.success() {
        Ok(())
    } else {
        Err(op_failed(&format!("rm -rf {path_str}"), &output))
    }
}

#[cfg(test)]
#[path = "ops_tests.rs"]
mod tests;
