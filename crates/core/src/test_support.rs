// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (behind the `test-support` feature).

#![allow(clippy::unwrap_used)]

use crate::board::Board;
use crate::gateway::GatewayChannel;
use crate::id::{BoardId, ChannelId, MessageId, RepoId, SessionId, TaskId, UserId, WorktreeId};
use crate::message::{ContentBlock, Message, MessageRole};
use crate::repo::Repo;
use crate::session::{AgenticTool, PermissionConfig, Session, SessionStatus};
use crate::task::{GitState, MessageRange, Task, TaskStatus};
use crate::user::{Role, User};
use crate::worktree::{FilesystemStatus, OthersCan, OthersFsAccess, RefType, Worktree};
use chrono::{TimeZone, Utc};
use indexmap::IndexMap;

fn epoch() -> chrono::DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000).single().unwrap()
}

#[derive(Default)]
pub struct UserBuilder {
    email: Option<String>,
    role: Option<Role>,
    unix_username: Option<String>,
}

impl UserBuilder {
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn unix_username(mut self, name: impl Into<String>) -> Self {
        self.unix_username = Some(name.into());
        self
    }

    pub fn build(self) -> User {
        User {
            user_id: UserId::new(),
            email: self.email.unwrap_or_else(|| "test@example.com".into()),
            password_hash: String::new(),
            role: self.role.unwrap_or(Role::Member),
            unix_username: self.unix_username,
            must_change_password: false,
            default_agentic_config: IndexMap::new(),
            api_keys: IndexMap::new(),
            created_at: epoch(),
            updated_at: epoch(),
        }
    }
}

#[derive(Default)]
pub struct RepoBuilder {
    slug: Option<String>,
    default_branch: Option<String>,
}

impl RepoBuilder {
    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = Some(branch.into());
        self
    }

    pub fn build(self) -> Repo {
        let slug = self.slug.unwrap_or_else(|| "acme/widgets".into());
        Repo {
            repo_id: RepoId::new(),
            local_path: format!("/tmp/agor/repos/{slug}").into(),
            remote_url: format!("git@example.com:{slug}.git"),
            slug,
            default_branch: self.default_branch.unwrap_or_else(|| "main".into()),
            unix_group: None,
            environment_config: None,
            created_by: None,
            next_worktree_unique_id: 0,
            created_at: epoch(),
            updated_at: epoch(),
        }
    }
}

#[derive(Default)]
pub struct WorktreeBuilder {
    repo_id: Option<RepoId>,
    name: Option<String>,
    created_by: Option<UserId>,
    status: Option<FilesystemStatus>,
    unique_id: Option<u16>,
    path: Option<std::path::PathBuf>,
}

impl WorktreeBuilder {
    pub fn repo(mut self, repo_id: RepoId) -> Self {
        self.repo_id = Some(repo_id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn created_by(mut self, user_id: UserId) -> Self {
        self.created_by = Some(user_id);
        self
    }

    pub fn status(mut self, status: FilesystemStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn unique_id(mut self, id: u16) -> Self {
        self.unique_id = Some(id);
        self
    }

    pub fn path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn build(self) -> Worktree {
        let name = self.name.unwrap_or_else(|| "feat-x".into());
        Worktree {
            worktree_id: WorktreeId::new(),
            repo_id: self.repo_id.unwrap_or_default(),
            path: self.path.unwrap_or_else(|| format!("/tmp/agor/worktrees/{name}").into()),
            ref_name: name.clone(),
            name,
            ref_type: RefType::Branch,
            base_ref: Some("main".into()),
            new_branch: true,
            worktree_unique_id: self.unique_id.unwrap_or(0),
            board_id: None,
            created_by: self.created_by.unwrap_or_default(),
            filesystem_status: self.status.unwrap_or(FilesystemStatus::Ready),
            others_can: OthersCan::None,
            others_fs_access: OthersFsAccess::None,
            unix_group: None,
            environment_instance: None,
            last_error: None,
            created_at: epoch(),
            updated_at: epoch(),
        }
    }
}

#[derive(Default)]
pub struct SessionBuilder {
    worktree_id: Option<WorktreeId>,
    created_by: Option<UserId>,
    tool: Option<AgenticTool>,
    unix_username: Option<String>,
}

impl SessionBuilder {
    pub fn worktree(mut self, worktree_id: WorktreeId) -> Self {
        self.worktree_id = Some(worktree_id);
        self
    }

    pub fn created_by(mut self, user_id: UserId) -> Self {
        self.created_by = Some(user_id);
        self
    }

    pub fn tool(mut self, tool: AgenticTool) -> Self {
        self.tool = Some(tool);
        self
    }

    pub fn unix_username(mut self, name: impl Into<String>) -> Self {
        self.unix_username = Some(name.into());
        self
    }

    pub fn build(self) -> Session {
        let tool = self.tool.unwrap_or(AgenticTool::ClaudeCode);
        Session {
            session_id: SessionId::new(),
            worktree_id: self.worktree_id.unwrap_or_default(),
            created_by: self.created_by.unwrap_or_default(),
            unix_username: self.unix_username,
            agentic_tool: tool,
            permission_config: PermissionConfig::for_tool(tool),
            model_config: Default::default(),
            status: SessionStatus::Idle,
            tasks: Vec::new(),
            message_count: 0,
            genealogy: Default::default(),
            custom_context: None,
            archived: false,
            created_at: epoch(),
            updated_at: epoch(),
        }
    }
}

#[derive(Default)]
pub struct TaskBuilder {
    session_id: Option<SessionId>,
    status: Option<TaskStatus>,
    prompt: Option<String>,
}

impl TaskBuilder {
    pub fn session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn build(self) -> Task {
        let prompt = self.prompt.unwrap_or_else(|| "do the thing".into());
        Task {
            task_id: TaskId::new(),
            session_id: self.session_id.unwrap_or_default(),
            status: self.status.unwrap_or(TaskStatus::Pending),
            description: Task::describe(&prompt),
            full_prompt: prompt,
            message_range: MessageRange::default(),
            tool_use_count: 0,
            report: None,
            git_state: GitState::default(),
            raw_sdk_response: None,
            normalized_sdk_response: None,
            computed_context_window: None,
            error: None,
            completed_at: None,
            created_at: epoch(),
            updated_at: epoch(),
        }
    }
}

/// A plain user message for transcript tests.
pub fn user_message(session_id: &SessionId, task_id: &TaskId, text: &str) -> Message {
    Message {
        message_id: MessageId::new(),
        session_id: session_id.clone(),
        task_id: task_id.clone(),
        role: MessageRole::User,
        content: vec![ContentBlock::text(text)],
        timestamp: epoch(),
        parent_tool_use_id: None,
    }
}

/// A board with defaults for channel-broadcast tests.
pub fn board(name: &str) -> Board {
    Board {
        board_id: BoardId::new(),
        name: name.into(),
        created_by: None,
        created_at: epoch(),
        updated_at: epoch(),
    }
}

/// A gateway channel bound to `worktree` with the given key hash.
pub fn gateway_channel(
    owner: &UserId,
    worktree: &WorktreeId,
    key_hash: impl Into<String>,
) -> GatewayChannel {
    GatewayChannel {
        channel_id: ChannelId::new(),
        channel_type: "test".into(),
        channel_key_hash: key_hash.into(),
        agor_user_id: owner.clone(),
        target_worktree_id: worktree.clone(),
        enabled: true,
        config: None,
        agentic_config: None,
        last_message_at: None,
        created_at: epoch(),
        updated_at: epoch(),
    }
}
