// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The hook pipeline wrapping every service call.
//!
//! Hooks are ordered vectors of function values — before hooks can
//! mutate params or short-circuit with an error, after hooks can shape
//! the result, error hooks observe failures before they go on the wire.

use agor_core::{AgorError, ErrorKind, Role, User};
use serde_json::Value;
use std::sync::Arc;

/// Who is calling.
#[derive(Clone)]
pub enum Principal {
    Anonymous,
    User(User),
    /// An executor dialing back; carries the impersonated user and the
    /// task its token was minted for.
    Executor { user: User, task_id: Option<String> },
    /// Internal dispatch (gateway inbound); auth hooks pass, the
    /// attached user scopes ownership checks.
    Internal { user: Option<User> },
}

impl Principal {
    pub fn user(&self) -> Option<&User> {
        match self {
            Principal::Anonymous => None,
            Principal::User(user) => Some(user),
            Principal::Executor { user, .. } => Some(user),
            Principal::Internal { user } => user.as_ref(),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.user().map(|u| u.role)
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, Principal::Internal { .. } | Principal::Executor { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            Principal::Anonymous => "anonymous".into(),
            Principal::User(user) => format!("user:{}", user.user_id.short()),
            Principal::Executor { user, .. } => format!("executor:{}", user.user_id.short()),
            Principal::Internal { .. } => "internal".into(),
        }
    }
}

/// The verb (or custom route) being invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Find,
    Get,
    Create,
    Patch,
    Remove,
    Custom(String),
}

impl Method {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Method::Create | Method::Patch | Method::Remove)
    }
}

/// Context threaded through the pipeline phases.
pub struct HookContext<'a> {
    pub service: &'a str,
    pub method: &'a Method,
    pub principal: &'a Principal,
    pub id: Option<&'a str>,
    pub params: &'a mut Value,
    /// Set during the after phase.
    pub result: Option<&'a mut Value>,
}

pub type BeforeHook = Arc<dyn Fn(&mut HookContext) -> Result<(), AgorError> + Send + Sync>;
pub type AfterHook = Arc<dyn Fn(&mut HookContext) + Send + Sync>;
pub type ErrorHook = Arc<dyn Fn(&HookContext, &AgorError) + Send + Sync>;

/// Ordered hook vectors for one service.
#[derive(Default, Clone)]
pub struct HookSet {
    pub before: Vec<BeforeHook>,
    pub after: Vec<AfterHook>,
    pub error: Vec<ErrorHook>,
}

impl HookSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, hook: BeforeHook) -> Self {
        self.before.push(hook);
        self
    }

    pub fn after(mut self, hook: AfterHook) -> Self {
        self.after.push(hook);
        self
    }

    pub fn on_error(mut self, hook: ErrorHook) -> Self {
        self.error.push(hook);
        self
    }

    /// Run the before phase; the first error short-circuits.
    pub fn run_before(&self, ctx: &mut HookContext) -> Result<(), AgorError> {
        for hook in &self.before {
            hook(ctx)?;
        }
        Ok(())
    }

    pub fn run_after(&self, ctx: &mut HookContext) {
        for hook in &self.after {
            hook(ctx);
        }
    }

    pub fn run_error(&self, ctx: &HookContext, error: &AgorError) {
        for hook in &self.error {
            hook(ctx, error);
        }
    }
}

// --- common guards ---

/// Reject anonymous callers.
pub fn require_authenticated() -> BeforeHook {
    Arc::new(|ctx| {
        if ctx.principal.user().is_some() || ctx.principal.is_internal() {
            Ok(())
        } else {
            Err(AgorError::new(ErrorKind::NotAuthenticated, "authentication required"))
        }
    })
}

/// Require at least `min` role. Internal dispatches pass.
pub fn require_role(min: Role) -> BeforeHook {
    Arc::new(move |ctx| {
        if ctx.principal.is_internal() {
            return Ok(());
        }
        match ctx.principal.role() {
            Some(role) if role >= min => Ok(()),
            Some(_) => Err(AgorError::forbidden(format!(
                "{} requires the {min} role",
                ctx.service
            ))),
            None => Err(AgorError::new(ErrorKind::NotAuthenticated, "authentication required")),
        }
    })
}

/// Restrict mutations to admins while leaving reads open.
pub fn admin_writes() -> BeforeHook {
    Arc::new(|ctx| {
        if !ctx.method.is_mutation() || ctx.principal.is_internal() {
            return Ok(());
        }
        match ctx.principal.role() {
            Some(role) if role.is_admin() => Ok(()),
            Some(_) => Err(AgorError::forbidden(format!("only admins may modify {}", ctx.service))),
            None => Err(AgorError::new(ErrorKind::NotAuthenticated, "authentication required")),
        }
    })
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
