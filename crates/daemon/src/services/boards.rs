// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Boards: plain spatial-workspace CRUD, a channel-broadcast consumer.

use super::{CallCtx, Service};
use crate::hooks::{require_authenticated, HookSet};
use crate::state::AppState;
use agor_core::{AgorError, Board, BoardComment, BoardId, BoardObject, Clock, ErrorKind};
use agor_wire::FindQuery;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

pub struct BoardsService<C: Clock + 'static> {
    state: Arc<AppState<C>>,
}

impl<C: Clock + 'static> BoardsService<C> {
    pub fn new(state: Arc<AppState<C>>) -> Arc<Self> {
        Arc::new(Self { state })
    }
}

fn to_value<T: serde::Serialize>(record: T) -> Result<Value, AgorError> {
    serde_json::to_value(record)
        .map_err(|e| AgorError::new(ErrorKind::ValidationFailed, e.to_string()))
}

#[async_trait]
impl<C: Clock + 'static> Service<C> for BoardsService<C> {
    fn name(&self) -> &'static str {
        "boards"
    }

    fn hooks(&self) -> HookSet {
        HookSet::new().before(require_authenticated())
    }

    async fn find(&self, _ctx: &CallCtx, query: FindQuery) -> Result<Vec<Value>, AgorError> {
        Ok(query.apply(self.state.store.all_raw(agor_storage::Table::Boards)))
    }

    async fn get(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        to_value(self.state.store.get::<Board>(id)?)
    }

    async fn create(&self, ctx: &CallCtx, data: Value) -> Result<Value, AgorError> {
        let name = data
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AgorError::validation("name is required"))?;
        let now = self.state.store.clock().utc_now();
        let board = Board {
            board_id: BoardId::new(),
            name: name.to_string(),
            created_by: ctx.principal.user().map(|u| u.user_id.clone()),
            created_at: now,
            updated_at: now,
        };
        to_value(self.state.store.create(board)?)
    }

    async fn patch(&self, _ctx: &CallCtx, id: &str, data: Value) -> Result<Value, AgorError> {
        to_value(self.state.store.patch::<Board>(id, data)?)
    }

    async fn remove(&self, _ctx: &CallCtx, id: &str) -> Result<Value, AgorError> {
        let board: Board = self.state.store.remove(id)?;
        // Cascade the board's objects and comments.
        for object in self.state.store.all::<BoardObject>() {
            if object.board_id == board.board_id {
                let _ = self.state.store.remove::<BoardObject>(&object.object_id);
            }
        }
        for comment in self.state.store.all::<BoardComment>() {
            if comment.board_id == board.board_id {
                let _ = self.state.store.remove::<BoardComment>(&comment.comment_id);
            }
        }
        to_value(board)
    }
}
