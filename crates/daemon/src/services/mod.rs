// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The real-time service framework.
//!
//! Services are registered by name and expose up to five verbs plus
//! custom routes. Every call runs through the hook pipeline; every
//! mutation broadcasts a typed event to channel subscribers.

pub mod boards;
pub mod config_service;
pub mod gateway_messages;
pub mod mcp_servers;
pub mod messages;
pub mod repos;
pub mod sessions;
pub mod tasks;
pub mod terminals;
pub mod users;
pub mod worktrees;

use crate::channels::{service_channels, ChannelHub};
use crate::hooks::{HookContext, HookSet, Method};
use agor_core::{AgorError, Clock, ErrorKind, Event};
use agor_wire::{FindQuery, Request, Response};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub use crate::hooks::Principal;

/// Per-call context.
pub struct CallCtx {
    pub principal: Principal,
}

fn unsupported(service: &str, method: &str) -> AgorError {
    AgorError::new(ErrorKind::NotFound, format!("{service} does not implement {method}"))
}

/// One named service.
#[async_trait]
pub trait Service<C: Clock + 'static>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Hook vectors wrapping this service's calls.
    fn hooks(&self) -> HookSet {
        HookSet::default()
    }

    async fn find(&self, _ctx: &CallCtx, _query: FindQuery) -> Result<Vec<Value>, AgorError> {
        Err(unsupported(self.name(), "find"))
    }

    async fn get(&self, _ctx: &CallCtx, _id: &str) -> Result<Value, AgorError> {
        Err(unsupported(self.name(), "get"))
    }

    async fn create(&self, _ctx: &CallCtx, _data: Value) -> Result<Value, AgorError> {
        Err(unsupported(self.name(), "create"))
    }

    async fn patch(&self, _ctx: &CallCtx, _id: &str, _data: Value) -> Result<Value, AgorError> {
        Err(unsupported(self.name(), "patch"))
    }

    async fn remove(&self, _ctx: &CallCtx, _id: &str) -> Result<Value, AgorError> {
        Err(unsupported(self.name(), "remove"))
    }

    async fn call(
        &self,
        _ctx: &CallCtx,
        route: &str,
        _id: Option<&str>,
        _params: Value,
    ) -> Result<Value, AgorError> {
        Err(unsupported(self.name(), route))
    }

    /// Channels a mutated record broadcasts on.
    fn channels_for(&self, record: &Value) -> Vec<String> {
        service_channels(self.name(), record)
    }

    /// Suppress the automatic CRUD broadcast (services that emit their
    /// own richer events).
    fn quiet(&self) -> bool {
        false
    }
}

/// Name-indexed service registry with lazy lookup.
pub struct ServiceRegistry<C: Clock + 'static> {
    services: RwLock<HashMap<&'static str, Arc<dyn Service<C>>>>,
}

impl<C: Clock + 'static> ServiceRegistry<C> {
    pub fn empty() -> Self {
        Self { services: RwLock::new(HashMap::new()) }
    }

    pub fn register(&self, service: Arc<dyn Service<C>>) {
        self.services.write().insert(service.name(), service);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Service<C>>, AgorError> {
        self.services
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AgorError::not_found(format!("service {name:?}")))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.services.read().keys().copied().collect()
    }

    /// Dispatch one service-addressed request through the pipeline.
    pub async fn dispatch(
        &self,
        hub: &ChannelHub,
        principal: Principal,
        request: Request,
    ) -> Response {
        let (service_name, method, id, mut params) = match request {
            Request::Find { service, query } => (service, Method::Find, None, query),
            Request::Get { service, id } => (service, Method::Get, Some(id), Value::Null),
            Request::Create { service, data } => (service, Method::Create, None, data),
            Request::Patch { service, id, data } => (service, Method::Patch, Some(id), data),
            Request::Remove { service, id } => (service, Method::Remove, Some(id), Value::Null),
            Request::Call { service, route, id, params } => {
                (service, Method::Custom(route), id, params)
            }
            other => {
                return Response::error(AgorError::validation(format!(
                    "not a service request: {other:?}"
                )))
            }
        };

        let service = match self.get(&service_name) {
            Ok(service) => service,
            Err(e) => return Response::error(e),
        };

        let hooks = service.hooks();
        let ctx = CallCtx { principal };
        {
            let mut hook_ctx = HookContext {
                service: service.name(),
                method: &method,
                principal: &ctx.principal,
                id: id.as_deref(),
                params: &mut params,
                result: None,
            };
            if let Err(error) = hooks.run_before(&mut hook_ctx) {
                hooks.run_error(&hook_ctx, &error);
                return Response::error(error);
            }
        }

        let outcome: Result<Response, AgorError> = match &method {
            Method::Find => match FindQuery::validate(&params) {
                Ok(query) => service.find(&ctx, query).await.map(|data| {
                    let total = data.len();
                    Response::Records { data, total }
                }),
                Err(e) => Err(e),
            },
            Method::Get => match &id {
                Some(id) => service.get(&ctx, id).await.map(|data| Response::Record { data }),
                None => Err(AgorError::validation("get requires an id")),
            },
            Method::Create => {
                service.create(&ctx, params.clone()).await.map(|data| Response::Record { data })
            }
            Method::Patch => match &id {
                Some(id) => service
                    .patch(&ctx, id, params.clone())
                    .await
                    .map(|data| Response::Record { data }),
                None => Err(AgorError::validation("patch requires an id")),
            },
            Method::Remove => match &id {
                Some(id) => service.remove(&ctx, id).await.map(|data| Response::Record { data }),
                None => Err(AgorError::validation("remove requires an id")),
            },
            Method::Custom(route) => service
                .call(&ctx, route, id.as_deref(), params.clone())
                .await
                .map(|data| Response::Record { data }),
        };

        match outcome {
            Ok(response) => {
                if let Response::Record { data } = &response {
                    let mut result = data.clone();
                    let mut hook_ctx = HookContext {
                        service: service.name(),
                        method: &method,
                        principal: &ctx.principal,
                        id: id.as_deref(),
                        params: &mut params,
                        result: Some(&mut result),
                    };
                    hooks.run_after(&mut hook_ctx);

                    if method.is_mutation() && !service.quiet() {
                        let event = match method {
                            Method::Create => Event::ServiceCreated {
                                service: service.name().to_string(),
                                data: result.clone(),
                            },
                            Method::Patch => Event::ServicePatched {
                                service: service.name().to_string(),
                                data: result.clone(),
                            },
                            _ => Event::ServiceRemoved {
                                service: service.name().to_string(),
                                data: result.clone(),
                            },
                        };
                        hub.publish_to(service.channels_for(&result), event);
                    }
                    return Response::Record { data: result };
                }
                response
            }
            Err(error) => {
                debug!(service = service.name(), ?method, error = %error, "service call failed");
                let hook_ctx = HookContext {
                    service: service.name(),
                    method: &method,
                    principal: &ctx.principal,
                    id: id.as_deref(),
                    params: &mut params,
                    result: None,
                };
                hooks.run_error(&hook_ctx, &error);
                return Response::error(error);
            }
        }
    }

    /// Internal dispatch used by the gateway and the executors'
    /// server-side helpers; bypasses auth hooks via the internal
    /// principal.
    pub async fn internal_call(
        &self,
        hub: &ChannelHub,
        user: Option<agor_core::User>,
        service: &str,
        route: &str,
        id: Option<&str>,
        params: Value,
    ) -> Result<Value, AgorError> {
        let response = self
            .dispatch(
                hub,
                Principal::Internal { user },
                Request::Call {
                    service: service.to_string(),
                    route: route.to_string(),
                    id: id.map(str::to_string),
                    params,
                },
            )
            .await;
        match response {
            Response::Record { data } => Ok(data),
            Response::Error { error } => Err(error),
            other => Err(AgorError::validation(format!("unexpected response {other:?}"))),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
