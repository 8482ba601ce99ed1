//! Route handlers: the trait the router stores, generated entity CRUD handlers, and the optimizer.

pub mod entity;
pub mod optimizer;
pub use entity::{CrudAction, EntityHandler, QueryShape};
pub use optimizer::{analyze, emit, optimize, Plan, Precompiled};

use crate::error::AppError;
use crate::response::Reply;
use crate::routes::Endpoint;
use crate::state::AppState;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// What a handler receives: bound path parameters and, for POST/PUT, the JSON object body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Request {
    pub params: HashMap<String, String>,
    pub body: Option<Map<String, Value>>,
}

impl Request {
    pub fn new(params: HashMap<String, String>) -> Self {
        Request { params, body: None }
    }

    pub fn with_body(mut self, body: Map<String, Value>) -> Self {
        self.body = Some(body);
        self
    }

    /// Bound values for `names`, in that order. Names without a binding are skipped.
    pub fn ordered(&self, names: &[String]) -> Vec<(String, String)> {
        names
            .iter()
            .filter_map(|n| self.params.get(n).map(|v| (n.clone(), v.clone())))
            .collect()
    }

    pub fn body(&self) -> Result<&Map<String, Value>, AppError> {
        self.body
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("request body is required".into()))
    }
}

#[async_trait]
pub trait Handler: Send + Sync {
    /// Parameter names this handler binds. Route wildcards must be a subset.
    fn parameters(&self) -> &[String];

    async fn call(&self, state: &AppState, req: Request) -> Result<Reply, AppError>;

    /// Read shape for the optimizer; `None` means the handler cannot be precompiled.
    fn shape(&self) -> Option<&QueryShape> {
        None
    }
}

pub type HandlerRef = Arc<dyn Handler>;

impl Endpoint for HandlerRef {
    fn parameters(&self) -> &[String] {
        Handler::parameters(self.as_ref())
    }

    fn is_same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

struct FnHandler<F> {
    parameters: Vec<String>,
    f: F,
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(AppState, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, AppError>> + Send + 'static,
{
    fn parameters(&self) -> &[String] {
        &self.parameters
    }

    async fn call(&self, state: &AppState, req: Request) -> Result<Reply, AppError> {
        (self.f)(state.clone(), req).await
    }
}

/// Wrap an async closure as a handler binding `parameters`.
pub fn handler_fn<F, Fut>(parameters: &[&str], f: F) -> HandlerRef
where
    F: Fn(AppState, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Reply, AppError>> + Send + 'static,
{
    Arc::new(FnHandler {
        parameters: parameters.iter().map(|s| s.to_string()).collect(),
        f,
    })
}
