//! Per-method route trees behind a URL prefix, and generated CRUD mounts.

use crate::config::{CrudMount, Entity, Schema};
use crate::error::{AppError, RouteError};
use crate::handlers::{CrudAction, EntityHandler, HandlerRef};
use crate::routes::{Match, PathTree};
use axum::http::Method;
use regex::Regex;
use std::sync::Arc;

pub struct EntryPoint {
    url_prefix: String,
    get: PathTree<HandlerRef>,
    put: PathTree<HandlerRef>,
    post: PathTree<HandlerRef>,
    delete: PathTree<HandlerRef>,
}

impl std::fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryPoint")
            .field("url_prefix", &self.url_prefix)
            .field("get", &self.get.templates())
            .field("put", &self.put.templates())
            .field("post", &self.post.templates())
            .field("delete", &self.delete.templates())
            .finish()
    }
}

/// Single-resource and collection templates derived from a mount like `/hotels/[hotel_id]/rooms/[number]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountTemplates {
    pub single: String,
    pub collection: String,
}

/// `[x]` becomes `{x}`; the collection route drops the last bracketed segment.
pub fn mount_templates(template: &str) -> Result<MountTemplates, RouteError> {
    let invalid = |reason: &str| RouteError::InvalidTemplate {
        template: template.to_string(),
        reason: reason.to_string(),
    };
    let bracket = Regex::new(r"^\[([A-Za-z_][A-Za-z0-9_]*)\]$").map_err(|e| invalid(&e.to_string()))?;

    let mut segments = Vec::new();
    let mut last_bracket = None;
    for (i, raw) in template.split('/').enumerate() {
        if let Some(caps) = bracket.captures(raw) {
            segments.push(format!("{{{}}}", &caps[1]));
            last_bracket = Some(i);
        } else if raw.contains(['[', ']']) {
            return Err(invalid(&format!("malformed identity segment '{}'", raw)));
        } else {
            segments.push(raw.to_string());
        }
    }
    let last = last_bracket.ok_or_else(|| invalid("no [identity] segment"))?;

    let single = segments.join("/");
    let mut rest = segments;
    rest.remove(last);
    let collection = match rest.join("/") {
        s if s.is_empty() => "/".to_string(),
        s => s,
    };
    Ok(MountTemplates { single, collection })
}

fn wildcard_names(template: &str) -> Vec<&str> {
    template
        .split('/')
        .filter_map(|s| s.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .collect()
}

/// Every name in `required` must be bound by the template.
fn require_bound(template: &str, required: &[String]) -> Result<(), RouteError> {
    let bound = wildcard_names(template);
    match required.iter().find(|r| !bound.contains(&r.as_str())) {
        Some(missing) => Err(RouteError::MissingParameter {
            template: template.to_string(),
            parameter: missing.clone(),
        }),
        None => Ok(()),
    }
}

impl EntryPoint {
    /// The prefix must be empty or start with `/`.
    pub fn new(url_prefix: &str) -> Result<Self, RouteError> {
        if !url_prefix.is_empty() && !url_prefix.starts_with('/') {
            return Err(RouteError::InvalidTemplate {
                template: url_prefix.to_string(),
                reason: "url prefix must be empty or start with '/'".into(),
            });
        }
        Ok(EntryPoint {
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            get: PathTree::new(),
            put: PathTree::new(),
            post: PathTree::new(),
            delete: PathTree::new(),
        })
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Tree for a method; `None` for methods the entry point does not serve.
    pub fn tree(&self, method: &Method) -> Option<&PathTree<HandlerRef>> {
        match *method {
            Method::GET => Some(&self.get),
            Method::PUT => Some(&self.put),
            Method::POST => Some(&self.post),
            Method::DELETE => Some(&self.delete),
            _ => None,
        }
    }

    fn tree_mut(&mut self, method: &Method) -> Result<&mut PathTree<HandlerRef>, RouteError> {
        match *method {
            Method::GET => Ok(&mut self.get),
            Method::PUT => Ok(&mut self.put),
            Method::POST => Ok(&mut self.post),
            Method::DELETE => Ok(&mut self.delete),
            _ => Err(RouteError::InvalidTemplate {
                template: method.to_string(),
                reason: "unsupported method".into(),
            }),
        }
    }

    pub fn route(&mut self, method: Method, template: &str, handler: HandlerRef) -> Result<(), RouteError> {
        self.tree_mut(&method)?.add(template, handler)
    }

    pub fn replace_controller(&mut self, method: &Method, old: &HandlerRef, new: HandlerRef) -> Result<usize, RouteError> {
        self.tree_mut(method)?.replace_controller(old, new)
    }

    /// Register the five CRUD handlers of `entity` under `template`.
    pub fn crud(&mut self, template: &str, entity: &Entity) -> Result<(), RouteError> {
        let t = mount_templates(template)?;
        require_bound(&t.single, &entity.identity)?;
        require_bound(&t.collection, &entity.inherited_identity())?;

        let handler = |action: CrudAction| -> HandlerRef { Arc::new(EntityHandler::new(action, entity)) };
        self.route(Method::GET, &t.single, handler(CrudAction::Read))?;
        self.route(Method::PUT, &t.single, handler(CrudAction::Update))?;
        self.route(Method::DELETE, &t.single, handler(CrudAction::Delete))?;
        self.route(Method::GET, &t.collection, handler(CrudAction::List))?;
        self.route(Method::POST, &t.collection, handler(CrudAction::Create))?;
        tracing::debug!(entity = %entity.name, single = %t.single, collection = %t.collection, "crud mounted");
        Ok(())
    }

    /// Mount every configured entity.
    pub fn mount_all(&mut self, schema: &Schema, mounts: &[CrudMount]) -> Result<(), AppError> {
        for mount in mounts {
            let entity = schema.entity(&mount.entity)?;
            self.crud(&mount.template, entity)?;
        }
        Ok(())
    }

    /// Strip the prefix and look the path up in the method's tree.
    pub fn resolve(&self, method: &Method, path: &str) -> Result<Match<'_, HandlerRef>, AppError> {
        let tree = self
            .tree(method)
            .ok_or_else(|| AppError::MethodNotAllowed(method.to_string()))?;
        let local = match path.strip_prefix(self.url_prefix.as_str()) {
            Some("") => "/",
            Some(rest) if rest.starts_with('/') => rest,
            _ => return Err(AppError::NotFound(path.to_string())),
        };
        Ok(tree.get(local)?)
    }
}
