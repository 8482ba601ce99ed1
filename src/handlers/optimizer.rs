//! Offline handler optimizer.
//!
//! `analyze` turns a handler's read shape into a `Plan` holding fixed SQL; `emit` wraps the
//! plan in a `Precompiled` handler that binds path values and zips rows straight into JSON,
//! skipping record materialization. Only entities without relations qualify, since their
//! projection is exactly their readable columns.

use crate::config::{Entity, Schema};
use crate::error::{AppError, SchemaError};
use crate::handlers::{Handler, HandlerRef, QueryShape, Request};
use crate::response::Reply;
use crate::routes::EntryPoint;
use crate::service::{CrudService, Query};
use crate::sql::{Dialect, SqlValue};
use crate::state::AppState;
use async_trait::async_trait;
use axum::http::Method;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub entity: String,
    pub sql: String,
    /// Selected columns, in row order.
    pub field_names: Vec<String>,
    /// Path parameters bound to the placeholders, in order.
    pub keys: Vec<String>,
    pub single: bool,
}

/// `None` when the shape's entity has relations to project.
pub fn analyze(schema: &Schema, shape: &QueryShape, dialect: Dialect) -> Result<Option<Plan>, SchemaError> {
    let entity = schema.entity(&shape.entity)?;
    if !entity.relations.is_empty() {
        return Ok(None);
    }
    let mut query = Query::new(schema, &entity.name)?;
    for key in &shape.keys {
        query = query.filter_eq(key, SqlValue::Null);
    }
    if !shape.single {
        let order: Vec<&str> = entity.identity.iter().map(String::as_str).collect();
        query = query.order_by(&order);
    }
    let select = query.to_sql(dialect)?;
    Ok(Some(Plan {
        entity: entity.name.clone(),
        sql: select.sql,
        field_names: select.field_names,
        keys: shape.keys.clone(),
        single: shape.single,
    }))
}

/// Build the replacement for `original`. It keeps the original's parameter list so the
/// route's wildcard check still holds.
pub fn emit(plan: Plan, original: &HandlerRef) -> HandlerRef {
    Arc::new(Precompiled {
        parameters: original.parameters().to_vec(),
        plan,
    })
}

#[derive(Debug)]
pub struct Precompiled {
    plan: Plan,
    parameters: Vec<String>,
}

impl Precompiled {
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    fn project(&self, entity: &Entity, row: Vec<SqlValue>) -> Value {
        let mut map = Map::new();
        for (name, raw) in self.plan.field_names.iter().zip(row) {
            if let Some(field) = entity.field(name).filter(|f| f.readable) {
                map.insert(name.clone(), field.kind.decode(raw).to_json());
            }
        }
        Value::Object(map)
    }
}

#[async_trait]
impl Handler for Precompiled {
    fn parameters(&self) -> &[String] {
        &self.parameters
    }

    async fn call(&self, state: &AppState, req: Request) -> Result<Reply, AppError> {
        let entity = state.schema.entity(&self.plan.entity)?;
        let ids = CrudService::path_ids(entity, &req.ordered(&self.plan.keys))?;
        if ids.len() != self.plan.keys.len() {
            return Err(AppError::BadRequest(format!(
                "expected path parameters {}",
                self.plan.keys.join(", ")
            )));
        }
        let params: Vec<SqlValue> = ids.into_iter().map(|(_, v)| v).collect();
        let rs = state.db.execute(&self.plan.sql, &params).await?;
        let mut rows = rs.rows.into_iter().map(|row| self.project(entity, row));

        if self.plan.single {
            rows.next()
                .map(Reply::Ok)
                .ok_or_else(|| AppError::NotFound(self.plan.entity.clone()))
        } else {
            Ok(Reply::Many(rows.collect()))
        }
    }
}

/// Replace every GET handler whose shape qualifies. Returns the number of routes rewritten.
pub fn optimize(entry: &mut EntryPoint, schema: &Schema, dialect: Dialect) -> Result<usize, AppError> {
    let mut candidates: Vec<HandlerRef> = Vec::new();
    if let Some(tree) = entry.tree(&Method::GET) {
        for (handler, _) in tree.controllers() {
            if !candidates.iter().any(|c| Arc::ptr_eq(c, handler)) {
                candidates.push(handler.clone());
            }
        }
    }

    let mut replaced = 0;
    for handler in candidates {
        let Some(shape) = handler.shape() else {
            continue;
        };
        match analyze(schema, shape, dialect)? {
            Some(plan) => {
                tracing::debug!(entity = %plan.entity, sql = %plan.sql, "handler precompiled");
                let new = emit(plan, &handler);
                replaced += entry.replace_controller(&Method::GET, &handler, new)?;
            }
            None => tracing::debug!(entity = %shape.entity, "handler kept: entity has relations"),
        }
    }
    tracing::info!(replaced, "optimizer finished");
    Ok(replaced)
}
