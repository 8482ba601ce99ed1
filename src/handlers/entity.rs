//! Generated CRUD handlers for one entity: read, list, create, update, delete.

use crate::config::Entity;
use crate::error::AppError;
use crate::handlers::{Handler, Request};
use crate::response::Reply;
use crate::service::CrudService;
use crate::state::AppState;
use async_trait::async_trait;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrudAction {
    Read,
    List,
    Create,
    Update,
    Delete,
}

impl CrudAction {
    /// Actions bound to the single-resource route (full identity in the URL).
    pub fn is_single(self) -> bool {
        matches!(self, CrudAction::Read | CrudAction::Update | CrudAction::Delete)
    }
}

/// A read the optimizer can precompile: entity, the filter keys in binding order, and
/// whether one row or a list comes back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryShape {
    pub entity: String,
    pub keys: Vec<String>,
    pub single: bool,
}

#[derive(Debug)]
pub struct EntityHandler {
    action: CrudAction,
    entity: String,
    parameters: Vec<String>,
    shape: Option<QueryShape>,
}

impl EntityHandler {
    /// Single-resource actions bind the whole identity; collection actions bind the
    /// identity inherited from parents.
    pub fn new(action: CrudAction, entity: &Entity) -> Self {
        let parameters = if action.is_single() {
            entity.identity.clone()
        } else {
            entity.inherited_identity()
        };
        let shape = match action {
            CrudAction::Read | CrudAction::List => Some(QueryShape {
                entity: entity.name.clone(),
                keys: parameters.clone(),
                single: action == CrudAction::Read,
            }),
            _ => None,
        };
        EntityHandler {
            action,
            entity: entity.name.clone(),
            parameters,
            shape,
        }
    }

    pub fn action(&self) -> CrudAction {
        self.action
    }
}

#[async_trait]
impl Handler for EntityHandler {
    fn parameters(&self) -> &[String] {
        &self.parameters
    }

    async fn call(&self, state: &AppState, req: Request) -> Result<Reply, AppError> {
        let schema = state.schema.as_ref();
        let db = &state.db;
        let entity = schema.entity(&self.entity)?;
        let ids = CrudService::path_ids(entity, &req.ordered(&self.parameters))?;
        let not_found = || AppError::NotFound(format!("{} {}", self.entity, describe(&req, &self.parameters)));

        match self.action {
            CrudAction::Read => CrudService::read(schema, db, entity, &ids)
                .await?
                .map(Reply::Ok)
                .ok_or_else(not_found),
            CrudAction::List => Ok(Reply::Many(CrudService::list(schema, db, entity, &ids).await?)),
            CrudAction::Create => {
                let created = CrudService::create(schema, db, entity, &ids, req.body()?).await?;
                Ok(Reply::Created(created))
            }
            CrudAction::Update => CrudService::update(schema, db, entity, &ids, req.body()?)
                .await?
                .map(Reply::Ok)
                .ok_or_else(not_found),
            CrudAction::Delete => {
                if CrudService::delete(schema, db, entity, &ids).await? {
                    Ok(Reply::NoContent)
                } else {
                    Err(not_found())
                }
            }
        }
    }

    fn shape(&self) -> Option<&QueryShape> {
        self.shape.as_ref()
    }
}

fn describe(req: &Request, names: &[String]) -> String {
    req.ordered(names)
        .iter()
        .map(|(n, v)| format!("{}={}", n, v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityDecl, Field, SchemaBuilder};

    #[test]
    fn parameters_follow_identity() {
        let schema = SchemaBuilder::new()
            .with(EntityDecl::new("Hotel").field(Field::string("name")).composed_by("rooms", "Room"))
            .with(EntityDecl::new("Room").field(Field::integer("number").weak_id()))
            .initialize()
            .unwrap();
        let room = schema.entity("Room").unwrap();

        let read = EntityHandler::new(CrudAction::Read, room);
        assert_eq!(read.parameters(), ["number", "hotel_id"]);
        assert_eq!(read.shape().map(|s| s.single), Some(true));

        let list = EntityHandler::new(CrudAction::List, room);
        assert_eq!(list.parameters(), ["hotel_id"]);

        let hotel = schema.entity("Hotel").unwrap();
        assert!(EntityHandler::new(CrudAction::Create, hotel).parameters().is_empty());
        assert!(EntityHandler::new(CrudAction::Delete, hotel).shape().is_none());
    }
}
