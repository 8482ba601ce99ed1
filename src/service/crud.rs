//! Generic CRUD over the resolved schema: identity lookups, validated writes, JSON projections.

use crate::config::{Entity, Schema};
use crate::error::AppError;
use crate::service::{Query, Record, RequestValidator};
use crate::sql::{eq, Condition, SqlValue};
use crate::store::Database;
use serde_json::{Map, Value};

/// Identity or parent-identity values taken from the URL, already coerced.
pub type Ids = Vec<(String, SqlValue)>;

pub struct CrudService;

impl CrudService {
    /// Coerce raw path parameters by the kinds of the fields they name.
    pub fn path_ids(entity: &Entity, params: &[(String, String)]) -> Result<Ids, AppError> {
        params
            .iter()
            .map(|(name, raw)| {
                let field = entity.field(name).ok_or_else(|| AppError::Schema(entity.unknown_field(name)))?;
                let v = field
                    .kind
                    .coerce(&Value::String(raw.clone()))
                    .map_err(|reason| AppError::BadRequest(format!("{} {}", name, reason)))?;
                Ok((name.clone(), v))
            })
            .collect()
    }

    fn filter(entity: &Entity, ids: &Ids) -> Option<Condition> {
        Condition::all(ids.iter().map(|(n, v)| eq(entity.column(n), v.clone())))
    }

    /// One projected record, or `None`.
    pub async fn read(schema: &Schema, db: &Database, entity: &Entity, ids: &Ids) -> Result<Option<Value>, AppError> {
        let mut q = Query::new(schema, &entity.name)?;
        if let Some(cond) = Self::filter(entity, ids) {
            q = q.filter(cond);
        }
        match q.first(db).await? {
            Some(record) => Ok(Some(record.to_json(schema, db).await?)),
            None => Ok(None),
        }
    }

    /// Projected records matching `ids` (the inherited identity for nested collections), ordered by identity.
    pub async fn list(schema: &Schema, db: &Database, entity: &Entity, ids: &Ids) -> Result<Vec<Value>, AppError> {
        let order: Vec<&str> = entity.identity.iter().map(String::as_str).collect();
        let mut q = Query::new(schema, &entity.name)?.order_by(&order);
        if let Some(cond) = Self::filter(entity, ids) {
            q = q.filter(cond);
        }
        let mut out = Vec::new();
        for record in q.fetch(db).await? {
            out.push(record.to_json(schema, db).await?);
        }
        Ok(out)
    }

    /// Validate, insert, and return the stored projection.
    pub async fn create(
        schema: &Schema,
        db: &Database,
        entity: &Entity,
        url_ids: &Ids,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        let from_url: Vec<String> = url_ids.iter().map(|(n, _)| n.clone()).collect();
        let values = RequestValidator::validate(entity, body, &from_url)?;
        let mut record = Record::new(entity);
        for (name, v) in values.into_iter().chain(url_ids.iter().cloned()) {
            record.set(&name, v)?;
        }
        record.save(schema, db).await?;

        let ids: Ids = entity
            .identity
            .iter()
            .cloned()
            .zip(record.identity_values(entity)?)
            .collect();
        Self::read(schema, db, entity, &ids)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} vanished after insert", entity.name)))
    }

    /// Validate and update; `None` when no row has that identity.
    pub async fn update(
        schema: &Schema,
        db: &Database,
        entity: &Entity,
        ids: &Ids,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let values = RequestValidator::validate_partial(entity, body)?;
        let mut record = Record::new(entity);
        for (name, v) in ids.iter().cloned().chain(values) {
            record.set(&name, v)?;
        }
        if record.update(schema, db).await? == 0 {
            return Ok(None);
        }
        Self::read(schema, db, entity, ids).await
    }

    /// `false` when no row has that identity.
    pub async fn delete(schema: &Schema, db: &Database, entity: &Entity, ids: &Ids) -> Result<bool, AppError> {
        let mut record = Record::new(entity);
        for (name, v) in ids {
            record.set(name, v.clone())?;
        }
        Ok(record.delete(schema, db).await? > 0)
    }
}
