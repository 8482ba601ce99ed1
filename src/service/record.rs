//! Entity instances: per-field slots, persistence, relation navigation, and JSON projection.

use crate::config::{Entity, LinkKind, RelationKind, Schema};
use crate::error::{AppError, SchemaError};
use crate::service::Query;
use crate::sql::{self, eq, next_value, Condition, SqlValue};
use crate::store::Database;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;

/// A field's state in a record. `NotSelected` is distinct from SQL NULL.
#[derive(Clone, Debug, PartialEq)]
pub enum Slot {
    NotSelected,
    Value(SqlValue),
}

impl Slot {
    pub fn value(&self) -> Option<&SqlValue> {
        match self {
            Slot::Value(v) => Some(v),
            Slot::NotSelected => None,
        }
    }
}

type JsonFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, AppError>> + Send + 'a>>;

#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    entity: String,
    slots: Vec<(String, Slot)>,
}

impl Record {
    /// Every field starts `NotSelected`.
    pub fn new(entity: &Entity) -> Self {
        Record {
            entity: entity.name.clone(),
            slots: entity
                .fields
                .iter()
                .map(|f| (f.name.clone(), Slot::NotSelected))
                .collect(),
        }
    }

    pub(crate) fn from_row(entity: &Entity, names: &[String], row: Vec<SqlValue>) -> Self {
        let mut record = Record::new(entity);
        for (name, raw) in names.iter().zip(row) {
            if let Some(field) = entity.field(name) {
                let value = field.kind.decode(raw);
                record.put(name, Slot::Value(value));
            }
        }
        record
    }

    pub fn entity_name(&self) -> &str {
        &self.entity
    }

    fn put(&mut self, name: &str, slot: Slot) -> bool {
        match self.slots.iter_mut().find(|(n, _)| n == name) {
            Some((_, s)) => {
                *s = slot;
                true
            }
            None => false,
        }
    }

    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Value of a selected field; `None` when unknown or not selected.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        self.slot(name).and_then(Slot::value)
    }

    pub fn set(&mut self, name: &str, value: impl Into<SqlValue>) -> Result<(), SchemaError> {
        if self.put(name, Slot::Value(value.into())) {
            Ok(())
        } else {
            Err(SchemaError::UnknownField {
                entity: self.entity.clone(),
                field: name.to_string(),
            })
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<SqlValue>) -> Result<Self, SchemaError> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn selected(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.slots
            .iter()
            .filter_map(|(n, s)| s.value().map(|v| (n.as_str(), v)))
    }

    fn entity<'s>(&self, schema: &'s Schema) -> Result<&'s Entity, SchemaError> {
        schema.entity(&self.entity)
    }

    /// Values of the identity columns, in identity order. All must be set.
    pub fn identity_values(&self, entity: &Entity) -> Result<Vec<SqlValue>, AppError> {
        entity
            .identity
            .iter()
            .map(|name| match self.get(name) {
                Some(v) if !v.is_null() => Ok(v.clone()),
                _ => Err(AppError::Validation(format!(
                    "{}.{} is part of the identity and must be set",
                    entity.name, name
                ))),
            })
            .collect()
    }

    fn identity_filter(&self, entity: &Entity) -> Result<Condition, AppError> {
        let conds = entity
            .identity
            .iter()
            .zip(self.identity_values(entity)?)
            .map(|(name, v)| eq(entity.column(name), v));
        Condition::all(conds).ok_or_else(|| AppError::Validation(format!("{} has no identity", entity.name)))
    }

    /// INSERT the selected fields. Fills an unset auto-increment weak id with the next
    /// value under the same parent, and stores the generated key of a single-column identity.
    pub async fn save(&mut self, schema: &Schema, db: &Database) -> Result<u64, AppError> {
        let entity = self.entity(schema)?;
        let dialect = db.dialect();
        let composite = entity.identity.len() > 1;

        let counters = entity.fields.iter().filter(|f| f.kind.is_auto_increment()).filter(|f| {
            f.weak_id || (f.primary_key && composite && !dialect.generates_composite_keys())
        });
        for counter in counters {
            if self.get(&counter.name).map(|v| !v.is_null()).unwrap_or(false) {
                continue;
            }
            let scope = if counter.weak_id { entity.inherited_identity() } else { Vec::new() };
            let mut scope_values = Vec::with_capacity(scope.len());
            for name in &scope {
                match self.get(name) {
                    Some(v) if !v.is_null() => scope_values.push(v.clone()),
                    _ => {
                        return Err(AppError::Validation(format!(
                            "{}.{} must be set before saving",
                            entity.name, name
                        )))
                    }
                }
            }
            let scope_refs: Vec<&str> = scope.iter().map(String::as_str).collect();
            let sql = next_value(dialect, &entity.table_name, &counter.name, &scope_refs);
            let rs = db.execute(&sql, &scope_values).await?;
            let next = rs.scalar().cloned().unwrap_or(SqlValue::Integer(1));
            self.set(&counter.name, next)?;
        }

        let auto_key = entity
            .primary_key()
            .filter(|f| f.kind.is_auto_increment())
            .find(|f| self.get(&f.name).map(SqlValue::is_null).unwrap_or(true))
            .map(|f| f.name.clone());

        let (names, values): (Vec<&str>, Vec<SqlValue>) = self
            .selected()
            .filter(|(n, v)| !(v.is_null() && auto_key.as_deref() == Some(*n)))
            .map(|(n, v)| (n, v.clone()))
            .unzip();
        let sql = match &auto_key {
            Some(key) => sql::insert_returning(dialect, &entity.table_name, &names, key),
            None => sql::insert(dialect, &entity.table_name, &names),
        };
        let rs = db.execute(&sql, &values).await?;
        if let (Some(key), Some(id)) = (auto_key, rs.last_insert_id) {
            self.set(&key, id)?;
        }
        Ok(rs.rows_affected)
    }

    /// UPDATE the selected non-identity fields WHERE identity.
    pub async fn update(&self, schema: &Schema, db: &Database) -> Result<u64, AppError> {
        let entity = self.entity(schema)?;
        let ids = self.identity_values(entity)?;
        let (names, mut values): (Vec<&str>, Vec<SqlValue>) = self
            .selected()
            .filter(|(n, _)| !entity.identity.iter().any(|id| id == n))
            .map(|(n, v)| (n, v.clone()))
            .unzip();
        if names.is_empty() {
            return self.exists(schema, db).await.map(u64::from);
        }
        let id_names: Vec<&str> = entity.identity.iter().map(String::as_str).collect();
        let sql = sql::update(db.dialect(), &entity.table_name, &names, &id_names);
        values.extend(ids);
        Ok(db.execute(&sql, &values).await?.rows_affected)
    }

    pub async fn delete(&self, schema: &Schema, db: &Database) -> Result<u64, AppError> {
        let entity = self.entity(schema)?;
        let ids = self.identity_values(entity)?;
        let id_names: Vec<&str> = entity.identity.iter().map(String::as_str).collect();
        let sql = sql::delete(db.dialect(), &entity.table_name, &id_names);
        Ok(db.execute(&sql, &ids).await?.rows_affected)
    }

    pub async fn exists(&self, schema: &Schema, db: &Database) -> Result<bool, AppError> {
        let entity = self.entity(schema)?;
        let ids: Vec<&str> = entity.identity.iter().map(String::as_str).collect();
        let q = Query::new(schema, &entity.name)?
            .select(&ids)
            .filter(self.identity_filter(entity)?);
        Ok(q.first(db).await?.is_some())
    }

    /// Children of a ComposedBy relation or targets of a Has relation, in insertion order.
    pub fn related<'s>(&self, schema: &'s Schema, relation: &str) -> Result<Query<'s>, AppError> {
        let entity = self.entity(schema)?;
        let rel = entity.relation(relation).ok_or_else(|| entity.unknown_field(relation))?;
        let target = schema.entity(&rel.target)?;
        let conds = entity
            .identity
            .iter()
            .zip(self.identity_values(entity)?)
            .map(|(id, v)| eq(target.column(&format!("{}_{}", entity.table_name, id)), v));
        let mut q = Query::new(schema, &target.name)?;
        if let Some(cond) = Condition::all(conds) {
            q = q.filter(cond);
        }
        Ok(q.order_by_insertion())
    }

    /// From a participant: rows of the association that reference this record.
    pub fn association_set<'s>(&self, schema: &'s Schema, link: &str) -> Result<Query<'s>, AppError> {
        let entity = self.entity(schema)?;
        let association = match entity.link(link).map(|l| &l.kind) {
            Some(LinkKind::ToAssociation { association }) => schema.entity(association)?,
            _ => return Err(entity.unknown_field(link).into()),
        };
        let values = self.identity_values(entity)?;
        let mut on = Vec::new();
        let mut filter = Vec::new();
        for (id, v) in entity.identity.iter().zip(values) {
            let related = association.column(&format!("{}_{}", entity.table_name, id));
            on.push(eq(related, entity.column(id)));
            filter.push(eq(entity.column(id), v));
        }
        let q = Query::new(schema, &association.name)?;
        let q = match Condition::all(on) {
            Some(on) => q.join(&entity.name, on)?,
            None => q,
        };
        Ok(match Condition::all(filter) {
            Some(f) => q.filter(f),
            None => q,
        })
    }

    /// From an association row: the participant it references.
    pub fn association_ref<'s>(&self, schema: &'s Schema, link: &str) -> Result<Query<'s>, AppError> {
        let entity = self.entity(schema)?;
        let participant = match entity.link(link).map(|l| &l.kind) {
            Some(LinkKind::FromAssociation { participant }) => schema.entity(participant)?,
            _ => return Err(entity.unknown_field(link).into()),
        };
        let mut conds = Vec::new();
        for id in &participant.identity {
            let local = format!("{}_{}", participant.table_name, id);
            let v = self
                .get(&local)
                .cloned()
                .ok_or_else(|| AppError::Validation(format!("{}.{} is not selected", entity.name, local)))?;
            conds.push(eq(participant.column(id), v));
        }
        let q = Query::new(schema, &participant.name)?;
        Ok(match Condition::all(conds) {
            Some(c) => q.filter(c),
            None => q,
        })
    }

    /// Readable selected fields by name; ComposedBy children as arrays of projections
    /// ordered by identity; Has targets as identity objects.
    pub fn to_json<'a>(&'a self, schema: &'a Schema, db: &'a Database) -> JsonFuture<'a> {
        Box::pin(async move {
            let entity = self.entity(schema)?;
            let mut map = Map::new();
            for field in entity.fields.iter().filter(|f| f.readable) {
                if let Some(v) = self.get(&field.name) {
                    map.insert(field.name.clone(), v.to_json());
                }
            }

            let identified = entity.identity.iter().all(|id| self.get(id).is_some());
            if !identified {
                return Ok(Value::Object(map));
            }
            for rel in &entity.relations {
                let query = self.related(schema, &rel.name)?;
                let value = match rel.kind {
                    RelationKind::ComposedBy => {
                        let mut children = Vec::new();
                        for child in query.all(db).await? {
                            children.push(child.to_json(schema, db).await?);
                        }
                        Value::Array(children)
                    }
                    RelationKind::Has => {
                        let target = query.entity();
                        let ids: Vec<&str> = target.identity.iter().map(String::as_str).collect();
                        let refs: Vec<Value> = query
                            .select(&ids)
                            .all(db)
                            .await?
                            .iter()
                            .map(|r| identity_object(r, target))
                            .collect();
                        if rel.cardinality.max_is_one() {
                            refs.into_iter().next().unwrap_or(Value::Null)
                        } else {
                            Value::Array(refs)
                        }
                    }
                };
                map.insert(rel.name.clone(), value);
            }
            Ok(Value::Object(map))
        })
    }
}

fn identity_object(record: &Record, entity: &Entity) -> Value {
    let map: Map<String, Value> = entity
        .identity
        .iter()
        .map(|id| (id.clone(), record.get(id).map(SqlValue::to_json).unwrap_or(Value::Null)))
        .collect();
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityDecl, Field, SchemaBuilder};

    fn schema() -> Schema {
        SchemaBuilder::new()
            .with(EntityDecl::new("Hotel").field(Field::string("name")))
            .initialize()
            .unwrap()
    }

    #[test]
    fn not_selected_is_not_null() {
        let schema = schema();
        let hotel = schema.entity("Hotel").unwrap();
        let mut r = Record::new(hotel);
        assert_eq!(r.slot("name"), Some(&Slot::NotSelected));
        assert_eq!(r.get("name"), None);
        r.set("name", SqlValue::Null).unwrap();
        assert_eq!(r.get("name"), Some(&SqlValue::Null));
        assert!(r.set("stars", 5).is_err());
    }

    #[test]
    fn from_row_leaves_unprojected_fields() {
        let schema = schema();
        let hotel = schema.entity("Hotel").unwrap();
        let r = Record::from_row(hotel, &["name".to_string()], vec![SqlValue::from("Ritz")]);
        assert_eq!(r.slot("id"), Some(&Slot::NotSelected));
        assert_eq!(r.get("name"), Some(&SqlValue::from("Ritz")));
        assert!(r.identity_values(hotel).is_err());
    }
}
