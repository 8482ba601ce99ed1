//! Request body validation against the resolved field model.

use crate::config::{Entity, Field};
use crate::error::AppError;
use crate::sql::SqlValue;
use serde_json::{Map, Value};

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body. Fields named in `from_url` are supplied by the route and
    /// need not be present; every other required field must be.
    pub fn validate(
        entity: &Entity,
        body: &Map<String, Value>,
        from_url: &[String],
    ) -> Result<Vec<(String, SqlValue)>, AppError> {
        let values = coerce_all(entity, body, from_url)?;
        for field in entity.fields.iter().filter(|f| is_required(f)) {
            if from_url.contains(&field.name) {
                continue;
            }
            if !values.iter().any(|(n, _)| *n == field.name) {
                return Err(AppError::Validation(format!("{} is required", field.name)));
            }
        }
        Ok(values)
    }

    /// Validate only the fields present (update). Identity fields cannot change.
    pub fn validate_partial(entity: &Entity, body: &Map<String, Value>) -> Result<Vec<(String, SqlValue)>, AppError> {
        if let Some(id) = entity.identity.iter().find(|id| body.contains_key(id.as_str())) {
            return Err(AppError::Validation(format!("{} is part of the identity and cannot be updated", id)));
        }
        coerce_all(entity, body, &[])
    }
}

/// Required on create: not nullable and not generated by the database.
fn is_required(f: &Field) -> bool {
    !f.nullable && !f.kind.is_auto_increment()
}

fn coerce_all(entity: &Entity, body: &Map<String, Value>, skip: &[String]) -> Result<Vec<(String, SqlValue)>, AppError> {
    let mut out = Vec::with_capacity(body.len());
    for (name, v) in body {
        if skip.contains(name) {
            continue;
        }
        let field = entity
            .field(name)
            .ok_or_else(|| AppError::Validation(format!("unknown field {}", name)))?;
        if !field.writable {
            return Err(AppError::Validation(format!("{} is read-only", name)));
        }
        if v.is_null() && !field.nullable {
            if field.kind.is_auto_increment() {
                continue;
            }
            return Err(AppError::Validation(format!("{} cannot be null", name)));
        }
        let value = field
            .kind
            .coerce(v)
            .map_err(|reason| AppError::Validation(format!("{} {}", name, reason)))?;
        out.push((name.clone(), value));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityDecl, Schema, SchemaBuilder};
    use serde_json::json;

    fn schema() -> Schema {
        SchemaBuilder::new()
            .with(
                EntityDecl::new("Hotel")
                    .field(Field::string("name").length(10))
                    .field(Field::string("note").nullable())
                    .field(Field::date("opened").nullable().read_only())
                    .composed_by("rooms", "Room"),
            )
            .with(
                EntityDecl::new("Room")
                    .field(Field::integer("number").weak_id())
                    .field(Field::integer("bed_count").range(1, 6)),
            )
            .initialize()
            .unwrap()
    }

    fn body(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn create_requires_non_null_fields() {
        let schema = schema();
        let hotel = schema.entity("Hotel").unwrap();
        let ok = RequestValidator::validate(hotel, &body(json!({"name": "Ritz"})), &[]).unwrap();
        assert_eq!(ok, vec![("name".to_string(), SqlValue::from("Ritz"))]);
        let err = RequestValidator::validate(hotel, &body(json!({"note": "x"})), &[]).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "name is required"));
    }

    #[test]
    fn url_fields_are_not_required() {
        let schema = schema();
        let room = schema.entity("Room").unwrap();
        let vals = RequestValidator::validate(
            room,
            &body(json!({"number": 1, "bed_count": 2})),
            &["hotel_id".to_string()],
        )
        .unwrap();
        assert_eq!(vals.len(), 2);
    }

    #[test]
    fn rejects_unknown_read_only_and_out_of_range() {
        let schema = schema();
        let hotel = schema.entity("Hotel").unwrap();
        assert!(RequestValidator::validate(hotel, &body(json!({"name": "a", "stars": 3})), &[]).is_err());
        assert!(RequestValidator::validate(hotel, &body(json!({"name": "a", "opened": "2020-01-01"})), &[]).is_err());
        assert!(RequestValidator::validate(hotel, &body(json!({"name": "far too long name"})), &[]).is_err());
        let room = schema.entity("Room").unwrap();
        assert!(RequestValidator::validate_partial(room, &body(json!({"bed_count": 9}))).is_err());
    }

    #[test]
    fn partial_rejects_identity_changes() {
        let schema = schema();
        let room = schema.entity("Room").unwrap();
        let err = RequestValidator::validate_partial(room, &body(json!({"number": 4}))).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(RequestValidator::validate_partial(room, &body(json!({"bed_count": 3}))).is_ok());
    }
}
