//! Declaration validation: referential integrity and per-field consistency, before resolution.

use crate::config::{AppConfig, EntityDecl, FieldKind};
use crate::error::{ConfigError, SchemaError};
use std::collections::HashSet;

/// Widest NUMERIC that still binds as a `rust_decimal::Decimal` on Postgres.
const MAX_NUMERIC_PRECISION: u8 = 28;

pub const PROVIDERS: &[&str] = &["sqlite", "postgres", "mysql", "generic"];

pub fn validate_declarations(decls: &[EntityDecl]) -> Result<(), SchemaError> {
    let mut names: HashSet<&str> = HashSet::new();
    for d in decls {
        if !is_identifier(&d.name) {
            return Err(SchemaError::InvalidField {
                entity: d.name.clone(),
                field: String::new(),
                reason: "entity name must be an identifier".into(),
            });
        }
        if !names.insert(d.name.as_str()) {
            return Err(SchemaError::DuplicateEntity(d.name.clone()));
        }
    }

    for d in decls {
        validate_fields(d)?;

        let mut relation_names: HashSet<&str> = HashSet::new();
        let mut targets = HashSet::new();
        for r in &d.relations {
            // every relation to one target lands on the same foreign key
            if !targets.insert(r.target.as_str()) {
                return Err(SchemaError::Conflict(format!(
                    "{} relates to {} twice",
                    d.name, r.target
                )));
            }
            if !names.contains(r.target.as_str()) {
                return Err(SchemaError::Reference {
                    context: format!("{}.{}", d.name, r.name),
                    name: r.target.clone(),
                });
            }
            if !relation_names.insert(r.name.as_str()) || d.fields.iter().any(|f| f.name == r.name) {
                return Err(SchemaError::Conflict(format!(
                    "{}: relation name '{}' is already used",
                    d.name, r.name
                )));
            }
        }

        let mut participants: HashSet<&str> = HashSet::new();
        for end in &d.association {
            if !names.contains(end.entity.as_str()) {
                return Err(SchemaError::Reference {
                    context: format!("{} association", d.name),
                    name: end.entity.clone(),
                });
            }
            if !participants.insert(end.entity.as_str()) {
                return Err(SchemaError::Conflict(format!(
                    "{}: participant '{}' listed twice",
                    d.name, end.entity
                )));
            }
        }
        if d.association.len() == 1 {
            return Err(SchemaError::Conflict(format!(
                "{}: an association needs at least two participants",
                d.name
            )));
        }
    }
    Ok(())
}

fn validate_fields(d: &EntityDecl) -> Result<(), SchemaError> {
    let invalid = |field: &str, reason: &str| SchemaError::InvalidField {
        entity: d.name.clone(),
        field: field.to_string(),
        reason: reason.to_string(),
    };

    let mut seen: HashSet<&str> = HashSet::new();
    for f in &d.fields {
        if !is_identifier(&f.name) {
            return Err(invalid(&f.name, "name must be an identifier"));
        }
        if !seen.insert(f.name.as_str()) {
            return Err(invalid(&f.name, "declared twice"));
        }
        if f.primary_key && f.weak_id {
            return Err(SchemaError::Conflict(format!(
                "{}.{} is both primary key and weak id",
                d.name, f.name
            )));
        }
        if (f.primary_key || f.weak_id) && f.nullable {
            return Err(invalid(&f.name, "identity fields cannot be nullable"));
        }
        match &f.kind {
            FieldKind::Integer { min_value, max_value, auto_increment } => {
                if min_value >= max_value {
                    return Err(invalid(&f.name, "min_value must be lower than max_value"));
                }
                if *auto_increment && *max_value <= 0 {
                    return Err(invalid(&f.name, "auto increment needs a positive range"));
                }
            }
            FieldKind::String { length, .. } if *length == 0 => {
                return Err(invalid(&f.name, "length must be positive"));
            }
            FieldKind::Numeric { precision, scale } if *precision == 0 || scale > precision => {
                return Err(invalid(&f.name, "scale must not exceed a positive precision"));
            }
            FieldKind::Numeric { precision, .. } if *precision > MAX_NUMERIC_PRECISION => {
                return Err(invalid(
                    &f.name,
                    &format!("precision cannot exceed {} digits", MAX_NUMERIC_PRECISION),
                ));
            }
            _ => {}
        }
    }

    let has_pk = d.fields.iter().any(|f| f.primary_key);
    let has_weak = d.fields.iter().any(|f| f.weak_id);
    if has_pk && has_weak {
        return Err(SchemaError::Conflict(format!(
            "{} declares both a primary key and weak ids",
            d.name
        )));
    }
    Ok(())
}

/// Server config checks, run after env overrides are applied.
pub fn validate_app_config(config: &AppConfig) -> Result<(), ConfigError> {
    if !PROVIDERS.contains(&config.database.provider.as_str()) {
        return Err(ConfigError::Validation(format!(
            "unknown database provider '{}' (expected one of {})",
            config.database.provider,
            PROVIDERS.join(", ")
        )));
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::Validation("database.max_connections must be positive".into()));
    }
    if !config.url_prefix.is_empty() && !config.url_prefix.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "url_prefix '{}' must start with '/'",
            config.url_prefix
        )));
    }
    for m in &config.mounts {
        if !m.template.contains('[') {
            return Err(ConfigError::Validation(format!(
                "mount '{}' for {} has no [identity] segment",
                m.template, m.entity
            )));
        }
    }
    Ok(())
}

pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Cardinality, Field};

    #[test]
    fn rejects_unknown_relation_target() {
        let decls = vec![EntityDecl::new("Hotel").composed_by("rooms", "Room")];
        assert_eq!(
            validate_declarations(&decls),
            Err(SchemaError::Reference {
                context: "Hotel.rooms".into(),
                name: "Room".into()
            })
        );
    }

    #[test]
    fn rejects_duplicate_entities() {
        let decls = vec![EntityDecl::new("A"), EntityDecl::new("A")];
        assert_eq!(validate_declarations(&decls), Err(SchemaError::DuplicateEntity("A".into())));
    }

    #[test]
    fn rejects_inverted_integer_range() {
        let decls = vec![EntityDecl::new("A").field(Field::integer("n").range(5, 5))];
        assert!(matches!(
            validate_declarations(&decls),
            Err(SchemaError::InvalidField { field, .. }) if field == "n"
        ));
    }

    #[test]
    fn rejects_numeric_wider_than_a_bound_decimal() {
        let ok = vec![EntityDecl::new("A").field(Field::numeric("n", 28, 4))];
        assert_eq!(validate_declarations(&ok), Ok(()));
        let wide = vec![EntityDecl::new("A").field(Field::numeric("n", 29, 4))];
        assert!(matches!(
            validate_declarations(&wide),
            Err(SchemaError::InvalidField { field, .. }) if field == "n"
        ));
    }

    #[test]
    fn rejects_pk_with_weak_id() {
        let decls = vec![EntityDecl::new("A")
            .field(Field::integer("a").primary_key())
            .field(Field::integer("b").weak_id())];
        assert!(matches!(validate_declarations(&decls), Err(SchemaError::Conflict(_))));
    }

    #[test]
    fn accepts_association() {
        let decls = vec![
            EntityDecl::new("A"),
            EntityDecl::new("B"),
            EntityDecl::new("AB")
                .associates("A", Cardinality::ZeroOrMore)
                .associates("B", Cardinality::One),
        ];
        assert_eq!(validate_declarations(&decls), Ok(()));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("hotel_id"));
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }
}
