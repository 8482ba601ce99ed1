//! Entity resolution: weak ids, primary keys, identities, then FK and unique synthesis.
//!
//! Passes must run in order. Identities need every weak id and primary key to exist,
//! and FK columns copy the referenced side's materialized identity.

use crate::case::to_snake_case;
use crate::config::{
    validate_declarations, EntityDecl, Field, FieldKind, RelationKind, Entity, ForeignKey, Link, LinkKind, Schema,
};
use crate::error::SchemaError;
use std::collections::HashMap;

/// Collects declarations; `initialize` freezes them into a `Schema`.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    decls: Vec<EntityDecl>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, decl: EntityDecl) -> &mut Self {
        self.decls.push(decl);
        self
    }

    pub fn with(mut self, decl: EntityDecl) -> Self {
        self.decls.push(decl);
        self
    }

    pub fn extend(mut self, decls: impl IntoIterator<Item = EntityDecl>) -> Self {
        self.decls.extend(decls);
        self
    }

    pub fn initialize(self) -> Result<Schema, SchemaError> {
        validate_declarations(&self.decls)?;
        let entities = self.decls.into_iter().map(declared_entity).collect();
        let schema = resolve(entities)?;
        tracing::info!(entities = schema.len(), "schema initialized");
        Ok(schema)
    }
}

impl Schema {
    /// Run the passes again over an already-resolved schema. Adds nothing.
    pub fn reinitialize(&self) -> Result<Schema, SchemaError> {
        resolve(self.entities.clone())
    }
}

fn declared_entity(decl: EntityDecl) -> Entity {
    let mut uniques: Vec<Vec<String>> = Vec::new();
    for f in decl.fields.iter().filter(|f| f.unique) {
        uniques.push(vec![f.name.clone()]);
    }
    for u in decl.uniques {
        if !uniques.contains(&u) {
            uniques.push(u);
        }
    }
    Entity {
        table_name: to_snake_case(&decl.name),
        required_for_pk: decl.association.iter().map(|a| a.entity.clone()).collect(),
        name: decl.name,
        fields: decl.fields,
        relations: decl.relations,
        association: decl.association,
        foreign_keys: Vec::new(),
        uniques,
        identity: Vec::new(),
        composed: false,
        links: Vec::new(),
    }
}

type Identity = Vec<(String, FieldKind)>;

fn resolve(mut entities: Vec<Entity>) -> Result<Schema, SchemaError> {
    let index: HashMap<String, usize> = entities
        .iter()
        .enumerate()
        .map(|(i, e)| (e.name.clone(), i))
        .collect();

    generate_weak_ids(&mut entities, &index)?;
    generate_primary_keys(&mut entities)?;
    let identities = materialize_identities(&mut entities, &index)?;
    synthesize_constraints(&mut entities, &index, &identities)?;
    check_uniques(&entities)?;

    Ok(Schema::from_entities(entities))
}

fn lookup(index: &HashMap<String, usize>, name: &str, context: &str) -> Result<usize, SchemaError> {
    index.get(name).copied().ok_or_else(|| SchemaError::Reference {
        context: context.to_string(),
        name: name.to_string(),
    })
}

fn generated(mut field: Field) -> Field {
    field.generated = true;
    field
}

fn generate_weak_ids(entities: &mut [Entity], index: &HashMap<String, usize>) -> Result<(), SchemaError> {
    for i in 0..entities.len() {
        let parent = entities[i].name.clone();
        let children: Vec<(String, String)> = entities[i]
            .relations
            .iter()
            .filter(|r| r.kind == RelationKind::ComposedBy)
            .map(|r| (r.name.clone(), r.target.clone()))
            .collect();

        for (relation, target) in children {
            let j = lookup(index, &target, &format!("{}.{}", parent, relation))?;
            let child = &mut entities[j];
            if child.primary_key().next().is_some() {
                return Err(SchemaError::Conflict(format!(
                    "{} cannot have a primary key because it is composed by {}",
                    child.name, parent
                )));
            }
            if !child.association.is_empty() {
                return Err(SchemaError::Conflict(format!(
                    "association {} cannot be composed by {}",
                    child.name, parent
                )));
            }
            if let Some(existing) = child.required_for_pk.first() {
                if *existing != parent {
                    return Err(SchemaError::Conflict(format!(
                        "{} is composed by both {} and {}",
                        child.name, existing, parent
                    )));
                }
            }
            if !child.is_weak() {
                if child.has_field("weak_id") {
                    return Err(SchemaError::Conflict(format!(
                        "{}.weak_id is declared but is not a weak id",
                        child.name
                    )));
                }
                child
                    .fields
                    .insert(0, generated(Field::integer("weak_id").weak_id().auto_increment()));
                tracing::debug!(entity = %child.name, "generated weak_id");
            }
            child.required_for_pk = vec![parent.clone()];
            entities[i].composed = true;
        }
    }
    // a weak id only means something under exactly one composing parent
    if let Some(e) = entities
        .iter()
        .find(|e| e.is_weak() && (e.required_for_pk.len() != 1 || !e.association.is_empty()))
    {
        return Err(SchemaError::Conflict(format!(
            "{} declares a weak id but is not composed by any entity",
            e.name
        )));
    }
    Ok(())
}

fn generate_primary_keys(entities: &mut [Entity]) -> Result<(), SchemaError> {
    for e in entities.iter_mut() {
        if e.is_weak() || e.primary_key().next().is_some() {
            continue;
        }
        if e.has_field("id") {
            return Err(SchemaError::Conflict(format!(
                "{}.id is declared but is not a primary key",
                e.name
            )));
        }
        e.fields
            .insert(0, generated(Field::integer("id").primary_key().auto_increment()));
        tracing::debug!(entity = %e.name, "generated id primary key");
    }
    Ok(())
}

fn materialize_identities(
    entities: &mut [Entity],
    index: &HashMap<String, usize>,
) -> Result<Vec<Identity>, SchemaError> {
    let mut memo: Vec<Option<Identity>> = vec![None; entities.len()];
    let mut stack = Vec::new();
    for i in 0..entities.len() {
        identity_of(entities, index, i, &mut memo, &mut stack)?;
    }
    let identities: Vec<Identity> = memo.into_iter().map(Option::unwrap_or_default).collect();
    for (e, ids) in entities.iter_mut().zip(&identities) {
        e.identity = ids.iter().map(|(name, _)| name.clone()).collect();
        tracing::debug!(entity = %e.name, identity = ?e.identity, "identity materialized");
    }
    Ok(identities)
}

/// Own identity fields, then each required entity's identity prefixed by its table name.
fn identity_of(
    entities: &[Entity],
    index: &HashMap<String, usize>,
    i: usize,
    memo: &mut Vec<Option<Identity>>,
    stack: &mut Vec<usize>,
) -> Result<Identity, SchemaError> {
    if let Some(ids) = &memo[i] {
        return Ok(ids.clone());
    }
    if stack.contains(&i) {
        let path: Vec<&str> = stack.iter().map(|&k| entities[k].name.as_str()).collect();
        return Err(SchemaError::Conflict(format!(
            "identity cycle: {} -> {}",
            path.join(" -> "),
            entities[i].name
        )));
    }
    stack.push(i);

    let e = &entities[i];
    let mut ids: Identity = e
        .fields
        .iter()
        .filter(|f| f.primary_key || f.weak_id)
        .map(|f| (f.name.clone(), f.kind.clone()))
        .collect();
    for required in &e.required_for_pk {
        let j = lookup(index, required, &format!("{} identity", e.name))?;
        let prefix = &entities[j].table_name;
        for (name, kind) in identity_of(entities, index, j, memo, stack)? {
            ids.push((format!("{}_{}", prefix, name), kind));
        }
    }

    stack.pop();
    memo[i] = Some(ids.clone());
    Ok(ids)
}

fn prefixed(prefix: &str, identity: &Identity) -> Identity {
    identity
        .iter()
        .map(|(name, kind)| (format!("{}_{}", prefix, name), kind.clone()))
        .collect()
}

fn synthesize_constraints(
    entities: &mut [Entity],
    index: &HashMap<String, usize>,
    identities: &[Identity],
) -> Result<(), SchemaError> {
    // keys from an earlier run are kept as they are
    let resolved: Vec<Vec<ForeignKey>> = entities.iter().map(|e| e.foreign_keys.clone()).collect();
    for i in 0..entities.len() {
        let ends = entities[i].association.clone();
        for end in ends {
            let j = lookup(index, &end.entity, &format!("{} association", entities[i].name))?;
            let columns = prefixed(&entities[j].table_name, &identities[j]);
            let fk = ForeignKey {
                columns: columns.iter().map(|(n, _)| n.clone()).collect(),
                referenced_table: entities[j].table_name.clone(),
                referenced_columns: entities[j].identity.clone(),
            };
            attach(&mut entities[i], &resolved[i], columns, false, fk, end.cardinality.max_is_one())?;

            let set = Link {
                name: format!("{}_set", entities[i].table_name),
                kind: LinkKind::ToAssociation {
                    association: entities[i].name.clone(),
                },
            };
            let reference = Link {
                name: format!("{}_ref", entities[j].table_name),
                kind: LinkKind::FromAssociation {
                    participant: entities[j].name.clone(),
                },
            };
            add_link(&mut entities[j], set);
            add_link(&mut entities[i], reference);
        }

        let relations = entities[i].relations.clone();
        for r in relations {
            let j = lookup(index, &r.target, &format!("{}.{}", entities[i].name, r.name))?;
            let columns = prefixed(&entities[i].table_name, &identities[i]);
            let fk = ForeignKey {
                columns: columns.iter().map(|(n, _)| n.clone()).collect(),
                referenced_table: entities[i].table_name.clone(),
                referenced_columns: entities[i].identity.clone(),
            };
            let nullable = r.kind == RelationKind::Has;
            attach(&mut entities[j], &resolved[j], columns, nullable, fk, r.cardinality.max_is_one())?;
        }
    }
    Ok(())
}

fn attach(
    entity: &mut Entity,
    resolved: &[ForeignKey],
    columns: Identity,
    nullable: bool,
    fk: ForeignKey,
    unique: bool,
) -> Result<(), SchemaError> {
    if resolved.contains(&fk) {
        return Ok(());
    }
    if entity.foreign_keys.contains(&fk) {
        return Err(SchemaError::Conflict(format!(
            "{}: two relations to {} share the foreign key ({})",
            entity.name,
            fk.referenced_table,
            fk.columns.join(", ")
        )));
    }
    for (name, _) in &columns {
        if entity.has_field(name) {
            return Err(SchemaError::Conflict(format!(
                "{}.{} collides with a foreign key column to {}",
                entity.name, name, fk.referenced_table
            )));
        }
    }
    for (name, kind) in &columns {
        entity.fields.push(Field::reference(name.clone(), kind, nullable));
    }
    if unique && !entity.uniques.contains(&fk.columns) {
        entity.uniques.push(fk.columns.clone());
    }
    tracing::debug!(
        entity = %entity.name,
        columns = ?fk.columns,
        references = %fk.referenced_table,
        "foreign key synthesized"
    );
    entity.foreign_keys.push(fk);
    Ok(())
}

fn add_link(entity: &mut Entity, link: Link) {
    if entity.link(&link.name).is_none() {
        entity.links.push(link);
    }
}

fn check_uniques(entities: &[Entity]) -> Result<(), SchemaError> {
    for e in entities {
        for u in &e.uniques {
            if u.is_empty() {
                return Err(SchemaError::Conflict(format!("{} has an empty unique constraint", e.name)));
            }
            if let Some(missing) = u.iter().find(|name| !e.has_field(name)) {
                return Err(e.unknown_field(missing));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Cardinality;
    use pretty_assertions::assert_eq;

    fn hotel_schema() -> Schema {
        SchemaBuilder::new()
            .with(
                EntityDecl::new("Hotel")
                    .field(Field::string("name"))
                    .field(Field::string("address"))
                    .composed_by("rooms", "Room"),
            )
            .with(
                EntityDecl::new("Room")
                    .field(Field::integer("number").weak_id())
                    .field(Field::integer("bed_count")),
            )
            .initialize()
            .unwrap()
    }

    #[test]
    fn weak_child_borrows_parent_identity() {
        let schema = hotel_schema();
        let room = schema.entity("Room").unwrap();
        assert_eq!(room.identity, vec!["number", "hotel_id"]);
        assert_eq!(room.field_names(), vec!["number", "bed_count", "hotel_id"]);
        assert_eq!(
            room.foreign_keys,
            vec![ForeignKey {
                columns: vec!["hotel_id".into()],
                referenced_table: "hotel".into(),
                referenced_columns: vec!["id".into()],
            }]
        );
        let fk = room.field("hotel_id").unwrap();
        assert!(fk.generated && !fk.nullable && !fk.kind.is_auto_increment());
        assert!(schema.entity("Hotel").unwrap().composed);
    }

    #[test]
    fn reinitialize_adds_nothing() {
        let schema = hotel_schema();
        let again = schema.reinitialize().unwrap();
        assert_eq!(again.entities(), schema.entities());
    }

    #[test]
    fn has_relation_adds_nullable_columns_on_the_other_side() {
        let schema = SchemaBuilder::new()
            .with(EntityDecl::new("Person").has("car", "Car", Cardinality::ZeroOrOne))
            .with(EntityDecl::new("Car"))
            .initialize()
            .unwrap();
        let car = schema.entity("Car").unwrap();
        let fk = car.field("person_id").unwrap();
        assert!(fk.nullable);
        assert_eq!(car.uniques, vec![vec!["person_id".to_string()]]);
    }

    #[test]
    fn association_links_both_sides() {
        let schema = SchemaBuilder::new()
            .with(EntityDecl::new("Student"))
            .with(EntityDecl::new("Course"))
            .with(
                EntityDecl::new("Enrollment")
                    .associates("Student", Cardinality::ZeroOrMore)
                    .associates("Course", Cardinality::ZeroOrMore),
            )
            .initialize()
            .unwrap();
        let e = schema.entity("Enrollment").unwrap();
        assert_eq!(e.identity, vec!["id", "student_id", "course_id"]);
        assert!(e.uniques.is_empty());
        assert!(e.link("student_ref").is_some());
        assert!(schema.entity("Student").unwrap().link("enrollment_set").is_some());
    }

    #[test]
    fn second_parent_is_a_conflict() {
        let err = SchemaBuilder::new()
            .with(EntityDecl::new("A").composed_by("cs", "C"))
            .with(EntityDecl::new("B").composed_by("cs", "C"))
            .with(EntityDecl::new("C"))
            .initialize()
            .unwrap_err();
        assert!(matches!(err, SchemaError::Conflict(_)));
    }

    #[test]
    fn composition_cycle_is_a_conflict() {
        let err = SchemaBuilder::new()
            .with(EntityDecl::new("A").composed_by("bs", "B"))
            .with(EntityDecl::new("B").composed_by("as_", "A"))
            .initialize()
            .unwrap_err();
        assert!(matches!(err, SchemaError::Conflict(_)));
    }

    #[test]
    fn unique_together_must_name_fields() {
        let err = SchemaBuilder::new()
            .with(EntityDecl::new("A").field(Field::string("x")).unique_together(&["x", "y"]))
            .initialize()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UnknownField {
                entity: "A".into(),
                field: "y".into()
            }
        );
    }
}
