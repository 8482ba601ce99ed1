//! Resolved entity model: declarations validated, identities derived, constraints synthesized.

use crate::config::{AssociationEnd, Field, RelationDecl};
use crate::error::SchemaError;
use crate::sql::Column;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForeignKey {
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
}

/// Navigation added for association entities.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkKind {
    /// On a participant: rows of the association referencing it.
    ToAssociation { association: String },
    /// On the association: the participant a row references.
    FromAssociation { participant: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub name: String,
    pub kind: LinkKind,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub name: String,
    pub table_name: String,
    pub fields: Vec<Field>,
    pub relations: Vec<RelationDecl>,
    pub association: Vec<AssociationEnd>,
    /// Entities this one's identity is borrowed from (parent of a weak entity, association participants).
    pub required_for_pk: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub uniques: Vec<Vec<String>>,
    /// Full ordered identity column list, materialized by the resolver.
    pub identity: Vec<String>,
    /// Composes at least one weak entity.
    pub composed: bool,
    pub links: Vec<Link>,
}

impl Entity {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    pub fn primary_key(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    pub fn weak_ids(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|f| f.weak_id)
    }

    pub fn is_weak(&self) -> bool {
        self.fields.iter().any(|f| f.weak_id)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Identity columns borrowed from other entities: identity minus own weak ids and primary key.
    pub fn inherited_identity(&self) -> Vec<String> {
        self.identity
            .iter()
            .filter(|name| !self.field(name).map(|f| f.weak_id || f.primary_key).unwrap_or(false))
            .cloned()
            .collect()
    }

    /// Table-qualified reference for conditions.
    pub fn column(&self, field: &str) -> Column {
        Column::new(self.table_name.as_str(), field)
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDecl> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.name == name)
    }

    pub(crate) fn unknown_field(&self, field: &str) -> SchemaError {
        SchemaError::UnknownField {
            entity: self.name.clone(),
            field: field.to_string(),
        }
    }
}

/// The frozen schema produced by `SchemaBuilder::initialize`.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    pub(crate) entities: Vec<Entity>,
    pub(crate) by_name: HashMap<String, usize>,
}

impl Schema {
    pub(crate) fn from_entities(entities: Vec<Entity>) -> Self {
        let by_name = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        Schema { entities, by_name }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Result<&Entity, SchemaError> {
        self.by_name
            .get(name)
            .map(|&i| &self.entities[i])
            .ok_or_else(|| SchemaError::Reference {
                context: "lookup".into(),
                name: name.to_string(),
            })
    }

    pub fn entity_by_table(&self, table: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.table_name == table)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
