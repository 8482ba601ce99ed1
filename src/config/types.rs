//! Raw declaration types: what an application states about its entities, plus server config.

use crate::config::Field;
use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Relationship multiplicity on the related side.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Cardinality {
    /// `1`
    One,
    /// `0..1`
    ZeroOrOne,
    /// `1..*`
    OneOrMore,
    /// `0..*` or `*`
    ZeroOrMore,
}

impl Cardinality {
    /// Upper bound is 1: the FK columns on that side are unique.
    pub fn max_is_one(self) -> bool {
        matches!(self, Cardinality::One | Cardinality::ZeroOrOne)
    }

    pub fn min_is_zero(self) -> bool {
        matches!(self, Cardinality::ZeroOrOne | Cardinality::ZeroOrMore)
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Cardinality::ZeroOrMore
    }
}

impl FromStr for Cardinality {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => Ok(Cardinality::One),
            "0..1" => Ok(Cardinality::ZeroOrOne),
            "1..*" | "1..n" => Ok(Cardinality::OneOrMore),
            "0..*" | "0..n" | "*" => Ok(Cardinality::ZeroOrMore),
            other => Err(SchemaError::InvalidCardinality(other.to_string())),
        }
    }
}

impl TryFrom<String> for Cardinality {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Cardinality> for String {
    fn from(c: Cardinality) -> String {
        c.to_string()
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cardinality::One => "1",
            Cardinality::ZeroOrOne => "0..1",
            Cardinality::OneOrMore => "1..*",
            Cardinality::ZeroOrMore => "0..*",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Owning: the target is a weak entity identified through this one.
    ComposedBy,
    /// Non-owning reference: the target carries nullable FK columns to this one.
    Has,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationDecl {
    pub name: String,
    pub kind: RelationKind,
    pub target: String,
    #[serde(default)]
    pub cardinality: Cardinality,
}

/// One participant of an association entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssociationEnd {
    pub entity: String,
    #[serde(default)]
    pub cardinality: Cardinality,
}

/// An entity as declared, before resolution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityDecl {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub relations: Vec<RelationDecl>,
    /// Present for n-ary relation entities.
    #[serde(default)]
    pub association: Vec<AssociationEnd>,
    /// Unique-together field lists.
    #[serde(default)]
    pub uniques: Vec<Vec<String>>,
}

impl EntityDecl {
    pub fn new(name: impl Into<String>) -> Self {
        EntityDecl {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn composed_by(self, name: &str, target: &str) -> Self {
        self.relation(name, RelationKind::ComposedBy, target, Cardinality::ZeroOrMore)
    }

    pub fn has(self, name: &str, target: &str, cardinality: Cardinality) -> Self {
        self.relation(name, RelationKind::Has, target, cardinality)
    }

    pub fn relation(mut self, name: &str, kind: RelationKind, target: &str, cardinality: Cardinality) -> Self {
        self.relations.push(RelationDecl {
            name: name.to_string(),
            kind,
            target: target.to_string(),
            cardinality,
        });
        self
    }

    pub fn associates(mut self, entity: &str, cardinality: Cardinality) -> Self {
        self.association.push(AssociationEnd {
            entity: entity.to_string(),
            cardinality,
        });
        self
    }

    pub fn unique_together(mut self, fields: &[&str]) -> Self {
        self.uniques.push(fields.iter().map(|s| s.to_string()).collect());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub provider: String,
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Generated CRUD routes for one entity, e.g. `/hotels/[hotel_id]/rooms/[number]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrudMount {
    pub template: String,
    pub entity: String,
}

/// Server configuration file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub url_prefix: String,
    #[serde(default)]
    pub optimize: bool,
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    /// Path to a JSON array of entity declarations.
    pub schema: String,
    #[serde(default)]
    pub mounts: Vec<CrudMount>,
}

fn default_listen() -> String {
    "0.0.0.0:8080".into()
}

fn default_body_limit() -> usize {
    1024 * 1024
}
