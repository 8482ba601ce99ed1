//! Select builder over one entity with explicit join chains, and a cursor over its rows.

use crate::config::{Entity, Field, Schema};
use crate::error::{AppError, SchemaError};
use crate::service::Record;
use crate::sql::{eq, Column, Condition, Dialect, QueryBuf, SqlValue};
use crate::store::Database;

/// Rendered SELECT: SQL, bound values, and the bare names of the selected fields.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectSql {
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub field_names: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
enum OrderKey {
    Field(String),
    Insertion,
}

#[derive(Clone, Debug)]
pub struct Query<'s> {
    schema: &'s Schema,
    entity: &'s Entity,
    projection: Vec<String>,
    joins: Vec<(&'s Entity, Condition)>,
    filter: Option<Condition>,
    order_by: Vec<OrderKey>,
}

impl<'s> Query<'s> {
    pub fn new(schema: &'s Schema, entity: &str) -> Result<Self, SchemaError> {
        Ok(Query {
            schema,
            entity: schema.entity(entity)?,
            projection: Vec::new(),
            joins: Vec::new(),
            filter: None,
            order_by: Vec::new(),
        })
    }

    pub fn entity(&self) -> &'s Entity {
        self.entity
    }

    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Column of the queried entity, for building conditions.
    pub fn col(&self, field: &str) -> Column {
        self.entity.column(field)
    }

    /// Restrict the selected fields. Empty means all fields.
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.projection = fields.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn join(mut self, entity: &str, on: Condition) -> Result<Self, SchemaError> {
        let joined = self.schema.entity(entity)?;
        self.joins.push((joined, on));
        Ok(self)
    }

    /// Repeated calls AND together.
    pub fn filter(mut self, cond: Condition) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(prev) => prev.and(cond),
            None => cond,
        });
        self
    }

    pub fn filter_eq(self, field: &str, value: impl Into<SqlValue>) -> Self {
        let cond = eq(self.col(field), value.into());
        self.filter(cond)
    }

    pub fn order_by(mut self, fields: &[&str]) -> Self {
        self.order_by = fields.iter().map(|s| OrderKey::Field(s.to_string())).collect();
        self
    }

    /// Rows in the order they were stored. Falls back to identity order where the
    /// engine keeps no insertion order.
    pub fn order_by_insertion(mut self) -> Self {
        self.order_by = vec![OrderKey::Insertion];
        self
    }

    fn order_exprs(&self, dialect: Dialect) -> Result<Vec<String>, SchemaError> {
        let table = &self.entity.table_name;
        let mut out = Vec::new();
        for key in &self.order_by {
            match key {
                OrderKey::Field(name) => {
                    if !self.entity.has_field(name) {
                        return Err(self.entity.unknown_field(name));
                    }
                    out.push(format!("{}.{}", table, name));
                }
                OrderKey::Insertion => match dialect.insertion_order(table) {
                    Some(expr) => out.push(expr),
                    None => out.extend(self.entity.identity.iter().map(|n| format!("{}.{}", table, n))),
                },
            }
        }
        Ok(out)
    }

    fn selected_fields(&self) -> Result<Vec<&'s Field>, SchemaError> {
        if self.projection.is_empty() {
            return Ok(self.entity.fields.iter().collect());
        }
        self.projection
            .iter()
            .map(|name| self.entity.field(name).ok_or_else(|| self.entity.unknown_field(name)))
            .collect()
    }

    pub fn to_sql(&self, dialect: Dialect) -> Result<SelectSql, SchemaError> {
        let fields = self.selected_fields()?;
        let table = &self.entity.table_name;
        let mut q = QueryBuf::new(dialect);

        let mut columns: Vec<String> = fields.iter().map(|f| dialect.select_expr(table, f)).collect();
        let order = self.order_exprs(dialect)?;
        // DISTINCT needs every sort key in the select list; extra ones trail the projection
        for expr in &order {
            if !columns.contains(expr) {
                columns.push(expr.clone());
            }
        }
        q.push_str(&format!("SELECT DISTINCT {} FROM {}", columns.join(", "), table));
        for (joined, on) in &self.joins {
            q.push_str(&format!(" INNER JOIN {} ON ", joined.table_name));
            q.push_condition(on);
        }
        if let Some(cond) = &self.filter {
            q.push_str(" WHERE ");
            q.push_condition(cond);
        }
        if !order.is_empty() {
            q.push_str(&format!(" ORDER BY {}", order.join(", ")));
        }

        Ok(SelectSql {
            sql: q.sql,
            params: q.params,
            field_names: fields.iter().map(|f| f.name.clone()).collect(),
        })
    }

    pub async fn fetch(&self, db: &Database) -> Result<Cursor<'s>, AppError> {
        let select = self.to_sql(db.dialect())?;
        let rs = db.execute(&select.sql, &select.params).await?;
        Ok(Cursor {
            entity: self.entity,
            field_names: select.field_names,
            rows: rs.rows.into_iter(),
        })
    }

    pub async fn all(&self, db: &Database) -> Result<Vec<Record>, AppError> {
        Ok(self.fetch(db).await?.collect())
    }

    pub async fn first(&self, db: &Database) -> Result<Option<Record>, AppError> {
        Ok(self.fetch(db).await?.next())
    }
}

/// Single pass over fetched rows. Each `next` decodes one row into a `Record`;
/// fields outside the projection stay `NotSelected`.
#[derive(Debug)]
pub struct Cursor<'s> {
    entity: &'s Entity,
    field_names: Vec<String>,
    rows: std::vec::IntoIter<Vec<SqlValue>>,
}

impl<'s> Cursor<'s> {
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }
}

impl Iterator for Cursor<'_> {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let row = self.rows.next()?;
        Some(Record::from_row(self.entity, &self.field_names, row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
