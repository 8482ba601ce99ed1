//! Apply the resolved schema to the database: every CREATE TABLE, then FK and unique constraints.
//! There are no migrations; tables are created once and CREATE TABLE fails if one exists.

use crate::config::{Entity, Schema};
use crate::error::AppError;
use crate::sql::{create_constraints, create_statements, create_table, Dialect, SqlValue};
use crate::store::Database;
use std::collections::HashSet;

pub async fn create_tables(db: &Database, schema: &Schema) -> Result<(), AppError> {
    let statements = create_statements(db.dialect(), schema);
    for sql in &statements {
        db.execute(sql, &[]).await?;
    }
    tracing::info!(
        tables = schema.len(),
        statements = statements.len(),
        "schema applied"
    );
    Ok(())
}

/// Tables for the named entities only, constraints after all tables.
pub async fn create_tables_for(db: &Database, schema: &Schema, names: &[&str]) -> Result<(), AppError> {
    let entities: Vec<&Entity> = names
        .iter()
        .map(|n| schema.entity(n))
        .collect::<Result<_, _>>()?;
    for e in &entities {
        db.execute(&create_table(db.dialect(), e), &[]).await?;
    }
    for e in &entities {
        for sql in create_constraints(db.dialect(), e) {
            db.execute(&sql, &[]).await?;
        }
    }
    Ok(())
}

/// Entities whose table is not in the database yet.
pub async fn missing_tables<'s>(db: &Database, schema: &'s Schema) -> Result<Vec<&'s str>, AppError> {
    let sql = match db.dialect() {
        Dialect::Sqlite => "SELECT name FROM sqlite_master WHERE type = 'table'",
        Dialect::Postgres => {
            "SELECT table_name::text FROM information_schema.tables WHERE table_schema = current_schema()"
        }
        Dialect::MySql | Dialect::Generic => {
            "SELECT table_name FROM information_schema.tables WHERE table_schema = DATABASE()"
        }
    };
    let present: HashSet<String> = db
        .execute(sql, &[])
        .await?
        .rows
        .into_iter()
        .filter_map(|row| match row.into_iter().next() {
            Some(SqlValue::Text(name)) => Some(name.to_lowercase()),
            _ => None,
        })
        .collect();
    Ok(schema
        .entities()
        .iter()
        .filter(|e| !present.contains(&e.table_name))
        .map(|e| e.name.as_str())
        .collect())
}

/// Create what is missing: everything on a fresh database, nothing when all tables exist.
pub async fn ensure_tables(db: &Database, schema: &Schema) -> Result<usize, AppError> {
    let missing = missing_tables(db, schema).await?;
    if missing.len() == schema.len() {
        create_tables(db, schema).await?;
    } else if !missing.is_empty() {
        create_tables_for(db, schema, &missing).await?;
        tracing::info!(created = missing.len(), "missing tables created");
    }
    Ok(missing.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EntityDecl, Field, SchemaBuilder};
    use sqlx::sqlite::SqlitePoolOptions;

    fn schema() -> Schema {
        SchemaBuilder::new()
            .with(EntityDecl::new("Hotel").field(Field::string("name")).composed_by("rooms", "Room"))
            .with(EntityDecl::new("Room").field(Field::integer("number").weak_id()))
            .initialize()
            .unwrap()
    }

    #[tokio::test]
    async fn ensure_tables_is_repeatable() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = Database::sqlite(pool);
        let schema = schema();
        assert_eq!(missing_tables(&db, &schema).await.unwrap(), vec!["Hotel", "Room"]);
        assert_eq!(ensure_tables(&db, &schema).await.unwrap(), 2);
        assert_eq!(ensure_tables(&db, &schema).await.unwrap(), 0);
    }
}
