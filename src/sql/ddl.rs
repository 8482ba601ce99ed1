//! DDL generation: one CREATE TABLE per entity, then FK and unique constraints.

use crate::config::{Entity, ForeignKey, Schema};
use crate::sql::Dialect;

pub fn create_table(dialect: Dialect, entity: &Entity) -> String {
    let rowid = rowid_key(dialect, entity);
    let mut defs: Vec<String> = entity
        .fields
        .iter()
        .map(|f| match rowid {
            Some(key) if key == f.name => format!("{} INTEGER NOT NULL", f.name),
            _ => dialect.column_definition(f),
        })
        .collect();
    if !entity.identity.is_empty() {
        defs.push(format!("PRIMARY KEY ({})", entity.identity.join(", ")));
    }
    format!("CREATE TABLE {}({});", entity.table_name, defs.join(", "))
}

/// A lone auto-increment key on SQLite. It has to be declared exactly `INTEGER` to alias
/// the rowid, whatever its range.
fn rowid_key(dialect: Dialect, entity: &Entity) -> Option<&str> {
    if dialect != Dialect::Sqlite {
        return None;
    }
    match entity.identity.as_slice() {
        [only] => entity
            .field(only)
            .filter(|f| f.kind.is_auto_increment())
            .map(|f| f.name.as_str()),
        _ => None,
    }
}

/// FK and unique statements for one entity. SQLite gets triggers and unique indexes.
pub fn create_constraints(dialect: Dialect, entity: &Entity) -> Vec<String> {
    let mut out = Vec::new();
    for fk in &entity.foreign_keys {
        if dialect.uses_triggers() {
            out.extend(fk_triggers(&entity.table_name, fk));
        } else {
            out.push(format!(
                "ALTER TABLE {} ADD FOREIGN KEY ({}) REFERENCES {}({});",
                entity.table_name,
                fk.columns.join(", "),
                fk.referenced_table,
                fk.referenced_columns.join(", ")
            ));
        }
    }
    for cols in &entity.uniques {
        if dialect.uses_triggers() {
            out.push(format!(
                "CREATE UNIQUE INDEX idx_{}_{} ON {}({});",
                entity.table_name,
                cols.join("_"),
                entity.table_name,
                cols.join(", ")
            ));
        } else {
            out.push(format!("ALTER TABLE {} ADD UNIQUE ({});", entity.table_name, cols.join(", ")));
        }
    }
    out
}

/// Every CREATE TABLE first, then every constraint.
pub fn create_statements(dialect: Dialect, schema: &Schema) -> Vec<String> {
    let mut out: Vec<String> = schema.entities().iter().map(|e| create_table(dialect, e)).collect();
    for e in schema.entities() {
        out.extend(create_constraints(dialect, e));
    }
    out
}

fn fk_triggers(table: &str, fk: &ForeignKey) -> [String; 3] {
    let referenced = &fk.referenced_table;
    let name = format!("fk_{}_{}_to_{}", table, fk.columns.join("_"), referenced);
    let pairs: Vec<(&String, &String)> = fk.columns.iter().zip(&fk.referenced_columns).collect();

    let match_new = pairs
        .iter()
        .map(|(col, ref_col)| format!("{}.{} = NEW.{}", referenced, ref_col, col))
        .collect::<Vec<_>>()
        .join(" AND ");
    let match_old = pairs
        .iter()
        .map(|(col, ref_col)| format!("{}.{} = OLD.{}", table, col, ref_col))
        .collect::<Vec<_>>()
        .join(" AND ");
    let all_set = fk
        .columns
        .iter()
        .map(|c| format!("NEW.{} IS NOT NULL", c))
        .collect::<Vec<_>>()
        .join(" AND ");
    let columns = fk.columns.join(", ");

    let guard = |event: &str, verb: &str| {
        format!(
            "CREATE TRIGGER {name}_{suffix} BEFORE {event} ON {table} FOR EACH ROW \
             WHEN {all_set} AND NOT EXISTS (SELECT 1 FROM {referenced} WHERE {match_new}) \
             BEGIN SELECT RAISE(ROLLBACK, 'foreign key mismatch: value {verb} {table}({columns}) \
             has no matching row in {referenced}'); END;",
            suffix = &event[..1].to_lowercase(),
        )
    };

    [
        guard("INSERT", "inserted into"),
        guard("UPDATE", "updated in"),
        format!(
            "CREATE TRIGGER {name}_d BEFORE DELETE ON {referenced} FOR EACH ROW \
             WHEN EXISTS (SELECT 1 FROM {table} WHERE {match_old}) \
             BEGIN SELECT RAISE(ROLLBACK, 'foreign key mismatch: row deleted from {referenced} \
             is still referenced by {table}({columns})'); END;"
        ),
    ]
}
