//! Parameterized DML. Identifiers come from the resolved schema only; values are always bound.

use crate::sql::{Condition, Dialect, Placeholders, SqlValue};

/// SQL text plus its bound values, in placeholder order.
#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<SqlValue>,
    placeholders: Placeholders,
}

impl QueryBuf {
    pub fn new(dialect: Dialect) -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
            placeholders: dialect.placeholders(),
        }
    }

    /// Bind a value and return its placeholder.
    pub fn push_param(&mut self, v: SqlValue) -> String {
        self.params.push(v);
        self.placeholders.next()
    }

    pub fn push_condition(&mut self, cond: &Condition) {
        cond.render(&mut self.placeholders, &mut self.sql, &mut self.params);
    }

    pub fn push_str(&mut self, s: &str) {
        self.sql.push_str(s);
    }
}

fn placeholder_list(dialect: Dialect, n: usize) -> Vec<String> {
    let mut p = dialect.placeholders();
    (0..n).map(|_| p.next()).collect()
}

fn where_ids(ids: &[&str], p: &mut Placeholders) -> String {
    ids.iter()
        .map(|id| format!("{} = {}", id, p.next()))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub fn insert(dialect: Dialect, table: &str, fields: &[&str]) -> String {
    if fields.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", table);
    }
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        fields.join(", "),
        placeholder_list(dialect, fields.len()).join(", ")
    )
}

/// INSERT that reports the generated key. Only Postgres needs `RETURNING`.
pub fn insert_returning(dialect: Dialect, table: &str, fields: &[&str], key: &str) -> String {
    let sql = insert(dialect, table, fields);
    if dialect == Dialect::Postgres {
        format!("{} RETURNING {}", sql, key)
    } else {
        sql
    }
}

/// Parameters: the SET values, then the identity values.
pub fn update(dialect: Dialect, table: &str, fields: &[&str], ids: &[&str]) -> String {
    let mut p = dialect.placeholders();
    let sets = fields
        .iter()
        .map(|f| format!("{} = {}", f, p.next()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE {} SET {} WHERE {}", table, sets, where_ids(ids, &mut p))
}

pub fn delete(dialect: Dialect, table: &str, ids: &[&str]) -> String {
    let mut p = dialect.placeholders();
    format!("DELETE FROM {} WHERE {}", table, where_ids(ids, &mut p))
}

/// Next free value of `column` among rows matching `scope`, starting at 1.
pub fn next_value(dialect: Dialect, table: &str, column: &str, scope: &[&str]) -> String {
    let mut sql = format!("SELECT COALESCE(MAX({}), 0) + 1 FROM {}", column, table);
    if !scope.is_empty() {
        let mut p = dialect.placeholders();
        sql.push_str(" WHERE ");
        sql.push_str(&where_ids(scope, &mut p));
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{eq, Column};
    use pretty_assertions::assert_eq;

    #[test]
    fn insert_per_dialect() {
        assert_eq!(insert(Dialect::Sqlite, "hotel", &["name", "address"]), "INSERT INTO hotel (name, address) VALUES (?, ?)");
        assert_eq!(insert(Dialect::MySql, "hotel", &["name"]), "INSERT INTO hotel (name) VALUES (%s)");
        assert_eq!(
            insert_returning(Dialect::Postgres, "hotel", &["name", "address"], "id"),
            "INSERT INTO hotel (name, address) VALUES ($1, $2) RETURNING id"
        );
    }

    #[test]
    fn update_numbers_sets_before_ids() {
        assert_eq!(
            update(Dialect::Postgres, "room", &["bed_count"], &["number", "hotel_id"]),
            "UPDATE room SET bed_count = $1 WHERE number = $2 AND hotel_id = $3"
        );
    }

    #[test]
    fn delete_and_next_value() {
        assert_eq!(delete(Dialect::Sqlite, "hotel", &["id"]), "DELETE FROM hotel WHERE id = ?");
        assert_eq!(
            next_value(Dialect::Sqlite, "room", "number", &["hotel_id"]),
            "SELECT COALESCE(MAX(number), 0) + 1 FROM room WHERE hotel_id = ?"
        );
    }

    #[test]
    fn query_buf_shares_numbering() {
        let mut q = QueryBuf::new(Dialect::Postgres);
        let first = q.push_param(SqlValue::Integer(1));
        q.push_str(&format!("SELECT * FROM t WHERE t.a = {} AND ", first));
        q.push_condition(&eq(Column::new("t", "b"), 2));
        assert_eq!(q.sql, "SELECT * FROM t WHERE t.a = $1 AND t.b = $2");
        assert_eq!(q.params, vec![SqlValue::Integer(1), SqlValue::Integer(2)]);
    }
}
