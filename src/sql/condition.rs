//! Condition algebra: immutable predicate trees rendered to parameterized SQL.

use crate::sql::{Placeholders, SqlValue};
use std::fmt;

/// A table-qualified column reference.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub table: String,
    pub field: String,
}

impl Column {
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Column {
            table: table.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.field)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

/// Right-hand side: a bound value or another column.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Value(SqlValue),
    Column(Column),
}

impl From<Column> for Operand {
    fn from(c: Column) -> Self {
        Operand::Column(c)
    }
}

macro_rules! value_operand {
    ($($t:ty),*) => {
        $(impl From<$t> for Operand {
            fn from(v: $t) -> Self {
                Operand::Value(v.into())
            }
        })*
    };
}

value_operand!(SqlValue, i64, i32, f64, &str, String, chrono::NaiveDate, chrono::NaiveDateTime);

#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Compare { lhs: Column, op: CompareOp, rhs: Operand },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

pub fn compare(lhs: Column, op: CompareOp, rhs: impl Into<Operand>) -> Condition {
    Condition::Compare {
        lhs,
        op,
        rhs: rhs.into(),
    }
}

pub fn eq(lhs: Column, rhs: impl Into<Operand>) -> Condition {
    compare(lhs, CompareOp::Eq, rhs)
}

pub fn ne(lhs: Column, rhs: impl Into<Operand>) -> Condition {
    compare(lhs, CompareOp::Ne, rhs)
}

pub fn lt(lhs: Column, rhs: impl Into<Operand>) -> Condition {
    compare(lhs, CompareOp::Lt, rhs)
}

pub fn le(lhs: Column, rhs: impl Into<Operand>) -> Condition {
    compare(lhs, CompareOp::Le, rhs)
}

pub fn gt(lhs: Column, rhs: impl Into<Operand>) -> Condition {
    compare(lhs, CompareOp::Gt, rhs)
}

pub fn ge(lhs: Column, rhs: impl Into<Operand>) -> Condition {
    compare(lhs, CompareOp::Ge, rhs)
}

pub fn and(l: Condition, r: Condition) -> Condition {
    Condition::And(Box::new(l), Box::new(r))
}

pub fn or(l: Condition, r: Condition) -> Condition {
    Condition::Or(Box::new(l), Box::new(r))
}

impl Condition {
    pub fn and(self, other: Condition) -> Condition {
        and(self, other)
    }

    pub fn or(self, other: Condition) -> Condition {
        or(self, other)
    }

    /// AND of all conditions, left to right. `None` when empty.
    pub fn all(conds: impl IntoIterator<Item = Condition>) -> Option<Condition> {
        conds.into_iter().reduce(and)
    }

    /// Render into `sql`, appending bound values to `params` in left-to-right order.
    pub fn render(&self, placeholders: &mut Placeholders, sql: &mut String, params: &mut Vec<SqlValue>) {
        match self {
            Condition::Compare { lhs, op, rhs } => {
                sql.push_str(&format!("{} {} ", lhs, op.as_sql()));
                match rhs {
                    Operand::Value(v) => {
                        sql.push_str(&placeholders.next());
                        params.push(v.clone());
                    }
                    Operand::Column(c) => sql.push_str(&c.to_string()),
                }
            }
            Condition::And(l, r) | Condition::Or(l, r) => {
                let joiner = if matches!(self, Condition::And(..)) { " AND " } else { " OR " };
                sql.push_str("( ");
                l.render(placeholders, sql, params);
                sql.push_str(joiner);
                r.render(placeholders, sql, params);
                sql.push_str(" )");
            }
        }
    }

    pub fn to_sql(&self, placeholders: &mut Placeholders) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render(placeholders, &mut sql, &mut params);
        (sql, params)
    }
}
