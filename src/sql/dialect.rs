//! SQL dialects: placeholder syntax and per-kind column types.

use crate::config::{Field, FieldKind};
use crate::error::ConfigError;

const SMALLINT_MIN: i64 = -32_768;
const SMALLINT_MAX: i64 = 32_767;
const INTEGER_MIN: i64 = -2_147_483_648;
const INTEGER_MAX: i64 = 2_147_483_647;
const USMALLINT_MAX: i64 = 65_535;
const UINTEGER_MAX: i64 = 4_294_967_295;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Dialect {
    #[default]
    Generic,
    MySql,
    Postgres,
    Sqlite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `%s`
    Format,
    /// `?`
    Qmark,
    /// `$1`, `$2`, ...
    Numbered,
}

/// Hands out placeholders in parameter order.
#[derive(Debug)]
pub struct Placeholders {
    style: PlaceholderStyle,
    count: usize,
}

impl Placeholders {
    pub fn new(style: PlaceholderStyle) -> Self {
        Placeholders { style, count: 0 }
    }

    pub fn next(&mut self) -> String {
        self.count += 1;
        match self.style {
            PlaceholderStyle::Format => "%s".to_string(),
            PlaceholderStyle::Qmark => "?".to_string(),
            PlaceholderStyle::Numbered => format!("${}", self.count),
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl Dialect {
    /// Dialect for a config `database.provider`.
    pub fn from_provider(provider: &str) -> Result<Dialect, ConfigError> {
        match provider {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "mysql" => Ok(Dialect::MySql),
            "generic" => Ok(Dialect::Generic),
            other => Err(ConfigError::Validation(format!("unknown database provider '{}'", other))),
        }
    }

    pub fn placeholder_style(self) -> PlaceholderStyle {
        match self {
            Dialect::Generic | Dialect::MySql => PlaceholderStyle::Format,
            Dialect::Sqlite => PlaceholderStyle::Qmark,
            Dialect::Postgres => PlaceholderStyle::Numbered,
        }
    }

    pub fn placeholders(self) -> Placeholders {
        Placeholders::new(self.placeholder_style())
    }

    /// SQLite does not enforce foreign keys added after table creation.
    pub fn uses_triggers(self) -> bool {
        self == Dialect::Sqlite
    }

    /// Whether an auto-increment column inside a composite primary key gets a value from
    /// the database. SQLite only generates keys for a lone `INTEGER PRIMARY KEY`.
    pub fn generates_composite_keys(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::MySql)
    }

    /// Sort expression for insertion order, where the engine keeps one.
    pub fn insertion_order(self, table: &str) -> Option<String> {
        match self {
            Dialect::Sqlite => Some(format!("{}.rowid", table)),
            _ => None,
        }
    }

    pub fn column_type(self, kind: &FieldKind) -> String {
        match kind {
            FieldKind::Integer {
                min_value,
                max_value,
                auto_increment,
            } => self.integer_type(*min_value, *max_value, *auto_increment),
            FieldKind::String { length, fixed_length: true } => format!("CHAR({})", length),
            FieldKind::String { length, .. } => format!("VARCHAR({})", length),
            FieldKind::Float => "REAL".into(),
            FieldKind::Binary if self == Dialect::Postgres => "BYTEA".into(),
            FieldKind::Binary => "BLOB".into(),
            FieldKind::Date => "DATE".into(),
            FieldKind::DateTime if self == Dialect::Postgres => "TIMESTAMP".into(),
            FieldKind::DateTime => "DATETIME".into(),
            FieldKind::Numeric { precision, scale } => format!("NUMERIC({}, {})", precision, scale),
        }
    }

    fn integer_type(self, min: i64, max: i64, auto_increment: bool) -> String {
        if self == Dialect::Postgres {
            // no unsigned types: pick the signed type holding the whole range
            let serial = auto_increment;
            let ty = if min >= SMALLINT_MIN && max <= SMALLINT_MAX {
                if serial { "SMALLSERIAL" } else { "SMALLINT" }
            } else if min >= INTEGER_MIN && max <= INTEGER_MAX {
                if serial { "SERIAL" } else { "INTEGER" }
            } else if serial {
                "BIGSERIAL"
            } else {
                "BIGINT"
            };
            return ty.into();
        }
        let ty = if min < 0 {
            if min >= SMALLINT_MIN && max <= SMALLINT_MAX {
                "SMALLINT"
            } else if min >= INTEGER_MIN && max <= INTEGER_MAX {
                "INTEGER"
            } else {
                "BIGINT"
            }
        } else if max <= USMALLINT_MAX {
            "SMALLINT UNSIGNED"
        } else if max <= UINTEGER_MAX {
            "INTEGER UNSIGNED"
        } else {
            "BIGINT UNSIGNED"
        };
        ty.into()
    }

    /// `name TYPE NULL|NOT NULL`, plus ` AUTO_INCREMENT` on MySQL.
    pub fn column_definition(self, field: &Field) -> String {
        let null = if field.nullable { "NULL" } else { "NOT NULL" };
        let mut def = format!("{} {} {}", field.name, self.column_type(&field.kind), null);
        if self == Dialect::MySql && field.kind.is_auto_increment() {
            def.push_str(" AUTO_INCREMENT");
        }
        def
    }

    /// Select-list expression for a column. Postgres numerics come back as text.
    pub fn select_expr(self, table: &str, field: &Field) -> String {
        match (self, &field.kind) {
            (Dialect::Postgres, FieldKind::Numeric { .. }) => format!("{}.{}::text", table, field.name),
            _ => format!("{}.{}", table, field.name),
        }
    }
}
