//! Field model: typed column descriptors and per-kind value coercion.

use crate::sql::{SqlValue, DATETIME_FORMAT, DATE_FORMAT};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const INT_MIN: i64 = -2_147_483_648;
pub const INT_MAX: i64 = 2_147_483_647;

/// Column kind with its kind-specific constraints.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Integer {
        #[serde(default = "default_min")]
        min_value: i64,
        #[serde(default = "default_max")]
        max_value: i64,
        #[serde(default)]
        auto_increment: bool,
    },
    String {
        #[serde(default = "default_length")]
        length: u32,
        #[serde(default)]
        fixed_length: bool,
    },
    Float,
    Binary,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Numeric {
        #[serde(default = "default_precision")]
        precision: u8,
        #[serde(default = "default_scale")]
        scale: u8,
    },
}

fn default_min() -> i64 {
    INT_MIN
}

fn default_max() -> i64 {
    INT_MAX
}

fn default_length() -> u32 {
    255
}

fn default_precision() -> u8 {
    10
}

fn default_scale() -> u8 {
    3
}

fn default_true() -> bool {
    true
}

impl FieldKind {
    pub fn integer() -> Self {
        FieldKind::Integer {
            min_value: INT_MIN,
            max_value: INT_MAX,
            auto_increment: false,
        }
    }

    pub fn string() -> Self {
        FieldKind::String {
            length: default_length(),
            fixed_length: false,
        }
    }

    pub fn numeric() -> Self {
        FieldKind::Numeric {
            precision: default_precision(),
            scale: default_scale(),
        }
    }

    pub fn is_auto_increment(&self) -> bool {
        matches!(self, FieldKind::Integer { auto_increment: true, .. })
    }

    /// Same kind and constraints, minus auto increment. Used for FK columns.
    pub fn as_reference(&self) -> FieldKind {
        match self {
            FieldKind::Integer { min_value, max_value, .. } => FieldKind::Integer {
                min_value: *min_value,
                max_value: *max_value,
                auto_increment: false,
            },
            other => other.clone(),
        }
    }

    /// Normalize a raw driver cell into this kind's value shape.
    pub fn decode(&self, raw: SqlValue) -> SqlValue {
        match (self, raw) {
            (_, SqlValue::Null) => SqlValue::Null,
            (FieldKind::Float, SqlValue::Integer(n)) => SqlValue::Float(n as f64),
            (FieldKind::Date, SqlValue::Text(s)) => match NaiveDate::parse_from_str(&s, DATE_FORMAT) {
                Ok(d) => SqlValue::Date(d),
                Err(_) => SqlValue::Text(s),
            },
            (FieldKind::DateTime, SqlValue::Text(s)) => match parse_datetime(&s) {
                Some(d) => SqlValue::DateTime(d),
                None => SqlValue::Text(s),
            },
            (FieldKind::DateTime, SqlValue::Date(d)) => SqlValue::DateTime(d.and_time(chrono::NaiveTime::MIN)),
            (FieldKind::Numeric { .. }, SqlValue::Text(s)) => SqlValue::Numeric(s),
            (FieldKind::Numeric { .. }, SqlValue::Integer(n)) => SqlValue::Numeric(n.to_string()),
            (FieldKind::Numeric { .. }, SqlValue::Float(f)) => SqlValue::Numeric(f.to_string()),
            (FieldKind::Binary, SqlValue::Text(s)) => SqlValue::Blob(s.into_bytes()),
            (_, other) => other,
        }
    }

    /// Convert a JSON request value into this kind, enforcing its constraints.
    pub fn coerce(&self, v: &Value) -> Result<SqlValue, String> {
        if v.is_null() {
            return Ok(SqlValue::Null);
        }
        match self {
            FieldKind::Integer { min_value, max_value, .. } => {
                let n = match v {
                    Value::Number(n) => n.as_i64().ok_or_else(|| "must be an integer".to_string())?,
                    Value::String(s) => s.trim().parse::<i64>().map_err(|_| "must be an integer".to_string())?,
                    _ => return Err("must be an integer".into()),
                };
                if n < *min_value || n > *max_value {
                    return Err(format!("must be between {} and {}", min_value, max_value));
                }
                Ok(SqlValue::Integer(n))
            }
            FieldKind::String { length, .. } => {
                let s = match v {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    _ => return Err("must be a string".into()),
                };
                if s.chars().count() > *length as usize {
                    return Err(format!("must be at most {} characters", length));
                }
                Ok(SqlValue::Text(s))
            }
            FieldKind::Float => match v {
                Value::Number(n) => n.as_f64().map(SqlValue::Float).ok_or_else(|| "must be a number".into()),
                Value::String(s) => s.trim().parse().map(SqlValue::Float).map_err(|_| "must be a number".into()),
                _ => Err("must be a number".into()),
            },
            FieldKind::Binary => match v {
                Value::String(s) => Ok(SqlValue::Blob(s.clone().into_bytes())),
                Value::Array(items) => items
                    .iter()
                    .map(|x| x.as_u64().and_then(|b| u8::try_from(b).ok()))
                    .collect::<Option<Vec<u8>>>()
                    .map(SqlValue::Blob)
                    .ok_or_else(|| "must be an array of bytes".into()),
                _ => Err("must be a string or an array of bytes".into()),
            },
            FieldKind::Date => v
                .as_str()
                .and_then(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).ok())
                .map(SqlValue::Date)
                .ok_or_else(|| "must be a date (YYYY-MM-DD)".into()),
            FieldKind::DateTime => v
                .as_str()
                .and_then(parse_datetime)
                .map(SqlValue::DateTime)
                .ok_or_else(|| "must be a datetime (YYYY-MM-DD HH:MM:SS)".into()),
            FieldKind::Numeric { precision, scale } => {
                let s = match v {
                    Value::Number(n) => n.to_string(),
                    Value::String(s) => s.trim().to_string(),
                    _ => return Err("must be a decimal number".into()),
                };
                check_numeric(&s, *precision, *scale)?;
                Ok(SqlValue::Numeric(s))
            }
        }
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

fn check_numeric(s: &str, precision: u8, scale: u8) -> Result<(), String> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let well_formed = !int_part.is_empty()
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit());
    if !well_formed {
        return Err("must be a decimal number".into());
    }
    let int_digits = int_part.trim_start_matches('0').len();
    if frac_part.len() > scale as usize || int_digits > precision.saturating_sub(scale) as usize {
        return Err(format!("must fit NUMERIC({}, {})", precision, scale));
    }
    Ok(())
}

/// A column of an entity table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub weak_id: bool,
    #[serde(default = "default_true")]
    pub writable: bool,
    #[serde(default = "default_true")]
    pub readable: bool,
    /// Added by the resolver (generated ids, FK columns) rather than declared.
    #[serde(skip)]
    pub generated: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Field {
            name: name.into(),
            kind,
            nullable: false,
            unique: false,
            primary_key: false,
            weak_id: false,
            writable: true,
            readable: true,
            generated: false,
        }
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::integer())
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::string())
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Float)
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Binary)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::DateTime)
    }

    pub fn numeric(name: impl Into<String>, precision: u8, scale: u8) -> Self {
        Self::new(name, FieldKind::Numeric { precision, scale })
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn weak_id(mut self) -> Self {
        self.weak_id = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.readable = false;
        self
    }

    /// Integer range. No effect on other kinds.
    pub fn range(mut self, min: i64, max: i64) -> Self {
        if let FieldKind::Integer { min_value, max_value, .. } = &mut self.kind {
            *min_value = min;
            *max_value = max;
        }
        self
    }

    pub fn auto_increment(mut self) -> Self {
        if let FieldKind::Integer { auto_increment, .. } = &mut self.kind {
            *auto_increment = true;
        }
        self
    }

    pub fn length(mut self, n: u32) -> Self {
        if let FieldKind::String { length, .. } = &mut self.kind {
            *length = n;
        }
        self
    }

    pub fn fixed_length(mut self) -> Self {
        if let FieldKind::String { fixed_length, .. } = &mut self.kind {
            *fixed_length = true;
        }
        self
    }

    /// Generated column copying a referenced identity field.
    pub(crate) fn reference(name: String, kind: &FieldKind, nullable: bool) -> Self {
        let mut f = Field::new(name, kind.as_reference());
        f.nullable = nullable;
        f.generated = true;
        f
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_coercion_enforces_range() {
        let kind = Field::integer("n").range(0, 10).kind;
        assert_eq!(kind.coerce(&json!(4)), Ok(SqlValue::Integer(4)));
        assert_eq!(kind.coerce(&json!("7")), Ok(SqlValue::Integer(7)));
        assert!(kind.coerce(&json!(11)).is_err());
        assert!(kind.coerce(&json!("x")).is_err());
    }

    #[test]
    fn numeric_coercion_checks_precision_and_scale() {
        let kind = FieldKind::Numeric { precision: 5, scale: 2 };
        assert_eq!(kind.coerce(&json!("123.45")), Ok(SqlValue::Numeric("123.45".into())));
        assert!(kind.coerce(&json!("1234.5")).is_err());
        assert!(kind.coerce(&json!("1.234")).is_err());
        assert!(kind.coerce(&json!("1e3")).is_err());
    }

    #[test]
    fn decode_parses_text_dates() {
        let d = FieldKind::Date.decode(SqlValue::Text("2020-01-31".into()));
        assert_eq!(d, SqlValue::Date(NaiveDate::from_ymd_opt(2020, 1, 31).unwrap()));
        assert_eq!(FieldKind::Date.decode(SqlValue::Null), SqlValue::Null);
    }

    #[test]
    fn field_deserializes_with_defaults() {
        let f: Field = serde_json::from_value(json!({"name": "title", "type": "string", "length": 40})).unwrap();
        assert_eq!(f.kind, FieldKind::String { length: 40, fixed_length: false });
        assert!(f.writable && f.readable && !f.nullable);
        let g: Field = serde_json::from_value(json!({"name": "n", "type": "integer", "weak_id": true})).unwrap();
        assert_eq!(g.kind, FieldKind::integer());
        assert!(g.weak_id);
    }
}
