//! Dynamic SQL values: bound as statement parameters and decoded from result rows.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::sqlite::{Sqlite, SqliteTypeInfo};
use sqlx::{Database, Type};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One cell or parameter. `Null` is SQL NULL; "not selected" lives in `service::Slot`.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Decimal kept in its textual form so no precision is lost.
    Numeric(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Untyped conversion from JSON. Field-aware coercion lives in `FieldKind::coerce`.
    pub fn from_json(v: &Value) -> SqlValue {
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Integer(i)
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => SqlValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => SqlValue::Text(v.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(n) => Value::Number((*n).into()),
            SqlValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) | SqlValue::Numeric(s) => Value::String(s.clone()),
            SqlValue::Blob(b) => Value::Array(b.iter().map(|x| Value::Number((*x).into())).collect()),
            SqlValue::Date(d) => Value::String(d.format(DATE_FORMAT).to_string()),
            SqlValue::DateTime(d) => Value::String(d.format(DATETIME_FORMAT).to_string()),
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
            other => match other.to_json() {
                Value::String(s) => f.write_str(&s),
                v => write!(f, "{}", v),
            },
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v.into())
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl<'q> Encode<'q, Postgres> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            SqlValue::Null => <Option<i64> as Encode<Postgres>>::encode_by_ref(&None, buf),
            SqlValue::Integer(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            SqlValue::Float(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf),
            SqlValue::Text(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf),
            SqlValue::Blob(b) => <Vec<u8> as Encode<Postgres>>::encode_by_ref(b, buf),
            SqlValue::Date(d) => <NaiveDate as Encode<Postgres>>::encode_by_ref(d, buf),
            SqlValue::DateTime(d) => <NaiveDateTime as Encode<Postgres>>::encode_by_ref(d, buf),
            SqlValue::Numeric(s) => {
                let d: Decimal = s.parse()?;
                <Decimal as Encode<Postgres>>::encode_by_ref(&d, buf)
            }
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            // unspecified: the server infers the parameter type from context
            SqlValue::Null => PgTypeInfo::with_oid(Oid(0)),
            SqlValue::Integer(_) => <i64 as Type<Postgres>>::type_info(),
            SqlValue::Float(_) => <f64 as Type<Postgres>>::type_info(),
            SqlValue::Numeric(_) => <Decimal as Type<Postgres>>::type_info(),
            SqlValue::Text(_) => <String as Type<Postgres>>::type_info(),
            SqlValue::Blob(_) => <Vec<u8> as Type<Postgres>>::type_info(),
            SqlValue::Date(_) => <NaiveDate as Type<Postgres>>::type_info(),
            SqlValue::DateTime(_) => <NaiveDateTime as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for SqlValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'q> Encode<'q, Sqlite> for SqlValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Sqlite as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            SqlValue::Null => <Option<i64> as Encode<Sqlite>>::encode_by_ref(&None, buf),
            SqlValue::Integer(n) => <i64 as Encode<Sqlite>>::encode_by_ref(n, buf),
            SqlValue::Float(n) => <f64 as Encode<Sqlite>>::encode_by_ref(n, buf),
            SqlValue::Text(s) | SqlValue::Numeric(s) => <String as Encode<Sqlite>>::encode_by_ref(s, buf),
            SqlValue::Blob(b) => <Vec<u8> as Encode<Sqlite>>::encode_by_ref(b, buf),
            SqlValue::Date(d) => {
                let s = d.format(DATE_FORMAT).to_string();
                <String as Encode<Sqlite>>::encode_by_ref(&s, buf)
            }
            SqlValue::DateTime(d) => {
                let s = d.format(DATETIME_FORMAT).to_string();
                <String as Encode<Sqlite>>::encode_by_ref(&s, buf)
            }
        }
    }
}

impl Type<Sqlite> for SqlValue {
    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }

    fn compatible(_ty: &SqliteTypeInfo) -> bool {
        true
    }
}
