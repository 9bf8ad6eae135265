//! Typed values stored in the host record.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// The types a host record value can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Real,
    Date,
    Bool,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Date => "date",
            Self::Bool => "bool",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" | "str" => Ok(Self::String),
            "integer" | "int" => Ok(Self::Integer),
            "real" | "float" => Ok(Self::Real),
            "date" => Ok(Self::Date),
            "bool" | "boolean" => Ok(Self::Bool),
            other => Err(format!(
                "Unknown value type '{other}'. Valid: string, integer, real, date, bool"
            )),
        }
    }
}

/// A single host record value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Real(f64),
    Date(DateTime<Utc>),
    Bool(bool),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Integer(_) => ValueKind::Integer,
            Self::Real(_) => ValueKind::Real,
            Self::Date(_) => ValueKind::Date,
            Self::Bool(_) => ValueKind::Bool,
        }
    }

    /// Parse `raw` as a value of the given kind.
    ///
    /// Dates accept RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
    pub fn parse(kind: ValueKind, raw: &str) -> Result<Self> {
        let invalid = |message: String| Error::InvalidValue {
            kind: kind.name(),
            value: raw.to_string(),
            message,
        };

        match kind {
            ValueKind::String => Ok(Self::String(raw.to_string())),
            ValueKind::Integer => raw
                .trim()
                .parse()
                .map(Self::Integer)
                .map_err(|e| invalid(format!("{e}"))),
            ValueKind::Real => raw
                .trim()
                .parse()
                .map(Self::Real)
                .map_err(|e| invalid(format!("{e}"))),
            ValueKind::Bool => match raw.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Self::Bool(true)),
                "false" | "no" | "0" => Ok(Self::Bool(false)),
                _ => Err(invalid("expected true/false".to_string())),
            },
            ValueKind::Date => parse_date(raw.trim())
                .map(Self::Date)
                .ok_or_else(|| invalid("expected RFC 3339 or YYYY-MM-DD".to_string())),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub(crate) fn to_plist(&self) -> plist::Value {
        match self {
            Self::String(s) => plist::Value::String(s.clone()),
            Self::Integer(i) => plist::Value::Integer((*i).into()),
            Self::Real(r) => plist::Value::Real(*r),
            Self::Date(d) => plist::Value::Date(plist::Date::from(SystemTime::from(*d))),
            Self::Bool(b) => plist::Value::Boolean(*b),
        }
    }

    /// `None` for plist types the host record doesn't model (arrays, data...).
    pub(crate) fn from_plist(value: &plist::Value) -> Option<Self> {
        match value {
            plist::Value::String(s) => Some(Self::String(s.clone())),
            plist::Value::Integer(i) => i.as_signed().map(Self::Integer),
            plist::Value::Real(r) => Some(Self::Real(*r)),
            plist::Value::Date(d) => Some(Self::Date(DateTime::<Utc>::from(SystemTime::from(*d)))),
            plist::Value::Boolean(b) => Some(Self::Bool(*b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Self::Date(d)
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
