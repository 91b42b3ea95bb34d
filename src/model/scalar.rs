use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Runtime kind of a [`Scalar`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Integer,
    Boolean,
    Decimal,
    DateTime,
}

impl ScalarKind {
    pub fn name(self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Integer => "integer",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Decimal => "decimal",
            ScalarKind::DateTime => "dateTime",
        }
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bare primitive value
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Boolean(bool),
    Decimal(Decimal),
    DateTime(DateTime<FixedOffset>),
}

impl Scalar {
    pub fn kind(&self) -> ScalarKind {
        match self {
            Scalar::String(_) => ScalarKind::String,
            Scalar::Integer(_) => ScalarKind::Integer,
            Scalar::Boolean(_) => ScalarKind::Boolean,
            Scalar::Decimal(_) => ScalarKind::Decimal,
            Scalar::DateTime(_) => ScalarKind::DateTime,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    /// Culture-invariant text form; round-trips through [`Scalar::convert`]
    pub fn to_invariant_string(&self) -> String {
        match self {
            Scalar::String(s) => s.clone(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Boolean(b) => b.to_string(),
            Scalar::Decimal(d) => d.to_string(),
            Scalar::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }

    /// Convert to another scalar kind, `None` when the pair is not convertible
    pub fn convert(&self, target: ScalarKind) -> Option<Scalar> {
        if self.kind() == target {
            return Some(self.clone());
        }

        match (self, target) {
            (_, ScalarKind::String) => Some(Scalar::String(self.to_invariant_string())),
            (Scalar::String(s), ScalarKind::Integer) => s.trim().parse().ok().map(Scalar::Integer),
            (Scalar::String(s), ScalarKind::Boolean) => parse_bool(s).map(Scalar::Boolean),
            (Scalar::String(s), ScalarKind::Decimal) => {
                Decimal::from_str(s.trim()).ok().map(Scalar::Decimal)
            }
            (Scalar::String(s), ScalarKind::DateTime) => parse_date_time(s).map(Scalar::DateTime),
            (Scalar::Integer(i), ScalarKind::Decimal) => Some(Scalar::Decimal(Decimal::from(*i))),
            (Scalar::Decimal(d), ScalarKind::Integer) if d.fract().is_zero() => {
                d.to_i64().map(Scalar::Integer)
            }
            _ => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_invariant_string())
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::String(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Integer(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

impl From<Decimal> for Scalar {
    fn from(value: Decimal) -> Self {
        Scalar::Decimal(value)
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Accepts RFC 3339, `YYYY-MM-DDThh:mm:ss` (read as UTC) and `YYYY-MM-DD`
pub fn parse_date_time(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt);
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).fixed_offset())
}
