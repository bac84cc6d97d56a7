//! Difference records.
//!
//! A [`Difference`] is one detected mismatch (or one unmatched row) for a
//! single primary key. It is immutable once built; the sink persists it as a
//! single report line.

use crate::{Error, FieldPath, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Field path reported for [`DifferenceKind::MissingRow`].
pub const MISSING_ROW_PATH: &str = "ALL_FIELDS";

/// Which input stream a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    One,
    Two,
}

impl Side {
    /// The other side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Side::One => Side::Two,
            Side::Two => Side::One,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::One => f.write_str("side1"),
            Side::Two => f.write_str("side2"),
        }
    }
}

/// Kind of difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DifferenceKind {
    /// Both sides hold the key but a field differs.
    ValueMismatch,
    /// Only one side ever delivered the key.
    MissingRow,
}

impl DifferenceKind {
    /// Symbolic name as written to the report.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DifferenceKind::ValueMismatch => "VALUE_MISMATCH",
            DifferenceKind::MissingRow => "MISSING_ROW",
        }
    }
}

impl fmt::Display for DifferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifferenceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALUE_MISMATCH" => Ok(DifferenceKind::ValueMismatch),
            "MISSING_ROW" => Ok(DifferenceKind::MissingRow),
            other => Err(Error::InvalidDifferenceKind(other.to_string())),
        }
    }
}

/// One mismatch or missing-row event for a primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Difference {
    primary_key: String,
    field_path: String,
    value1: Value,
    value2: Value,
    kind: DifferenceKind,
}

impl Difference {
    /// A field whose values differ between the two sides.
    #[must_use]
    pub fn value_mismatch(
        primary_key: impl Into<String>,
        field_path: &FieldPath,
        value1: Value,
        value2: Value,
    ) -> Self {
        Self {
            primary_key: primary_key.into(),
            field_path: field_path.as_str().to_string(),
            value1,
            value2,
            kind: DifferenceKind::ValueMismatch,
        }
    }

    /// A record that only `side` delivered. The rendered record occupies that
    /// side's value slot; the other slot is absent.
    #[must_use]
    pub fn missing_row(primary_key: impl Into<String>, side: Side, rendered: impl Into<String>) -> Self {
        let present = Value::Str(rendered.into());
        let (value1, value2) = match side {
            Side::One => (present, Value::Absent),
            Side::Two => (Value::Absent, present),
        };
        Self {
            primary_key: primary_key.into(),
            field_path: MISSING_ROW_PATH.to_string(),
            value1,
            value2,
            kind: DifferenceKind::MissingRow,
        }
    }

    #[must_use]
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    #[must_use]
    pub fn field_path(&self) -> &str {
        &self.field_path
    }

    #[must_use]
    pub fn value1(&self) -> &Value {
        &self.value1
    }

    #[must_use]
    pub fn value2(&self) -> &Value {
        &self.value2
    }

    #[must_use]
    pub fn kind(&self) -> DifferenceKind {
        self.kind
    }
}

impl fmt::Display for Difference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] {:?} != {:?}",
            self.kind, self.primary_key, self.field_path, self.value1, self.value2
        )
    }
}
