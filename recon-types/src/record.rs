//! Generic structured records.
//!
//! A [`Record`] is a tagged tree: every named field is either a scalar
//! [`Value`] or a nested [`Record`]. Decoders for concrete wire formats build
//! records explicitly or go through the JSON adapter ([`Record::from_json`]),
//! so flattening and comparison never depend on runtime reflection.

use crate::{Error, Result, Value};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One field of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Field {
    Scalar(Value),
    Nested(Record),
}

impl Field {
    /// Returns the scalar value, if this is a leaf.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Field::Scalar(v) => Some(v),
            Field::Nested(_) => None,
        }
    }

    /// Returns the nested record, if this is a branch.
    #[must_use]
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Field::Scalar(_) => None,
            Field::Nested(r) => Some(r),
        }
    }
}

impl From<Record> for Field {
    fn from(r: Record) -> Self {
        Field::Nested(r)
    }
}

macro_rules! scalar_field_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Field {
                fn from(v: $t) -> Self {
                    Field::Scalar(Value::from(v))
                }
            }
        )*
    };
}

scalar_field_from!(Value, &str, String, bool, i32, i64, f64, Decimal);

/// A structured record with insertion-ordered named fields.
///
/// Field order is the declaration order and drives the enumeration order of
/// flattening and of emitted differences.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, Field)>,
}

impl Record {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Record::set`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, field: impl Into<Field>) -> Self {
        self.set(name, field);
        self
    }

    /// Sets a field. An existing field with the same name is replaced in
    /// place, keeping its position.
    pub fn set(&mut self, name: impl Into<String>, field: impl Into<Field>) {
        let name = name.into();
        let field = field.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name, field)),
        }
    }

    /// Removes a field, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<Field> {
        let idx = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.remove(idx).1)
    }

    /// Looks up a top-level field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Looks up a top-level scalar.
    #[must_use]
    pub fn scalar(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Field::as_scalar)
    }

    /// Resolves a dotted path such as `details.region`.
    #[must_use]
    pub fn get_path(&self, path: &str) -> Option<&Field> {
        let mut segments = path.split('.');
        let mut current = self.get(segments.next()?)?;
        for segment in segments {
            current = current.as_record()?.get(segment)?;
        }
        Some(current)
    }

    /// Iterates over fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Number of top-level fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // ── JSON adapter ─────────────────────────────────────────────

    /// Builds a record from a JSON object.
    ///
    /// `null` maps to [`Value::Absent`], integers that fit `i64` to `Int`,
    /// other numbers to `Decimal` with the scale they were written with
    /// (`10.00` stays `10.00`), and numbers no decimal can hold to `Float`.
    /// Objects become nested records and arrays nested records keyed by
    /// index. Object members keep the order the JSON map yields, which is
    /// sorted by key.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(Self::from_object(map)),
            other => Err(Error::NotAnObject(json_kind(other))),
        }
    }

    /// Parses a JSON document and builds a record from it.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let json: serde_json::Value = serde_json::from_str(s)?;
        Self::from_json(&json)
    }

    fn from_object(map: &serde_json::Map<String, serde_json::Value>) -> Self {
        let fields = map
            .iter()
            .map(|(name, v)| (name.clone(), field_from_json(v)))
            .collect();
        Self { fields }
    }

    /// Renders the record as JSON.
    ///
    /// `Decimal` leaves are rendered as numbers written with their scale.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .fields
            .iter()
            .map(|(name, field)| (name.clone(), field_to_json(field)))
            .collect();
        serde_json::Value::Object(map)
    }
}

fn field_from_json(json: &serde_json::Value) -> Field {
    match json {
        serde_json::Value::Null => Field::Scalar(Value::Absent),
        serde_json::Value::Bool(b) => Field::Scalar(Value::Bool(*b)),
        serde_json::Value::Number(n) => Field::Scalar(number_from_json(n)),
        serde_json::Value::String(s) => Field::Scalar(Value::Str(s.clone())),
        serde_json::Value::Array(items) => {
            let fields = items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), field_from_json(v)))
                .collect();
            Field::Nested(Record { fields })
        }
        serde_json::Value::Object(map) => Field::Nested(Record::from_object(map)),
    }
}

fn number_from_json(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        return Value::Int(i);
    }
    let text = n.to_string();
    match Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text)) {
        Ok(d) => Value::Decimal(d),
        Err(_) => n.as_f64().map_or(Value::Absent, Value::Float),
    }
}

fn field_to_json(field: &Field) -> serde_json::Value {
    match field {
        Field::Nested(r) => r.to_json(),
        Field::Scalar(v) => match v {
            Value::Absent => serde_json::Value::Null,
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(x) => serde_json::Number::from_f64(*x)
                .map_or_else(|| serde_json::Value::String(x.to_string()), serde_json::Value::Number),
            Value::Decimal(d) => {
                let text = d.to_string();
                serde_json::Number::from_str(&text)
                    .map_or(serde_json::Value::String(text), serde_json::Value::Number)
            }
        },
    }
}

fn json_kind(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
