//! Per-schema comparison policy.
//!
//! A [`SchemaPolicy`] is a plain value bundling the four capabilities a
//! schema needs: primary-key extraction, the ignore list, decimal precision
//! per path, and optional custom predicates per path. It is cheap to clone
//! (closures are shared) and is handed explicitly to the comparator and the
//! correlator.

use crate::numeric::Rounding;
use recon_types::{Record, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Fractional digits used when a path has no explicit precision.
pub const DEFAULT_PRECISION: u32 = 5;

/// Extracts the primary key from a record.
pub type PrimaryKeyFn = Arc<dyn Fn(&Record) -> Option<String> + Send + Sync>;

/// Maps a field path to a precision, or `None` to fall through.
pub type PrecisionFn = Arc<dyn Fn(&str) -> Option<u32> + Send + Sync>;

/// Custom equality for one field path. Returns true when the values match.
pub type FieldPredicate = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Comparison policy for one schema.
#[derive(Clone)]
pub struct SchemaPolicy {
    primary_key: PrimaryKeyFn,
    fields_to_ignore: HashSet<String>,
    default_precision: u32,
    precision_overrides: HashMap<String, u32>,
    precision_fn: Option<PrecisionFn>,
    rounding: Rounding,
    predicates: HashMap<String, FieldPredicate>,
}

impl SchemaPolicy {
    /// Creates a policy with a custom primary-key extractor and defaults for
    /// everything else.
    pub fn new(primary_key: impl Fn(&Record) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            primary_key: Arc::new(primary_key),
            fields_to_ignore: HashSet::new(),
            default_precision: DEFAULT_PRECISION,
            precision_overrides: HashMap::new(),
            precision_fn: None,
            rounding: Rounding::default(),
            predicates: HashMap::new(),
        }
    }

    /// Creates a policy keyed by the scalar at `path` (dotted paths allowed).
    ///
    /// Absent values, empty strings and nested records yield no key.
    pub fn keyed_by(path: &str) -> Self {
        let path = path.to_string();
        Self::new(move |record| {
            let value = record.get_path(&path)?.as_scalar()?;
            match value {
                Value::Absent => None,
                Value::Str(s) if s.is_empty() => None,
                other => Some(other.to_string()),
            }
        })
    }

    /// Builds a policy from its serializable form.
    pub fn from_config(config: &PolicyConfig) -> Self {
        let mut policy = Self::keyed_by(&config.key_field)
            .with_default_precision(config.default_precision)
            .with_rounding(config.rounding)
            .ignore_all(config.fields_to_ignore.iter().cloned());
        for (path, digits) in &config.precision {
            policy = policy.with_precision(path.clone(), *digits);
        }
        policy
    }

    // ── Builders ─────────────────────────────────────────────────

    /// Excludes a path (and, for a nested record, its whole subtree).
    #[must_use]
    pub fn ignore(mut self, path: impl Into<String>) -> Self {
        self.fields_to_ignore.insert(path.into());
        self
    }

    /// Excludes several paths.
    #[must_use]
    pub fn ignore_all<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields_to_ignore.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Sets the precision used when nothing more specific applies.
    #[must_use]
    pub fn with_default_precision(mut self, digits: u32) -> Self {
        self.default_precision = digits;
        self
    }

    /// Sets the precision for one exact path.
    #[must_use]
    pub fn with_precision(mut self, path: impl Into<String>, digits: u32) -> Self {
        self.precision_overrides.insert(path.into(), digits);
        self
    }

    /// Sets a precision rule consulted for paths without an exact override,
    /// e.g. "every path ending in `price` uses 4 digits".
    #[must_use]
    pub fn with_precision_fn(
        mut self,
        rule: impl Fn(&str) -> Option<u32> + Send + Sync + 'static,
    ) -> Self {
        self.precision_fn = Some(Arc::new(rule));
        self
    }

    /// Sets how numbers are reduced to their precision.
    #[must_use]
    pub fn with_rounding(mut self, rounding: Rounding) -> Self {
        self.rounding = rounding;
        self
    }

    /// Registers a custom equality predicate for one exact path.
    #[must_use]
    pub fn with_predicate(
        mut self,
        path: impl Into<String>,
        predicate: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicates.insert(path.into(), Arc::new(predicate));
        self
    }

    // ── Capabilities ─────────────────────────────────────────────

    /// Extracts the primary key, if the record has one.
    pub fn primary_key_of(&self, record: &Record) -> Option<String> {
        (self.primary_key)(record)
    }

    pub fn fields_to_ignore(&self) -> &HashSet<String> {
        &self.fields_to_ignore
    }

    pub fn is_ignored(&self, path: &str) -> bool {
        self.fields_to_ignore.contains(path)
    }

    /// Precision for `path`: exact override, then the rule, then the default.
    pub fn decimal_precision(&self, path: &str) -> u32 {
        if let Some(digits) = self.precision_overrides.get(path) {
            return *digits;
        }
        self.precision_fn
            .as_ref()
            .and_then(|rule| rule(path))
            .unwrap_or(self.default_precision)
    }

    pub fn rounding(&self) -> Rounding {
        self.rounding
    }

    /// Custom predicate for `path`, or `None` when the built-in rules apply.
    pub fn custom_predicate(&self, path: &str) -> Option<&FieldPredicate> {
        self.predicates.get(path)
    }
}

impl fmt::Debug for SchemaPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ignored: Vec<&String> = self.fields_to_ignore.iter().collect();
        ignored.sort();
        let mut predicates: Vec<&String> = self.predicates.keys().collect();
        predicates.sort();
        f.debug_struct("SchemaPolicy")
            .field("fields_to_ignore", &ignored)
            .field("default_precision", &self.default_precision)
            .field("precision_overrides", &self.precision_overrides)
            .field("precision_fn", &self.precision_fn.as_ref().map(|_| "<fn>"))
            .field("rounding", &self.rounding)
            .field("predicates", &predicates)
            .finish_non_exhaustive()
    }
}

/// Serializable subset of a [`SchemaPolicy`]. Custom predicates and
/// precision rules are code-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Path of the scalar holding the primary key.
    pub key_field: String,
    pub fields_to_ignore: Vec<String>,
    pub default_precision: u32,
    pub rounding: Rounding,
    /// Exact per-path precision overrides.
    pub precision: BTreeMap<String, u32>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            key_field: "id".to_string(),
            fields_to_ignore: Vec::new(),
            default_precision: DEFAULT_PRECISION,
            rounding: Rounding::default(),
            precision: BTreeMap::new(),
        }
    }
}
