use crate::error::{CompareError, CompareResult};
use crate::flatten::flatten_excluding;
use crate::numeric;
use crate::policy::SchemaPolicy;
use recon_types::{Difference, FieldPath, Record, Value};
use std::collections::{HashMap, HashSet};
use tracing::trace;

/// Decides field-by-field equivalence of two same-keyed records.
#[derive(Debug, Clone)]
pub struct FieldComparator {
    policy: SchemaPolicy,
}

impl FieldComparator {
    pub fn new(policy: SchemaPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SchemaPolicy {
        &self.policy
    }

    /// Compares two records, deriving the primary key from each through the
    /// policy. Both must yield the same key.
    pub fn compare(&self, left: &Record, right: &Record) -> CompareResult<Vec<Difference>> {
        let left_key = self
            .policy
            .primary_key_of(left)
            .ok_or(CompareError::MissingPrimaryKey)?;
        let right_key = self
            .policy
            .primary_key_of(right)
            .ok_or(CompareError::MissingPrimaryKey)?;
        if left_key != right_key {
            return Err(CompareError::KeyMismatch {
                left: left_key,
                right: right_key,
            });
        }
        Ok(self.compare_keyed(&left_key, left, right))
    }

    /// Compares two records already known to share `key`.
    ///
    /// Paths are visited in left-record order, then right-only paths in
    /// right-record order. A path missing on one side compares against
    /// [`Value::Absent`].
    pub fn compare_keyed(&self, key: &str, left: &Record, right: &Record) -> Vec<Difference> {
        let ignore = self.policy.fields_to_ignore();
        let left_flat = flatten_excluding(left, ignore);
        let right_flat = flatten_excluding(right, ignore);

        let right_index: HashMap<&str, &Value> = right_flat
            .iter()
            .map(|(path, value)| (path.as_str(), value))
            .collect();
        let mut visited: HashSet<&str> = HashSet::with_capacity(left_flat.len());
        let absent = Value::Absent;
        let mut diffs = Vec::new();

        for (path, left_value) in &left_flat {
            visited.insert(path.as_str());
            let right_value = right_index.get(path.as_str()).copied().unwrap_or(&absent);
            self.check(key, path, left_value, right_value, &mut diffs);
        }
        for (path, right_value) in &right_flat {
            if !visited.contains(path.as_str()) {
                self.check(key, path, &absent, right_value, &mut diffs);
            }
        }
        diffs
    }

    /// Applies the equality rule for `path`: custom predicate, then numeric
    /// rounding, then exact equality.
    pub fn values_match(&self, path: &str, left: &Value, right: &Value) -> bool {
        if let Some(predicate) = self.policy.custom_predicate(path) {
            return predicate(left, right);
        }
        if left.is_numeric() && right.is_numeric() {
            return numeric::numbers_equal(
                left,
                right,
                self.policy.decimal_precision(path),
                self.policy.rounding(),
            );
        }
        left == right
    }

    fn check(
        &self,
        key: &str,
        path: &FieldPath,
        left: &Value,
        right: &Value,
        diffs: &mut Vec<Difference>,
    ) {
        if !self.values_match(path.as_str(), left, right) {
            trace!(
                key,
                path = %path,
                left = left.type_name(),
                right = right.type_name(),
                "field mismatch"
            );
            diffs.push(Difference::value_mismatch(key, path, left.clone(), right.clone()));
        }
    }
}
