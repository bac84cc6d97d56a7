//! Record flattening.

use recon_types::{Field, FieldPath, Record, Value};
use std::collections::HashSet;

/// Leaf paths of a record with their values, in depth-first declaration order.
pub type FlatRecord = Vec<(FieldPath, Value)>;

/// Flattens a record: every scalar contributes one entry, nested records
/// contribute their children under the parent's path.
pub fn flatten(record: &Record) -> FlatRecord {
    flatten_excluding(record, &HashSet::new())
}

/// Like [`flatten`], but paths in `ignore` are skipped. An ignored nested
/// record is not descended into, so none of its descendants appear.
pub fn flatten_excluding(record: &Record, ignore: &HashSet<String>) -> FlatRecord {
    let mut out = Vec::new();
    walk(record, None, ignore, &mut out);
    out
}

fn walk(record: &Record, prefix: Option<&FieldPath>, ignore: &HashSet<String>, out: &mut FlatRecord) {
    for (name, field) in record.fields() {
        let path = FieldPath::join(prefix, name);
        if ignore.contains(path.as_str()) {
            continue;
        }
        match field {
            Field::Scalar(value) => out.push((path, value.clone())),
            Field::Nested(child) => walk(child, Some(&path), ignore, out),
        }
    }
}
