//! Report line format.
//!
//! One report per schema, named `<schema>_diff_report.csv`, with the header
//! [`REPORT_HEADER`] followed by one line per difference:
//!
//! ```text
//! primaryKey,fieldPath,value1,value2,differenceType
//! A,price,10.00,10.001,VALUE_MISMATCH
//! ```
//!
//! Fields follow standard CSV quoting, so any CSV reader splits each row
//! into exactly five fields.

use crate::error::{SinkError, SinkResult};
use recon_types::Difference;

pub const REPORT_HEADER: &str = "primaryKey,fieldPath,value1,value2,differenceType";

/// File name of the report for `schema`. Characters outside
/// `[A-Za-z0-9._-]` are replaced with `_` so a schema name can never
/// address another directory.
pub fn report_file_name(schema: &str) -> String {
    let safe: String = schema
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}_diff_report.csv")
}

/// Renders a difference as one report line, without the trailing newline.
/// Fields holding a comma, a quote or a line break are quoted.
pub fn format_line(diff: &Difference) -> SinkResult<String> {
    let value1 = diff.value1().to_string();
    let value2 = diff.value2().to_string();
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([
        diff.primary_key(),
        diff.field_path(),
        value1.as_str(),
        value2.as_str(),
        diff.kind().as_str(),
    ])
    .map_err(|e| SinkError::Encode(e.to_string()))?;

    let bytes = wtr
        .into_inner()
        .map_err(|e| SinkError::Encode(e.to_string()))?;
    String::from_utf8(bytes)
        .map(|s| s.trim_end_matches(['\r', '\n']).to_string())
        .map_err(|e| SinkError::Encode(e.to_string()))
}
