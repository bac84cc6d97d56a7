//! File-based reconciliation.
//!
//! Reads two JSON-lines files (one record per line), correlates them by
//! primary key in batch mode and writes `<schema>_diff_report.csv` to the
//! output directory.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use recon_compare::{PolicyConfig, Rounding, SchemaPolicy};
use recon_correlate::{
    CorrelationConfig, Pull, ReconcileReport, Reconciler, RecordSource, SourceError, SourceResult,
};
use recon_sink::{DiffSink, SinkConfig};
use recon_types::Record;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

#[derive(Parser, Debug)]
#[command(name = "recon")]
#[command(about = "Reconcile two JSON-lines record files field by field")]
pub struct Cli {
    /// Side-1 records, one JSON object per line
    #[arg(long)]
    pub left: PathBuf,

    /// Side-2 records, one JSON object per line
    #[arg(long)]
    pub right: PathBuf,

    /// Schema name; also names the report file
    #[arg(short, long)]
    pub schema: String,

    /// Field holding the primary key (dotted paths allowed)
    #[arg(short, long, default_value = "id")]
    pub key: String,

    /// Field path to leave out of the comparison (repeatable)
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,

    /// Fractional digits used to compare numbers
    #[arg(long, default_value_t = recon_compare::DEFAULT_PRECISION)]
    pub precision: u32,

    /// Per-path precision as PATH=DIGITS (repeatable)
    #[arg(long = "field-precision", value_parser = parse_field_precision)]
    pub field_precision: Vec<(String, u32)>,

    /// Truncate numbers to the precision instead of rounding half-up
    #[arg(long)]
    pub truncate: bool,

    /// End the run after this long without new records
    #[arg(long, default_value_t = 60_000)]
    pub idle_timeout_ms: u64,

    /// Also report records only present on side 2
    #[arg(long)]
    pub flush_side2: bool,

    /// Directory for the report
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            key_field: self.key.clone(),
            fields_to_ignore: self.ignore.clone(),
            default_precision: self.precision,
            rounding: if self.truncate {
                Rounding::Truncate
            } else {
                Rounding::HalfUp
            },
            precision: self.field_precision.iter().cloned().collect(),
        }
    }

    pub fn correlation_config(&self) -> CorrelationConfig {
        CorrelationConfig::batch(self.idle_timeout_ms).with_flush_side2(self.flush_side2)
    }

    pub fn sink_config(&self) -> SinkConfig {
        SinkConfig::new(&self.output)
    }
}

/// Parses `PATH=DIGITS`.
pub fn parse_field_precision(raw: &str) -> Result<(String, u32), String> {
    let (path, digits) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=DIGITS, got {raw:?}"))?;
    if path.is_empty() {
        return Err(format!("empty field path in {raw:?}"));
    }
    let digits = digits
        .trim()
        .parse()
        .map_err(|e| format!("invalid digits in {raw:?}: {e}"))?;
    Ok((path.trim().to_string(), digits))
}

/// A [`RecordSource`] over a JSON-lines file. Blank lines are skipped; end
/// of file closes the stream; a line that is not a JSON object is a
/// [`SourceError::Decode`].
pub struct JsonLinesSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl JsonLinesSource {
    pub async fn open(path: impl AsRef<Path>) -> SourceResult<Self> {
        let file = File::open(path.as_ref()).await?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

#[async_trait]
impl RecordSource for JsonLinesSource {
    async fn try_pull(&mut self) -> SourceResult<Pull> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record = Record::from_json_str(&line).map_err(|source| SourceError::Decode {
                line: self.line_no,
                source,
            })?;
            return Ok(Pull::Record(record));
        }
        Ok(Pull::Closed)
    }
}

/// Reconciles one pair of files as one schema and drains the sink.
pub async fn reconcile_files(cli: &Cli) -> Result<ReconcileReport> {
    let left = JsonLinesSource::open(&cli.left)
        .await
        .with_context(|| format!("opening {}", cli.left.display()))?;
    let right = JsonLinesSource::open(&cli.right)
        .await
        .with_context(|| format!("opening {}", cli.right.display()))?;

    let sink = DiffSink::new(cli.sink_config()).context("starting difference sink")?;
    let mut reconciler = Reconciler::new(sink);
    reconciler
        .spawn(
            cli.schema.clone(),
            SchemaPolicy::from_config(&cli.policy_config()),
            cli.correlation_config(),
            left,
            right,
        )
        .context("starting correlator")?;
    Ok(reconciler.finish().await)
}
