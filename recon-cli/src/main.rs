//! Reconcile two JSON-lines files.
//!
//! Usage:
//!   recon --left a.jsonl --right b.jsonl --schema Orders [--key id] [--output DIR]
//!
//! Writes `<schema>_diff_report.csv` to the output directory and prints a
//! JSON summary on stdout. Exits non-zero when the run or a report did not
//! finish cleanly.

use anyhow::{Result, bail};
use clap::Parser;
use recon_cli::{Cli, reconcile_files};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    info!(
        schema = %cli.schema,
        left = %cli.left.display(),
        right = %cli.right.display(),
        output = %cli.output.display(),
        "starting reconciliation"
    );

    let report = reconcile_files(&cli).await?;

    let schemas: serde_json::Map<String, serde_json::Value> = report
        .schemas
        .iter()
        .map(|(schema, result)| -> Result<(String, serde_json::Value)> {
            let value = match result {
                Ok(summary) => serde_json::to_value(summary)?,
                Err(e) => serde_json::json!({ "error": e }),
            };
            Ok((schema.clone(), value))
        })
        .collect::<Result<_>>()?;
    let summary = serde_json::json!({
        "schemas": schemas,
        "reports": serde_json::to_value(&report.sink)?,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    if !report.is_clean() {
        bail!("reconciliation of {} did not finish cleanly", cli.schema);
    }
    Ok(())
}
