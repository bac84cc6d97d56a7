use crate::error::{SinkError, SinkResult};
use crate::report::{format_line, REPORT_HEADER};
use recon_types::Difference;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Append-only report file. Every line is flushed as soon as it is written.
pub(crate) struct ReportWriter {
    path: PathBuf,
    file: File,
}

impl ReportWriter {
    /// Opens (or creates) the report at `dir/file_name`. The header is
    /// written only when the file is new or empty, so a restarted writer
    /// keeps appending to the same report.
    pub(crate) async fn open(dir: &Path, file_name: &str) -> SinkResult<Self> {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| SinkError::io(dir, e))?;
        let path = dir.join(file_name);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| SinkError::io(&path, e))?;
        let existing = file
            .metadata()
            .await
            .map_err(|e| SinkError::io(&path, e))?
            .len();

        let mut writer = Self { path, file };
        if existing == 0 {
            writer.write_line(REPORT_HEADER).await?;
        }
        Ok(writer)
    }

    pub(crate) async fn write(&mut self, diff: &Difference) -> SinkResult<()> {
        self.write_line(&format_line(diff)?).await
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&mut self, line: &str) -> SinkResult<()> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.file
            .write_all(buf.as_bytes())
            .await
            .map_err(|e| SinkError::io(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| SinkError::io(&self.path, e))
    }
}
