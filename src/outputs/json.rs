//! JSON output.

use serde::Serialize;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

use crate::error::Result;
use crate::report::RunReport;

/// Serialize `value` as pretty JSON to `path`, creating parent directories.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(dir).await {
            error!(dir = %dir.display(), error = %e, "Failed to create output dir");
            return Err(e.into());
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, json).await?;
    fs::rename(&tmp, path).await?;
    info!(bytes = fs::metadata(path).await?.len(), "Wrote JSON");
    Ok(())
}

/// Write the run report for the scheduler to archive.
pub async fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    write_json_pretty(path, report).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Stage, StageReport};

    #[tokio::test]
    async fn test_write_creates_dirs_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        write_json_pretty(&path, &serde_json::json!({"a": 1})).await.unwrap();
        write_json_pretty(&path, &serde_json::json!({"a": 2})).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"a\": 2"));
        assert!(!dir.path().join("nested/out.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut run = RunReport::new("manual");
        run.push(StageReport::skipped(Stage::Summarize, "no news files"));
        write_report(&path, &run).await.unwrap();

        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["trigger"], "manual");
        assert_eq!(v["stages"][0]["status"], "skipped");
    }
}
