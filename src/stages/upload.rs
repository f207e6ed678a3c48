//! Upload stage: push `inshorts_*.json` to the hosted database.
//!
//! Skipped when the data directory holds no summary files. Any upload
//! failure fails the run.

use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::config::{Backend, UploadConfig};
use crate::error::{PipelineError, Result};
use crate::models::INSHORTS_PREFIX;
use crate::report::{Stage, StageReport};
use crate::retry::RetryPolicy;
use crate::runner::{CommandRunner, Invocation, Retrying};
use crate::supabase::{SupabaseClient, upload_files};
use crate::utils::list_category_files;

/// Hosted database credentials, taken from the environment.
#[derive(Clone, Default)]
pub struct DatabaseCredentials {
    pub url: Option<String>,
    pub key: Option<String>,
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("url", &self.url)
            .field("key", &self.key.as_ref().map(|_| "***"))
            .finish()
    }
}

impl DatabaseCredentials {
    /// Export as `SUPABASE_URL` / `SUPABASE_KEY` to a child process.
    pub fn export(&self, mut inv: Invocation) -> Invocation {
        if let Some(ref url) = self.url {
            inv = inv.env("SUPABASE_URL", url.clone());
        }
        if let Some(ref key) = self.key {
            inv = inv.env("SUPABASE_KEY", key.clone()).redact(key.clone());
        }
        inv
    }

    fn require(&self) -> Result<(&str, &str)> {
        match (self.url.as_deref(), self.key.as_deref()) {
            (Some(url), Some(key)) => Ok((url, key)),
            _ => Err(PipelineError::Config(
                "SUPABASE_URL and SUPABASE_KEY must be set".to_string(),
            )),
        }
    }
}

pub struct UploadStage<'a, R> {
    pub runner: &'a R,
    pub command: &'a [String],
    pub config: &'a UploadConfig,
    pub retry: &'a RetryPolicy,
    pub data_dir: &'a Path,
    pub credentials: &'a DatabaseCredentials,
}

impl<R: CommandRunner> UploadStage<'_, R> {
    #[instrument(level = "info", skip_all, fields(backend = ?self.config.backend))]
    pub async fn run(&self) -> StageReport {
        let files = match list_category_files(self.data_dir, INSHORTS_PREFIX).await {
            Ok(files) => files,
            Err(e) => return StageReport::failed(Stage::Upload, e.to_string()),
        };
        if files.is_empty() {
            info!(dir = %self.data_dir.display(), "No summary files; skipping upload");
            return StageReport::skipped(Stage::Upload, "no inshorts_*.json files");
        }

        let report = match self.config.backend {
            Backend::Script => self.run_script(files.len()).await,
            Backend::Builtin => match self.client() {
                Ok(client) => upload_files(&client, &files, self.retry).await,
                Err(e) => StageReport::failed(Stage::Upload, e.to_string()),
            },
        };
        if report.is_failed() {
            error!(detail = report.detail.as_deref().unwrap_or(""), "Upload stage failed");
        }
        report
    }

    fn client(&self) -> Result<SupabaseClient> {
        let (url, key) = self.credentials.require()?;
        SupabaseClient::new(
            url,
            key,
            &self.config.table,
            Duration::from_secs(self.config.request_timeout_secs),
        )
    }

    async fn run_script(&self, file_count: usize) -> StageReport {
        let inv = match Invocation::from_command_line(self.command) {
            Ok(inv) => self.credentials.export(inv),
            Err(e) => return StageReport::failed(Stage::Upload, e.to_string()),
        };
        let runner = Retrying::new(self.runner, self.retry.clone());
        match runner.run_checked(&inv).await {
            Ok(_) => {
                let mut report = StageReport::new(Stage::Upload).with_detail(format!("{file_count} file(s)"));
                for _ in 0..file_count {
                    report.record_success();
                }
                report.finish()
            }
            Err(e) => StageReport::failed(Stage::Upload, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::inshorts_path;
    use crate::report::StageStatus;
    use crate::testing::{FakeRunner, exit, fast_retry};

    fn command() -> Vec<String> {
        vec!["python3".to_string(), "scripts/push_inshorts_to_supabase.py".to_string()]
    }

    fn credentials() -> DatabaseCredentials {
        DatabaseCredentials {
            url: Some("https://abc.supabase.co".to_string()),
            key: Some("service-key".to_string()),
        }
    }

    #[tokio::test]
    async fn test_skipped_without_summary_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("news_tech.json"), "{}").unwrap();
        let runner = FakeRunner::ok();
        let cmd = command();
        let config = UploadConfig::default();
        let retry = fast_retry();
        let creds = credentials();
        let stage = UploadStage {
            runner: &runner,
            command: &cmd,
            config: &config,
            retry: &retry,
            data_dir: dir.path(),
            credentials: &creds,
        };

        let report = stage.run().await;
        assert_eq!(report.status, StageStatus::Skipped);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_script_gets_credentials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(inshorts_path(dir.path(), "tech"), "{}").unwrap();
        let runner = FakeRunner::ok();
        let cmd = command();
        let config = UploadConfig::default();
        let retry = fast_retry();
        let creds = credentials();
        let stage = UploadStage {
            runner: &runner,
            command: &cmd,
            config: &config,
            retry: &retry,
            data_dir: dir.path(),
            credentials: &creds,
        };

        let report = stage.run().await;
        assert_eq!(report.status, StageStatus::Succeeded);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["scripts/push_inshorts_to_supabase.py"]);
        assert!(calls[0].envs.contains(&("SUPABASE_KEY".to_string(), "service-key".to_string())));
        assert!(calls[0].envs.contains(&("SUPABASE_URL".to_string(), "https://abc.supabase.co".to_string())));
    }

    #[tokio::test]
    async fn test_script_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(inshorts_path(dir.path(), "tech"), "{}").unwrap();
        let runner = FakeRunner::with(|_, _| Ok(exit(1)));
        let cmd = command();
        let config = UploadConfig::default();
        let retry = fast_retry();
        let creds = credentials();
        let stage = UploadStage {
            runner: &runner,
            command: &cmd,
            config: &config,
            retry: &retry,
            data_dir: dir.path(),
            credentials: &creds,
        };

        assert!(stage.run().await.is_failed());
        assert_eq!(runner.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_builtin_without_credentials_fails() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(inshorts_path(dir.path(), "tech"), "{}").unwrap();
        let runner = FakeRunner::ok();
        let cmd = command();
        let config = UploadConfig {
            backend: Backend::Builtin,
            ..UploadConfig::default()
        };
        let retry = fast_retry();
        let creds = DatabaseCredentials::default();
        let stage = UploadStage {
            runner: &runner,
            command: &cmd,
            config: &config,
            retry: &retry,
            data_dir: dir.path(),
            credentials: &creds,
        };

        let report = stage.run().await;
        assert!(report.is_failed());
        assert!(report.detail.unwrap().contains("SUPABASE_URL"));
    }

    #[test]
    fn test_credentials_debug_hides_key() {
        let shown = format!("{:?}", credentials());
        assert!(!shown.contains("service-key"));
        assert!(shown.contains("***"));
    }
}
