//! Pipeline configuration.
//!
//! Settings come from an optional YAML file (`--config`) with every field
//! defaulted, then individual CLI flags override them. Secrets never live
//! here; they arrive through the environment (see [`crate::cli::Cli`]).
//!
//! ```yaml
//! data_dir: data
//! commands:
//!   fetch: [python3, scripts/fetch_news.py]
//!   summarize: [python3, scripts/generate_all_inshorts.py]
//!   upload: [python3, scripts/push_inshorts_to_supabase.py]
//! summarize:
//!   backend: builtin
//!   max_articles: 15
//! fetch:
//!   failure_policy: continue
//! ```

use clap::ValueEnum;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding `news_*.json` and `inshorts_*.json`.
    pub data_dir: PathBuf,
    pub commands: CommandsConfig,
    pub fetch: FetchConfig,
    pub summarize: SummarizeConfig,
    pub upload: UploadConfig,
    pub persist: PersistConfig,
    pub retry: RetryPolicy,
    /// Wall-clock limit for any single external command.
    pub command_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            commands: CommandsConfig::default(),
            fetch: FetchConfig::default(),
            summarize: SummarizeConfig::default(),
            upload: UploadConfig::default(),
            persist: PersistConfig::default(),
            retry: RetryPolicy::default(),
            command_timeout_secs: 600,
        }
    }
}

impl PipelineConfig {
    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(text)
            .map_err(|e| PipelineError::Config(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, cmd) in [
            ("fetch", &self.commands.fetch),
            ("summarize", &self.commands.summarize),
            ("upload", &self.commands.upload),
        ] {
            if cmd.is_empty() {
                return Err(PipelineError::Config(format!("commands.{name} is empty")));
            }
        }
        if self.summarize.max_articles == 0 {
            return Err(PipelineError::Config(
                "summarize.max_articles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Command lines of the collaborator scripts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    pub fetch: Vec<String>,
    pub summarize: Vec<String>,
    pub upload: Vec<String>,
    /// End-to-end entry point used by a manual full run when set.
    pub full_run: Option<Vec<String>>,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        let py = |script: &str| vec!["python3".to_string(), script.to_string()];
        Self {
            fetch: py("scripts/fetch_news.py"),
            summarize: py("scripts/generate_all_inshorts.py"),
            upload: py("scripts/push_inshorts_to_supabase.py"),
            full_run: None,
        }
    }
}

/// What a failed fetch does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failed request.
    Abort,
    /// Record the failure and keep fetching.
    Continue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub failure_policy: FailurePolicy,
    /// Pause between consecutive fetch requests.
    pub request_delay_ms: u64,
    pub language: Option<String>,
    pub country: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            failure_policy: FailurePolicy::Abort,
            request_delay_ms: 1_000,
            language: None,
            country: None,
        }
    }
}

/// Script collaborator or the in-process implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Script,
    Builtin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Plain HTTP client; no JavaScript.
    Http,
    /// Headless browser driven over the WebDriver protocol.
    Webdriver,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SummarizeConfig {
    pub backend: Backend,
    pub max_articles: usize,
    /// Word budget of a generated summary.
    pub summary_length: usize,
    pub headless: bool,
    pub session: SessionKind,
    pub article_timeout_secs: u64,
    pub article_delay_ms: u64,
    pub user_agent: String,
    pub webdriver: WebDriverConfig,
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Script,
            max_articles: 15,
            summary_length: 60,
            headless: true,
            session: SessionKind::Http,
            article_timeout_secs: 10,
            article_delay_ms: 1_000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            webdriver: WebDriverConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// Existing WebDriver endpoint. When unset a driver is spawned locally.
    pub url: Option<String>,
    pub driver_command: Vec<String>,
    pub port: u16,
    pub page_load_timeout_ms: u64,
    pub startup_timeout_secs: u64,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: None,
            driver_command: vec!["chromedriver".to_string()],
            port: 9515,
            page_load_timeout_ms: 20_000,
            startup_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub backend: Backend,
    /// Table the built-in uploader upserts into.
    pub table: String,
    pub request_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Script,
            table: "inshorts_articles".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    pub enabled: bool,
    pub remote: String,
    /// Branch to push to; the current `HEAD` when unset.
    pub branch: Option<String>,
    pub author_name: String,
    pub author_email: String,
    /// Working tree to commit from; the current directory when unset.
    pub repo_dir: Option<PathBuf>,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            remote: "origin".to_string(),
            branch: None,
            author_name: "github-actions[bot]".to_string(),
            author_email: "github-actions[bot]@users.noreply.github.com".to_string(),
            repo_dir: None,
        }
    }
}
