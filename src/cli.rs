//! Command-line interface definitions.
//!
//! Flags override values from the YAML configuration file. Secrets and the
//! CI trigger are read from the environment the scheduler provides.

use clap::Parser;
use std::path::PathBuf;
use tracing::warn;

use crate::config::{Backend, FailurePolicy, PipelineConfig, SessionKind};
use crate::dispatch::TriggerKind;
use crate::models::NewsType;

/// Command-line arguments for the pipeline job.
///
/// # Examples
///
/// ```sh
/// # Nightly batch (what the scheduler runs)
/// inshorts_pipeline --trigger schedule
///
/// # One ad-hoc search, written to data/news_elections.json
/// inshorts_pipeline --trigger manual --type search --query elections --when 1d
///
/// # Manual end-to-end run with the built-in summarizer
/// inshorts_pipeline --trigger manual --summarizer builtin
///
/// # Two search-backed categories, summaries kept local
/// inshorts_pipeline --trigger manual --categories politics,scandal --skip-supabase
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// What started this run: schedule, push or manual (CI event names such
    /// as `workflow_dispatch` are accepted; anything else runs as manual)
    #[arg(long, env = "GITHUB_EVENT_NAME")]
    pub trigger: Option<String>,

    /// Optional path to a YAML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for news_*.json and inshorts_*.json files
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Manual request: kind of news to fetch
    #[arg(long = "type", value_enum)]
    pub news_type: Option<NewsType>,

    /// Manual request: topic for `--type topic`
    #[arg(long)]
    pub topic: Option<String>,

    /// Manual request: query for `--type search`
    #[arg(long)]
    pub query: Option<String>,

    /// Manual request: time window for `--type search` (e.g. 1h, 1d)
    #[arg(long)]
    pub when: Option<String>,

    /// Manual request: location for `--type geo`
    #[arg(long)]
    pub location: Option<String>,

    /// Manual request: output file (defaults to <data-dir>/news_<category>.json)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Manual full run: only these categories (comma separated or repeated)
    #[arg(long, num_args = 1.., value_delimiter = ',')]
    pub categories: Vec<String>,

    /// Manual full run: reuse the news files already in the data directory
    #[arg(long)]
    pub skip_fetch: bool,

    /// Manual full run: don't summarize
    #[arg(long, alias = "skip-extract")]
    pub skip_summarize: bool,

    /// Manual full run: don't upload to the hosted database
    #[arg(long, alias = "skip-supabase")]
    pub skip_upload: bool,

    /// Maximum summarized articles per category
    #[arg(long)]
    pub max_articles: Option<usize>,

    /// Run the browser with a visible window
    #[arg(long)]
    pub no_headless: bool,

    /// Summarize backend
    #[arg(long, value_enum)]
    pub summarizer: Option<Backend>,

    /// Page session used by the built-in summarizer
    #[arg(long, value_enum)]
    pub session: Option<SessionKind>,

    /// Upload backend
    #[arg(long, value_enum)]
    pub uploader: Option<Backend>,

    /// What a failed fetch does to the rest of the batch
    #[arg(long, value_enum)]
    pub fetch_failure_policy: Option<FailurePolicy>,

    /// Skip committing and pushing the data directory
    #[arg(long)]
    pub no_persist: bool,

    /// Write the run report as JSON to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Hosted database URL
    #[arg(long, env = "SUPABASE_URL", hide_env_values = true)]
    pub supabase_url: Option<String>,

    /// Hosted database service key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    /// Token used to push the data commit
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// `owner/name` of the repository to push to
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub github_repository: Option<String>,
}

impl Cli {
    /// The trigger, falling back to manual when it is missing or not one we
    /// know (CI also reports events such as `pull_request`).
    pub fn trigger_kind(&self) -> TriggerKind {
        let Some(name) = self.trigger.as_deref() else {
            return TriggerKind::Manual;
        };
        name.parse().unwrap_or_else(|e: String| {
            warn!(trigger = name, error = %e, "Unrecognized trigger; running as manual");
            TriggerKind::Manual
        })
    }

    /// Whether a single ad-hoc request was asked for.
    pub fn has_request_fields(&self) -> bool {
        self.news_type.is_some()
    }

    /// Whether category selection or a step skip was asked for.
    pub fn has_full_run_fields(&self) -> bool {
        !self.categories.is_empty() || self.skip_fetch || self.skip_summarize || self.skip_upload
    }

    /// Apply flag overrides on top of the file configuration.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(ref dir) = self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(max) = self.max_articles {
            config.summarize.max_articles = max;
        }
        if self.no_headless {
            config.summarize.headless = false;
        }
        if let Some(backend) = self.summarizer {
            config.summarize.backend = backend;
        }
        if let Some(session) = self.session {
            config.summarize.session = session;
        }
        if let Some(backend) = self.uploader {
            config.upload.backend = backend;
        }
        if let Some(policy) = self.fetch_failure_policy {
            config.fetch.failure_policy = policy;
        }
        if self.no_persist {
            config.persist.enabled = false;
        }
        config
    }
}
