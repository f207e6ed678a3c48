//! Summarize stage: `news_<category>.json` → `inshorts_<category>.json`.
//!
//! With no fetched files in the data directory the stage is skipped
//! without touching anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{error, info, instrument, warn};

use crate::config::{Backend, SummarizeConfig};
use crate::error::Result;
use crate::inshorts::generate_all;
use crate::models::{INSHORTS_PREFIX, InshortsFile, NEWS_PREFIX, inshorts_path};
use crate::report::{GeneratedFile, Stage, StageReport};
use crate::runner::{CommandRunner, Invocation};
use crate::session::{AnySession, PageSession};
use crate::utils::list_category_files;

pub struct SummarizeStage<'a, R> {
    pub runner: &'a R,
    pub command: &'a [String],
    pub config: &'a SummarizeConfig,
    pub data_dir: &'a Path,
    /// Categories in scope; empty means every `news_*.json` in `data_dir`.
    pub only: &'a [String],
}

impl<R: CommandRunner> SummarizeStage<'_, R> {
    /// `<command> --input-dir <d> --output-dir <d> --max-articles <n> [--headless]`
    pub fn script_invocation(&self) -> Result<Invocation> {
        let dir = self.data_dir.display().to_string();
        let mut inv = Invocation::from_command_line(self.command)?
            .arg("--input-dir")
            .arg(dir.clone())
            .arg("--output-dir")
            .arg(dir)
            .arg("--max-articles")
            .arg(self.config.max_articles.to_string());
        if self.config.headless {
            inv = inv.arg("--headless");
        }
        Ok(inv)
    }

    #[instrument(level = "info", skip_all, fields(backend = ?self.config.backend))]
    pub async fn run(&self) -> StageReport {
        let inputs = match list_category_files(self.data_dir, NEWS_PREFIX).await {
            Ok(inputs) if self.only.is_empty() => inputs,
            Ok(inputs) => inputs
                .into_iter()
                .filter(|(category, _)| self.only.contains(category))
                .collect(),
            Err(e) => {
                error!(error = %e, "Cannot scan data directory");
                return StageReport::failed(Stage::Summarize, e.to_string());
            }
        };
        if inputs.is_empty() {
            info!(dir = %self.data_dir.display(), "No news files to summarize");
            return StageReport::skipped(Stage::Summarize, "no news_*.json files");
        }
        info!(categories = inputs.len(), "Summarizing");

        match self.config.backend {
            Backend::Script => self.run_script(&inputs).await,
            Backend::Builtin => match AnySession::open(self.config).await {
                Ok(session) => run_with_session(session, &inputs, self.data_dir, self.config).await,
                Err(e) => {
                    error!(error = %e, "Could not open page session");
                    StageReport::failed(Stage::Summarize, format!("page session: {e}"))
                }
            },
        }
    }

    /// One script call covers every category. A category counts as
    /// summarized only when the script (re)wrote its
    /// `inshorts_<category>.json` during this call; summaries left over from
    /// an earlier run don't count.
    ///
    /// A non-zero exit fails the stage only when no category got a fresh
    /// summary.
    async fn run_script(&self, inputs: &[(String, PathBuf)]) -> StageReport {
        let before = summary_mtimes(self.data_dir).await;
        let outcome = match self.script_invocation() {
            Ok(inv) => self.runner.run_checked(&inv).await,
            Err(e) => Err(e),
        };
        let script_error = outcome.err();
        if let Some(ref e) = script_error {
            error!(error = %e, "Summarize script failed");
        }

        let after = summary_mtimes(self.data_dir).await;
        let mut report = StageReport::new(Stage::Summarize);
        for (category, _) in inputs {
            let fresh = match (before.get(category), after.get(category)) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(old), Some(new)) => old != new,
            };
            if fresh {
                report.record_success();
            } else {
                let path = inshorts_path(self.data_dir, category);
                warn!(%category, "Script produced no new summary file");
                report.record_failure(category.clone(), format!("{} not written", path.display()));
            }
        }
        let report = report.finish();
        match script_error {
            Some(e) => report.with_detail(e.to_string()),
            None => report,
        }
    }
}

/// Modification time of every `inshorts_*.json` in `dir`, by category.
async fn summary_mtimes(dir: &Path) -> HashMap<String, Option<SystemTime>> {
    let mut mtimes = HashMap::new();
    for (category, path) in list_category_files(dir, INSHORTS_PREFIX).await.unwrap_or_default() {
        let modified = tokio::fs::metadata(&path).await.and_then(|m| m.modified()).ok();
        mtimes.insert(category, modified);
    }
    mtimes
}

/// Article counts of the summary files in `dir`, limited to `only` unless
/// it is empty.
pub async fn generated_files(dir: &Path, only: &[String]) -> Vec<GeneratedFile> {
    let mut generated = Vec::new();
    for (category, path) in list_category_files(dir, INSHORTS_PREFIX).await.unwrap_or_default() {
        if !only.is_empty() && !only.contains(&category) {
            continue;
        }
        let articles = match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_json::from_str::<InshortsFile>(&text)
                .ok()
                .map(|file| file.articles.len()),
            Err(_) => None,
        };
        generated.push(GeneratedFile { category, articles });
    }
    generated
}

/// Run the built-in generator with `session`, then close it.
pub async fn run_with_session<S: PageSession>(
    mut session: S,
    inputs: &[(String, PathBuf)],
    output_dir: &Path,
    config: &SummarizeConfig,
) -> StageReport {
    let report = generate_all(&mut session, inputs, output_dir, config).await;
    if let Err(e) = session.close().await {
        warn!(error = %e, "Failed to close page session");
    }
    report
}
