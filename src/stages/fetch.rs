//! Fetch stage: one collaborator call per [`NewsRequest`], strictly in order.
//!
//! Each call writes its own `news_<category>.json`, so a failed request can
//! never clobber another category's output. What a failure does to the rest
//! of the batch is decided by [`FailurePolicy`].

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use crate::config::{FailurePolicy, FetchConfig};
use crate::error::{PipelineError, Result};
use crate::models::{NewsRequest, NewsType};
use crate::report::{Stage, StageReport, StageStatus};
use crate::retry::RetryPolicy;
use crate::runner::{CommandRunner, Invocation, Retrying};

/// Flags for one fetch call: `--type`, the fields relevant to that type,
/// and `--output`.
///
/// Fields that don't belong to the type are never forwarded. A relevant
/// field that is missing or blank is simply omitted.
///
/// # Arguments
///
/// * `req` - The request to turn into flags
///
/// # Returns
///
/// The flags, in order, without the command itself.
///
/// # Examples
///
/// ```ignore
/// let req = NewsRequest::search("elections", Some("1d"), "data/news_elections.json");
/// assert_eq!(
///     fetch_args(&req),
///     ["--type", "search", "--query", "elections", "--when", "1d", "--output", "data/news_elections.json"]
/// );
/// ```
pub fn fetch_args(req: &NewsRequest) -> Vec<String> {
    let mut args = vec!["--type".to_string(), req.kind.as_str().to_string()];
    let mut push = |flag: &str, value: &Option<String>| {
        if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            args.push(flag.to_string());
            args.push(v.to_string());
        }
    };
    match req.kind {
        NewsType::Top => {}
        NewsType::Topic => push("--topic", &req.topic),
        NewsType::Search => {
            push("--query", &req.query);
            push("--when", &req.when);
        }
        NewsType::Geo => push("--location", &req.location),
    }
    args.push("--output".to_string());
    args.push(req.output_path.display().to_string());
    args
}

pub struct FetchStage<'a, R> {
    pub runner: &'a R,
    pub command: &'a [String],
    pub config: &'a FetchConfig,
    pub retry: &'a RetryPolicy,
}

impl<R: CommandRunner> FetchStage<'_, R> {
    fn invocation(&self, req: &NewsRequest) -> Result<Invocation> {
        let mut inv = Invocation::from_command_line(self.command)?.args(fetch_args(req));
        if let Some(ref language) = self.config.language {
            inv = inv.arg("--language").arg(language.clone());
        }
        if let Some(ref country) = self.config.country {
            inv = inv.arg("--country").arg(country.clone());
        }
        Ok(inv)
    }

    async fn fetch_one(&self, req: &NewsRequest) -> Result<()> {
        if let Some(parent) = req.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let inv = self.invocation(req)?;
        let runner = Retrying::new(self.runner, self.retry.clone());
        runner
            .run_checked(&inv)
            .await
            .map(|_| ())
            .map_err(|e| PipelineError::Fetch {
                category: req.category(),
                reason: e.to_string(),
            })
    }

    /// Run every request in order and report per-category outcomes.
    #[instrument(level = "info", skip_all, fields(requests = requests.len()))]
    pub async fn run(&self, requests: &[NewsRequest]) -> StageReport {
        let mut report = StageReport::new(Stage::Fetch);
        let delay = Duration::from_millis(self.config.request_delay_ms);

        for (i, req) in requests.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                sleep(delay).await;
            }
            let category = req.category();
            info!(%category, kind = %req.kind, output = %req.output_path.display(), "Fetching");
            match self.fetch_one(req).await {
                Ok(()) => report.record_success(),
                Err(e) => {
                    error!(%category, error = %e, "Fetch failed");
                    report.record_failure(category, &e);
                    if self.config.failure_policy == FailurePolicy::Abort {
                        let skipped = requests.len() - i - 1;
                        warn!(skipped, "Aborting fetch batch after failure");
                        let mut report = report
                            .with_detail(format!("aborted; {skipped} request(s) not attempted"));
                        report.status = StageStatus::Failed;
                        return report;
                    }
                }
            }
        }

        let report = report.finish();
        info!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            total = requests.len(),
            "Fetch stage finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, exit, fast_retry};

    const FLAGS: [&str; 4] = ["--topic", "--query", "--when", "--location"];

    fn flags_in(args: &[String]) -> Vec<&str> {
        args.iter()
            .map(String::as_str)
            .filter(|a| FLAGS.contains(a))
            .collect()
    }

    #[test]
    fn test_top_has_no_type_specific_flags() {
        let mut req = NewsRequest::top("data/news_top.json");
        req.topic = Some("sports".to_string());
        req.query = Some("x".to_string());
        req.when = Some("1d".to_string());
        req.location = Some("Paris".to_string());
        let args = fetch_args(&req);
        assert_eq!(args, vec!["--type", "top", "--output", "data/news_top.json"]);
    }

    #[test]
    fn test_each_type_gets_only_its_flags() {
        let mut topic = NewsRequest::topic("science", "d/news_science.json");
        topic.query = Some("stray".to_string());
        assert_eq!(flags_in(&fetch_args(&topic)), vec!["--topic"]);

        let mut search = NewsRequest::search("trending", Some("1d"), "d/news_trending.json");
        search.location = Some("stray".to_string());
        assert_eq!(flags_in(&fetch_args(&search)), vec!["--query", "--when"]);

        let mut geo = NewsRequest::geo("Berlin", "d/news_berlin.json");
        geo.topic = Some("stray".to_string());
        assert_eq!(flags_in(&fetch_args(&geo)), vec!["--location"]);
    }

    #[test]
    fn test_search_without_query_degrades() {
        let mut req = NewsRequest::search("", None, "d/news_search.json");
        req.query = None;
        let args = fetch_args(&req);
        assert_eq!(args, vec!["--type", "search", "--output", "d/news_search.json"]);

        // blank values are treated as missing
        let blank = NewsRequest::search("  ", Some(""), "d/news_search.json");
        assert!(flags_in(&fetch_args(&blank)).is_empty());
    }

    fn config(policy: FailurePolicy) -> FetchConfig {
        FetchConfig {
            failure_policy: policy,
            request_delay_ms: 0,
            language: None,
            country: None,
        }
    }

    fn requests(dir: &std::path::Path) -> Vec<NewsRequest> {
        vec![
            NewsRequest::top(dir.join("news_top.json")),
            NewsRequest::topic("world", dir.join("news_world.json")),
            NewsRequest::search("trending", Some("1d"), dir.join("news_trending.json")),
        ]
    }

    fn command() -> Vec<String> {
        vec!["python3".to_string(), "scripts/fetch_news.py".to_string()]
    }

    #[tokio::test]
    async fn test_runs_requests_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::ok();
        let cmd = command();
        let mut cfg = config(FailurePolicy::Abort);
        cfg.language = Some("en".to_string());
        let retry = fast_retry();
        let stage = FetchStage { runner: &runner, command: &cmd, config: &cfg, retry: &retry };

        let report = stage.run(&requests(dir.path())).await;
        assert_eq!(report.status, StageStatus::Succeeded);
        assert_eq!(report.succeeded, 3);

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].program, "python3");
        assert_eq!(calls[0].args[..3], ["scripts/fetch_news.py", "--type", "top"]);
        assert_eq!(calls[1].args[2], "topic");
        assert_eq!(calls[2].args[2], "search");
        assert!(calls[0].args.ends_with(&["--language".to_string(), "en".to_string()]));
    }

    #[tokio::test]
    async fn test_abort_stops_batch() {
        let dir = tempfile::tempdir().unwrap();
        // every attempt at the topic request fails
        let runner = FakeRunner::with(|inv, _| {
            Ok(if inv.args.contains(&"topic".to_string()) { exit(1) } else { exit(0) })
        });
        let cmd = command();
        let cfg = config(FailurePolicy::Abort);
        let retry = fast_retry();
        let stage = FetchStage { runner: &runner, command: &cmd, config: &cfg, retry: &retry };

        let report = stage.run(&requests(dir.path())).await;
        assert_eq!(report.status, StageStatus::Failed);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].category, "world");
        // 1 success + 3 attempts for the failing one, search never ran
        assert_eq!(runner.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_continue_collects_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::with(|inv, _| {
            Ok(if inv.args.contains(&"topic".to_string()) { exit(1) } else { exit(0) })
        });
        let cmd = command();
        let cfg = config(FailurePolicy::Continue);
        let retry = fast_retry();
        let stage = FetchStage { runner: &runner, command: &cmd, config: &cfg, retry: &retry };

        let report = stage.run(&requests(dir.path())).await;
        assert_eq!(report.status, StageStatus::Succeeded);
        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed[0].category, "world");
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let runner = FakeRunner::failing_first(1);
        let cmd = command();
        let cfg = config(FailurePolicy::Abort);
        let retry = fast_retry();
        let stage = FetchStage { runner: &runner, command: &cmd, config: &cfg, retry: &retry };

        let report = stage.run(&requests(dir.path())[..1]).await;
        assert_eq!(report.status, StageStatus::Succeeded);
        assert_eq!(runner.calls().len(), 2);
    }
}
