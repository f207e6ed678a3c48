//! Structured run report.
//!
//! Each stage returns a [`StageReport`] with per-category outcomes so a run
//! that fetched 3 of 9 categories is distinguishable from one that fetched
//! none. The [`RunReport`] is logged at the end of the run and can be
//! written to disk as JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Fetch,
    Summarize,
    Upload,
    Persist,
    FullRun,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Summarize => "summarize",
            Stage::Upload => "upload",
            Stage::Persist => "persist",
            Stage::FullRun => "full_run",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryFailure {
    pub category: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: Stage,
    pub status: StageStatus,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<CategoryFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StageReport {
    /// A report with no outcomes yet; status is derived by [`StageReport::finish`].
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            status: StageStatus::Succeeded,
            attempted: 0,
            succeeded: 0,
            failed: Vec::new(),
            detail: None,
        }
    }

    pub fn skipped(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Skipped,
            detail: Some(reason.into()),
            ..Self::new(stage)
        }
    }

    pub fn failed(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            status: StageStatus::Failed,
            detail: Some(reason.into()),
            ..Self::new(stage)
        }
    }

    pub fn record_success(&mut self) {
        self.attempted += 1;
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, category: impl Into<String>, error: impl fmt::Display) {
        self.attempted += 1;
        self.failed.push(CategoryFailure {
            category: category.into(),
            error: error.to_string(),
        });
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Fail the stage when nothing that was attempted succeeded.
    pub fn finish(mut self) -> Self {
        self.status = if self.attempted > 0 && self.succeeded == 0 {
            StageStatus::Failed
        } else {
            StageStatus::Succeeded
        };
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

/// A summary file present at the end of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedFile {
    pub category: String,
    /// `None` when the file exists but can't be read as a summary file.
    pub articles: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub trigger: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub generated: Vec<GeneratedFile>,
}

impl RunReport {
    pub fn new(trigger: impl Into<String>) -> Self {
        Self {
            trigger: trigger.into(),
            started_at: Utc::now(),
            finished_at: None,
            stages: Vec::new(),
            generated: Vec::new(),
        }
    }

    pub fn push(&mut self, stage: StageReport) {
        self.stages.push(stage);
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn succeeded(&self) -> bool {
        !self.stages.iter().any(StageReport::is_failed)
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// One log line per stage, then one per generated file.
    pub fn log(&self) {
        for s in &self.stages {
            let failed_categories = s
                .failed
                .iter()
                .map(|f| f.category.as_str())
                .collect::<Vec<_>>()
                .join(",");
            if s.is_failed() {
                warn!(
                    stage = %s.stage,
                    status = ?s.status,
                    attempted = s.attempted,
                    succeeded = s.succeeded,
                    failed = s.failed.len(),
                    %failed_categories,
                    detail = s.detail.as_deref().unwrap_or(""),
                    "Stage summary"
                );
            } else {
                info!(
                    stage = %s.stage,
                    status = ?s.status,
                    attempted = s.attempted,
                    succeeded = s.succeeded,
                    failed = s.failed.len(),
                    %failed_categories,
                    detail = s.detail.as_deref().unwrap_or(""),
                    "Stage summary"
                );
            }
        }
        for file in &self.generated {
            match file.articles {
                Some(articles) => info!(category = %file.category, articles, "Generated file"),
                None => warn!(category = %file.category, "Generated file is unreadable"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_success_is_success() {
        let mut r = StageReport::new(Stage::Fetch);
        r.record_success();
        r.record_failure("world", "timeout");
        let r = r.finish();
        assert_eq!(r.status, StageStatus::Succeeded);
        assert_eq!(r.attempted, 2);
        assert_eq!(r.failed[0].category, "world");
    }

    #[test]
    fn test_all_failed_is_failure() {
        let mut r = StageReport::new(Stage::Summarize);
        r.record_failure("tech", "bad json");
        assert!(r.finish().is_failed());
    }

    #[test]
    fn test_nothing_attempted_is_success() {
        assert_eq!(StageReport::new(Stage::Upload).finish().status, StageStatus::Succeeded);
    }

    #[test]
    fn test_run_report_json() {
        let mut run = RunReport::new("schedule");
        run.push(StageReport::skipped(Stage::Upload, "no inshorts files"));
        run.finish();
        assert!(run.succeeded());
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["stages"][0]["stage"], "upload");
        assert_eq!(json["stages"][0]["status"], "skipped");
        assert_eq!(json["stages"][0]["detail"], "no inshorts files");
        assert!(run.stage(Stage::Fetch).is_none());
        assert!(json.get("generated").is_none());

        run.generated.push(GeneratedFile { category: "tech".to_string(), articles: Some(15) });
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["generated"][0]["category"], "tech");
        assert_eq!(json["generated"][0]["articles"], 15);
    }
}
