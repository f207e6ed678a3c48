//! Running a dispatched plan.
//!
//! Stages run strictly one after another. Gating:
//!
//! - a failed fetch stops the run; the remaining stages are reported as skipped
//! - upload needs a summarize stage that didn't fail, and summary files on disk
//! - persist needs every earlier stage to have succeeded (or been skipped)

use tracing::{error, info, instrument};

use crate::config::PipelineConfig;
use crate::dispatch::{Plan, Trigger, dispatch};
use crate::models::NewsRequest;
use crate::report::{RunReport, Stage, StageReport};
use crate::runner::{CommandRunner, Invocation};
use crate::stages::fetch::FetchStage;
use crate::stages::persist::{GitAuth, PersistStage};
use crate::stages::summarize::{SummarizeStage, generated_files};
use crate::stages::upload::{DatabaseCredentials, UploadStage};

/// Secrets handed in from the environment.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub database: DatabaseCredentials,
    pub git: GitAuth,
}

pub struct Pipeline<'a, R> {
    pub config: &'a PipelineConfig,
    pub runner: &'a R,
    pub secrets: &'a Secrets,
}

impl<R: CommandRunner> Pipeline<'_, R> {
    #[instrument(level = "info", skip_all, fields(trigger = %trigger.kind()))]
    pub async fn run(&self, trigger: &Trigger) -> RunReport {
        let mut report = RunReport::new(trigger.kind().to_string());

        match dispatch(trigger, self.config) {
            Plan::FullRunCommand(cmd) => report.push(self.full_run(&cmd).await),
            Plan::Stages { fetch, summarize, upload, scope } => {
                self.run_stages(&mut report, &fetch, summarize, upload, &scope).await;
                if summarize || upload {
                    report.generated = generated_files(&self.config.data_dir, &scope).await;
                }
            }
        }

        let persist = if !self.config.persist.enabled {
            StageReport::skipped(Stage::Persist, "disabled")
        } else if !report.succeeded() {
            StageReport::skipped(Stage::Persist, "an earlier stage failed")
        } else {
            self.persist().await
        };
        report.push(persist);

        report.finish();
        if report.succeeded() {
            info!("Run succeeded");
        } else {
            error!("Run failed");
        }
        report
    }

    async fn run_stages(
        &self,
        report: &mut RunReport,
        fetch: &[NewsRequest],
        summarize: bool,
        upload: bool,
        scope: &[String],
    ) {
        if !fetch.is_empty() {
            let stage = FetchStage {
                runner: self.runner,
                command: &self.config.commands.fetch,
                config: &self.config.fetch,
                retry: &self.config.retry,
            };
            let fetched = stage.run(fetch).await;
            let failed = fetched.is_failed();
            report.push(fetched);
            if failed {
                for (planned, stage) in [(summarize, Stage::Summarize), (upload, Stage::Upload)] {
                    if planned {
                        report.push(StageReport::skipped(stage, "fetch failed"));
                    }
                }
                return;
            }
        }

        let mut summarize_failed = false;
        if summarize {
            let stage = SummarizeStage {
                runner: self.runner,
                command: &self.config.commands.summarize,
                config: &self.config.summarize,
                data_dir: &self.config.data_dir,
                only: scope,
            };
            let summarized = stage.run().await;
            summarize_failed = summarized.is_failed();
            report.push(summarized);
        }

        if upload {
            let uploaded = if summarize_failed {
                StageReport::skipped(Stage::Upload, "summarize failed")
            } else {
                UploadStage {
                    runner: self.runner,
                    command: &self.config.commands.upload,
                    config: &self.config.upload,
                    retry: &self.config.retry,
                    data_dir: &self.config.data_dir,
                    credentials: &self.secrets.database,
                }
                .run()
                .await
            };
            report.push(uploaded);
        }
    }

    /// Run the configured end-to-end entry point once.
    async fn full_run(&self, command: &[String]) -> StageReport {
        let inv = match Invocation::from_command_line(command) {
            Ok(inv) => self.secrets.database.export(inv),
            Err(e) => return StageReport::failed(Stage::FullRun, e.to_string()),
        };
        let inv = if self.config.summarize.headless {
            inv.arg("--headless")
        } else {
            inv
        };
        let mut report = StageReport::new(Stage::FullRun);
        match self.runner.run_checked(&inv).await {
            Ok(_) => report.record_success(),
            Err(e) => {
                error!(error = %e, "Full run failed");
                report.record_failure("all", &e);
            }
        }
        report.finish()
    }

    async fn persist(&self) -> StageReport {
        PersistStage {
            runner: self.runner,
            config: &self.config.persist,
            retry: &self.config.retry,
            data_dir: &self.config.data_dir,
            auth: &self.secrets.git,
        }
        .run()
        .await
    }
}
