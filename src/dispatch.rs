//! Trigger dispatch.
//!
//! A run is started by one of three triggers. Each maps to a [`Plan`]:
//!
//! | Trigger | Plan |
//! |---------|------|
//! | `schedule`, `push` | 9-request batch, summarize, upload |
//! | `manual` with `--type` | the single request |
//! | `manual` without `--type` | full run: the batch (or `--categories`), minus skipped steps; or the configured full-run command |
//!
//! Persistence is appended to every plan by [`crate::pipeline`].
//!
//! # Category catalog
//!
//! A category name decides how its headlines are fetched:
//!
//! - `top`: top headlines
//! - `tech`/`technology`, `business`, `entertainment`, `sports`, `science`,
//!   `health`, `world`: a topic query
//! - everything in [`SEARCH_CATEGORIES`]: a search over the last day

use itertools::Itertools;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::PipelineConfig;
use crate::models::{NewsRequest, news_path};

/// The trigger name alone, as given on the command line or by CI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Scheduled,
    Pushed,
    Manual,
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "schedule" | "scheduled" => Ok(TriggerKind::Scheduled),
            "push" | "pushed" => Ok(TriggerKind::Pushed),
            "manual" | "workflow_dispatch" => Ok(TriggerKind::Manual),
            other => Err(format!(
                "unknown trigger `{other}` (expected schedule, push or manual)"
            )),
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TriggerKind::Scheduled => "schedule",
            TriggerKind::Pushed => "push",
            TriggerKind::Manual => "manual",
        })
    }
}

/// Steps a manual full run leaves out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipSteps {
    pub fetch: bool,
    pub summarize: bool,
    pub upload: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualRequest {
    /// One ad-hoc fetch.
    Single(NewsRequest),
    /// Everything a scheduled run does, optionally narrowed to `categories`
    /// (empty means the batch) and without the `skip`ped steps.
    FullRun {
        categories: Vec<String>,
        skip: SkipSteps,
    },
}

impl ManualRequest {
    /// A full run of the whole batch.
    pub fn full_run() -> Self {
        ManualRequest::FullRun {
            categories: Vec::new(),
            skip: SkipSteps::default(),
        }
    }
}

/// What started the run, with the manual request when there is one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Scheduled,
    Pushed,
    Manual(ManualRequest),
}

impl Trigger {
    pub fn kind(&self) -> TriggerKind {
        match self {
            Trigger::Scheduled => TriggerKind::Scheduled,
            Trigger::Pushed => TriggerKind::Pushed,
            Trigger::Manual(_) => TriggerKind::Manual,
        }
    }

    /// Resolve the trigger from parsed arguments. A missing or unknown
    /// trigger is manual.
    pub fn from_cli(cli: &Cli, data_dir: &Path) -> Self {
        let kind = cli.trigger_kind();
        match kind {
            TriggerKind::Scheduled | TriggerKind::Pushed => {
                if cli.has_request_fields() || cli.has_full_run_fields() {
                    warn!(%kind, "Ignoring manual request fields for an automatic trigger");
                }
                if kind == TriggerKind::Scheduled {
                    Trigger::Scheduled
                } else {
                    Trigger::Pushed
                }
            }
            TriggerKind::Manual => match cli.news_type {
                None => Trigger::Manual(ManualRequest::FullRun {
                    categories: cli.categories.clone(),
                    skip: SkipSteps {
                        fetch: cli.skip_fetch,
                        summarize: cli.skip_summarize,
                        upload: cli.skip_upload,
                    },
                }),
                Some(news_type) => {
                    if cli.has_full_run_fields() {
                        warn!("Ignoring --categories and --skip-* for a single request");
                    }
                    let output_path = cli.output.clone().unwrap_or_else(|| {
                        let category = NewsRequest::default_category(
                            news_type,
                            cli.topic.as_deref(),
                            cli.query.as_deref(),
                            cli.location.as_deref(),
                        );
                        news_path(data_dir, &category)
                    });
                    Trigger::Manual(ManualRequest::Single(NewsRequest {
                        kind: news_type,
                        topic: cli.topic.clone(),
                        query: cli.query.clone(),
                        when: cli.when.clone(),
                        location: cli.location.clone(),
                        output_path,
                    }))
                }
            },
        }
    }
}

/// Topics the fetch collaborator can query directly. `technology` is
/// written under the `tech` category.
const TOPIC_CATEGORIES: [&str; 7] = [
    "technology",
    "business",
    "entertainment",
    "sports",
    "science",
    "health",
    "world",
];

/// Categories with no topic of their own, fetched as a one-day search.
pub const SEARCH_CATEGORIES: [(&str, &str); 15] = [
    ("trending", "trending"),
    ("politics", "politics news"),
    ("national", "national news"),
    ("india", "India news"),
    ("automobile", "automobile automotive car news"),
    ("startups", "startup business news"),
    ("travel", "travel tourism news"),
    ("fashion", "fashion style news"),
    ("education", "education school university news"),
    ("miscellaneous", "general news"),
    ("scandal", "scandal controversy corruption exposed"),
    ("viral", "viral trending goes viral internet sensation"),
    ("crime", "arrest investigation fraud lawsuit criminal charges"),
    ("celebrity", "celebrity scandal hollywood controversy celebrity drama"),
    ("political_scandal", "political scandal government corruption election fraud"),
];

/// Categories of the scheduled batch, in fetch order.
const BATCH_CATEGORIES: [&str; 9] = [
    "top",
    "tech",
    "business",
    "entertainment",
    "sports",
    "science",
    "health",
    "world",
    "trending",
];

/// Look up how `name` is fetched and where its news file goes.
///
/// # Arguments
///
/// * `name` - Category name, case-insensitive (`tech` and `technology` are the same)
/// * `data_dir` - Directory the `news_<category>.json` file is written to
///
/// # Returns
///
/// The fetch request, or `None` when the catalog doesn't know `name`.
///
/// # Examples
///
/// ```ignore
/// let req = catalog_request("scandal", Path::new("data")).unwrap();
/// assert_eq!(req.query.as_deref(), Some("scandal controversy corruption exposed"));
/// assert_eq!(req.output_path, PathBuf::from("data/news_scandal.json"));
/// ```
pub fn catalog_request(name: &str, data_dir: &Path) -> Option<NewsRequest> {
    let name = name.trim().to_ascii_lowercase();
    match name.as_str() {
        "top" => return Some(NewsRequest::top(news_path(data_dir, "top"))),
        "tech" | "technology" => {
            return Some(NewsRequest::topic("technology", news_path(data_dir, "tech")));
        }
        _ => {}
    }
    if let Some(topic) = TOPIC_CATEGORIES.iter().find(|t| **t == name) {
        return Some(NewsRequest::topic(topic, news_path(data_dir, topic)));
    }
    SEARCH_CATEGORIES
        .iter()
        .find(|(category, _)| *category == name)
        .map(|(category, query)| NewsRequest::search(query, Some("1d"), news_path(data_dir, category)))
}

/// Requests for the named categories, in the order given.
///
/// Unknown names are logged and skipped; a category named twice (say
/// `tech` and `technology`) is fetched once.
pub fn category_requests(names: &[String], data_dir: &Path) -> Vec<NewsRequest> {
    names
        .iter()
        .filter_map(|name| {
            let req = catalog_request(name, data_dir);
            if req.is_none() {
                warn!(category = %name, "Unknown category, skipping");
            }
            req
        })
        .unique_by(|req| req.output_path.clone())
        .collect()
}

/// The fixed batch: top headlines, seven topics and trending searches.
///
/// # Arguments
///
/// * `data_dir` - Directory the `news_<category>.json` files are written to
///
/// # Returns
///
/// Exactly nine requests, identical for scheduled and pushed runs:
/// `top`, `tech`, `business`, `entertainment`, `sports`, `science`,
/// `health`, `world`, `trending`.
pub fn batch_sequence(data_dir: &Path) -> Vec<NewsRequest> {
    BATCH_CATEGORIES
        .iter()
        .filter_map(|name| catalog_request(name, data_dir))
        .collect()
}

/// Stages a trigger runs, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Stages {
        fetch: Vec<NewsRequest>,
        summarize: bool,
        upload: bool,
        /// Categories summarize and the final summary are limited to;
        /// empty means everything in the data directory.
        scope: Vec<String>,
    },
    /// Hand the whole run to the configured entry point.
    FullRunCommand(Vec<String>),
}

/// Map a trigger to the stages it runs.
///
/// # Arguments
///
/// * `trigger` - What started the run
/// * `config` - Supplies the data directory and the optional full-run command
///
/// # Returns
///
/// - schedule and push: the [`batch_sequence`], then summarize and upload
/// - a manual single request: that fetch alone
/// - a manual full run: the configured full-run command (with
///   `--categories` and the skip flags forwarded) when there is one,
///   otherwise the batch or the selected categories, minus skipped steps.
///   A selection that names no known category plans nothing.
pub fn dispatch(trigger: &Trigger, config: &PipelineConfig) -> Plan {
    let plan = match trigger {
        Trigger::Scheduled | Trigger::Pushed => Plan::Stages {
            fetch: batch_sequence(&config.data_dir),
            summarize: true,
            upload: true,
            scope: Vec::new(),
        },
        Trigger::Manual(ManualRequest::Single(req)) => Plan::Stages {
            fetch: vec![req.clone()],
            summarize: false,
            upload: false,
            scope: Vec::new(),
        },
        Trigger::Manual(ManualRequest::FullRun { categories, skip }) => match config.commands.full_run {
            Some(ref cmd) if !cmd.is_empty() => Plan::FullRunCommand(full_run_command(cmd, categories, *skip)),
            _ if categories.is_empty() => Plan::Stages {
                fetch: if skip.fetch { Vec::new() } else { batch_sequence(&config.data_dir) },
                summarize: !skip.summarize,
                upload: !skip.upload,
                scope: Vec::new(),
            },
            _ => {
                let requests = category_requests(categories, &config.data_dir);
                if requests.is_empty() {
                    warn!(?categories, "No known category selected; nothing to run");
                    Plan::Stages { fetch: Vec::new(), summarize: false, upload: false, scope: Vec::new() }
                } else {
                    Plan::Stages {
                        scope: requests.iter().map(NewsRequest::category).collect(),
                        fetch: if skip.fetch { Vec::new() } else { requests },
                        summarize: !skip.summarize,
                        upload: !skip.upload,
                    }
                }
            }
        },
    };
    match plan {
        Plan::Stages { ref fetch, summarize, upload, ref scope } => {
            info!(
                trigger = %trigger.kind(),
                requests = fetch.len(),
                summarize,
                upload,
                scope = %scope.join(","),
                "Dispatched"
            )
        }
        Plan::FullRunCommand(ref cmd) => {
            info!(trigger = %trigger.kind(), command = %cmd.join(" "), "Dispatched full run")
        }
    }
    plan
}

/// The configured entry point with the selection and skips forwarded in
/// its own flag names. It knows `tech` as `technology`.
fn full_run_command(cmd: &[String], categories: &[String], skip: SkipSteps) -> Vec<String> {
    let mut cmd = cmd.to_vec();
    let known: Vec<String> = categories
        .iter()
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| {
            let known = catalog_request(c, Path::new("")).is_some();
            if !known {
                warn!(category = %c, "Unknown category, skipping");
            }
            known
        })
        .map(|c| if c == "tech" { "technology".to_string() } else { c })
        .unique()
        .collect();
    if !known.is_empty() {
        cmd.push("--categories".to_string());
        cmd.extend(known);
    }
    for (skipped, flag) in [
        (skip.fetch, "--skip-fetch"),
        (skip.summarize, "--skip-extract"),
        (skip.upload, "--skip-supabase"),
    ] {
        if skipped {
            cmd.push(flag.to_string());
        }
    }
    cmd
}
