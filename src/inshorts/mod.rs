//! Built-in Inshorts generator.
//!
//! Turns each `news_<category>.json` into `inshorts_<category>.json`:
//! the first `max_articles` headlines are loaded through the shared
//! [`PageSession`], condensed with [`summary::generate_summary`] and written
//! with a stable `id`.
//!
//! A page that fails to load or times out gets placeholder details and still
//! produces an entry. A category whose input can't be read or whose output
//! can't be written is recorded as failed; the other categories go on.

pub mod summary;

use chrono::Local;
use itertools::Itertools;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{error, info, instrument, warn};

use crate::config::SummarizeConfig;
use crate::error::{PipelineError, Result};
use crate::models::{InshortsArticle, InshortsFile, InshortsMetadata, NewsFile, NewsItem, inshorts_path};
use crate::outputs::json::write_json_pretty;
use crate::report::{Stage, StageReport};
use crate::scrapers::page::PageDetails;
use crate::session::PageSession;
use summary::{NO_CONTENT, article_id, generate_summary};

const UNKNOWN_TITLE: &str = "Unknown Title";
const UNKNOWN_SOURCE: &str = "Unknown Source";

/// Generate summaries for every `(category, news file)` pair, in order.
///
/// The caller owns `session` and closes it afterwards.
#[instrument(level = "info", skip_all, fields(categories = inputs.len()))]
pub async fn generate_all<S: PageSession>(
    session: &mut S,
    inputs: &[(String, PathBuf)],
    output_dir: &Path,
    config: &SummarizeConfig,
) -> StageReport {
    let mut report = StageReport::new(Stage::Summarize);
    for (category, input) in inputs {
        let output = inshorts_path(output_dir, category);
        match generate_category(session, input, &output, config).await {
            Ok(count) => {
                info!(%category, count, output = %output.display(), "Category summarized");
                report.record_success();
            }
            Err(e) => {
                error!(%category, error = %e, "Category failed");
                report.record_failure(category.clone(), &e);
            }
        }
    }
    report.finish()
}

/// Summarize one news file into `output`.
///
/// Takes the first `config.max_articles` headlines, skips those without a
/// link and loads each page through `session`. A page that fails or times
/// out still yields an entry, built from the headline alone. Entries are
/// deduplicated by id before writing.
///
/// # Arguments
///
/// * `session` - Open page session, shared across categories
/// * `input` - A `news_<category>.json` file
/// * `output` - Where the `inshorts_<category>.json` file is written
/// * `config` - Cap, per-article timeout, delay and summary length
///
/// # Returns
///
/// The number of entries written, or an error when `input` can't be read
/// or `output` can't be written.
pub async fn generate_category<S: PageSession>(
    session: &mut S,
    input: &Path,
    output: &Path,
    config: &SummarizeConfig,
) -> Result<usize> {
    let text = tokio::fs::read_to_string(input).await?;
    let news: NewsFile = serde_json::from_str(&text)
        .map_err(|e| PipelineError::Summarize(format!("{}: {e}", input.display())))?;

    let selected = news.articles.iter().take(config.max_articles).collect::<Vec<_>>();
    info!(
        input = %input.display(),
        available = news.articles.len(),
        selected = selected.len(),
        max = config.max_articles,
        "Processing articles"
    );

    let delay = Duration::from_millis(config.article_delay_ms);
    let mut articles = Vec::with_capacity(selected.len());
    for (i, item) in selected.iter().enumerate() {
        let Some(link) = item.link.as_deref().filter(|l| !l.trim().is_empty()) else {
            warn!(title = %item.title, "Article has no link; skipping");
            continue;
        };
        if i > 0 && !delay.is_zero() {
            sleep(delay).await;
        }
        articles.push(condense(session, item, link, config).await);
    }

    let articles: Vec<InshortsArticle> = articles.into_iter().unique_by(|a| a.id.clone()).collect();
    let file = InshortsFile {
        metadata: InshortsMetadata {
            source_file: input.display().to_string(),
            generation_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            total_articles: articles.len(),
        },
        articles,
    };
    write_json_pretty(output, &file).await?;
    Ok(file.articles.len())
}

async fn condense<S: PageSession>(
    session: &mut S,
    item: &NewsItem,
    link: &str,
    config: &SummarizeConfig,
) -> InshortsArticle {
    let title = non_empty_or(&item.title, UNKNOWN_TITLE);
    let source = non_empty_or(&item.source, UNKNOWN_SOURCE);

    let limit = Duration::from_secs(config.article_timeout_secs.max(1));
    let details = match timeout(limit, session.load(link)).await {
        Ok(Ok(details)) => details,
        Ok(Err(e)) => {
            warn!(url = link, error = %e, "Page load failed; using placeholder");
            PageDetails::placeholder()
        }
        Err(_) => {
            warn!(url = link, secs = limit.as_secs(), "Page load timed out; using placeholder");
            PageDetails::placeholder()
        }
    };

    let summary = match details.text_excerpt.as_deref().or(details.description.as_deref()) {
        Some(text) => generate_summary(text, config.summary_length),
        None => NO_CONTENT.to_string(),
    };

    InshortsArticle {
        id: article_id(link, &title, &source),
        url: details.resolved_url.unwrap_or_else(|| link.to_string()),
        image_url: details.image_url,
        summary,
        published: item.published.clone(),
        title,
        source,
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}
