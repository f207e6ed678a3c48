//! Hosted database uploads.
//!
//! [`RecordSink`] is the seam the upload stage writes through;
//! [`SupabaseClient`] implements it against a PostgREST endpoint, upserting
//! each [`InshortsArticle`] keyed on its `id`.

use futures::stream::{self, StreamExt};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use url::Url;

use crate::error::{PipelineError, Result};
use crate::models::{InshortsArticle, InshortsFile};
use crate::report::{Stage, StageReport, StageStatus};
use crate::retry::RetryPolicy;
use crate::utils::truncate_for_log;

/// Destination for condensed articles.
pub trait RecordSink {
    /// Insert `record`, or replace the existing record with the same `id`.
    async fn upsert(&self, record: &InshortsArticle) -> Result<()>;
}

impl<S: RecordSink> RecordSink for &S {
    async fn upsert(&self, record: &InshortsArticle) -> Result<()> {
        (**self).upsert(record).await
    }
}

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    client: Client,
    endpoint: Url,
}

impl SupabaseClient {
    /// `base_url` is the project URL (`https://<ref>.supabase.co`), `key` the
    /// service key sent as both `apikey` and bearer token.
    pub fn new(base_url: &str, key: &str, table: &str, timeout: Duration) -> Result<Self> {
        if base_url.trim().is_empty() || key.trim().is_empty() {
            return Err(PipelineError::Config(
                "SUPABASE_URL and SUPABASE_KEY must be set for the built-in uploader".to_string(),
            ));
        }
        let endpoint = Url::parse(&format!(
            "{}/rest/v1/{}?on_conflict=id",
            base_url.trim_end_matches('/'),
            urlencoding::encode(table)
        ))
        .map_err(|e| PipelineError::Config(format!("invalid SUPABASE_URL: {e}")))?;

        let mut headers = HeaderMap::new();
        let key_value = |v: String| {
            let mut hv = HeaderValue::from_str(&v)
                .map_err(|_| PipelineError::Config("SUPABASE_KEY is not a valid header value".to_string()))?;
            hv.set_sensitive(true);
            Ok::<_, PipelineError>(hv)
        };
        headers.insert("apikey", key_value(key.to_string())?);
        headers.insert(AUTHORIZATION, key_value(format!("Bearer {key}"))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("prefer", HeaderValue::from_static("resolution=merge-duplicates,return=minimal"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl RecordSink for SupabaseClient {
    #[instrument(level = "debug", skip_all, fields(id = %record.id))]
    async fn upsert(&self, record: &InshortsArticle) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(record)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            debug!(%status, "Upserted");
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(PipelineError::Rejected {
            status: status.as_u16(),
            body: truncate_for_log(body.trim(), 300),
        })
    }
}

/// Upsert every entry of every summary file through `sink`.
///
/// Entries go one at a time, each under `retry`. Rejections the server
/// won't change its mind about (4xx other than 408 and 429) are not retried.
///
/// # Arguments
///
/// * `sink` - Where records go
/// * `files` - `(category, inshorts_<category>.json)` pairs
/// * `retry` - Policy applied to each entry
///
/// # Returns
///
/// An upload [`StageReport`] with one outcome per file. A file counts as
/// uploaded only when all of its entries were; any failed file fails the
/// stage.
#[instrument(level = "info", skip_all, fields(files = files.len()))]
pub async fn upload_files<S: RecordSink>(
    sink: &S,
    files: &[(String, PathBuf)],
    retry: &RetryPolicy,
) -> StageReport {
    let mut report = StageReport::new(Stage::Upload);
    for (category, path) in files {
        match upload_file(sink, path, retry).await {
            Ok(count) => {
                info!(%category, count, "Uploaded category");
                report.record_success();
            }
            Err(e) => {
                error!(%category, error = %e, "Upload failed");
                report.record_failure(category.clone(), &e);
            }
        }
    }
    let mut report = report.finish();
    if !report.failed.is_empty() {
        report.status = StageStatus::Failed;
    }
    report
}

async fn upload_file<S: RecordSink>(sink: &S, path: &Path, retry: &RetryPolicy) -> Result<usize> {
    let text = tokio::fs::read_to_string(path).await?;
    let file: InshortsFile = serde_json::from_str(&text)?;

    let results: Vec<Result<()>> = stream::iter(file.articles.iter())
        .then(|article| async move {
            let label = format!("upsert {}", article.id);
            retry.run(&label, || sink.upsert(article)).await
        })
        .collect()
        .await;

    let total = results.len();
    let failures = results.into_iter().filter_map(|r| r.err()).collect::<Vec<_>>();
    match failures.first() {
        None => Ok(total),
        Some(first) => Err(PipelineError::Upload(format!(
            "{} of {total} entries failed in {}; first: {first}",
            failures.len(),
            path.display()
        ))),
    }
}
