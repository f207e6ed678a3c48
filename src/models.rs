//! Data models for fetch requests and the files exchanged between stages.
//!
//! - [`NewsRequest`]: one invocation of the fetch collaborator
//! - [`NewsFile`]: what a fetch writes (`news_<category>.json`)
//! - [`InshortsFile`]: what the summarize stage writes (`inshorts_<category>.json`)
//!
//! Field names follow the JSON the collaborator scripts read and write, so
//! files produced by either side stay interchangeable.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::utils::slugify;

/// File name prefix of fetch outputs.
pub const NEWS_PREFIX: &str = "news_";
/// File name prefix of summary outputs.
pub const INSHORTS_PREFIX: &str = "inshorts_";

/// Kind of headline query the fetch collaborator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NewsType {
    Top,
    Topic,
    Search,
    Geo,
}

impl NewsType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewsType::Top => "top",
            NewsType::Topic => "topic",
            NewsType::Search => "search",
            NewsType::Geo => "geo",
        }
    }
}

impl fmt::Display for NewsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single fetch request.
///
/// Only the fields relevant to `kind` are ever forwarded to the fetch
/// collaborator (see [`crate::stages::fetch::fetch_args`]). Irrelevant or
/// missing fields are tolerated here so a sloppy manual request degrades
/// instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsRequest {
    #[serde(rename = "type")]
    pub kind: NewsType,
    pub topic: Option<String>,
    pub query: Option<String>,
    pub when: Option<String>,
    pub location: Option<String>,
    pub output_path: PathBuf,
}

impl NewsRequest {
    pub fn top(output_path: impl Into<PathBuf>) -> Self {
        Self {
            kind: NewsType::Top,
            topic: None,
            query: None,
            when: None,
            location: None,
            output_path: output_path.into(),
        }
    }

    pub fn topic(topic: &str, output_path: impl Into<PathBuf>) -> Self {
        Self {
            topic: Some(topic.to_string()),
            kind: NewsType::Topic,
            ..Self::top(output_path)
        }
    }

    pub fn search(query: &str, when: Option<&str>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            kind: NewsType::Search,
            query: Some(query.to_string()),
            when: when.map(str::to_string),
            ..Self::top(output_path)
        }
    }

    pub fn geo(location: &str, output_path: impl Into<PathBuf>) -> Self {
        Self {
            kind: NewsType::Geo,
            location: Some(location.to_string()),
            ..Self::top(output_path)
        }
    }

    /// Category name this request writes, taken from `news_<category>.json`.
    ///
    /// Falls back to the bare file stem for outputs that don't follow the
    /// naming convention.
    pub fn category(&self) -> String {
        category_from_path(&self.output_path, NEWS_PREFIX).unwrap_or_else(|| {
            self.output_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.kind.as_str().to_string())
        })
    }

    /// Default category for an ad-hoc request that didn't name an output file.
    pub fn default_category(
        kind: NewsType,
        topic: Option<&str>,
        query: Option<&str>,
        location: Option<&str>,
    ) -> String {
        let named = match kind {
            NewsType::Top => None,
            NewsType::Topic => topic,
            NewsType::Search => query,
            NewsType::Geo => location,
        };
        named
            .map(slugify)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| kind.as_str().to_string())
    }
}

/// `<dir>/news_<category>.json`
pub fn news_path(dir: &Path, category: &str) -> PathBuf {
    dir.join(format!("{NEWS_PREFIX}{category}.json"))
}

/// `<dir>/inshorts_<category>.json`
pub fn inshorts_path(dir: &Path, category: &str) -> PathBuf {
    dir.join(format!("{INSHORTS_PREFIX}{category}.json"))
}

/// Extract `<category>` from a `<prefix><category>.json` file name.
pub fn category_from_path(path: &Path, prefix: &str) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let category = name.strip_prefix(prefix)?.strip_suffix(".json")?;
    if category.is_empty() {
        None
    } else {
        Some(category.to_string())
    }
}

/// Fetch output as written by the fetch collaborator.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NewsFile {
    pub metadata: NewsMetadata,
    pub articles: Vec<NewsItem>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NewsMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub info: String,
    pub count: usize,
}

/// One headline in a [`NewsFile`].
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NewsItem {
    pub title: String,
    pub link: Option<String>,
    pub published: String,
    pub summary: String,
    pub source: String,
}

/// Summarize output for one category.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct InshortsFile {
    pub metadata: InshortsMetadata,
    pub articles: Vec<InshortsArticle>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct InshortsMetadata {
    pub source_file: String,
    pub generation_time: String,
    pub total_articles: usize,
}

/// A condensed article. `id` is the upsert key on the remote side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct InshortsArticle {
    pub id: String,
    pub title: String,
    pub source: String,
    pub url: String,
    pub image_url: Option<String>,
    pub summary: String,
    pub published: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_news_type_wire_names() {
        assert_eq!(serde_json::to_string(&NewsType::Geo).unwrap(), "\"geo\"");
        let t: NewsType = serde_json::from_str("\"search\"").unwrap();
        assert_eq!(t, NewsType::Search);
        assert_eq!(NewsType::Topic.to_string(), "topic");
    }

    #[test]
    fn test_request_category_from_output() {
        let req = NewsRequest::topic("technology", "data/news_tech.json");
        assert_eq!(req.category(), "tech");

        let odd = NewsRequest::top("out/headlines.json");
        assert_eq!(odd.category(), "headlines");
    }

    #[test]
    fn test_default_category() {
        assert_eq!(
            NewsRequest::default_category(NewsType::Top, None, None, None),
            "top"
        );
        assert_eq!(
            NewsRequest::default_category(NewsType::Geo, None, None, Some("New York")),
            "new_york"
        );
        // search without query falls back to the type name
        assert_eq!(
            NewsRequest::default_category(NewsType::Search, None, None, None),
            "search"
        );
    }

    #[test]
    fn test_category_from_path() {
        assert_eq!(
            category_from_path(Path::new("data/inshorts_world.json"), INSHORTS_PREFIX),
            Some("world".to_string())
        );
        assert_eq!(
            category_from_path(Path::new("data/news_world.json"), INSHORTS_PREFIX),
            None
        );
        assert_eq!(category_from_path(Path::new("data/news_.json"), NEWS_PREFIX), None);
    }

    #[test]
    fn test_news_file_tolerates_missing_fields() {
        let json = r#"{
            "metadata": {"type": "top", "count": 1},
            "articles": [{"title": "Hello", "extra": 42}]
        }"#;
        let file: NewsFile = serde_json::from_str(json).unwrap();
        assert_eq!(file.metadata.kind, "top");
        assert_eq!(file.articles.len(), 1);
        assert_eq!(file.articles[0].title, "Hello");
        assert!(file.articles[0].link.is_none());
    }

    #[test]
    fn test_inshorts_file_serialization() {
        let file = InshortsFile {
            metadata: InshortsMetadata {
                source_file: "data/news_tech.json".to_string(),
                generation_time: "2025-05-06 08:00:00".to_string(),
                total_articles: 1,
            },
            articles: vec![InshortsArticle {
                id: "abc".to_string(),
                title: "T".to_string(),
                source: "S".to_string(),
                url: "https://example.com".to_string(),
                image_url: None,
                summary: "Short.".to_string(),
                published: String::new(),
            }],
        };
        let json = serde_json::to_string(&file).unwrap();
        assert!(json.contains("\"total_articles\":1"));
        assert!(json.contains("\"image_url\":null"));
    }
}
