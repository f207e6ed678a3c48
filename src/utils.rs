//! Small helpers shared by the stages: string trimming for logs and
//! payloads, category slugs and data directory scanning.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs as stdfs;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::models::category_from_path;

static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Lowercase `s` and squash every run of non-alphanumerics into `_`.
///
/// ```ignore
/// assert_eq!(slugify("New York"), "new_york");
/// ```
pub fn slugify(s: &str) -> String {
    NON_SLUG
        .replace_all(&s.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// Largest index `<= max` that lies on a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a char boundary) with
/// `"…(+N bytes)"` appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let end = floor_char_boundary(s, max);
        format!("{}…(+{} bytes)", &s[..end], s.len() - end)
    }
}

/// Keep the first `max` characters of `s`, appending `...` when cut.
pub fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!("Data directory is writable");
    Ok(())
}

/// List `<prefix><category>.json` files in `dir`, sorted by category.
///
/// A missing directory yields an empty list.
pub async fn list_category_files(dir: &Path, prefix: &str) -> Result<Vec<(String, PathBuf)>> {
    let mut found = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "Directory does not exist");
            return Ok(found);
        }
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(category) = category_from_path(&path, prefix) {
            found.push((category, path));
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{INSHORTS_PREFIX, NEWS_PREFIX};

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        // 'é' is two bytes; cutting at 1 must not split it
        let result = truncate_for_log("éé", 1);
        assert_eq!(result, "…(+4 bytes)");
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("abcdef", 3), "abc...");
        assert_eq!(truncate_with_ellipsis("abc", 3), "abc");
        assert_eq!(truncate_with_ellipsis("ééé", 2), "éé...");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("New York"), "new_york");
        assert_eq!(slugify("  Trending!! News "), "trending_news");
        assert_eq!(slugify("---"), "");
    }

    #[tokio::test]
    async fn test_list_category_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["news_world.json", "news_tech.json", "inshorts_tech.json", "notes.txt"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        std::fs::create_dir(dir.path().join("news_dir.json")).unwrap();

        let news = list_category_files(dir.path(), NEWS_PREFIX).await.unwrap();
        let names: Vec<_> = news.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(names, vec!["tech", "world"]);

        let inshorts = list_category_files(dir.path(), INSHORTS_PREFIX).await.unwrap();
        assert_eq!(inshorts.len(), 1);
    }

    #[tokio::test]
    async fn test_list_category_files_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(list_category_files(&missing, NEWS_PREFIX).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_writable_dir_creates() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b");
        ensure_writable_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join("..__probe_write__").exists());
    }
}
