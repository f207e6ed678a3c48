//! Article page extraction.
//!
//! Given the HTML of a loaded article page, pull out what a digest card
//! needs: a lead image, the page title, a short description and a plain-text
//! excerpt of the body.
//!
//! # Image priority
//!
//! `og:image` → `twitter:image` → largest absolute `<img>` by declared area.
//!
//! # Description priority
//!
//! `meta[name=description]` → `og:description` → first paragraph longer
//! than 50 characters.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::utils::truncate_with_ellipsis;

/// Shown when no image could be extracted from a page.
pub const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300x150?text=No+Image";

const DESCRIPTION_MAX_CHARS: usize = 500;
const EXCERPT_MAX_CHARS: usize = 1000;
const MIN_PARAGRAPH_CHARS: usize = 50;

static OG_IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).unwrap());
static TWITTER_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="twitter:image"]"#).unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src]").unwrap());
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).unwrap());
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:description"]"#).unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// What was extracted from one article page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDetails {
    /// URL after redirects.
    pub resolved_url: Option<String>,
    pub image_url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub text_excerpt: Option<String>,
}

impl PageDetails {
    /// Details used when a page could not be loaded at all.
    pub fn placeholder() -> Self {
        Self {
            image_url: Some(PLACEHOLDER_IMAGE.to_string()),
            ..Self::default()
        }
    }
}

/// Extract [`PageDetails`] from `html` served at `resolved_url`.
pub fn extract_details(html: &str, resolved_url: &str) -> PageDetails {
    let document = Html::parse_document(html);
    let base = Url::parse(resolved_url).ok();

    let image_url = meta_content(&document, &OG_IMAGE)
        .or_else(|| meta_content(&document, &TWITTER_IMAGE))
        .and_then(|src| absolutize(base.as_ref(), &src))
        .or_else(|| largest_image(&document));

    let title = document
        .select(&TITLE)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let description = meta_content(&document, &META_DESCRIPTION)
        .or_else(|| meta_content(&document, &OG_DESCRIPTION))
        .or_else(|| first_long_paragraph(&document))
        .map(|d| truncate_with_ellipsis(&d, DESCRIPTION_MAX_CHARS));

    let text_excerpt = document
        .select(&BODY)
        .next()
        .map(visible_text)
        .filter(|t| !t.is_empty())
        .map(|t| truncate_with_ellipsis(&t, EXCERPT_MAX_CHARS));

    debug!(
        url = resolved_url,
        has_image = image_url.is_some(),
        has_description = description.is_some(),
        "Extracted page details"
    );

    PageDetails {
        resolved_url: Some(resolved_url.to_string()),
        image_url,
        title,
        description,
        text_excerpt,
    }
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|m| m.value().attr("content"))
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

fn absolutize(base: Option<&Url>, src: &str) -> Option<String> {
    match Url::parse(src) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.and_then(|b| b.join(src).ok()).map(|u| u.to_string()),
    }
}

/// First absolute `<img>` with the largest `width * height`; images without
/// usable dimensions count as zero area.
fn largest_image(document: &Html) -> Option<String> {
    let mut best: Option<(&str, u64)> = None;
    for img in document.select(&IMG) {
        let Some(src) = img.value().attr("src") else {
            continue;
        };
        if !(src.starts_with("http://") || src.starts_with("https://")) {
            continue;
        }
        let dim = |name: &str| img.value().attr(name).and_then(|v| v.trim().parse::<u64>().ok());
        let area = match (dim("width"), dim("height")) {
            (Some(w), Some(h)) => w.saturating_mul(h),
            _ => 0,
        };
        if best.is_none_or(|(_, a)| area > a) {
            best = Some((src, area));
        }
    }
    best.map(|(src, _)| src.to_string())
}

fn first_long_paragraph(document: &Html) -> Option<String> {
    document
        .select(&PARAGRAPH)
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .find(|t| t.chars().count() > MIN_PARAGRAPH_CHARS)
}

/// Text of `root` one text node per line, skipping scripts and styles.
fn visible_text(root: ElementRef<'_>) -> String {
    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
        });
        let text = text.trim();
        if !hidden && !text.is_empty() {
            lines.push(collapse_whitespace(text));
        }
    }
    lines.join("\n")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
