//! HTML scraping of article pages.
//!
//! | Module | Input | Output |
//! |--------|-------|--------|
//! | [`page`] | Rendered or fetched article HTML | [`page::PageDetails`] |
//!
//! Extraction never fails: anything missing from a page is left as `None`
//! and the summarizer degrades around it.

pub mod page;
