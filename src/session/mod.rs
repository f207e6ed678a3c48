//! Page sessions used by the built-in summarizer.
//!
//! A session is opened once per summarize stage and handed explicitly to
//! every per-article load. Whoever opens it must call
//! [`PageSession::close`] on every exit path; browser-backed sessions also
//! kill their driver process when dropped.
//!
//! | Kind | Module | Notes |
//! |------|--------|-------|
//! | HTTP | [`http`] | Shared `reqwest` client, no JavaScript |
//! | WebDriver | [`webdriver`] | Headless Chrome through a local or remote driver |

pub mod http;
pub mod webdriver;

use tracing::info;

use crate::config::{SessionKind, SummarizeConfig};
use crate::error::Result;
use crate::scrapers::page::PageDetails;

pub use http::HttpSession;
pub use webdriver::WebDriverSession;

/// A reusable handle that loads article pages.
pub trait PageSession {
    /// Load `url` and extract its details.
    async fn load(&mut self, url: &str) -> Result<PageDetails>;

    /// Release the session and anything it spawned.
    async fn close(self) -> Result<()>;
}

/// The session kinds selectable from configuration.
#[derive(Debug)]
pub enum AnySession {
    Http(HttpSession),
    WebDriver(WebDriverSession),
}

impl AnySession {
    /// Open the session kind named in `config`.
    pub async fn open(config: &SummarizeConfig) -> Result<Self> {
        let session = match config.session {
            SessionKind::Http => AnySession::Http(HttpSession::new(config)?),
            SessionKind::Webdriver => AnySession::WebDriver(WebDriverSession::open(config).await?),
        };
        info!(kind = ?config.session, headless = config.headless, "Page session opened");
        Ok(session)
    }
}

impl PageSession for AnySession {
    async fn load(&mut self, url: &str) -> Result<PageDetails> {
        match self {
            AnySession::Http(s) => s.load(url).await,
            AnySession::WebDriver(s) => s.load(url).await,
        }
    }

    async fn close(self) -> Result<()> {
        match self {
            AnySession::Http(s) => s.close().await,
            AnySession::WebDriver(s) => s.close().await,
        }
    }
}
