//! Plain HTTP page session.
//!
//! One `reqwest` client (connection pool, cookies off) is shared by every
//! page load of the stage. Redirects are followed and the final URL becomes
//! the article's resolved URL.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::config::SummarizeConfig;
use crate::error::{PipelineError, Result};
use crate::scrapers::page::{PageDetails, extract_details};
use crate::session::PageSession;

#[derive(Debug)]
pub struct HttpSession {
    client: Client,
    pages_loaded: usize,
}

impl HttpSession {
    pub fn new(config: &SummarizeConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.article_timeout_secs.max(1)))
            .build()?;
        Ok(Self {
            client,
            pages_loaded: 0,
        })
    }
}

impl PageSession for HttpSession {
    #[instrument(level = "info", skip(self))]
    async fn load(&mut self, url: &str) -> Result<PageDetails> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(PipelineError::Session(format!("{url} returned {status}")));
        }
        let resolved = resp.url().to_string();
        let html = resp.text().await?;
        self.pages_loaded += 1;
        debug!(%resolved, bytes = html.len(), "Loaded page");
        Ok(extract_details(&html, &resolved))
    }

    async fn close(self) -> Result<()> {
        info!(pages_loaded = self.pages_loaded, "HTTP session closed");
        Ok(())
    }
}
