//! Headless browser session over the W3C WebDriver protocol.
//!
//! When no remote endpoint is configured a driver (`chromedriver` by
//! default) is spawned with `kill_on_drop`, so even an early return or a
//! panic cannot leave a headless browser running. [`PageSession::close`]
//! deletes the browser session and then kills the driver.

use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::SummarizeConfig;
use crate::error::{PipelineError, Result};
use crate::scrapers::page::{PageDetails, extract_details};
use crate::session::PageSession;

#[derive(Debug)]
pub struct WebDriverSession {
    client: Client,
    base: Url,
    session_id: String,
    driver: Option<Child>,
    pages_loaded: usize,
}

impl WebDriverSession {
    /// Start (or connect to) a driver and create one browser session.
    #[instrument(level = "info", skip_all)]
    pub async fn open(config: &SummarizeConfig) -> Result<Self> {
        let wd = &config.webdriver;
        let client = Client::builder()
            .timeout(Duration::from_millis(wd.page_load_timeout_ms) + Duration::from_secs(10))
            .build()?;

        let (base, driver) = match wd.url {
            Some(ref url) => (base_url(url)?, None),
            None => {
                let child = spawn_driver(&wd.driver_command, wd.port)?;
                (base_url(&format!("http://127.0.0.1:{}", wd.port))?, Some(child))
            }
        };

        wait_until_ready(&client, &base, Duration::from_secs(wd.startup_timeout_secs)).await?;

        let created = send(
            &client,
            Method::POST,
            endpoint(&base, "session")?,
            Some(capabilities(config)),
        )
        .await?;
        let session_id = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::Session("driver returned no sessionId".to_string()))?
            .to_string();
        info!(%session_id, %base, "Browser session created");

        let session = Self {
            client,
            base,
            session_id,
            driver,
            pages_loaded: 0,
        };
        let timeouts = json!({ "pageLoad": wd.page_load_timeout_ms });
        if let Err(e) = session.call(Method::POST, "timeouts", Some(timeouts)).await {
            let _ = session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    async fn call(&self, method: Method, command: &str, body: Option<Value>) -> Result<Value> {
        let path = format!("session/{}/{}", self.session_id, command);
        send(&self.client, method, endpoint(&self.base, &path)?, body).await
    }
}

impl PageSession for WebDriverSession {
    #[instrument(level = "info", skip(self))]
    async fn load(&mut self, url: &str) -> Result<PageDetails> {
        self.call(Method::POST, "url", Some(json!({ "url": url }))).await?;
        let resolved = self
            .call(Method::GET, "url", None)
            .await?
            .as_str()
            .unwrap_or(url)
            .to_string();
        let html = self.call(Method::GET, "source", None).await?;
        let html = html.as_str().unwrap_or_default();
        self.pages_loaded += 1;
        debug!(%resolved, bytes = html.len(), "Loaded page");
        Ok(extract_details(html, &resolved))
    }

    async fn close(mut self) -> Result<()> {
        let path = format!("session/{}", self.session_id);
        match endpoint(&self.base, &path) {
            Ok(url) => {
                if let Err(e) = send(&self.client, Method::DELETE, url, None).await {
                    warn!(error = %e, "Failed to delete browser session");
                }
            }
            Err(e) => warn!(error = %e, "Bad session endpoint"),
        }
        if let Some(mut child) = self.driver.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to stop WebDriver process");
            }
        }
        info!(pages_loaded = self.pages_loaded, "Browser session closed");
        Ok(())
    }
}

fn base_url(url: &str) -> Result<Url> {
    let with_slash = if url.ends_with('/') {
        url.to_string()
    } else {
        format!("{url}/")
    };
    Url::parse(&with_slash)
        .map_err(|e| PipelineError::Config(format!("invalid WebDriver URL {url}: {e}")))
}

fn endpoint(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| PipelineError::Session(format!("invalid endpoint {path}: {e}")))
}

fn spawn_driver(command: &[String], port: u16) -> Result<Child> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| PipelineError::Config("webdriver.driver_command is empty".to_string()))?;
    let child = Command::new(program)
        .args(args)
        .arg(format!("--port={port}"))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| PipelineError::Spawn {
            program: program.clone(),
            source,
        })?;
    info!(%program, port, "WebDriver process started");
    Ok(child)
}

async fn wait_until_ready(client: &Client, base: &Url, limit: Duration) -> Result<()> {
    let status_url = endpoint(base, "status")?;
    let t0 = Instant::now();
    loop {
        match send(client, Method::GET, status_url.clone(), None).await {
            Ok(value) if value.get("ready").and_then(Value::as_bool).unwrap_or(false) => {
                debug!(elapsed_ms = t0.elapsed().as_millis(), "WebDriver ready");
                return Ok(());
            }
            Ok(_) => debug!("WebDriver not ready yet"),
            Err(e) => debug!(error = %e, "WebDriver not reachable yet"),
        }
        if t0.elapsed() >= limit {
            return Err(PipelineError::Session(format!(
                "WebDriver at {base} not ready after {}s",
                limit.as_secs()
            )));
        }
        sleep(Duration::from_millis(250)).await;
    }
}

/// Issue one WebDriver command and unwrap its `value`.
async fn send(client: &Client, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
    let mut req = client.request(method, url);
    if let Some(body) = body {
        req = req.json(&body);
    }
    let resp = req.send().await?;
    let status = resp.status();
    let payload: Value = resp.json().await?;
    let value = payload.get("value").cloned().unwrap_or(Value::Null);
    if !status.is_success() {
        let error = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
        let message = value.get("message").and_then(Value::as_str).unwrap_or_default();
        return Err(PipelineError::Session(format!("{status} {error}: {message}")));
    }
    Ok(value)
}

fn capabilities(config: &SummarizeConfig) -> Value {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-extensions".to_string(),
        "--disable-popup-blocking".to_string(),
        "--disable-notifications".to_string(),
        "--mute-audio".to_string(),
        "--no-first-run".to_string(),
        format!("--user-agent={}", config.user_agent),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": { "args": args }
            }
        }
    })
}
