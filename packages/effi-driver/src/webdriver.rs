//! WebDriver-backed browser session.
//!
//! Talks to a chromedriver/geckodriver endpoint via fantoccini. Each launch
//! creates a fresh WebDriver session with its own download directory, so
//! concurrent extraction runs never share browser state.
//!
//! WebDriver has no download event, so `await_download` watches the session's
//! download directory for a new file whose size has stopped growing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use tempfile::TempDir;
use tokio::time::Instant;
use tracing::debug;

use crate::surface::{BrowserLauncher, BrowserSession, DownloadedFile, Selector};

/// How often bounded waits re-probe the page or the download directory.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Partial-download extensions the watcher ignores.
const PARTIAL_EXTENSIONS: &[&str] = &["crdownload", "part", "tmp"];

/// Launches WebDriver sessions against a running chromedriver.
pub struct WebDriverLauncher {
    webdriver_url: String,
    headless: bool,
    download_root: PathBuf,
}

impl WebDriverLauncher {
    pub fn new(webdriver_url: impl Into<String>, headless: bool, download_root: PathBuf) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            headless,
            download_root,
        }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        std::fs::create_dir_all(&self.download_root)
            .context("Failed to create download root directory")?;
        let download_dir = TempDir::new_in(&self.download_root)
            .context("Failed to create session download directory")?;

        let mut args = vec![
            "--window-size=1366,768".to_string(),
            "--disable-gpu".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }

        let chrome_options = serde_json::json!({
            "args": args,
            "prefs": {
                "download.default_directory": download_dir.path().to_string_lossy(),
                "download.prompt_for_download": false,
            },
        });
        let mut capabilities = serde_json::map::Map::new();
        capabilities.insert("goog:chromeOptions".to_string(), chrome_options);

        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(&self.webdriver_url)
            .await
            .with_context(|| format!("Failed to connect to WebDriver at {}", self.webdriver_url))?;

        debug!(download_dir = %download_dir.path().display(), "WebDriver session started");

        Ok(Box::new(WebDriverSession {
            client: Some(client),
            download_dir,
        }))
    }
}

/// One live WebDriver session. Dropping it removes the download directory.
pub struct WebDriverSession {
    client: Option<Client>,
    download_dir: TempDir,
}

impl WebDriverSession {
    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or_else(|| anyhow!("Browser session already closed"))
    }

    async fn find_first(&self, selectors: &[Selector]) -> Option<Element> {
        let client = self.client.as_ref()?;
        for selector in selectors {
            let locator = match selector {
                Selector::Css(s) => Locator::Css(s),
                Selector::XPath(s) => Locator::XPath(s),
            };
            if let Ok(element) = client.find(locator).await {
                return Some(element);
            }
        }
        None
    }

    /// List completed (non-partial) files currently in the download dir.
    fn completed_files(&self) -> Result<Vec<(PathBuf, u64)>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(self.download_dir.path())
            .context("Failed to read download directory")?
        {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || is_partial(&path) {
                continue;
            }
            let size = entry.metadata()?.len();
            files.push((path, size));
        }
        Ok(files)
    }
}

fn is_partial(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| PARTIAL_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.client()?
            .goto(url)
            .await
            .with_context(|| format!("Navigation to {url} failed"))
    }

    async fn fill(&mut self, selectors: &[Selector], value: &str) -> Result<()> {
        let element = self
            .find_first(selectors)
            .await
            .ok_or_else(|| anyhow!("No control matched {selectors:?}"))?;
        element.clear().await.context("Failed to clear input")?;
        element
            .send_keys(value)
            .await
            .context("Failed to type into input")
    }

    async fn click(&mut self, selectors: &[Selector]) -> Result<()> {
        let element = self
            .find_first(selectors)
            .await
            .ok_or_else(|| anyhow!("No control matched {selectors:?}"))?;
        element.click().await.context("Click failed")
    }

    async fn wait_visible(&mut self, selectors: &[Selector], timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(element) = self.find_first(selectors).await {
                // Presence counts as visible when the driver can't tell.
                if element.is_displayed().await.unwrap_or(true) {
                    return Ok(true);
                }
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_url_contains(&mut self, fragments: &[String], timeout: Duration) -> Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            let url = self.client()?.current_url().await?;
            let url = url.as_str();
            if fragments.iter().any(|f| url.contains(f.as_str())) {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn await_download(&mut self, timeout: Duration) -> Result<DownloadedFile> {
        let deadline = Instant::now() + timeout;
        let baseline: HashSet<PathBuf> = self
            .completed_files()?
            .into_iter()
            .map(|(path, _)| path)
            .collect();
        let mut last_seen: Option<(PathBuf, u64)> = None;

        loop {
            for (path, size) in self.completed_files()? {
                if baseline.contains(&path) || size == 0 {
                    continue;
                }
                match &last_seen {
                    // Size unchanged across two polls: the download is done.
                    Some((seen_path, seen_size)) if *seen_path == path && *seen_size == size => {
                        let suggested_name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        debug!(file = %path.display(), size, "Download completed");
                        return Ok(DownloadedFile {
                            path,
                            suggested_name,
                            size,
                        });
                    }
                    _ => last_seen = Some((path, size)),
                }
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("No download completed within {timeout:?}"));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.close().await.context("Failed to close WebDriver session")?;
        }
        Ok(())
    }
}
