//! Browser-automation surface traits.
//!
//! The extraction workflow in the server drives a third-party web UI through
//! these primitives. Implementations own the browser lifecycle; callers get
//! one isolated session per `launch()` and must `close()` it on every exit
//! path.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

/// A single element locator. Controls are addressed by a list of these so
/// that the workflow survives front-end changes (id first, then a
/// role/text-based XPath fallback).
#[derive(Debug, Clone)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    pub fn css(s: &str) -> Self {
        Selector::Css(s.to_string())
    }

    pub fn xpath(s: &str) -> Self {
        Selector::XPath(s.to_string())
    }
}

/// Locator lists for every control the export workflow touches.
///
/// The defaults match the Effi UI. Deployments integrating a variant UI can
/// override individual lists instead of patching the workflow.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub login_email: Vec<Selector>,
    pub login_password: Vec<Selector>,
    pub login_submit: Vec<Selector>,
    /// URL fragments that signal a successful login.
    pub post_login_urls: Vec<String>,
    pub export_button: Vec<Selector>,
    pub modal_confirm: Vec<Selector>,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            login_email: vec![
                Selector::css("#email"),
                Selector::css("input[name='email']"),
                Selector::css("input[type='email']"),
            ],
            login_password: vec![
                Selector::css("#password"),
                Selector::css("input[name='password']"),
                Selector::css("input[type='password']"),
            ],
            login_submit: vec![
                Selector::css("button[type='submit']"),
                Selector::xpath(
                    "//button[contains(translate(., 'INGRESAR', 'ingresar'), 'ingresar')]",
                ),
            ],
            post_login_urls: vec![
                "agenda".to_string(),
                "home".to_string(),
                "app".to_string(),
            ],
            export_button: vec![
                Selector::css("#toExcel"),
                Selector::xpath(
                    "//button[contains(translate(., 'EXPORTAR A EXCEL', 'exportar a excel'), 'exportar a excel')]",
                ),
            ],
            modal_confirm: vec![
                Selector::css("#btnValidarExcel"),
                Selector::xpath(
                    "//div[contains(@class, 'modal')]//button[contains(translate(., 'EXPORTAR', 'exportar'), 'exportar')]",
                ),
            ],
        }
    }
}

/// A completed browser download.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Where the browser wrote the file. Valid until the session closes.
    pub path: PathBuf,
    /// Filename the server suggested via Content-Disposition.
    pub suggested_name: String,
    pub size: u64,
}

/// One isolated browser session.
///
/// All waits are bounded by the caller-supplied timeout; primitives never
/// hang indefinitely. `wait_visible` reports absence as `Ok(false)` so the
/// workflow can branch on it, while hard driver failures surface as `Err`.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to an absolute URL.
    async fn goto(&mut self, url: &str) -> Result<()>;

    /// Fill the first control matching one of `selectors` with `value`.
    async fn fill(&mut self, selectors: &[Selector], value: &str) -> Result<()>;

    /// Click the first control matching one of `selectors`.
    async fn click(&mut self, selectors: &[Selector]) -> Result<()>;

    /// Wait for any of `selectors` to become visible.
    async fn wait_visible(&mut self, selectors: &[Selector], timeout: Duration) -> Result<bool>;

    /// Wait until the current URL contains any of `fragments`.
    async fn wait_url_contains(&mut self, fragments: &[String], timeout: Duration) -> Result<bool>;

    /// Wait for a download triggered by a prior click to complete.
    async fn await_download(&mut self, timeout: Duration) -> Result<DownloadedFile>;

    /// Tear down the session and its browser resources.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for browser sessions. One `launch()` per extraction run; sessions
/// are never shared across runs, so credentials cannot bleed between tenants.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>>;
}
