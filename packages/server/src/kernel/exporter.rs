//! Extraction state machine for the Effi guide export.
//!
//! Drives a browser session through login → filtered listing → export →
//! confirmation modal → download → validation → save. Every step has its own
//! timeout; exceeding any bound fails the run. There is no internal retry:
//! repeated automated logins against the third-party surface risk account
//! lockout, so a failed run surfaces as a job error and the caller decides.
//!
//! The session is torn down on every exit path, success or failure.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::{Months, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;
use tracing::warn;

use effi_driver::{BrowserLauncher, BrowserSession, DownloadedFile, Selectors};

use crate::kernel::stores::StoreCredential;

/// Post-login URL wait.
const LOGIN_TIMEOUT: Duration = Duration::from_secs(20);
/// Export-trigger visibility wait.
const EXPORT_BUTTON_TIMEOUT: Duration = Duration::from_secs(20);
/// Confirmation-modal visibility wait.
const MODAL_TIMEOUT: Duration = Duration::from_secs(30);
/// Server-side report generation can take minutes.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
/// Anything smaller is a truncated download or an error page.
const MIN_ARTIFACT_BYTES: u64 = 1024;

/// Date format the Effi listing filter expects.
pub const EFFI_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Login did not reach a post-login page within {LOGIN_TIMEOUT:?}")]
    Login,

    #[error("Export control did not become visible within {EXPORT_BUTTON_TIMEOUT:?}")]
    ExportControl,

    #[error("Export confirmation modal did not appear within {MODAL_TIMEOUT:?}")]
    ModalNotFound,

    #[error("Download did not complete: {0}")]
    Download(String),

    #[error("Downloaded file is too small ({size} bytes); possible incomplete download")]
    IncompleteDownload { size: u64 },

    #[error(transparent)]
    Surface(#[from] anyhow::Error),
}

/// Workflow states, in order. `Failed` is reachable from any of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Init,
    LoggedIn,
    ListLoaded,
    ExportRequested,
    ModalConfirmed,
    Downloaded,
    Validated,
    Saved,
    Failed,
}

/// A date-range bound: either a typed datetime or a caller-preformatted
/// string, both normalized to [`EFFI_DATE_FORMAT`] on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateParam {
    At(NaiveDateTime),
    Raw(String),
}

impl DateParam {
    /// Parse a query value. Accepts `YYYY-MM-DD HH:mm:ss` or a bare
    /// `YYYY-MM-DD` (midnight); anything else passes through verbatim.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, EFFI_DATE_FORMAT) {
            return DateParam::At(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return DateParam::At(date.and_hms_opt(0, 0, 0).unwrap_or(NaiveDateTime::MIN));
        }
        DateParam::Raw(s.to_string())
    }

    pub fn to_effi_str(&self) -> String {
        match self {
            DateParam::At(dt) => dt.format(EFFI_DATE_FORMAT).to_string(),
            DateParam::Raw(s) => s.clone(),
        }
    }
}

/// Default range for a run with no explicit bounds: the trailing month ending
/// today, end-of-day inclusive.
pub fn default_date_range(today: NaiveDate) -> (DateParam, DateParam) {
    let hasta = today.and_hms_opt(23, 59, 59).unwrap_or(NaiveDateTime::MIN);
    let desde = today
        .checked_sub_months(Months::new(1))
        .unwrap_or(today)
        .and_hms_opt(0, 0, 0)
        .unwrap_or(NaiveDateTime::MIN);
    (DateParam::At(desde), DateParam::At(hasta))
}

/// One export run against the Effi UI.
pub struct ExportMachine {
    base_url: String,
    work_dir: PathBuf,
    selectors: Selectors,
    modal_required: bool,
    state: ExportState,
}

impl ExportMachine {
    pub fn new(base_url: impl Into<String>, work_dir: PathBuf, modal_required: bool) -> Self {
        Self {
            base_url: base_url.into(),
            work_dir,
            selectors: Selectors::default(),
            modal_required,
            state: ExportState::Init,
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    /// Run the full workflow and return the saved artifact path.
    ///
    /// Opens a fresh session (no reuse across runs) and closes it on every
    /// exit path. Progress messages go to `progress`; the sink must not
    /// fail, and nothing here depends on it succeeding.
    pub async fn run(
        &mut self,
        launcher: &dyn BrowserLauncher,
        credential: &StoreCredential,
        desde: &DateParam,
        hasta: &DateParam,
        progress: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<PathBuf, ExportError> {
        progress("Starting browser session");
        let mut session = launcher.launch().await?;

        let result = self
            .drive(session.as_mut(), credential, desde, hasta, progress)
            .await;

        if let Err(e) = session.close().await {
            warn!(error = %e, "Browser session teardown failed");
        }
        if result.is_err() {
            self.state = ExportState::Failed;
        }
        result
    }

    async fn drive(
        &mut self,
        session: &mut dyn BrowserSession,
        credential: &StoreCredential,
        desde: &DateParam,
        hasta: &DateParam,
        progress: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<PathBuf, ExportError> {
        // Init -> LoggedIn
        progress("Navigating to login page");
        session.goto(&format!("{}/ingreso", self.base_url)).await?;
        progress("Submitting credentials");
        session
            .fill(&self.selectors.login_email, &credential.username)
            .await?;
        session
            .fill(&self.selectors.login_password, &credential.password)
            .await?;
        session.click(&self.selectors.login_submit).await?;
        progress("Waiting for post-login page");
        if !session
            .wait_url_contains(&self.selectors.post_login_urls, LOGIN_TIMEOUT)
            .await?
        {
            return Err(ExportError::Login);
        }
        self.advance(ExportState::LoggedIn, progress);

        // LoggedIn -> ListLoaded
        let list_url = format!(
            "{}/app/guia_transporte?desde={}&hasta={}",
            self.base_url,
            urlencoding::encode(&desde.to_effi_str()),
            urlencoding::encode(&hasta.to_effi_str()),
        );
        progress(&format!("Opening guide listing: {list_url}"));
        session.goto(&list_url).await?;
        self.advance(ExportState::ListLoaded, progress);

        // ListLoaded -> ExportRequested
        if !session
            .wait_visible(&self.selectors.export_button, EXPORT_BUTTON_TIMEOUT)
            .await?
        {
            return Err(ExportError::ExportControl);
        }
        progress("Requesting export");
        session.click(&self.selectors.export_button).await?;
        self.advance(ExportState::ExportRequested, progress);

        // ExportRequested -> ModalConfirmed (or straight to download when the
        // deployment opts out of the modal requirement). Waiting for the
        // modal click, not the first click, keeps a single download source.
        if session
            .wait_visible(&self.selectors.modal_confirm, MODAL_TIMEOUT)
            .await?
        {
            progress("Confirming export in modal");
            session.click(&self.selectors.modal_confirm).await?;
            self.advance(ExportState::ModalConfirmed, progress);
        } else if self.modal_required {
            return Err(ExportError::ModalNotFound);
        } else {
            progress("No confirmation modal; awaiting download from first click");
        }

        // -> Downloaded
        let download = session
            .await_download(DOWNLOAD_TIMEOUT)
            .await
            .map_err(|e| ExportError::Download(e.to_string()))?;
        self.advance(ExportState::Downloaded, progress);

        // Downloaded -> Validated
        if download.size < MIN_ARTIFACT_BYTES {
            return Err(ExportError::IncompleteDownload {
                size: download.size,
            });
        }
        self.advance(ExportState::Validated, progress);

        // Validated -> Saved
        let saved = self.persist(&download, &credential.name)?;
        self.advance(ExportState::Saved, progress);
        progress(&format!("Export complete: {}", saved.display()));
        Ok(saved)
    }

    /// Move the artifact into the working directory under a deterministic
    /// name (store + timestamp), falling back to the browser-suggested name
    /// when the store is unknown.
    fn persist(&self, download: &DownloadedFile, store: &str) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(&self.work_dir)
            .context("Failed to create working directory")?;

        let file_name = if store.is_empty() {
            let suggested = download.suggested_name.trim();
            if suggested.is_empty() {
                format!("guias_transporte_{}.xlsx", Utc::now().timestamp_millis())
            } else {
                suggested.to_string()
            }
        } else {
            format!("{}_{}.xlsx", store, Utc::now().timestamp_millis())
        };

        let dest = self.work_dir.join(file_name);
        // Rename first; fall back to copy when the download dir is on
        // another filesystem.
        if std::fs::rename(&download.path, &dest).is_err() {
            std::fs::copy(&download.path, &dest)
                .context("Failed to copy downloaded artifact")?;
            let _ = std::fs::remove_file(&download.path);
        }
        Ok(dest)
    }

    fn advance(&mut self, state: ExportState, progress: &(dyn Fn(&str) + Send + Sync)) {
        self.state = state;
        progress(&format!("State: {state:?}"));
    }
}
