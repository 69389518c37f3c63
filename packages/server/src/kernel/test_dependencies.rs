//! Scripted fakes for the browser surface and decoder.
//!
//! Kept as a regular module (not `#[cfg(test)]`) so both unit tests and the
//! integration tests under `tests/` can drive the export workflow without a
//! real WebDriver.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use effi_driver::{BrowserLauncher, BrowserSession, DownloadedFile, GuideDecoder, Selector};

/// What a scripted session should do at each step of the workflow.
#[derive(Debug, Clone)]
pub struct SessionScript {
    /// Directory the fake "browser" writes downloads into.
    pub download_dir: PathBuf,
    /// Whether the post-login URL wait succeeds.
    pub login_succeeds: bool,
    /// Whether the export trigger becomes visible.
    pub export_button_visible: bool,
    /// Whether the confirmation modal becomes visible.
    pub modal_visible: bool,
    /// Whether a download completes at all.
    pub download_produces: bool,
    /// Size of the produced artifact in bytes.
    pub download_size: u64,
}

impl SessionScript {
    /// A script where every step succeeds and the artifact is large enough.
    pub fn successful(download_dir: &Path) -> Self {
        Self {
            download_dir: download_dir.to_path_buf(),
            login_succeeds: true,
            export_button_visible: true,
            modal_visible: true,
            download_produces: true,
            download_size: 4096,
        }
    }
}

/// Launcher handing out scripted sessions; counts launches and teardowns so
/// tests can assert no session leaks on failure paths.
pub struct FakeLauncher {
    script: SessionScript,
    launched: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(script: SessionScript) -> Self {
        Self {
            script,
            launched: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sessions_launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let launch_no = self.launched.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            closed: self.closed.clone(),
            launch_no,
            visibility_probes: 0,
        }))
    }
}

struct FakeSession {
    script: SessionScript,
    closed: Arc<AtomicUsize>,
    launch_no: usize,
    /// First visibility probe is the export trigger, second is the modal.
    visibility_probes: usize,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, _url: &str) -> Result<()> {
        Ok(())
    }

    async fn fill(&mut self, _selectors: &[Selector], _value: &str) -> Result<()> {
        Ok(())
    }

    async fn click(&mut self, _selectors: &[Selector]) -> Result<()> {
        Ok(())
    }

    async fn wait_visible(&mut self, _selectors: &[Selector], _timeout: Duration) -> Result<bool> {
        self.visibility_probes += 1;
        Ok(match self.visibility_probes {
            1 => self.script.export_button_visible,
            _ => self.script.modal_visible,
        })
    }

    async fn wait_url_contains(
        &mut self,
        _fragments: &[String],
        _timeout: Duration,
    ) -> Result<bool> {
        Ok(self.script.login_succeeds)
    }

    async fn await_download(&mut self, timeout: Duration) -> Result<DownloadedFile> {
        if !self.script.download_produces {
            return Err(anyhow!("No download completed within {timeout:?}"));
        }
        std::fs::create_dir_all(&self.script.download_dir)?;
        let path = self
            .script
            .download_dir
            .join(format!("guias_transporte_{}.xlsx", self.launch_no));
        std::fs::write(&path, vec![0u8; self.script.download_size as usize])?;
        Ok(DownloadedFile {
            path,
            suggested_name: "guias_transporte.xlsx".to_string(),
            size: self.script.download_size,
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Decoder returning a fixed record set for any artifact.
pub struct StaticDecoder {
    records: Vec<Map<String, Value>>,
}

impl StaticDecoder {
    pub fn new(records: Vec<Map<String, Value>>) -> Self {
        Self { records }
    }

    /// Build a record from `(field, value)` string pairs.
    pub fn record(fields: &[(&str, &str)]) -> Map<String, Value> {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect()
    }
}

impl GuideDecoder for StaticDecoder {
    fn decode(&self, _path: &Path) -> Result<Vec<Map<String, Value>>> {
        Ok(self.records.clone())
    }
}

/// Decoder that always fails, for exercising the job error path after a
/// successful download.
pub struct FailingDecoder;

impl GuideDecoder for FailingDecoder {
    fn decode(&self, path: &Path) -> Result<Vec<Map<String, Value>>> {
        Err(anyhow!("Unreadable workbook: {}", path.display()))
    }
}
