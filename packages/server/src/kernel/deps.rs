//! Server dependencies (using traits for testability)
//!
//! Central dependency container handed to background jobs and request
//! handlers. The browser surface and decoder are trait objects so tests can
//! substitute scripted fakes for the WebDriver-backed adapters.

use std::sync::Arc;

use effi_driver::{BrowserLauncher, GuideDecoder};

use crate::config::Config;
use crate::kernel::cache::GuideCache;

/// Dependencies available to jobs and handlers.
#[derive(Clone)]
pub struct ServerDeps {
    pub config: Arc<Config>,
    pub launcher: Arc<dyn BrowserLauncher>,
    pub decoder: Arc<dyn GuideDecoder>,
    pub cache: Arc<GuideCache>,
}

impl ServerDeps {
    pub fn new(
        config: Arc<Config>,
        launcher: Arc<dyn BrowserLauncher>,
        decoder: Arc<dyn GuideDecoder>,
        cache: Arc<GuideCache>,
    ) -> Self {
        Self {
            config,
            launcher,
            decoder,
            cache,
        }
    }
}
