// Common test utilities

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use server_core::kernel::test_dependencies::{FakeLauncher, SessionScript, StaticDecoder};
use server_core::kernel::{GuideCache, Job, JobManager, JobStatus, ServerDeps};
use server_core::{Config, ConfiguredStore};
use tempfile::TempDir;
use uuid::Uuid;

pub struct TestHarness {
    pub deps: Arc<ServerDeps>,
    pub jobs: Arc<JobManager>,
    pub launcher: Arc<FakeLauncher>,
    // Dropped last; owns every path the harness hands out.
    pub work_dir: TempDir,
}

pub fn configured_store(name: &str) -> ConfiguredStore {
    ConfiguredStore {
        name: name.to_string(),
        username: Some(format!("{}@example.com", name)),
        password: Some("secret".to_string()),
    }
}

pub fn test_config(work_dir: &Path, stores: Vec<ConfiguredStore>) -> Config {
    Config {
        port: 0,
        effi_base_url: "https://effi.test".to_string(),
        token_secret: "test_secret".to_string(),
        jwt_issuer: "test_issuer".to_string(),
        work_dir: work_dir.to_path_buf(),
        webdriver_url: "http://localhost:9515".to_string(),
        headless: true,
        export_modal_required: true,
        stores,
    }
}

/// Build a full dependency graph around a scripted browser session and a
/// decoder returning `records` for every artifact.
pub fn harness(
    script_for: impl FnOnce(&Path) -> SessionScript,
    stores: Vec<ConfiguredStore>,
    records: Vec<serde_json::Map<String, serde_json::Value>>,
) -> TestHarness {
    let work_dir = TempDir::new().unwrap();
    let config = test_config(work_dir.path(), stores);
    let cache = Arc::new(GuideCache::new(config.cache_dir()));
    let launcher = Arc::new(FakeLauncher::new(script_for(work_dir.path())));
    let decoder = Arc::new(StaticDecoder::new(records));

    let deps = Arc::new(ServerDeps::new(
        Arc::new(config),
        launcher.clone(),
        decoder,
        cache,
    ));
    let jobs = Arc::new(JobManager::new(deps.clone()));

    TestHarness {
        deps,
        jobs,
        launcher,
        work_dir,
    }
}

/// Poll until the job reaches a terminal status, or panic after 5 seconds.
pub async fn wait_terminal(jobs: &JobManager, id: Uuid) -> Job {
    for _ in 0..500 {
        if let Some(job) = jobs.get(id) {
            if job.status.is_terminal() {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not reach a terminal status");
}

pub fn assert_done(job: &Job) {
    assert_eq!(job.status, JobStatus::Done, "job error: {:?}", job.error);
    assert!(job.result.is_some());
    assert!(job.error.is_none());
}
