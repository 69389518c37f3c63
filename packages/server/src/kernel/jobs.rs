//! Background export jobs.
//!
//! `submit` registers a `Queued` job synchronously and returns its id before
//! the background task is scheduled, so a caller polling right away always
//! observes a well-formed status. The spawned task is the job's only writer:
//! it transitions `Queued -> Running` and then exactly one of `Done` or
//! `Error`. Transitions are forward-only.
//!
//! The job table is in-process and never pruned; it grows with process
//! lifetime. Acceptable for the export cadence this service sees, and noted
//! here because it is a deliberate trade against lifecycle complexity.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local, Months, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::kernel::exporter::{default_date_range, DateParam, ExportMachine};
use crate::kernel::stores;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

/// One timestamped progress line from the running state machine.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Requested parameters, frozen at submission.
#[derive(Debug, Clone, Serialize)]
pub struct JobParams {
    pub desde: String,
    pub hasta: String,
    #[serde(rename = "storeName")]
    pub store_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobResult {
    #[serde(rename = "filePath")]
    pub file_path: PathBuf,
}

/// Lifecycle record of one asynchronous extraction request.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub logs: Vec<LogEntry>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub params: JobParams,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Job {
    fn new(params: JobParams) -> Self {
        Self {
            id: Uuid::new_v4(),
            status: JobStatus::Queued,
            logs: Vec::new(),
            result: None,
            error: None,
            params,
            created_at: Utc::now(),
        }
    }

    fn log(&mut self, message: impl Into<String>) {
        self.logs.push(LogEntry {
            at: Utc::now(),
            message: message.into(),
        });
    }

    fn start(&mut self) {
        if self.status == JobStatus::Queued {
            self.status = JobStatus::Running;
        }
    }

    fn complete(&mut self, file_path: PathBuf) {
        if self.status == JobStatus::Running {
            self.status = JobStatus::Done;
            self.result = Some(JobResult { file_path });
        }
    }

    fn fail(&mut self, message: String) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Error;
            self.error = Some(message);
        }
    }
}

#[derive(Debug, Error)]
pub enum JobFetchError {
    #[error("job not found")]
    NotFound,
    /// The caller polled before the job finished. Expected control flow,
    /// not a fault.
    #[error("job not finished")]
    NotReady,
}

#[derive(Debug, Clone, Default)]
pub struct SubmitParams {
    pub stardate: Option<String>,
    pub enddate: Option<String>,
    pub store_name: Option<String>,
}

type JobSlot = Arc<RwLock<Job>>;

/// Creates, tracks, and exposes background extraction jobs.
pub struct JobManager {
    jobs: RwLock<HashMap<Uuid, JobSlot>>,
    deps: Arc<ServerDeps>,
}

impl JobManager {
    pub fn new(deps: Arc<ServerDeps>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            deps,
        }
    }

    /// Register a job and schedule its extraction. Returns immediately.
    ///
    /// The effective date range is resolved here, before scheduling, so the
    /// job record always shows the bounds the extraction will actually use.
    pub fn submit(&self, params: SubmitParams) -> Uuid {
        let (desde, hasta) =
            resolve_range(params.stardate.as_deref(), params.enddate.as_deref());
        let job = Job::new(JobParams {
            desde: desde.to_effi_str(),
            hasta: hasta.to_effi_str(),
            store_name: params.store_name.clone(),
        });
        let id = job.id;
        let slot: JobSlot = Arc::new(RwLock::new(job));

        // Insert before spawning: the queued status must be observable
        // before the background task can touch the record.
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, slot.clone());

        info!(job_id = %id, store = ?params.store_name, "Export job queued");
        let deps = self.deps.clone();
        let store_name = params.store_name;
        tokio::spawn(async move {
            run_export_job(slot, deps, store_name, desde, hasta).await;
        });
        id
    }

    /// Snapshot of one job, or `None` if unknown.
    pub fn get(&self, id: Uuid) -> Option<Job> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .map(|slot| slot.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    /// Snapshots of all jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|slot| slot.read().unwrap_or_else(|e| e.into_inner()).clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Path of the finished artifact; fails until the job is `Done`.
    pub fn result_path(&self, id: Uuid) -> Result<PathBuf, JobFetchError> {
        let job = self.get(id).ok_or(JobFetchError::NotFound)?;
        match (job.status, job.result) {
            (JobStatus::Done, Some(result)) => Ok(result.file_path),
            _ => Err(JobFetchError::NotReady),
        }
    }
}

/// Resolve the effective date range: explicit bounds parse as
/// `YYYY-MM-DD[ HH:mm:ss]` (or pass through verbatim); absent bounds default
/// to the trailing month ending today, end-of-day inclusive.
fn resolve_range(stardate: Option<&str>, enddate: Option<&str>) -> (DateParam, DateParam) {
    let today = Local::now().date_naive();
    let (default_desde, default_hasta) = default_date_range(today);

    let hasta = match enddate {
        Some(s) => DateParam::parse(s),
        None => default_hasta,
    };
    let desde = match stardate {
        Some(s) => DateParam::parse(s),
        None => match &hasta {
            // Anchor the default start one month before an explicit end.
            DateParam::At(end) => {
                let start = end
                    .date()
                    .checked_sub_months(Months::new(1))
                    .unwrap_or(end.date())
                    .and_hms_opt(0, 0, 0)
                    .unwrap_or(*end);
                DateParam::At(start)
            }
            DateParam::Raw(_) => default_desde,
        },
    };
    (desde, hasta)
}

/// The one background task that owns a job's mutations.
///
/// Every failure - configuration, login, modal, download, decode, cache - is
/// caught here exactly once and recorded on the job; nothing escapes to
/// crash the process.
async fn run_export_job(
    slot: JobSlot,
    deps: Arc<ServerDeps>,
    store_name: Option<String>,
    desde: DateParam,
    hasta: DateParam,
) {
    {
        let mut job = slot.write().unwrap_or_else(|e| e.into_inner());
        job.start();
        job.log("Starting export");
    }

    let sink_slot = slot.clone();
    let sink = move |message: &str| {
        sink_slot
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .log(message);
    };

    let outcome: anyhow::Result<PathBuf> = async {
        let credential = stores::resolve(&deps.config.stores, store_name.as_deref())?;
        let mut machine = ExportMachine::new(
            deps.config.effi_base_url.clone(),
            deps.config.work_dir.clone(),
            deps.config.export_modal_required,
        );
        let file = machine
            .run(deps.launcher.as_ref(), &credential, &desde, &hasta, &sink)
            .await?;
        let records = deps.decoder.decode(&file)?;
        deps.cache.put(&credential.name, records)?;
        Ok(file)
    }
    .await;

    let mut job = slot.write().unwrap_or_else(|e| e.into_inner());
    match outcome {
        Ok(file) => {
            info!(job_id = %job.id, file = %file.display(), "Export job completed");
            job.log("Export completed");
            job.complete(file);
        }
        Err(e) => {
            error!(job_id = %job.id, error = %e, "Export job failed");
            job.log(format!("Error: {e}"));
            job.fail(e.to_string());
        }
    }
}
