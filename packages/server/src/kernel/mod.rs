//! Kernel module - server infrastructure and dependencies.
//!
//! Holds everything that is not a request handler: store resolution, the
//! extraction state machine, background jobs, the guide cache, scheduled
//! tasks, and the dependency container wiring them together.

pub mod cache;
pub mod deps;
pub mod exporter;
pub mod jobs;
pub mod scheduled_tasks;
pub mod stores;
pub mod test_dependencies;

pub use cache::GuideCache;
pub use deps::ServerDeps;
pub use exporter::{DateParam, ExportError, ExportMachine, ExportState};
pub use jobs::{Job, JobFetchError, JobManager, JobStatus, SubmitParams};
pub use scheduled_tasks::start_scheduler;
pub use stores::{StoreCredential, StoreError};
