pub mod export;
pub mod guides;
pub mod health;

pub use export::{download_job, get_job, list_jobs, start_export};
pub use guides::{available_fields, cache_stats, get_guides, search_by_field, search_store_by_field};
pub use health::health_handler;
