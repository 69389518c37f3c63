// Common types and utilities shared across the application

pub mod records;

pub use records::{value_text, GuideRecord, STORE_FIELD};
