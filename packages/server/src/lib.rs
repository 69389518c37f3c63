// Effi Guide Export Service - API Core
//
// This crate provides the backend API for extracting transport guides from
// the Effi web application on demand, caching them per store, and serving
// filtered queries over the cached dataset.
//
// Long extraction runs execute as background jobs; callers poll job status
// instead of waiting on the request.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
