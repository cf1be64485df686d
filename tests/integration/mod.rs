//! Integration tests for cardwright

mod append;
mod cli_binary;
mod config_integration;
mod draft_pipeline;
mod sled_store;
mod worker_pool;
