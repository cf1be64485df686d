//! Cardwright: ordered course content with concurrent AI card generation
//!
//! Courses hold ordered lessons and lessons hold ordered cards. Reorders run as a
//! two-phase staged update against a store that enforces unique positions, and
//! generated cards pass through a bounded worker pool and a draft before they are
//! appended to a lesson.

pub mod api;
pub mod cli;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod ordering;
pub mod progress;
pub mod provider;
pub mod store;
pub mod types;
