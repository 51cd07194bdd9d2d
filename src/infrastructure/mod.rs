//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Database: SQLite document collections
//! - Scheduler: Status cleanup cron job

pub mod config;
pub mod database;
pub mod scheduler;
