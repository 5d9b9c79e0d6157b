//! coach-core - Core library for coached networking practice sessions
//!
//! This crate provides everything below the HTTP surface:
//!
//! - **stage**: pure five-stage policy engine (signals, gates, transitions)
//! - **db**: direct SQLite access with per-session write transactions
//! - **cache**: key/value snapshots with TTLs and pending-job markers
//! - **store**: cached async facade over the database
//! - **jobs**: marker coordination, retries and background task tracking
//! - **enrichment**: worker client contract, validation and fallbacks
//! - **services**: summary, nudges, metadata, evaluation and follow-up jobs
//! - **orchestrator**: request-facing operations and job triggers
//! - **auth**: service-token authentication

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod services;
pub mod stage;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use cache::{KvStore, MemoryKv};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CoachConfig;
pub use db::Database;
pub use enrichment::EnrichmentClient;
#[cfg(feature = "http-client")]
pub use enrichment::HttpEnrichmentClient;
pub use error::{Error, Result};
pub use orchestrator::SessionOrchestrator;
pub use stage::{Stage, StageSignalFlags};
pub use types::*;
