// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod analyze;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod rank;
pub mod record;

pub use crate::analyze::{Analyzer, Scorer};
pub use crate::config::PipelineConfig;
pub use crate::error::{CollectionError, CollectorFailure, ScoreError};
pub use crate::ingest::{dedup, Collector, CollectorRegistry, Orchestrator};
pub use crate::notify::{Sink, SyncDispatcher};
pub use crate::pipeline::{Pipeline, RunReport};
pub use crate::rank::{rank_by_deadline, rank_by_priority};
pub use crate::record::{Analysis, AnalyzedRecord, Priority, Profile, Recommendation, Record};

/// `GRANT_RADAR_ENV` in {dev, development, local}: fixture data instead of
/// live sources.
pub fn is_dev_mode() -> bool {
    matches!(
        std::env::var("GRANT_RADAR_ENV")
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}
