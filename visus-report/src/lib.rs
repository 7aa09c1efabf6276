pub mod model;
pub mod recommend;
pub mod scoring;
pub mod stats;
mod summary;

pub use model::{AcuityLevel, PhaseResult, Report, format_duration};
pub use scoring::{ScoringConfig, backfill_history, compute_report, response_speed_score};
pub use stats::ResponseTimeStats;
