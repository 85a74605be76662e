//! # dost-learning
//!
//! The assistant's "learning system": descriptive statistics over small
//! per-user lists of timestamped interaction events.
//!
//! - [`patterns::PatternStore`] keeps mood / interaction-time / intent samples
//!   per user, pruned to a retention window.
//! - [`insights`] turns samples plus task and conversation records into
//!   canned insight sentences (mode, mean, ratio).
//! - [`service::LearningService`] is the shared, thread-safe front door:
//!   context ingestion, cached insights, predictions, feedback, statistics.
//!
//! There is no model here; every number is a frequency or an average.
//!
//! ## Crate Position
//!
//! Depends on `dost-core` and `dost-settings`. Depended on by `dost-server`.

#![deny(unsafe_code)]

pub mod errors;
pub mod insights;
pub mod patterns;
pub mod service;
pub mod types;

pub use errors::LearningError;
pub use service::LearningService;
pub use types::{
    Feedback, Insight, InsightKind, LearningStatistics, PatternKind, Prediction, PredictionKind,
};
