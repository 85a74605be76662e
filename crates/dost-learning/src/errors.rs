//! Learning system errors.

/// Failures surfaced by the learning service.
#[derive(Debug, thiserror::Error)]
pub enum LearningError {
    /// A context timestamp could not be parsed as ISO-8601.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    /// Feedback rating outside `0..=5`.
    #[error("rating must be between 0 and 5, got {0}")]
    InvalidRating(f64),
}
