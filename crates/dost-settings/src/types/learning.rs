use serde::{Deserialize, Serialize};

/// Learning system thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LearningSettings {
    /// Patterns older than this are pruned; also the task/conversation look-back.
    pub retention_days: i64,
    /// How long generated insights are served from cache.
    pub insight_cache_secs: u64,
    /// Samples required in one hour bucket before a mood insight is considered.
    pub min_mood_samples: usize,
    /// Share of the dominant mood required for a mood insight (0.0–1.0).
    pub mood_consistency: f64,
}

impl Default for LearningSettings {
    fn default() -> Self {
        Self {
            retention_days: 30,
            insight_cache_secs: 3600,
            min_mood_samples: 3,
            mood_consistency: 0.6,
        }
    }
}
