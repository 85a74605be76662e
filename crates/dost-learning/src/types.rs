//! Learning system types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Patterns
// ─────────────────────────────────────────────────────────────────────────────

/// Category of a recorded sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Reported or detected mood.
    Mood,
    /// Time of an interaction.
    Time,
    /// Detected intent of a message.
    Intent,
}

impl PatternKind {
    /// Name used for stored learning points (`mood_pattern`, ...).
    #[must_use]
    pub fn data_type(self) -> &'static str {
        match self {
            Self::Mood => "mood_pattern",
            Self::Time => "time_pattern",
            Self::Intent => "intent_pattern",
        }
    }
}

/// One sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternEntry {
    /// Mood or intent label; empty for time samples.
    pub value: String,
    /// When the sample happened (interaction time for [`PatternKind::Time`]).
    pub timestamp: DateTime<Utc>,
    /// Hour of day, 0–23.
    pub hour: u32,
    /// Day of week, Monday = 0.
    pub day_of_week: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Insights and predictions
// ─────────────────────────────────────────────────────────────────────────────

/// Insight category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Dominant mood at an hour of day.
    MoodPattern,
    /// Most active hour.
    TimePattern,
    /// Most active weekday.
    DayPattern,
    /// Most common intent.
    IntentPattern,
    /// Share of tasks completed.
    TaskCompletion,
    /// Most common task priority.
    PriorityPattern,
    /// Average conversations per active day.
    ConversationFrequency,
    /// Conversations in the look-back window.
    EngagementLevel,
}

/// A canned observation about the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    /// Category.
    #[serde(rename = "type")]
    pub kind: InsightKind,
    /// Short title.
    pub title: String,
    /// Sentence shown to the user.
    pub description: String,
    /// Share of samples supporting the insight (0.0–1.0).
    pub confidence: f64,
    /// Whether `actions` has something to do.
    pub actionable: bool,
    /// Suggested follow-ups.
    pub actions: Vec<String>,
}

/// Prediction category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionKind {
    /// Likely intent at the current hour and weekday.
    IntentPrediction,
    /// Likely mood at the current hour.
    MoodPrediction,
}

/// A guess about what the user needs right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Id the client can quote back in feedback.
    pub id: String,
    /// Category.
    #[serde(rename = "type")]
    pub kind: PredictionKind,
    /// Predicted label.
    pub prediction: String,
    /// Share of matching samples.
    pub confidence: f64,
    /// Sentence shown to the user.
    pub suggestion: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Feedback and statistics
// ─────────────────────────────────────────────────────────────────────────────

/// User feedback on assistant output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    /// Free-form category.
    #[serde(default, rename = "type")]
    pub feedback_type: Option<String>,
    /// Rating 0–5.
    #[serde(default)]
    pub rating: Option<f64>,
    /// Free-form comment.
    #[serde(default)]
    pub comment: Option<String>,
    /// Prediction this feedback rates.
    #[serde(default)]
    pub prediction_id: Option<String>,
}

/// One stored learning record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPoint {
    /// Record kind (`mood_pattern`, `feedback`, `prediction`, ...).
    pub data_type: String,
    /// Input snapshot.
    pub input: Map<String, Value>,
    /// Accuracy in 0.0–1.0; 0.0 until rated.
    pub accuracy: f64,
    /// Raw rating from feedback.
    pub feedback_score: Option<f64>,
    /// Prediction id this record belongs to.
    pub experiment_id: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Per-user learning summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStatistics {
    /// Stored learning points.
    pub total_learning_points: usize,
    /// Mean accuracy over rated points, 0.0 when none are rated.
    pub average_accuracy: f64,
    /// Pattern kinds with at least one sample.
    pub patterns_learned: usize,
    /// When these statistics were computed.
    pub last_updated: DateTime<Utc>,
}
