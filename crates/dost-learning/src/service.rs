//! Shared learning service.
//!
//! One instance lives in the server state. All methods take `&self`; state
//! sits behind `parking_lot` locks that are never held across an await.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use dost_core::UserId;
use dost_core::records::{ConversationRecord, TaskRecord};
use dost_settings::LearningSettings;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::errors::LearningError;
use crate::insights::{self, MoodThresholds};
use crate::patterns::{PatternStore, parse_timestamp};
use crate::types::{
    Feedback, Insight, LearningPoint, LearningStatistics, PatternKind, Prediction, PredictionKind,
};

const MAX_RATING: f64 = 5.0;

struct CachedInsights {
    generated_at: DateTime<Utc>,
    insights: Vec<Insight>,
}

/// Pattern ingestion, insights, predictions and feedback for all users.
pub struct LearningService {
    retention: Duration,
    cache_ttl: Duration,
    mood: MoodThresholds,
    patterns: RwLock<PatternStore>,
    cache: Mutex<HashMap<UserId, CachedInsights>>,
    points: Mutex<HashMap<UserId, Vec<LearningPoint>>>,
}

impl LearningService {
    /// Build from settings.
    pub fn new(settings: &LearningSettings) -> Self {
        Self {
            retention: Duration::days(settings.retention_days),
            cache_ttl: Duration::seconds(settings.insight_cache_secs.min(u64::from(u32::MAX)) as i64),
            mood: MoodThresholds {
                min_samples: settings.min_mood_samples,
                consistency: settings.mood_consistency,
            },
            patterns: RwLock::new(PatternStore::new(settings.retention_days)),
            cache: Mutex::new(HashMap::new()),
            points: Mutex::new(HashMap::new()),
        }
    }

    // ── Ingestion ────────────────────────────────────────────────────────

    /// Record patterns found in a context update. Returns how many were recorded.
    pub fn learn_from_context(&self, user_id: UserId, context: &Map<String, Value>) -> usize {
        self.learn_from_context_at(user_id, context, Utc::now())
    }

    /// [`Self::learn_from_context`] with an explicit clock.
    pub fn learn_from_context_at(
        &self,
        user_id: UserId,
        context: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> usize {
        let mut recorded = 0;
        let mut patterns = self.patterns.write();

        if let Some(mood) = context.get("mood").and_then(Value::as_str) {
            let _ = patterns.record(user_id, PatternKind::Mood, mood, now, now);
            recorded += 1;
        }

        if let Some(raw) = context.get("last_interaction").and_then(Value::as_str) {
            match parse_timestamp(raw) {
                Ok(at) => {
                    let _ = patterns.record(user_id, PatternKind::Time, "", at, now);
                    recorded += 1;
                }
                Err(error) => warn!(user_id = %user_id, %error, "skipping interaction time"),
            }
        }

        if let Some(intent) = context.get("last_intent").and_then(Value::as_str) {
            let _ = patterns.record(user_id, PatternKind::Intent, intent, now, now);
            recorded += 1;
        }

        debug!(user_id = %user_id, recorded, "learned from context");
        recorded
    }

    // ── Insights ─────────────────────────────────────────────────────────

    /// Insights for a user, served from cache while fresh.
    pub fn generate_insights(
        &self,
        user_id: UserId,
        tasks: &[TaskRecord],
        conversations: &[ConversationRecord],
    ) -> Vec<Insight> {
        self.generate_insights_at(user_id, tasks, conversations, Utc::now())
    }

    /// [`Self::generate_insights`] with an explicit clock.
    pub fn generate_insights_at(
        &self,
        user_id: UserId,
        tasks: &[TaskRecord],
        conversations: &[ConversationRecord],
        now: DateTime<Utc>,
    ) -> Vec<Insight> {
        if let Some(cached) = self.cache.lock().get(&user_id)
            && now - cached.generated_at < self.cache_ttl
        {
            debug!(user_id = %user_id, "insights served from cache");
            return cached.insights.clone();
        }

        let mut generated = Vec::new();
        {
            let patterns = self.patterns.read();
            generated.extend(insights::mood_insights(
                patterns.entries(user_id, PatternKind::Mood),
                self.mood,
            ));
            generated.extend(insights::time_insights(
                patterns.entries(user_id, PatternKind::Time),
            ));
            generated.extend(insights::intent_insights(
                patterns.entries(user_id, PatternKind::Intent),
            ));
        }
        let cutoff = now - self.retention;
        generated.extend(insights::task_insights(tasks, cutoff));
        generated.extend(insights::conversation_insights(conversations, cutoff));

        debug!(user_id = %user_id, count = generated.len(), "generated insights");
        let _ = self.cache.lock().insert(
            user_id,
            CachedInsights {
                generated_at: now,
                insights: generated.clone(),
            },
        );
        generated
    }

    // ── Predictions ──────────────────────────────────────────────────────

    /// Likely intent and mood for the current time.
    pub fn predict_needs(&self, user_id: UserId) -> Vec<Prediction> {
        self.predict_needs_at(user_id, Utc::now())
    }

    /// [`Self::predict_needs`] with an explicit clock.
    pub fn predict_needs_at(&self, user_id: UserId, now: DateTime<Utc>) -> Vec<Prediction> {
        let hour = now.hour();
        let weekday = now.weekday().num_days_from_monday();
        let mut predictions = Vec::new();

        {
            let patterns = self.patterns.read();

            let intents = patterns
                .entries(user_id, PatternKind::Intent)
                .iter()
                .filter(|e| e.hour == hour && e.day_of_week == weekday)
                .map(|e| e.value.as_str());
            if let Some((intent, count, total)) = insights::most_common(intents) {
                predictions.push(Prediction {
                    id: new_prediction_id(),
                    kind: PredictionKind::IntentPrediction,
                    prediction: intent.to_owned(),
                    confidence: count as f64 / total as f64,
                    suggestion: format!(
                        "Based on your patterns, you might want to {}",
                        intent.replace('_', " ")
                    ),
                });
            }

            let moods = patterns
                .entries(user_id, PatternKind::Mood)
                .iter()
                .filter(|e| e.hour == hour)
                .map(|e| e.value.as_str());
            if let Some((mood, count, total)) = insights::most_common(moods) {
                predictions.push(Prediction {
                    id: new_prediction_id(),
                    kind: PredictionKind::MoodPrediction,
                    prediction: mood.to_owned(),
                    confidence: count as f64 / total as f64,
                    suggestion: format!("You might be feeling {mood} around this time"),
                });
            }
        }

        let mut points = self.points.lock();
        let stored = points.entry(user_id).or_default();
        for prediction in &predictions {
            let mut input = Map::new();
            let _ = input.insert("type".into(), json!(prediction.kind));
            let _ = input.insert("prediction".into(), json!(prediction.prediction));
            let _ = input.insert("confidence".into(), json!(prediction.confidence));
            stored.push(LearningPoint {
                data_type: "prediction".into(),
                input,
                accuracy: 0.0,
                feedback_score: None,
                experiment_id: Some(prediction.id.clone()),
                created_at: now,
            });
        }

        debug!(user_id = %user_id, count = predictions.len(), "predicted needs");
        predictions
    }

    // ── Feedback ─────────────────────────────────────────────────────────

    /// Store feedback; a rated feedback naming a prediction sets its accuracy.
    pub fn learn_from_feedback(&self, user_id: UserId, feedback: Feedback) -> Result<(), LearningError> {
        if let Some(rating) = feedback.rating
            && !(0.0..=MAX_RATING).contains(&rating)
        {
            return Err(LearningError::InvalidRating(rating));
        }

        let mut points = self.points.lock();
        let stored = points.entry(user_id).or_default();

        if let (Some(prediction_id), Some(rating)) = (&feedback.prediction_id, feedback.rating) {
            let accuracy = rating / MAX_RATING;
            let mut matched = 0;
            for point in stored
                .iter_mut()
                .filter(|p| p.experiment_id.as_deref() == Some(prediction_id.as_str()))
            {
                point.accuracy = accuracy;
                point.feedback_score = Some(rating);
                matched += 1;
            }
            if matched == 0 {
                warn!(user_id = %user_id, prediction_id = %prediction_id, "feedback for unknown prediction");
            }
        }

        let input = match serde_json::to_value(&feedback) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        stored.push(LearningPoint {
            data_type: "feedback".into(),
            input,
            accuracy: 0.0,
            feedback_score: feedback.rating,
            experiment_id: feedback.prediction_id,
            created_at: Utc::now(),
        });
        Ok(())
    }

    // ── Statistics / lifecycle ───────────────────────────────────────────

    /// Summary of what has been learned about a user.
    pub fn statistics(&self, user_id: UserId) -> LearningStatistics {
        let (total, average) = {
            let points = self.points.lock();
            let stored = points.get(&user_id).map(Vec::as_slice).unwrap_or_default();
            let rated: Vec<f64> = stored
                .iter()
                .map(|p| p.accuracy)
                .filter(|a| *a > 0.0)
                .collect();
            let average = if rated.is_empty() {
                0.0
            } else {
                rated.iter().sum::<f64>() / rated.len() as f64
            };
            (stored.len(), average)
        };

        LearningStatistics {
            total_learning_points: total,
            average_accuracy: average,
            patterns_learned: self.patterns.read().kinds_learned(user_id),
            last_updated: Utc::now(),
        }
    }

    /// Drop all patterns and cached insights.
    pub fn cleanup(&self) {
        self.patterns.write().clear();
        self.cache.lock().clear();
        debug!("learning state cleared");
    }
}

fn new_prediction_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use dost_core::records::{TaskPriority, TaskStatus};

    fn service() -> LearningService {
        LearningService::new(&LearningSettings::default())
    }

    fn ctx(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Monday 2026-03-02 at the given hour.
    fn monday(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn context_keys_are_recorded() {
        let svc = service();
        let n = svc.learn_from_context_at(
            UserId(1),
            &ctx(json!({
                "mood": "positive",
                "last_interaction": "2026-03-02T09:30:00",
                "last_intent": "question",
                "other": 1
            })),
            monday(9),
        );
        assert_eq!(n, 3);
        assert_eq!(svc.statistics(UserId(1)).patterns_learned, 3);
    }

    #[test]
    fn bad_timestamp_is_skipped() {
        let svc = service();
        let n = svc.learn_from_context_at(
            UserId(1),
            &ctx(json!({"last_interaction": "not a time", "mood": "ok"})),
            monday(9),
        );
        assert_eq!(n, 1);
        assert_eq!(svc.statistics(UserId(1)).patterns_learned, 1);
    }

    #[test]
    fn insights_combine_sources() {
        let svc = service();
        let user = UserId(1);
        for _ in 0..3 {
            let _ = svc.learn_from_context_at(
                user,
                &ctx(json!({"mood": "positive", "last_intent": "task_creation"})),
                monday(9),
            );
        }
        let tasks = vec![TaskRecord {
            id: 1,
            user_id: user,
            title: "x".into(),
            description: None,
            status: TaskStatus::Completed,
            priority: TaskPriority::High,
            due_date: None,
            created_at: monday(8),
            completed_at: None,
        }];
        let insights = svc.generate_insights_at(user, &tasks, &[], monday(10));
        let descriptions: Vec<&str> = insights.iter().map(|i| i.description.as_str()).collect();
        assert!(descriptions.contains(&"You tend to be positive around 9:00"));
        assert!(descriptions.contains(&"You primarily use me for task creation"));
        assert!(descriptions.contains(&"You complete 100.0% of your tasks"));
    }

    #[test]
    fn insights_are_cached_for_the_ttl() {
        let svc = service();
        let user = UserId(1);
        assert!(svc.generate_insights_at(user, &[], &[], monday(9)).is_empty());

        let _ = svc.learn_from_context_at(user, &ctx(json!({"last_intent": "question"})), monday(9));
        assert!(svc.generate_insights_at(user, &[], &[], monday(9) + Duration::minutes(30)).is_empty());
        assert_eq!(svc.generate_insights_at(user, &[], &[], monday(10) + Duration::seconds(1)).len(), 1);
    }

    #[test]
    fn predictions_match_hour_and_weekday() {
        let svc = service();
        let user = UserId(1);
        let _ = svc.learn_from_context_at(
            user,
            &ctx(json!({"last_intent": "task_creation", "mood": "neutral"})),
            monday(9),
        );
        // Tuesday, same hour: mood matches, intent does not.
        let tuesday = monday(9) + Duration::days(1);
        let predictions = svc.predict_needs_at(user, tuesday);
        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].kind, PredictionKind::MoodPrediction);
        assert_eq!(predictions[0].suggestion, "You might be feeling neutral around this time");

        let predictions = svc.predict_needs_at(user, monday(9) + Duration::days(7));
        assert_eq!(predictions[0].kind, PredictionKind::IntentPrediction);
        assert_eq!(
            predictions[0].suggestion,
            "Based on your patterns, you might want to task creation"
        );
        assert!((predictions[0].confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn feedback_sets_prediction_accuracy() {
        let svc = service();
        let user = UserId(1);
        let _ = svc.learn_from_context_at(user, &ctx(json!({"mood": "positive"})), monday(9));
        let predictions = svc.predict_needs_at(user, monday(9));
        let id = predictions[0].id.clone();

        svc.learn_from_feedback(
            user,
            Feedback {
                rating: Some(4.0),
                prediction_id: Some(id),
                ..Feedback::default()
            },
        )
        .unwrap();

        let stats = svc.statistics(user);
        assert_eq!(stats.total_learning_points, 2);
        assert!((stats.average_accuracy - 0.8).abs() < 1e-9);
    }

    #[test]
    fn feedback_rejects_out_of_range_rating() {
        let svc = service();
        let result = svc.learn_from_feedback(
            UserId(1),
            Feedback {
                rating: Some(7.0),
                ..Feedback::default()
            },
        );
        assert_matches!(result, Err(LearningError::InvalidRating(r)) if (r - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn cleanup_clears_patterns_and_cache() {
        let svc = service();
        let user = UserId(1);
        let _ = svc.learn_from_context_at(user, &ctx(json!({"last_intent": "question"})), monday(9));
        assert_eq!(svc.generate_insights_at(user, &[], &[], monday(9)).len(), 1);

        svc.cleanup();
        assert_eq!(svc.statistics(user).patterns_learned, 0);
        assert!(svc.generate_insights_at(user, &[], &[], monday(9)).is_empty());
    }

    #[test]
    fn statistics_for_unknown_user_are_zero() {
        let stats = service().statistics(UserId(42));
        assert_eq!(stats.total_learning_points, 0);
        assert!(stats.average_accuracy.abs() < f64::EPSILON);
    }
}
