//! Insight generation.
//!
//! Each generator is a pure function over samples or records so the service
//! only has to gather inputs and cache outputs.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use dost_core::records::{ConversationRecord, TaskRecord, TaskStatus};

use crate::types::{Insight, InsightKind, PatternEntry};

const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Task completion rate below which the completion insight becomes actionable.
const COMPLETION_TARGET: f64 = 0.8;

/// Thresholds for mood insights.
#[derive(Debug, Clone, Copy)]
pub struct MoodThresholds {
    /// Samples needed in an hour bucket.
    pub min_samples: usize,
    /// Required share of the dominant mood.
    pub consistency: f64,
}

/// Most frequent value with its count and the total sample count.
///
/// Ties go to the value seen first.
pub fn most_common<T: PartialEq>(values: impl IntoIterator<Item = T>) -> Option<(T, usize, usize)> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    let mut total = 0;
    for value in values {
        total += 1;
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, n)) => *n += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(T, usize)> = None;
    for (value, count) in counts {
        if best.as_ref().is_none_or(|(_, n)| count > *n) {
            best = Some((value, count));
        }
    }
    best.map(|(value, count)| (value, count, total))
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn humanize(label: &str) -> String {
    label.replace('_', " ")
}

/// Dominant mood per hour of day, for hours with enough consistent samples.
pub fn mood_insights(entries: &[PatternEntry], thresholds: MoodThresholds) -> Vec<Insight> {
    // Hours keep first-seen order so output is stable.
    let mut by_hour: Vec<(u32, Vec<&str>)> = Vec::new();
    for entry in entries {
        match by_hour.iter_mut().find(|(h, _)| *h == entry.hour) {
            Some((_, moods)) => moods.push(&entry.value),
            None => by_hour.push((entry.hour, vec![&entry.value])),
        }
    }

    by_hour
        .into_iter()
        .filter(|(_, moods)| moods.len() >= thresholds.min_samples)
        .filter_map(|(hour, moods)| {
            let (mood, count, total) = most_common(moods)?;
            let share = ratio(count, total);
            (share >= thresholds.consistency).then(|| Insight {
                kind: InsightKind::MoodPattern,
                title: format!("Mood Pattern at {hour}:00"),
                description: format!("You tend to be {mood} around {hour}:00"),
                confidence: share,
                actionable: true,
                actions: vec![format!(
                    "Schedule positive activities when you're typically {mood}"
                )],
            })
        })
        .collect()
}

/// Most active hour and most active weekday.
pub fn time_insights(entries: &[PatternEntry]) -> Vec<Insight> {
    let mut insights = Vec::new();

    if let Some((hour, count, total)) = most_common(entries.iter().map(|e| e.hour)) {
        insights.push(Insight {
            kind: InsightKind::TimePattern,
            title: "Most Active Hour".into(),
            description: format!("You're most active around {hour}:00"),
            confidence: ratio(count, total),
            actionable: true,
            actions: vec!["Schedule important tasks during your most active hours".into()],
        });
    }

    if let Some((day, count, total)) = most_common(entries.iter().map(|e| e.day_of_week)) {
        let name = DAY_NAMES[day as usize % 7];
        insights.push(Insight {
            kind: InsightKind::DayPattern,
            title: "Most Active Day".into(),
            description: format!("You're most active on {name}"),
            confidence: ratio(count, total),
            actionable: true,
            actions: vec![format!("Plan important activities on {name}")],
        });
    }

    insights
}

/// Most common intent.
pub fn intent_insights(entries: &[PatternEntry]) -> Vec<Insight> {
    most_common(entries.iter().map(|e| e.value.as_str()))
        .map(|(intent, count, total)| {
            let label = humanize(intent);
            Insight {
                kind: InsightKind::IntentPattern,
                title: "Primary Use Case".into(),
                description: format!("You primarily use me for {label}"),
                confidence: ratio(count, total),
                actionable: true,
                actions: vec![format!("I can help you optimize {label} workflows")],
            }
        })
        .into_iter()
        .collect()
}

/// Completion rate and priority preference over tasks created since `cutoff`.
pub fn task_insights(tasks: &[TaskRecord], cutoff: DateTime<Utc>) -> Vec<Insight> {
    let recent: Vec<&TaskRecord> = tasks.iter().filter(|t| t.created_at >= cutoff).collect();
    if recent.is_empty() {
        return Vec::new();
    }

    let completed = recent
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .count();
    let rate = ratio(completed, recent.len());
    let below_target = rate < COMPLETION_TARGET;

    let mut insights = vec![Insight {
        kind: InsightKind::TaskCompletion,
        title: "Task Completion Rate".into(),
        description: format!("You complete {:.1}% of your tasks", rate * 100.0),
        confidence: 1.0,
        actionable: below_target,
        actions: if below_target {
            vec!["Consider breaking large tasks into smaller ones".into()]
        } else {
            Vec::new()
        },
    }];

    if let Some((priority, count, total)) = most_common(recent.iter().map(|t| t.priority)) {
        insights.push(Insight {
            kind: InsightKind::PriorityPattern,
            title: "Priority Preference".into(),
            description: format!("You mostly create {priority} priority tasks"),
            confidence: ratio(count, total),
            actionable: true,
            actions: vec!["Consider using varied priority levels for better organization".into()],
        });
    }

    insights
}

/// Daily average and total over conversations since `cutoff`.
pub fn conversation_insights(
    conversations: &[ConversationRecord],
    cutoff: DateTime<Utc>,
) -> Vec<Insight> {
    let recent: Vec<&ConversationRecord> = conversations
        .iter()
        .filter(|c| c.timestamp >= cutoff)
        .collect();
    if recent.is_empty() {
        return Vec::new();
    }

    let mut per_day: HashMap<NaiveDate, usize> = HashMap::new();
    for conv in &recent {
        *per_day.entry(conv.timestamp.date_naive()).or_default() += 1;
    }
    let average = recent.len() as f64 / per_day.len() as f64;

    vec![
        Insight {
            kind: InsightKind::ConversationFrequency,
            title: "Daily Interaction".into(),
            description: format!("You have an average of {average:.1} conversations per day"),
            confidence: 1.0,
            actionable: false,
            actions: Vec::new(),
        },
        Insight {
            kind: InsightKind::EngagementLevel,
            title: "Engagement Level".into(),
            description: format!("You've had {} conversations this month", recent.len()),
            confidence: 1.0,
            actionable: false,
            actions: Vec::new(),
        },
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
