//! Keyword-driven assistant.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dost_core::UserId;
use dost_core::records::{CalendarEvent, TaskPriority, TaskRecord};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{Assistant, AssistantAction, AssistantReply};

/// Action titles are cut to this many characters.
const ACTION_TITLE_CHARS: usize = 100;

const MATCH_CONFIDENCE: f64 = 0.8;
const FALLBACK_CONFIDENCE: f64 = 0.5;

static DATE_PATTERNS: LazyLock<[Regex; 3]> = LazyLock::new(|| {
    [
        Regex::new(r"(?i)\b(today|tomorrow|yesterday)\b").unwrap(),
        Regex::new(r"\b(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})\b").unwrap(),
        Regex::new(r"(?i)\b(monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b").unwrap(),
    ]
});

static TIME_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"\b(\d{1,2}:\d{2})\b").unwrap(),
        Regex::new(r"(?i)\b(\d{1,2}(am|pm))\b").unwrap(),
    ]
});

// ─────────────────────────────────────────────────────────────────────────────
// Intent
// ─────────────────────────────────────────────────────────────────────────────

/// What the user is trying to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Create, add, remind, schedule, plan.
    TaskCreation,
    /// What / how / when / where / why / who.
    Question,
    /// Calendar, meeting, appointment, event.
    Calendar,
    /// Tell me, explain, show me, find.
    Information,
    /// Greetings and everything else.
    Casual,
}

impl Intent {
    /// Checked in this order; the first keyword hit wins.
    const KEYWORDS: [(Self, &'static [&'static str]); 5] = [
        (Self::TaskCreation, &["create", "add", "remind", "schedule", "plan"]),
        (Self::Question, &["what", "how", "when", "where", "why", "who"]),
        (Self::Calendar, &["calendar", "meeting", "appointment", "event"]),
        (Self::Information, &["tell me", "explain", "show me", "find"]),
        (Self::Casual, &["hi", "hello", "how are you", "thanks", "bye"]),
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TaskCreation => "task_creation",
            Self::Question => "question",
            Self::Calendar => "calendar",
            Self::Information => "information",
            Self::Casual => "casual",
        }
    }
}

/// Dates and times mentioned in a message, as written.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Entities {
    /// Relative days, numeric dates, weekday names.
    pub dates: Vec<String>,
    /// `HH:MM` and `Ham`/`Hpm` times.
    pub times: Vec<String>,
}

/// Intent plus extracted entities.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntentAnalysis {
    /// Detected intent.
    pub intent: Intent,
    /// 0.8 on a keyword hit, 0.5 for the fallback.
    pub confidence: f64,
    /// Extracted entities.
    pub entities: Entities,
}

/// Classify a message by keyword containment.
///
/// Keywords match as substrings of the lower-cased message.
pub fn analyze_intent(message: &str) -> IntentAnalysis {
    let lower = message.to_lowercase();
    let hit = Intent::KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(intent, _)| *intent);

    IntentAnalysis {
        intent: hit.unwrap_or(Intent::Casual),
        confidence: if hit.is_some() {
            MATCH_CONFIDENCE
        } else {
            FALLBACK_CONFIDENCE
        },
        entities: extract_entities(message),
    }
}

fn extract_entities(message: &str) -> Entities {
    Entities {
        dates: find_all(&DATE_PATTERNS[..], message),
        times: find_all(&TIME_PATTERNS[..], message),
    }
}

/// First capture group of every match, pattern by pattern.
fn find_all(patterns: &[Regex], message: &str) -> Vec<String> {
    patterns
        .iter()
        .flat_map(|re| re.captures_iter(message))
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_owned()))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Mood
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse sentiment of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    /// Happy, great, awesome, good, excellent.
    Positive,
    /// Sad, bad, terrible, awful, horrible.
    Negative,
    /// Ok, fine, alright.
    Neutral,
}

impl Mood {
    const INDICATORS: [(Self, &'static [&'static str]); 3] = [
        (Self::Positive, &["happy", "great", "awesome", "good", "excellent"]),
        (Self::Negative, &["sad", "bad", "terrible", "awful", "horrible"]),
        (Self::Neutral, &["ok", "fine", "alright"]),
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
        }
    }
}

/// First mood with an indicator contained in the message.
pub fn detect_mood(message: &str) -> Option<Mood> {
    let lower = message.to_lowercase();
    Mood::INDICATORS
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(mood, _)| *mood)
}

// ─────────────────────────────────────────────────────────────────────────────
// Assistant
// ─────────────────────────────────────────────────────────────────────────────

/// Rule-based assistant: keyword intents, regex entities, echo replies.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordAssistant;

impl KeywordAssistant {
    /// Reply with an explicit clock for `last_interaction`.
    pub fn respond_at(
        &self,
        message: &str,
        context: &Map<String, Value>,
        now: DateTime<Utc>,
    ) -> AssistantReply {
        let analysis = analyze_intent(message);
        let text = format!("I hear you saying: '{message}'.");
        let actions = extract_actions(&text, &analysis);
        let context = update_context(context, message, analysis.intent, now);
        AssistantReply {
            message: text,
            context,
            actions,
            intent: analysis.intent,
            confidence: analysis.confidence,
        }
    }
}

fn update_context(
    current: &Map<String, Value>,
    message: &str,
    intent: Intent,
    now: DateTime<Utc>,
) -> Map<String, Value> {
    let mut context = current.clone();
    let count = context
        .get("conversation_count")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let _ = context.insert("last_interaction".into(), json!(now.to_rfc3339()));
    let _ = context.insert("last_intent".into(), json!(intent.as_str()));
    let _ = context.insert("conversation_count".into(), json!(count + 1));
    if let Some(mood) = detect_mood(message) {
        let _ = context.insert("mood".into(), json!(mood.as_str()));
    }
    context
}

fn extract_actions(response: &str, analysis: &IntentAnalysis) -> Vec<AssistantAction> {
    let title: String = response.chars().take(ACTION_TITLE_CHARS).collect();
    let first_date = analysis.entities.dates.first().cloned();
    match analysis.intent {
        Intent::TaskCreation => vec![AssistantAction::CreateTask {
            title,
            due_date: first_date,
            priority: TaskPriority::Medium,
        }],
        Intent::Calendar => vec![AssistantAction::CalendarEvent {
            title,
            date: first_date,
            time: analysis.entities.times.first().cloned(),
        }],
        _ => Vec::new(),
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("1 {word}")
    } else {
        format!("{n} {word}s")
    }
}

#[async_trait]
impl Assistant for KeywordAssistant {
    async fn respond(&self, user_id: UserId, message: &str, context: &Map<String, Value>) -> AssistantReply {
        let reply = self.respond_at(message, context, Utc::now());
        debug!(user_id = %user_id, intent = reply.intent.as_str(), actions = reply.actions.len(), "keyword reply");
        reply
    }

    async fn day_summary(&self, events: &[CalendarEvent], tasks: &[TaskRecord]) -> String {
        let load = match events.len() + tasks.len() {
            0 => return "Your day is clear. Nothing is scheduled and no tasks are due.".to_owned(),
            1..=3 => "light",
            4..=6 => "balanced",
            _ => "busy",
        };
        let mut summary = format!(
            "You have {} and {} today. It looks like a {load} day.",
            plural(events.len(), "event"),
            plural(tasks.len(), "task"),
        );
        if let Some(first) = events.first() {
            summary.push_str(&format!(" First up: {} at {}.", first.title, first.start.format("%H:%M")));
        }
        summary
    }
}
