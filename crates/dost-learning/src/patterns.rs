//! Per-user sample lists with a retention window.

use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Timelike, Utc};
use dost_core::UserId;

use crate::errors::LearningError;
use crate::types::{PatternEntry, PatternKind};

/// Samples grouped by user and kind, oldest first.
#[derive(Debug, Default)]
pub struct PatternStore {
    users: HashMap<UserId, HashMap<PatternKind, Vec<PatternEntry>>>,
    retention: Duration,
}

impl PatternStore {
    /// Empty store keeping `retention_days` of samples.
    pub fn new(retention_days: i64) -> Self {
        Self {
            users: HashMap::new(),
            retention: Duration::days(retention_days),
        }
    }

    /// Append a sample and prune that kind's list to the retention window.
    ///
    /// `at` is the sample time, `now` anchors the window. Returns the entry.
    pub fn record(
        &mut self,
        user_id: UserId,
        kind: PatternKind,
        value: impl Into<String>,
        at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> PatternEntry {
        let entry = PatternEntry {
            value: value.into(),
            timestamp: at,
            hour: at.hour(),
            day_of_week: at.weekday().num_days_from_monday(),
        };
        let cutoff = now - self.retention;
        let list = self
            .users
            .entry(user_id)
            .or_default()
            .entry(kind)
            .or_default();
        list.push(entry.clone());
        list.retain(|p| p.timestamp > cutoff);
        entry
    }

    /// Samples of one kind for a user; empty when none.
    pub fn entries(&self, user_id: UserId, kind: PatternKind) -> &[PatternEntry] {
        self.users
            .get(&user_id)
            .and_then(|kinds| kinds.get(&kind))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of kinds with at least one sample for the user.
    pub fn kinds_learned(&self, user_id: UserId) -> usize {
        self.users
            .get(&user_id)
            .map_or(0, |kinds| kinds.values().filter(|v| !v.is_empty()).count())
    }

    /// Users with any recorded samples.
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.users.clear();
    }
}

/// Parse an ISO-8601 timestamp, with or without offset (naive values are UTC).
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LearningError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .map_err(|_| LearningError::InvalidTimestamp(raw.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn record_derives_hour_and_weekday() {
        let mut store = PatternStore::new(30);
        // 2026-03-02 is a Monday.
        let entry = store.record(UserId(1), PatternKind::Mood, "positive", at(2, 9), at(2, 9));
        assert_eq!(entry.hour, 9);
        assert_eq!(entry.day_of_week, 0);
        assert_eq!(store.entries(UserId(1), PatternKind::Mood).len(), 1);
    }

    #[test]
    fn record_prunes_outside_retention() {
        let mut store = PatternStore::new(30);
        let user = UserId(1);
        let _ = store.record(user, PatternKind::Time, "", at(1, 8), at(1, 8));
        // 40 days later the first sample is outside the window.
        let later = at(1, 8) + Duration::days(40);
        let _ = store.record(user, PatternKind::Time, "", later, later);
        let entries = store.entries(user, PatternKind::Time);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp, later);
    }

    #[test]
    fn pruning_is_per_kind() {
        let mut store = PatternStore::new(30);
        let user = UserId(1);
        let _ = store.record(user, PatternKind::Mood, "neutral", at(1, 8), at(1, 8));
        let later = at(1, 8) + Duration::days(40);
        let _ = store.record(user, PatternKind::Intent, "question", later, later);
        assert_eq!(store.entries(user, PatternKind::Mood).len(), 1);
        assert_eq!(store.kinds_learned(user), 2);
    }

    #[test]
    fn unknown_user_has_no_entries() {
        let store = PatternStore::new(30);
        assert!(store.entries(UserId(9), PatternKind::Mood).is_empty());
        assert_eq!(store.kinds_learned(UserId(9)), 0);
    }

    #[test]
    fn parse_timestamp_accepts_offset_and_naive() {
        let a = parse_timestamp("2026-03-02T09:15:00+00:00").unwrap();
        let b = parse_timestamp("2026-03-02T09:15:00.123456").unwrap();
        assert_eq!(a.hour(), 9);
        assert_eq!(b.minute(), 15);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
