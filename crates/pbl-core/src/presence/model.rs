//! LearnerRecord domain model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::step::Step;

/// A learner counts as active while its last navigation is younger than this.
pub const DEFAULT_ACTIVE_THRESHOLD_SECS: i64 = 300;

/// [`DEFAULT_ACTIVE_THRESHOLD_SECS`] as a `Duration`.
pub fn default_active_threshold() -> Duration {
    Duration::seconds(DEFAULT_ACTIVE_THRESHOLD_SECS)
}

/// Presence record of one learner device, keyed by its visitor id.
///
/// Timestamps serialize as ISO-8601 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerRecord {
    pub visitor_id: String,
    pub name: String,
    pub team_id: u32,
    /// Display name of the team, e.g. `"2조"`.
    pub team_name: String,
    pub current_step: Step,
    /// Set when the record is first created and never moved afterwards.
    pub joined_at: DateTime<Utc>,
    /// Refreshed on every step transition.
    pub last_active_at: DateTime<Utc>,
}

impl LearnerRecord {
    /// Builds the record stored by an upsert.
    ///
    /// An existing record keeps its `joined_at`; everything else is
    /// overwritten and `last_active_at` becomes `now`.
    pub fn upserted(
        existing: Option<&LearnerRecord>,
        visitor_id: &str,
        name: &str,
        team_id: u32,
        team_name: &str,
        current_step: Step,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            visitor_id: visitor_id.to_string(),
            name: name.to_string(),
            team_id,
            team_name: team_name.to_string(),
            current_step,
            joined_at: existing.map(|r| r.joined_at).unwrap_or(now),
            last_active_at: now,
        }
    }

    /// Moves the record to `step`, leaving identity and join time untouched.
    pub fn advance(&mut self, step: Step, now: DateTime<Utc>) {
        self.current_step = step;
        self.last_active_at = now;
    }

    /// Whether the learner navigated within `threshold` of `now`.
    ///
    /// Always evaluated at read time; nothing about activity is stored.
    pub fn is_active_at(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        now.signed_duration_since(self.last_active_at) < threshold
    }

    pub fn is_completed(&self) -> bool {
        self.current_step == Step::Report
    }
}

/// Orders a roster ascending by team id.
///
/// Ties keep a stable order by join time, then visitor id, so repeated
/// snapshots of the same collection compare equal.
pub fn sort_roster(records: &mut [LearnerRecord]) {
    records.sort_by(|a, b| {
        a.team_id
            .cmp(&b.team_id)
            .then_with(|| a.joined_at.cmp(&b.joined_at))
            .then_with(|| a.visitor_id.cmp(&b.visitor_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(visitor_id: &str, team_id: u32, last_active_at: DateTime<Utc>) -> LearnerRecord {
        LearnerRecord {
            visitor_id: visitor_id.to_string(),
            name: "Kim".to_string(),
            team_id,
            team_name: format!("{}조", team_id),
            current_step: Step::Situation,
            joined_at: last_active_at,
            last_active_at,
        }
    }

    #[test]
    fn test_active_threshold() {
        let now = Utc::now();
        let recent = record("v1", 1, now - Duration::minutes(4));
        let stale = record("v2", 1, now - Duration::minutes(6));

        assert!(recent.is_active_at(now, default_active_threshold()));
        assert!(!stale.is_active_at(now, default_active_threshold()));
    }

    #[test]
    fn test_upsert_keeps_join_time() {
        let joined = Utc::now() - Duration::hours(1);
        let existing = record("v1", 3, joined);
        let now = Utc::now();

        let updated =
            LearnerRecord::upserted(Some(&existing), "v1", "Lee", 2, "2조", Step::Situation, now);
        assert_eq!(updated.joined_at, joined);
        assert_eq!(updated.last_active_at, now);
        assert_eq!(updated.name, "Lee");

        let fresh = LearnerRecord::upserted(None, "v9", "Park", 1, "1조", Step::Situation, now);
        assert_eq!(fresh.joined_at, now);
    }

    #[test]
    fn test_advance_preserves_identity() {
        let joined = Utc::now() - Duration::minutes(10);
        let mut rec = record("v1", 3, joined);
        rec.advance(Step::AnalysisWhy, Utc::now());

        assert_eq!(rec.current_step, Step::AnalysisWhy);
        assert_eq!(rec.name, "Kim");
        assert_eq!(rec.team_id, 3);
        assert_eq!(rec.joined_at, joined);
    }

    #[test]
    fn test_sort_roster_by_team() {
        let now = Utc::now();
        let mut roster = vec![record("c", 3, now), record("b", 1, now), record("a", 3, now)];
        sort_roster(&mut roster);
        let order: Vec<&str> = roster.iter().map(|r| r.visitor_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_timestamps_are_iso8601() {
        let json = serde_json::to_value(record("v1", 1, Utc::now())).unwrap();
        let joined = json["joinedAt"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(joined).is_ok());
        assert_eq!(json["currentStep"], "SITUATION");
        assert_eq!(json["visitorId"], "v1");
    }
}
