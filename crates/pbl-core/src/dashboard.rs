//! Admin dashboard statistics.
//!
//! Pure functions over a session config and a roster snapshot. Nothing is
//! cached; the admin view recomputes on every delivered change.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::presence::LearnerRecord;
use crate::session::{SessionConfig, team_name};
use crate::step::Step;

/// Progress of one team bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamSummary {
    pub team_id: u32,
    pub team_name: String,
    pub participants: usize,
    /// Mean step progress of the members, rounded; 0 for an empty team.
    pub average_progress: u32,
}

/// Overall and per-team progress of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_participants: usize,
    pub active_participants: usize,
    pub completed: usize,
    pub teams: Vec<TeamSummary>,
}

impl DashboardStats {
    pub fn team(&self, team_id: u32) -> Option<&TeamSummary> {
        self.teams.iter().find(|t| t.team_id == team_id)
    }
}

/// One row of the admin's learner table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnerRow {
    pub visitor_id: String,
    pub name: String,
    pub team_name: String,
    pub step: Step,
    pub progress: u32,
    pub active: bool,
}

/// Computes dashboard statistics as of `now`.
///
/// Teams are reported for `1..=config.total_teams`. Records whose team lies
/// outside that range (left over from a larger earlier configuration) still
/// count toward the totals but belong to no team row.
pub fn aggregate(
    config: &SessionConfig,
    records: &[LearnerRecord],
    now: DateTime<Utc>,
    active_threshold: Duration,
) -> DashboardStats {
    let teams = (1..=config.total_teams)
        .map(|team_id| {
            let members: Vec<&LearnerRecord> =
                records.iter().filter(|r| r.team_id == team_id).collect();
            TeamSummary {
                team_id,
                team_name: team_name(team_id),
                participants: members.len(),
                average_progress: average_progress(&members),
            }
        })
        .collect();

    DashboardStats {
        total_participants: records.len(),
        active_participants: records
            .iter()
            .filter(|r| r.is_active_at(now, active_threshold))
            .count(),
        completed: records.iter().filter(|r| r.is_completed()).count(),
        teams,
    }
}

/// Builds the learner table rows in roster order.
pub fn learner_rows(
    records: &[LearnerRecord],
    now: DateTime<Utc>,
    active_threshold: Duration,
) -> Vec<LearnerRow> {
    records
        .iter()
        .map(|r| LearnerRow {
            visitor_id: r.visitor_id.clone(),
            name: r.name.clone(),
            team_name: r.team_name.clone(),
            step: r.current_step,
            progress: r.current_step.progress_percent(),
            active: r.is_active_at(now, active_threshold),
        })
        .collect()
}

fn average_progress(members: &[&LearnerRecord]) -> u32 {
    if members.is_empty() {
        return 0;
    }
    let total: u32 = members
        .iter()
        .map(|r| r.current_step.progress_percent())
        .sum();
    (f64::from(total) / members.len() as f64).round() as u32
}
