//! What a client currently shows, derived from local state and the latest
//! session config.

use pbl_core::dashboard::{DashboardStats, LearnerRow};
use pbl_core::session::{DEFAULT_TOTAL_TEAMS, SessionConfig};
use pbl_core::step::Step;
use serde::Serialize;

/// Which side of the app a client is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewMode {
    #[default]
    Learner,
    Admin,
}

/// Screen of the learner view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnerScreen {
    /// No session config has arrived yet.
    Loading,
    /// The session is closed. Shown regardless of the local step.
    Waiting,
    /// The session is open and the learner has not picked a team.
    TeamSelection { group_name: String, choices: Vec<u32> },
    /// A team is picked; the learner still has to enter a name.
    NameEntry { group_name: String, team_id: u32 },
    /// Past the intro, on one of the exercise steps.
    Step(Step),
}

/// Screen of the admin view.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminScreen {
    Loading,
    /// Session settings form; forced while the session is closed.
    Setup(SetupDraft),
    Dashboard(DashboardView),
}

/// Unsaved contents of the admin's session settings form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupDraft {
    pub group_name: String,
    pub total_teams: u32,
}

impl SetupDraft {
    /// Prefills the form from the stored config.
    pub fn from_config(config: &SessionConfig) -> Self {
        let total_teams = if config.group_name.is_empty() && !config.is_session_active {
            DEFAULT_TOTAL_TEAMS
        } else {
            config.total_teams
        };
        Self {
            group_name: config.group_name.clone(),
            total_teams,
        }
    }
}

/// Everything the admin dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub group_name: String,
    pub total_teams: u32,
    pub stats: DashboardStats,
    pub learners: Vec<LearnerRow>,
}

/// Intro progress of a learner who has not joined yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct IntroDraft {
    pub(crate) team_id: Option<u32>,
}

pub(crate) fn learner_screen(
    config: Option<&SessionConfig>,
    step: Step,
    intro: &IntroDraft,
) -> LearnerScreen {
    let Some(config) = config else {
        return LearnerScreen::Loading;
    };
    if !config.is_session_active {
        return LearnerScreen::Waiting;
    }
    if step != Step::Intro {
        return LearnerScreen::Step(step);
    }
    match intro.team_id {
        Some(team_id) if config.contains_team(team_id) => LearnerScreen::NameEntry {
            group_name: config.group_name.clone(),
            team_id,
        },
        _ => LearnerScreen::TeamSelection {
            group_name: config.group_name.clone(),
            choices: config.team_choices(),
        },
    }
}
