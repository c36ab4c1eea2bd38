//! SessionConfig domain model.

use serde::{Deserialize, Serialize};

use crate::error::{PblError, Result};

/// Lowest allowed team count.
pub const MIN_TEAMS: u32 = 1;
/// Highest allowed team count.
pub const MAX_TEAMS: u32 = 12;
/// Team count of a freshly created session.
pub const DEFAULT_TOTAL_TEAMS: u32 = 6;

/// The admin-controlled configuration of one exercise instance.
///
/// There is exactly one of these per store. It is never deleted, only
/// overwritten as a whole, and every client reads it continuously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Human label for the group. Empty means "not set yet".
    #[serde(default)]
    pub group_name: String,
    /// Number of team buckets, always within `MIN_TEAMS..=MAX_TEAMS`.
    #[serde(default = "default_total_teams")]
    pub total_teams: u32,
    /// Whether learners may leave the waiting room.
    #[serde(default)]
    pub is_session_active: bool,
}

fn default_total_teams() -> u32 {
    DEFAULT_TOTAL_TEAMS
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            group_name: String::new(),
            total_teams: DEFAULT_TOTAL_TEAMS,
            is_session_active: false,
        }
    }
}

impl SessionConfig {
    /// Creates an active session config after validating its fields.
    pub fn active(group_name: impl Into<String>, total_teams: u32) -> Result<Self> {
        let config = Self {
            group_name: group_name.into(),
            total_teams,
            is_session_active: true,
        };
        config.validate_for_activation()?;
        Ok(config)
    }

    /// Checks the fields an admin must fill in before opening a session.
    pub fn validate_for_activation(&self) -> Result<()> {
        if self.group_name.trim().is_empty() {
            return Err(PblError::validation("group name must not be empty"));
        }
        Self::validate_total_teams(self.total_teams)
    }

    /// Checks that a team count lies within `MIN_TEAMS..=MAX_TEAMS`.
    pub fn validate_total_teams(total_teams: u32) -> Result<()> {
        if !(MIN_TEAMS..=MAX_TEAMS).contains(&total_teams) {
            return Err(PblError::validation(format!(
                "team count must be between {} and {}, got {}",
                MIN_TEAMS, MAX_TEAMS, total_teams
            )));
        }
        Ok(())
    }

    /// Team ids a learner may pick, `1..=total_teams`.
    pub fn team_choices(&self) -> Vec<u32> {
        (1..=self.total_teams.clamp(MIN_TEAMS, MAX_TEAMS)).collect()
    }

    /// Whether `team_id` names one of this session's team buckets.
    pub fn contains_team(&self, team_id: u32) -> bool {
        team_id >= 1 && team_id <= self.total_teams
    }

    /// Returns a copy with the team count clamped into range.
    ///
    /// Used on values read back from storage, where a hand-edited or
    /// foreign payload could carry an out-of-range count.
    pub fn normalized(mut self) -> Self {
        self.total_teams = self.total_teams.clamp(MIN_TEAMS, MAX_TEAMS);
        self
    }

    /// True when moving from `previous` to `self` opens a new session.
    pub fn activates_from(&self, previous: Option<&SessionConfig>) -> bool {
        self.is_session_active && !previous.is_some_and(|p| p.is_session_active)
    }
}

/// Display name of a team bucket, e.g. `"2조"`.
pub fn team_name(team_id: u32) -> String {
    format!("{}조", team_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let config = SessionConfig::default();
        assert_eq!(config.group_name, "");
        assert_eq!(config.total_teams, 6);
        assert!(!config.is_session_active);
    }

    #[test]
    fn test_team_choices_cover_every_count() {
        for total in MIN_TEAMS..=MAX_TEAMS {
            let config = SessionConfig::active("ABC", total).unwrap();
            let choices = config.team_choices();
            assert_eq!(choices.len() as u32, total);
            assert!(choices.iter().all(|id| config.contains_team(*id)));
            assert!(!config.contains_team(0));
            assert!(!config.contains_team(total + 1));
        }
    }

    #[test]
    fn test_activation_validation() {
        assert!(SessionConfig::active("  ", 4).unwrap_err().is_validation());
        assert!(SessionConfig::active("ABC", 0).unwrap_err().is_validation());
        assert!(SessionConfig::active("ABC", 13).unwrap_err().is_validation());
    }

    #[test]
    fn test_activation_edge() {
        let inactive = SessionConfig::default();
        let active = SessionConfig::active("ABC", 4).unwrap();
        assert!(active.activates_from(None));
        assert!(active.activates_from(Some(&inactive)));
        assert!(!active.activates_from(Some(&active)));
        assert!(!inactive.activates_from(Some(&active)));
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_value(SessionConfig::active("ABC", 4).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"groupName": "ABC", "totalTeams": 4, "isSessionActive": true})
        );

        let partial: SessionConfig = serde_json::from_str(r#"{"groupName":"X"}"#).unwrap();
        assert_eq!(partial.total_teams, DEFAULT_TOTAL_TEAMS);
        assert!(!partial.is_session_active);
    }

    #[test]
    fn test_team_name() {
        assert_eq!(team_name(2), "2조");
        let clamped = SessionConfig {
            total_teams: 40,
            ..SessionConfig::default()
        }
        .normalized();
        assert_eq!(clamped.total_teams, MAX_TEAMS);
    }
}
