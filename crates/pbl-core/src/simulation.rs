//! Client-local simulation state.
//!
//! Everything in here stays on the learner's device. It is never written to
//! a store; the presence record is the only thing other clients see.

use serde::{Deserialize, Serialize};

use crate::step::Step;

/// Identity chosen by a learner at join time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub team_id: u32,
    pub team_name: String,
    /// Group name of the session the learner joined.
    pub group_name: String,
}

/// Damage inventory written on the problem definition step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDefinition {
    pub human_damage: String,
    pub material_damage: String,
    pub others: String,
}

/// One root-cause analysis (fire or injury).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CauseAnalysis {
    /// Root (direct) cause.
    pub direct_cause: String,
    /// Factors that made the outcome worse.
    pub contributing_factors: String,
}

/// Measures drafted on the solution step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Solutions {
    pub immediate: String,
    pub prevention: String,
    pub contingency: String,
}

/// Work in progress of one learner for the duration of one visit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationState {
    pub current_step: Step,
    pub user: Option<UserProfile>,
    pub problem_definition: ProblemDefinition,
    pub analysis_fire: CauseAnalysis,
    pub analysis_injury: CauseAnalysis,
    pub solutions: Solutions,
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }

    // Step components replace their whole slice; there is no per-field setter.

    pub fn set_problem_definition(&mut self, data: ProblemDefinition) {
        self.problem_definition = data;
    }

    pub fn set_analysis_fire(&mut self, data: CauseAnalysis) {
        self.analysis_fire = data;
    }

    pub fn set_analysis_injury(&mut self, data: CauseAnalysis) {
        self.analysis_injury = data;
    }

    pub fn set_solutions(&mut self, data: Solutions) {
        self.solutions = data;
    }

    /// Clears the profile and returns to the intro.
    ///
    /// Answers are left in place, matching a browser tab that keeps its
    /// form state after logging out.
    pub fn logout(&mut self) {
        self.current_step = Step::Intro;
        self.user = None;
    }

    /// Projects the state into the final report.
    pub fn report(&self) -> Report {
        let unknown = || "Unknown".to_string();
        Report {
            team_name: self
                .user
                .as_ref()
                .map(|u| u.team_name.clone())
                .unwrap_or_else(unknown),
            author: self
                .user
                .as_ref()
                .map(|u| u.name.clone())
                .unwrap_or_else(unknown),
            group_name: self
                .user
                .as_ref()
                .map(|u| u.group_name.clone())
                .unwrap_or_default(),
            problem_definition: self.problem_definition.clone(),
            analysis_fire: self.analysis_fire.clone(),
            analysis_injury: self.analysis_injury.clone(),
            solutions: self.solutions.clone(),
        }
    }
}

/// The final report, a read-only view over [`SimulationState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub team_name: String,
    pub author: String,
    pub group_name: String,
    pub problem_definition: ProblemDefinition,
    pub analysis_fire: CauseAnalysis,
    pub analysis_injury: CauseAnalysis,
    pub solutions: Solutions,
}

impl Report {
    /// Sections left blank by the learner, by section title.
    pub fn missing_sections(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        let pd = &self.problem_definition;
        if pd.human_damage.trim().is_empty() && pd.material_damage.trim().is_empty() {
            missing.push("problem definition");
        }
        if self.analysis_fire.direct_cause.trim().is_empty() {
            missing.push("fire cause analysis");
        }
        if self.analysis_injury.direct_cause.trim().is_empty() {
            missing.push("injury cause analysis");
        }
        let s = &self.solutions;
        if s.immediate.trim().is_empty()
            && s.prevention.trim().is_empty()
            && s.contingency.trim().is_empty()
        {
            missing.push("solutions");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing_sections().is_empty()
    }
}
