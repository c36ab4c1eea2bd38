//! The fixed step sequence a learner walks through.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// One stage of the factory fire exercise.
///
/// The declaration order is the navigation order, so the derived `Ord`
/// compares steps by progress.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum Step {
    /// Waiting room, team selection and name entry.
    #[default]
    Intro,
    /// Situation briefing.
    Situation,
    /// Damage inventory (human, material, other).
    ProblemDefinition,
    /// Root-cause analysis for the fire and for the injury.
    AnalysisWhy,
    /// Immediate, preventive and contingency measures.
    Solution,
    /// Final report projection.
    Report,
}

impl Step {
    /// Progress percentage shown on the admin dashboard.
    pub fn progress_percent(self) -> u32 {
        match self {
            Step::Intro => 0,
            Step::Situation => 20,
            Step::ProblemDefinition => 40,
            Step::AnalysisWhy => 60,
            Step::Solution => 80,
            Step::Report => 100,
        }
    }

    /// The step reached by `onNext`, or `None` at the end of the sequence.
    pub fn next(self) -> Option<Step> {
        match self {
            Step::Intro => Some(Step::Situation),
            Step::Situation => Some(Step::ProblemDefinition),
            Step::ProblemDefinition => Some(Step::AnalysisWhy),
            Step::AnalysisWhy => Some(Step::Solution),
            Step::Solution => Some(Step::Report),
            Step::Report => None,
        }
    }

    /// The step reached by `onBack`.
    ///
    /// The intro and the situation briefing have no back action; leaving
    /// them goes through exit/logout instead.
    pub fn previous(self) -> Option<Step> {
        match self {
            Step::Intro | Step::Situation => None,
            Step::ProblemDefinition => Some(Step::Situation),
            Step::AnalysisWhy => Some(Step::ProblemDefinition),
            Step::Solution => Some(Step::AnalysisWhy),
            Step::Report => Some(Step::Solution),
        }
    }

    /// All steps in navigation order.
    pub fn all() -> impl Iterator<Item = Step> {
        Step::iter()
    }
}
