//! Text rendering of screens, dashboards and reports.

use std::fmt::Write;

use colored::Colorize;
use pbl_application::{AdminScreen, DashboardView, LearnerScreen, SetupDraft};
use pbl_core::simulation::Report;
use pbl_core::step::Step;

pub fn step_title(step: Step) -> &'static str {
    match step {
        Step::Intro => "Intro",
        Step::Situation => "Situation briefing",
        Step::ProblemDefinition => "Problem definition",
        Step::AnalysisWhy => "Cause analysis",
        Step::Solution => "Solutions",
        Step::Report => "Report",
    }
}

fn step_guide(step: Step) -> &'static str {
    match step {
        Step::Intro => "",
        Step::Situation => {
            "A fire broke out on the production floor of Factory 3 during a rushed night shift. \
             Read the briefing, then move on with 'next'."
        }
        Step::ProblemDefinition => {
            "List the human damage, the material damage and anything else affected. Use 'edit'."
        }
        Step::AnalysisWhy => {
            "Find the direct cause and the contributing factors of the fire and of the injury. \
             Use 'edit'."
        }
        Step::Solution => "Draft immediate, preventive and contingency measures. Use 'edit'.",
        Step::Report => "Your report is ready. Use 'report' to read it.",
    }
}

pub fn learner_screen(screen: &LearnerScreen) -> String {
    let mut out = String::new();
    match screen {
        LearnerScreen::Loading => {
            let _ = writeln!(out, "{}", "Connecting to the session...".bright_black());
        }
        LearnerScreen::Waiting => {
            let _ = writeln!(out, "{}", "Waiting for the instructor to open the session.".yellow());
        }
        LearnerScreen::TeamSelection { group_name, choices } => {
            let _ = writeln!(out, "{} {}", "Group:".bold(), group_name);
            let teams: Vec<String> = choices.iter().map(|id| id.to_string()).collect();
            let _ = writeln!(out, "Pick your team with 'team <n>': {}", teams.join(" "));
        }
        LearnerScreen::NameEntry { group_name, team_id } => {
            let _ = writeln!(
                out,
                "{} {}  {} {}",
                "Group:".bold(),
                group_name,
                "Team:".bold(),
                team_id
            );
            let _ = writeln!(out, "Enter your name with 'join <name>'.");
        }
        LearnerScreen::Step(step) => {
            let _ = writeln!(
                out,
                "{} {}",
                format!("[{}%]", step.progress_percent()).bright_black(),
                step_title(*step).bold()
            );
            let _ = writeln!(out, "{}", step_guide(*step));
        }
    }
    out
}

pub fn admin_screen(screen: &AdminScreen) -> String {
    match screen {
        AdminScreen::Loading => format!("{}\n", "Connecting to the session...".bright_black()),
        AdminScreen::Setup(draft) => setup_form(draft),
        AdminScreen::Dashboard(view) => dashboard(view),
    }
}

fn setup_form(draft: &SetupDraft) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Session settings".bold());
    let group = if draft.group_name.is_empty() {
        "(not set)".bright_black().to_string()
    } else {
        draft.group_name.clone()
    };
    let _ = writeln!(out, "  group: {}", group);
    let _ = writeln!(out, "  teams: {}", draft.total_teams);
    let _ = writeln!(out, "Use 'group <name>' and 'teams <n>', then 'open'.");
    out
}

pub fn dashboard(view: &DashboardView) -> String {
    let mut out = String::new();
    let stats = &view.stats;
    let _ = writeln!(
        out,
        "{}  ({} teams)",
        view.group_name.bold(),
        view.total_teams
    );
    let _ = writeln!(
        out,
        "participants {}  active {}  completed {}",
        stats.total_participants.to_string().bright_cyan(),
        stats.active_participants.to_string().bright_green(),
        stats.completed.to_string().bright_magenta()
    );

    let _ = writeln!(out);
    for team in &stats.teams {
        let _ = writeln!(
            out,
            "  {:<6} {:>3} learners  {:>3}% {}",
            team.team_name,
            team.participants,
            team.average_progress,
            progress_bar(team.average_progress)
        );
    }

    if !view.learners.is_empty() {
        let _ = writeln!(out);
        for row in &view.learners {
            let marker = if row.active {
                "●".bright_green()
            } else {
                "○".bright_black()
            };
            let _ = writeln!(
                out,
                "  {} {:<16} {:<6} {:<20} {:>3}%",
                marker,
                row.name,
                row.team_name,
                step_title(row.step),
                row.progress
            );
        }
    }
    out
}

fn progress_bar(percent: u32) -> String {
    let filled = (percent.min(100) / 10) as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(10 - filled))
}

pub fn report(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "Factory 3 fire investigation report".bold());
    let _ = writeln!(
        out,
        "team {}  author {}  group {}",
        report.team_name, report.author, report.group_name
    );

    let pd = &report.problem_definition;
    section(&mut out, "Problem definition", &[
        ("Human damage", &pd.human_damage),
        ("Material damage", &pd.material_damage),
        ("Others", &pd.others),
    ]);
    section(&mut out, "Fire cause", &[
        ("Direct cause", &report.analysis_fire.direct_cause),
        ("Contributing factors", &report.analysis_fire.contributing_factors),
    ]);
    section(&mut out, "Injury cause", &[
        ("Direct cause", &report.analysis_injury.direct_cause),
        ("Contributing factors", &report.analysis_injury.contributing_factors),
    ]);
    let s = &report.solutions;
    section(&mut out, "Solutions", &[
        ("Immediate", &s.immediate),
        ("Prevention", &s.prevention),
        ("Contingency", &s.contingency),
    ]);

    let missing = report.missing_sections();
    if !missing.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{} {}", "Incomplete:".yellow(), missing.join(", "));
    }
    out
}

fn section(out: &mut String, title: &str, fields: &[(&str, &String)]) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", title.bright_cyan());
    for (label, value) in fields {
        let value = if value.trim().is_empty() { "-" } else { value.as_str() };
        let _ = writeln!(out, "  {}: {}", label, value);
    }
}
