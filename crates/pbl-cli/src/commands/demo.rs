//! Scripted walkthrough: one admin and three learners sharing an in-process
//! document store.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use pbl_application::{AdminScreen, SessionController};
use pbl_core::simulation::{CauseAnalysis, ProblemDefinition, Solutions};
use pbl_infrastructure::MemoryDocumentStore;
use tokio::time::timeout;
use tracing::info;

use crate::app::Stores;
use crate::repl::render;

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run() -> Result<()> {
    let stores = Stores::remote(Arc::new(MemoryDocumentStore::new()));

    let admin = stores.controller("visitor_demo_admin".to_string()).await;
    admin.enter_admin().await;
    admin.set_setup_group_name("Demo Safety Class");
    admin.set_setup_total_teams(3)?;
    let config = admin.open_session().await?;
    info!(group_name = %config.group_name, "Demo session opened");
    heading(&format!("Session '{}' opened with {} teams", config.group_name, config.total_teams));

    let cast = [("Kim", 1, 1), ("Lee", 2, 3), ("Park", 3, 4)];
    let mut learners = Vec::new();
    for (index, (name, team_id, steps)) in cast.into_iter().enumerate() {
        let learner = stores.controller(format!("visitor_demo_{}", index + 1)).await;
        wait_for_open(&learner).await?;
        learner.select_team(team_id)?;
        learner.join(name).await?;
        for _ in 1..steps {
            learner.next()?;
        }
        learner.flush_presence().await;
        learners.push(learner);
    }

    wait_for_roster(&admin, cast.len()).await?;
    heading("Dashboard after everyone joined");
    print_dashboard(&admin);

    let finisher = learners.last().context("Demo has no learners")?;
    fill_answers(finisher);
    finisher.next()?;
    finisher.flush_presence().await;
    wait_for_completed(&admin, 1).await?;

    heading("Report of the first learner to finish");
    print!("{}", render::report(&finisher.report()));

    heading("Dashboard at the end");
    print_dashboard(&admin);
    Ok(())
}

fn heading(text: &str) {
    println!();
    println!("{}", format!("== {} ==", text).bright_magenta().bold());
}

fn print_dashboard(admin: &SessionController) {
    print!("{}", render::admin_screen(&admin.admin_screen()));
}

fn fill_answers(learner: &SessionController) {
    learner.set_problem_definition(ProblemDefinition {
        human_damage: "One worker burned while evacuating".to_string(),
        material_damage: "Line 2 and stored packaging destroyed".to_string(),
        others: "Production halted for a week".to_string(),
    });
    learner.set_analysis_fire(CauseAnalysis {
        direct_cause: "Electrical overload from the rushed schedule".to_string(),
        contributing_factors: "Packaging stacked next to the panel".to_string(),
    });
    learner.set_analysis_injury(CauseAnalysis {
        direct_cause: "Blocked emergency exit".to_string(),
        contributing_factors: "No evacuation drill this year".to_string(),
    });
    learner.set_solutions(Solutions {
        immediate: "Clear every exit and inspect the panels".to_string(),
        prevention: "Load monitoring and storage rules near panels".to_string(),
        contingency: "Quarterly evacuation drills".to_string(),
    });
}

async fn wait_for_open(learner: &SessionController) -> Result<()> {
    let mut config = learner.watch_config();
    let opened = config.wait_for(|c| c.as_ref().is_some_and(|c| c.is_session_active));
    match timeout(SETTLE_TIMEOUT, opened).await {
        Ok(Ok(_)) => Ok(()),
        _ => bail!("Learner never saw the session open"),
    }
}

async fn wait_for_roster(admin: &SessionController, expected: usize) -> Result<()> {
    let mut roster = admin.watch_roster();
    match timeout(SETTLE_TIMEOUT, roster.wait_for(|r| r.len() >= expected)).await {
        Ok(Ok(_)) => Ok(()),
        _ => bail!("Roster never reached {} learners", expected),
    }
}

async fn wait_for_completed(admin: &SessionController, expected: usize) -> Result<()> {
    let mut roster = admin.watch_roster();
    let done = roster.wait_for(|r| r.iter().filter(|l| l.is_completed()).count() >= expected);
    match timeout(SETTLE_TIMEOUT, done).await {
        Ok(Ok(_)) => {}
        _ => bail!("Nobody reached the report"),
    }
    if !matches!(admin.admin_screen(), AdminScreen::Dashboard(_)) {
        bail!("Admin is not on the dashboard");
    }
    Ok(())
}
