use anyhow::Result;
use chrono::Utc;
use colored::Colorize;
use pbl_application::DashboardView;
use pbl_core::dashboard::{aggregate, learner_rows};

use crate::app::AppContext;
use crate::repl::render;

/// Prints the dashboard of the stored session once.
pub async fn run(app: &AppContext, json: bool) -> Result<()> {
    let stores = app.stores()?;
    let config = stores.session.read().await;
    let roster = stores.presence.list_all().await;
    let now = Utc::now();
    let threshold = app.settings.active_threshold();

    let view = DashboardView {
        group_name: config.group_name.clone(),
        total_teams: config.total_teams,
        stats: aggregate(&config, &roster, now, threshold),
        learners: learner_rows(&roster, now, threshold),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    if !config.is_session_active {
        println!("{}", "No session is open.".yellow());
        if roster.is_empty() {
            return Ok(());
        }
        println!("{}", "Learners from the previous session:".bright_black());
    }
    print!("{}", render::dashboard(&view));
    Ok(())
}
