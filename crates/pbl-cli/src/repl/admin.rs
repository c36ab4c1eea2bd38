use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use pbl_application::{AdminScreen, SessionController};

use super::command::{ADMIN_COMMANDS, AdminCommand, parse_admin};
use super::{Flow, render};

/// How often `watch` redraws without a change, so activity flags age out.
const WATCH_REFRESH: Duration = Duration::from_secs(30);

pub(super) async fn handle(controller: &SessionController, line: &str) -> Result<Flow> {
    let command = match parse_admin(line) {
        Ok(command) => command,
        Err(message) => {
            println!("{}", message.yellow());
            return Ok(Flow::Continue);
        }
    };

    match command {
        AdminCommand::Show => show(controller),
        AdminCommand::Settings => {
            controller.begin_setup();
            show(controller);
        }
        AdminCommand::Group(name) => {
            controller.set_setup_group_name(&name);
            show(controller);
        }
        AdminCommand::Teams(total_teams) => {
            controller.set_setup_total_teams(total_teams)?;
            show(controller);
        }
        AdminCommand::Open => {
            let config = controller.open_session().await?;
            println!(
                "{}",
                format!(
                    "Session '{}' saved with {} teams.",
                    config.group_name, config.total_teams
                )
                .bright_green()
            );
            show(controller);
        }
        AdminCommand::Cancel => {
            controller.cancel_setup();
            show(controller);
        }
        AdminCommand::Watch => watch(controller).await,
        AdminCommand::Exit => {
            controller.exit().await;
            println!("{}", "Learner view.".bright_magenta());
            print!("{}", render::learner_screen(&controller.learner_screen()));
        }
        AdminCommand::Help => {
            for (name, description) in ADMIN_COMMANDS {
                println!("  {:<10} {}", name.bright_cyan(), description);
            }
        }
        AdminCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn show(controller: &SessionController) {
    print!("{}", render::admin_screen(&controller.admin_screen()));
}

/// Redraws the dashboard on every roster or session change until Ctrl-C.
async fn watch(controller: &SessionController) {
    if !matches!(controller.admin_screen(), AdminScreen::Dashboard(_)) {
        println!("{}", "Open a session first.".yellow());
        return;
    }

    let mut roster = controller.watch_roster();
    let mut config = controller.watch_config();
    let mut refresh = tokio::time::interval(WATCH_REFRESH);
    println!("{}", "Watching, Ctrl-C to stop.".bright_black());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = roster.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = config.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = refresh.tick() => {}
        }
        println!();
        show(controller);
    }
}
