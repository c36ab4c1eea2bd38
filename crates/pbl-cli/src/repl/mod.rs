//! Interactive console shared by the learner and admin entry points.
//!
//! One console drives one [`SessionController`]. The command set follows
//! the controller's view mode, so `exit` on the intro turns a learner
//! console into an admin console the same way the exit button does.

mod admin;
pub mod command;
mod helper;
mod learner;
pub mod render;

use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use pbl_application::{SessionController, ViewMode};
use pbl_core::SessionConfig;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use command::{ADMIN_COMMANDS, LEARNER_COMMANDS};
use helper::CliHelper;

pub(crate) type LineEditor = Editor<CliHelper, DefaultHistory>;

/// Whether the console keeps reading after a command.
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub struct Console {
    controller: Arc<SessionController>,
    editor: LineEditor,
}

impl Console {
    pub fn new(controller: SessionController) -> Result<Self> {
        let mut editor = Editor::new()?;
        editor.set_helper(Some(CliHelper::new(LEARNER_COMMANDS)));
        Ok(Self {
            controller: Arc::new(controller),
            editor,
        })
    }

    pub async fn run(mut self) -> Result<()> {
        println!("{}", "=== Factory 3 Fire PBL ===".bright_magenta().bold());
        println!(
            "{}",
            "Type 'help' for commands, 'quit' to leave.".bright_black()
        );
        println!();

        let config = self.controller.wait_until_loaded().await;
        self.show();
        let notifier = spawn_session_notifier(&self.controller, config);
        info!(visitor_id = %self.controller.visitor_id(), "Console started");

        loop {
            let view = self.controller.view_mode();
            if let Some(helper) = self.editor.helper_mut() {
                helper.set_commands(match view {
                    ViewMode::Learner => LEARNER_COMMANDS,
                    ViewMode::Admin => ADMIN_COMMANDS,
                });
            }

            let prompt = self.prompt(view);
            let editor = &mut self.editor;
            let readline = tokio::task::block_in_place(|| editor.readline(&prompt));

            match readline {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    let _ = self.editor.add_history_entry(trimmed);

                    let flow = match view {
                        ViewMode::Learner => {
                            learner::handle(&self.controller, &mut self.editor, trimmed).await
                        }
                        ViewMode::Admin => admin::handle(&self.controller, trimmed).await,
                    };
                    match flow {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Quit) => break,
                        Err(e) => eprintln!("{}", e.to_string().red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "CTRL-C detected. Type 'quit' to leave.".yellow());
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}", format!("Error: {:?}", err).red());
                    break;
                }
            }
        }

        notifier.abort();
        self.controller.flush_presence().await;
        println!("{}", "Goodbye!".bright_green());
        Ok(())
    }

    fn prompt(&self, view: ViewMode) -> String {
        match view {
            ViewMode::Admin => "admin> ".to_string(),
            ViewMode::Learner => match self.controller.profile() {
                Some(_) => format!("learner[{}]> ", self.controller.current_step()),
                None => "learner> ".to_string(),
            },
        }
    }

    fn show(&self) {
        match self.controller.view_mode() {
            ViewMode::Learner => {
                print!("{}", render::learner_screen(&self.controller.learner_screen()))
            }
            ViewMode::Admin => {
                print!("{}", render::admin_screen(&self.controller.admin_screen()))
            }
        }
    }
}

/// Prints a line whenever the shared session opens, closes or changes.
fn spawn_session_notifier(
    controller: &SessionController,
    initial: SessionConfig,
) -> JoinHandle<()> {
    let mut config = controller.watch_config();
    tokio::spawn(async move {
        let mut previous = initial;
        while config.changed().await.is_ok() {
            let Some(latest) = config.borrow_and_update().clone() else {
                continue;
            };
            if latest == previous {
                continue;
            }
            debug!(
                group_name = %latest.group_name,
                active = latest.is_session_active,
                "Session changed"
            );
            let message = if latest.activates_from(Some(&previous)) {
                format!(
                    "Session '{}' is open with {} teams.",
                    latest.group_name, latest.total_teams
                )
            } else if !latest.is_session_active {
                "The session was closed.".to_string()
            } else {
                format!(
                    "Session settings changed: '{}', {} teams.",
                    latest.group_name, latest.total_teams
                )
            };
            println!("\n{}", message.bright_yellow());
            previous = latest;
        }
    })
}
