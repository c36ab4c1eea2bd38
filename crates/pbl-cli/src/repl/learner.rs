use anyhow::Result;
use colored::Colorize;
use pbl_application::{ExitOutcome, SessionController};
use pbl_core::simulation::{CauseAnalysis, ProblemDefinition, Solutions};
use pbl_core::step::Step;
use rustyline::error::ReadlineError;

use super::command::{LEARNER_COMMANDS, LearnerCommand, parse_learner};
use super::{Flow, LineEditor, render};

pub(super) async fn handle(
    controller: &SessionController,
    editor: &mut LineEditor,
    line: &str,
) -> Result<Flow> {
    let command = match parse_learner(line) {
        Ok(command) => command,
        Err(message) => {
            println!("{}", message.yellow());
            return Ok(Flow::Continue);
        }
    };

    match command {
        LearnerCommand::Show => show(controller),
        LearnerCommand::Team(team_id) => {
            controller.select_team(team_id)?;
            show(controller);
        }
        LearnerCommand::ChangeTeam => {
            controller.change_team();
            show(controller);
        }
        LearnerCommand::Join(name) => {
            let profile = controller.join(&name).await?;
            println!(
                "{}",
                format!("Welcome {} ({}).", profile.name, profile.team_name).bright_green()
            );
            show(controller);
        }
        LearnerCommand::Next => {
            controller.next()?;
            show(controller);
        }
        LearnerCommand::Back => {
            controller.back()?;
            show(controller);
        }
        LearnerCommand::Edit => edit(controller, editor)?,
        LearnerCommand::Report => print!("{}", render::report(&controller.report())),
        LearnerCommand::Exit => match controller.exit().await {
            ExitOutcome::EnteredAdmin => {
                println!("{}", "Admin view.".bright_magenta());
                print!("{}", render::admin_screen(&controller.admin_screen()));
            }
            ExitOutcome::LoggedOut => {
                println!("{}", "Logged out.".bright_green());
                show(controller);
            }
            ExitOutcome::LeftAdmin => show(controller),
        },
        LearnerCommand::Help => {
            for (name, description) in LEARNER_COMMANDS {
                println!("  {:<12} {}", name.bright_cyan(), description);
            }
        }
        LearnerCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

fn show(controller: &SessionController) {
    print!("{}", render::learner_screen(&controller.learner_screen()));
}

/// Prompts for the answers of the current step, prefilled with what is
/// already there. Ctrl-C abandons the whole step without saving.
fn edit(controller: &SessionController, editor: &mut LineEditor) -> Result<()> {
    let state = controller.simulation();
    let saved = match controller.current_step() {
        Step::ProblemDefinition => {
            let pd = &state.problem_definition;
            let Some(human_damage) = ask(editor, "Human damage", &pd.human_damage)? else {
                return cancelled();
            };
            let Some(material_damage) = ask(editor, "Material damage", &pd.material_damage)? else {
                return cancelled();
            };
            let Some(others) = ask(editor, "Others", &pd.others)? else {
                return cancelled();
            };
            controller.set_problem_definition(ProblemDefinition {
                human_damage,
                material_damage,
                others,
            });
            true
        }
        Step::AnalysisWhy => {
            let Some(fire) = ask_analysis(editor, "Fire", &state.analysis_fire)? else {
                return cancelled();
            };
            let Some(injury) = ask_analysis(editor, "Injury", &state.analysis_injury)? else {
                return cancelled();
            };
            controller.set_analysis_fire(fire);
            controller.set_analysis_injury(injury);
            true
        }
        Step::Solution => {
            let s = &state.solutions;
            let Some(immediate) = ask(editor, "Immediate", &s.immediate)? else {
                return cancelled();
            };
            let Some(prevention) = ask(editor, "Prevention", &s.prevention)? else {
                return cancelled();
            };
            let Some(contingency) = ask(editor, "Contingency", &s.contingency)? else {
                return cancelled();
            };
            controller.set_solutions(Solutions {
                immediate,
                prevention,
                contingency,
            });
            true
        }
        _ => false,
    };

    if saved {
        println!("{}", "Saved.".bright_green());
    } else {
        println!("{}", "Nothing to fill in on this step.".bright_black());
    }
    Ok(())
}

fn ask_analysis(
    editor: &mut LineEditor,
    subject: &str,
    current: &CauseAnalysis,
) -> Result<Option<CauseAnalysis>> {
    let direct_label = format!("{} direct cause", subject);
    let Some(direct_cause) = ask(editor, &direct_label, &current.direct_cause)? else {
        return Ok(None);
    };
    let Some(contributing_factors) = ask(
        editor,
        &format!("{} contributing factors", subject),
        &current.contributing_factors,
    )?
    else {
        return Ok(None);
    };
    Ok(Some(CauseAnalysis {
        direct_cause,
        contributing_factors,
    }))
}

fn ask(editor: &mut LineEditor, label: &str, current: &str) -> Result<Option<String>> {
    let prompt = format!("{}: ", label);
    match tokio::task::block_in_place(|| editor.readline_with_initial(&prompt, (current, ""))) {
        Ok(value) => Ok(Some(value.trim().to_string())),
        Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn cancelled() -> Result<()> {
    println!("{}", "Edit cancelled.".yellow());
    Ok(())
}
