//! Parsing of console input lines.

/// Commands of the learner view, in the order `help` lists them.
pub const LEARNER_COMMANDS: &[(&str, &str)] = &[
    ("show", "Show the current screen"),
    ("team", "team <n>  Pick a team"),
    ("change-team", "Go back to team selection"),
    ("join", "join <name>  Enter your name and start"),
    ("next", "Go to the next step"),
    ("back", "Go to the previous step"),
    ("edit", "Fill in the answers of the current step"),
    ("report", "Show your report"),
    ("exit", "Admin view from the intro, log out elsewhere"),
    ("help", "List commands"),
    ("quit", "Leave the console"),
];

/// Commands of the admin view.
pub const ADMIN_COMMANDS: &[(&str, &str)] = &[
    ("show", "Show the dashboard or the settings form"),
    ("settings", "Edit the session settings"),
    ("group", "group <name>  Set the group name"),
    ("teams", "teams <n>  Set the number of teams"),
    ("open", "Save the settings and open the session"),
    ("cancel", "Close the settings form without saving"),
    ("watch", "Follow the dashboard live until Ctrl-C"),
    ("exit", "Return to the learner view"),
    ("help", "List commands"),
    ("quit", "Leave the console"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnerCommand {
    Show,
    Team(u32),
    ChangeTeam,
    Join(String),
    Next,
    Back,
    Edit,
    Report,
    Exit,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Show,
    Settings,
    Group(String),
    Teams(u32),
    Open,
    Cancel,
    Watch,
    Exit,
    Help,
    Quit,
}

fn split(line: &str) -> (&str, &str) {
    let line = line.trim();
    match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    }
}

fn number(command: &str, arg: &str) -> Result<u32, String> {
    arg.parse()
        .map_err(|_| format!("'{}' expects a number, got '{}'", command, arg))
}

fn text(command: &str, arg: &str) -> Result<String, String> {
    if arg.is_empty() {
        return Err(format!("'{}' expects an argument", command));
    }
    Ok(arg.to_string())
}

pub fn parse_learner(line: &str) -> Result<LearnerCommand, String> {
    let (head, arg) = split(line);
    let command = match head {
        "show" | "status" => LearnerCommand::Show,
        "team" => LearnerCommand::Team(number(head, arg)?),
        "change-team" => LearnerCommand::ChangeTeam,
        "join" | "name" => LearnerCommand::Join(text(head, arg)?),
        "next" => LearnerCommand::Next,
        "back" => LearnerCommand::Back,
        "edit" => LearnerCommand::Edit,
        "report" => LearnerCommand::Report,
        "exit" => LearnerCommand::Exit,
        "help" | "?" => LearnerCommand::Help,
        "quit" => LearnerCommand::Quit,
        other => return Err(format!("Unknown command '{}'", other)),
    };
    Ok(command)
}

pub fn parse_admin(line: &str) -> Result<AdminCommand, String> {
    let (head, arg) = split(line);
    let command = match head {
        "show" | "status" | "dashboard" => AdminCommand::Show,
        "settings" => AdminCommand::Settings,
        // Group names may be blank until the session is opened.
        "group" => AdminCommand::Group(arg.to_string()),
        "teams" => AdminCommand::Teams(number(head, arg)?),
        "open" => AdminCommand::Open,
        "cancel" => AdminCommand::Cancel,
        "watch" => AdminCommand::Watch,
        "exit" => AdminCommand::Exit,
        "help" | "?" => AdminCommand::Help,
        "quit" => AdminCommand::Quit,
        other => return Err(format!("Unknown command '{}'", other)),
    };
    Ok(command)
}
