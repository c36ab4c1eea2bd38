use anyhow::Result;
use colored::Colorize;

use crate::app::AppContext;

/// Prints the effective settings and where things live.
pub fn show(app: &AppContext) -> Result<()> {
    println!("{} {}", "settings file:".bold(), app.config.path().display());
    println!("{} {}", "storage:".bold(), app.paths.storage_dir()?.display());
    println!("{} {}", "logs:".bold(), app.paths.logs_dir()?.display());
    println!();
    print!("{}", toml::to_string_pretty(&app.settings)?);
    Ok(())
}
