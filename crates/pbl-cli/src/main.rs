use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pbl_core::config::BackendKind;

mod app;
mod commands;
mod logging;
mod repl;

use app::AppContext;

#[derive(Parser)]
#[command(name = "pbl")]
#[command(
    about = "PBL Sync - shared session consoles for the factory fire simulation",
    long_about = None
)]
struct Cli {
    /// Root directory for settings, storage and logs
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Store backend: memory (this process only) or local (shared between
    /// terminals on this machine); overrides pbl.toml. remote is only
    /// available through `pbl demo`, which runs an in-process document store
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Device name; each device keeps its own visitor id
    #[arg(long, global = true, default_value = "default")]
    device: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a learner console
    Learner,
    /// Open an admin console
    Admin,
    /// Print the dashboard of the stored session
    Status {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print the effective settings
    Config,
    /// Run a scripted session with one admin and three learners
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = AppContext::load(cli.data_dir, cli.backend)?;
    let _log_guard = logging::init(&app.paths.logs_dir()?, &app.settings.log_level)?;

    match cli.command {
        Commands::Learner => commands::console::learner(&app, &cli.device).await?,
        Commands::Admin => commands::console::admin(&app, &cli.device).await?,
        Commands::Status { json } => commands::status::run(&app, json).await?,
        Commands::Config => commands::config::show(&app)?,
        Commands::Demo => commands::demo::run().await?,
    }

    Ok(())
}
