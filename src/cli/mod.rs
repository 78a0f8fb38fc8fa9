pub mod interactive;
pub mod report;
pub mod screen;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    session::create_tracker,
    utils::{clock::DefaultClock, logging::enable_logging, paths::AppPaths},
};

use self::report::{process_report_command, ReportCommand};

#[derive(Parser, Debug)]
#[command(name = "codetime", version)]
#[command(about = "Persistent coding session timer", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable console logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the interactive timer (recovers any session left running)")]
    Run {
        #[arg(
            long,
            help = "State directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
        #[arg(long, help = "Do not start tracking automatically on launch")]
        no_autostart: bool,
    },
    #[command(about = "Print or save a monthly report without entering the timer")]
    Report {
        #[arg(
            long,
            help = "State directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "Clear the current session without touching history")]
    Reset {
        #[arg(
            long,
            help = "State directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    match args.commands {
        Commands::Run { dir, no_autostart } => {
            let paths = AppPaths::resolve(dir)?;
            enable_logging(&paths.log_dir(), logging_level, args.log)?;
            interactive::run_interactive(&paths, no_autostart).await
        }
        Commands::Report { dir, command } => {
            let paths = AppPaths::resolve(dir)?;
            enable_logging(&paths.log_dir(), logging_level, args.log)?;
            process_report_command(&paths, command).await
        }
        Commands::Reset { dir, yes } => {
            let paths = AppPaths::resolve(dir)?;
            enable_logging(&paths.log_dir(), logging_level, args.log)?;
            process_reset_command(&paths, yes).await
        }
    }
}

async fn process_reset_command(paths: &AppPaths, yes: bool) -> Result<()> {
    if !yes && !screen::confirm("Reset current session? (yes/no): ").await? {
        println!("Aborted.");
        return Ok(());
    }
    let mut tracker = create_tracker(paths, DefaultClock)?;
    tracker.recover_on_load().await;
    tracker.reset().await;
    println!("Session reset.");
    Ok(())
}
