pub mod manage;
pub mod output;
pub mod process;
pub mod report;

use std::{env, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use manage::{
    load_state, process_config_command, process_export_command, process_reset_command,
    ConfigCommand, ExportCommand, ResetCommand,
};
use process::{kill_previous_servers, restart_server};
use report::{
    process_average_command, process_day_command, process_peaks_command, AverageCommand,
    DayCommand, PeaksCommand,
};
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::start_daemon,
    utils::{
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, DAEMON_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "wordwhen", version, long_about = None)]
#[command(about = "Find out when during the day you actually write", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init,
    #[command(
        about = "Run a daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve,
    #[command(about = "Stop currently running daemon.")]
    Stop,
    #[command(about = "Words written during a day, bucketed by half hour")]
    Day {
        #[command(flatten)]
        command: DayCommand,
    },
    #[command(about = "Rolling average of the last days, bucketed by half hour")]
    Average {
        #[command(flatten)]
        command: AverageCommand,
    },
    #[command(about = "Times of day you write the most")]
    Peaks {
        #[command(flatten)]
        command: PeaksCommand,
    },
    #[command(about = "Write all recorded buckets as JSON")]
    Export {
        #[command(flatten)]
        command: ExportCommand,
    },
    #[command(about = "Delete recorded buckets and word counts. Settings are kept")]
    Reset {
        #[command(flatten)]
        command: ResetCommand,
    },
    #[command(about = "Show or change settings")]
    Config {
        #[command(flatten)]
        command: ConfigCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let prefix = match args.commands {
        Commands::Serve => DAEMON_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir.join("logs"), logging_level, args.log)?;

    match args.commands {
        Commands::Init => {
            restart_server(&app_dir)?;
            println!("Daemon started");
            Ok(())
        }
        Commands::Stop => {
            let process_name = env::current_exe().context("Can't operate without an executable")?;
            if kill_previous_servers(&process_name)? {
                println!("Daemon stopped");
            } else {
                println!("No daemon was running");
            }
            Ok(())
        }
        Commands::Serve => start_daemon(app_dir).await,
        Commands::Day { command } => process_day_command(command, &load_state(&app_dir).await?),
        Commands::Average { command } => {
            process_average_command(command, &load_state(&app_dir).await?)
        }
        Commands::Peaks { command } => process_peaks_command(command, &load_state(&app_dir).await?),
        Commands::Export { command } => process_export_command(command, &app_dir).await,
        Commands::Reset { command } => process_reset_command(command, &app_dir).await,
        Commands::Config { command } => process_config_command(command, &app_dir).await,
    }
}
