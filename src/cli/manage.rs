use std::{
    env,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{CommandFactory, Parser};
use tracing::info;

use crate::{
    daemon::storage::{
        entities::{RollingWindow, Settings, TrackingState},
        state_storage::{JsonStateStorage, StateStorage},
    },
    utils::dir::STATE_FILE_NAME,
};

use super::{
    process::{kill_previous_servers, restart_server},
    Args,
};

#[derive(Debug, Parser)]
pub struct ConfigCommand {
    #[arg(long, help = "Directory with your notes. Every tracked path is relative to it")]
    vault: Option<PathBuf>,
    #[arg(long, help = "Folder inside the vault with daily notes, for example \"Journal\"")]
    folder: Option<String>,
    #[arg(long, help = "Days the rolling average covers: 7, 14 or 30")]
    window: Option<RollingWindow>,
    #[arg(long, help = "Unfold reports on the first save of a day")]
    auto_expand: Option<bool>,
    #[arg(long, help = "Print only report summaries")]
    collapsed: Option<bool>,
}

impl ConfigCommand {
    fn is_empty(&self) -> bool {
        self.vault.is_none()
            && self.folder.is_none()
            && self.window.is_none()
            && self.auto_expand.is_none()
            && self.collapsed.is_none()
    }
}

#[derive(Debug, Parser)]
pub struct ResetCommand {
    #[arg(long, help = "Don't ask for confirmation")]
    yes: bool,
}

#[derive(Debug, Parser)]
pub struct ExportCommand {
    #[arg(long, short, help = "File to write into. Prints to stdout when missing")]
    output: Option<PathBuf>,
}

/// Prints the settings, or changes them when any option is given.
pub async fn process_config_command(command: ConfigCommand, dir: &Path) -> Result<()> {
    if command.is_empty() {
        let state = load_state(dir).await?;
        print_settings(&state.settings);
        return Ok(());
    }

    let vault = match command.vault {
        Some(vault) => Some(canonical_vault(&vault)?),
        None => None,
    };

    let state = update_state(dir, |state| {
        let settings = &mut state.settings;
        if let Some(vault) = vault {
            settings.vault = Some(vault);
        }
        if let Some(folder) = &command.folder {
            settings.set_tracking_folder(folder);
        }
        if let Some(window) = command.window {
            settings.rolling_window = window;
        }
        if let Some(auto_expand) = command.auto_expand {
            settings.auto_expand_on_first_save = auto_expand;
        }
        if let Some(collapsed) = command.collapsed {
            settings.panel_collapsed = collapsed;
        }
    })
    .await?;

    print_settings(&state.settings);
    Ok(())
}

/// Clears recorded buckets and snapshots. Settings survive.
pub async fn process_reset_command(ResetCommand { yes }: ResetCommand, dir: &Path) -> Result<()> {
    if !yes && !confirm("Delete every recorded word count?")? {
        println!("Nothing was deleted");
        return Ok(());
    }
    update_state(dir, TrackingState::reset).await?;
    println!("Recorded data cleared");
    Ok(())
}

pub async fn process_export_command(ExportCommand { output }: ExportCommand, dir: &Path) -> Result<()> {
    let state = load_state(dir).await?;
    let document = serde_json::to_string_pretty(&state.export(Utc::now()))?;
    match output {
        Some(path) => {
            tokio::fs::write(&path, document)
                .await
                .with_context(|| format!("Failed to write export to {}", path.display()))?;
            info!("Exported to {}", path.display());
            println!("Exported to {}", path.display());
        }
        None => println!("{document}"),
    }
    Ok(())
}

pub async fn load_state(dir: &Path) -> Result<TrackingState> {
    let storage = JsonStateStorage::new(dir.join(STATE_FILE_NAME))?;
    Ok(storage.load().await?.unwrap_or_default())
}

/// The daemon holds the state in memory and would overwrite any outside change, so it's stopped
/// while the file is rewritten and brought back afterwards.
async fn update_state(
    dir: &Path,
    update: impl FnOnce(&mut TrackingState),
) -> Result<TrackingState> {
    let cli = env::current_exe().context("Can't operate without an executable")?;
    let was_running = kill_previous_servers(&cli)?;

    let storage = JsonStateStorage::new(dir.join(STATE_FILE_NAME))?;
    let mut state = storage.load().await?.unwrap_or_default();
    update(&mut state);
    storage.save(&state).await?;

    if was_running {
        restart_server(dir)?;
    }
    Ok(state)
}

fn canonical_vault(vault: &Path) -> Result<PathBuf> {
    match std::fs::canonicalize(vault) {
        Ok(path) if path.is_dir() => Ok(path),
        Ok(_) | Err(_) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("{} is not an existing directory", vault.display()),
            )
            .into()),
    }
}

fn print_settings(settings: &Settings) {
    let vault = settings
        .vault
        .as_ref()
        .map(|v| v.display().to_string())
        .unwrap_or_else(|| "not set".into());
    let folder = if settings.tracking_folder.is_empty() {
        "not set (nothing is tracked)"
    } else {
        settings.tracking_folder.as_str()
    };
    println!("vault\t\t{vault}");
    println!("folder\t\t{folder}");
    println!("window\t\t{}", settings.rolling_window);
    println!("auto expand\t{}", settings.auto_expand_on_first_save);
    println!("collapsed\t{}", settings.panel_collapsed);
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
