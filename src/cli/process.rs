use std::{
    env,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{anyhow, Context, Result};
use sysinfo::{get_current_pid, Process, Signal, System};
use tracing::{debug, info};

const DAEMON_EXECUTABLE: &str = "wordwhen-daemon";

/// Path of the standalone daemon binary living next to the cli.
fn daemon_executable(mut cli: PathBuf) -> PathBuf {
    cli.set_file_name(DAEMON_EXECUTABLE);
    #[cfg(windows)]
    {
        cli.set_extension("exe");
    }
    cli
}

/// A daemon is either `wordwhen serve` or the standalone `wordwhen-daemon` binary.
fn is_daemon(process: &Process, cli: &Path, daemon: &Path) -> bool {
    let Some(exe) = process.exe().filter(|v| v.exists()) else {
        return false;
    };
    if exe == daemon {
        return true;
    }
    exe == cli && process.cmd().iter().any(|arg| arg == "serve")
}

/// Stops every running daemon. Returns whether anything was stopped, so callers that only
/// need the daemon out of the way for a moment know to bring it back.
pub fn kill_previous_servers(cli: &Path) -> Result<bool> {
    let system = System::new_all();
    let current_id = get_current_pid().map_err(|e| anyhow!("Failed to get current pid {e}"))?;
    let daemon = daemon_executable(cli.to_path_buf());

    let mut stopped = false;
    for (pid, process) in system.processes().iter() {
        if *pid == current_id {
            continue;
        }
        if matches!(process.parent(), Some(p) if p == current_id) {
            continue;
        }

        if is_daemon(process, cli, &daemon) {
            debug!("Stopping daemon {pid}");
            // This will forcefully terminate the process on Windows.
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
            process.wait();
            stopped = true;
        }
    }
    Ok(stopped)
}

/// Stops a running daemon and starts a new detached one working with `dir`.
pub fn restart_server(dir: &Path) -> Result<()> {
    let process_name = env::current_exe().context("Can't operate without an executable")?;
    kill_previous_servers(&process_name)?;
    let mut command = std::process::Command::new(process_name);
    command.arg("serve").arg("--dir").arg(dir);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }
    #[cfg(not(unix))]
    {
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
    }

    #[allow(clippy::zombie_processes)]
    let child = command.spawn().context("Failed to spawn the daemon")?;
    info!("Spawned daemon {}", child.id());
    Ok(())
}
