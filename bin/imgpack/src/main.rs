//! imgpack – launcher for `imgpack-server`.
//!
//! ## Commands
//!
//! - `imgpack start` - run the server in the foreground, forwarding Ctrl-C so it
//!   can drain and purge its working files before exiting
//! - `imgpack restart` - ask a process supervisor (pm2 by default) to restart a
//!   managed server instance

use std::path::{Path, PathBuf};
use std::process::{ExitCode, ExitStatus, Stdio};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::process::{Child, Command};
use tracing::{info, warn};

const SERVER_BIN: &str = "imgpack-server";

#[derive(Debug, Parser)]
#[command(name = "imgpack")]
#[command(about = "Local image conversion server launcher", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run imgpack-server in the foreground and exit with its status
    Start {
        /// Path to the server executable (defaults to the one next to this launcher)
        #[arg(long)]
        server: Option<PathBuf>,
    },
    /// Ask the supervisor to restart a managed server instance
    Restart {
        #[arg(long, default_value = "pm2")]
        supervisor: String,
        /// Process name registered with the supervisor
        #[arg(long, default_value = SERVER_BIN)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match Cli::parse().command {
        Commands::Start { server } => {
            let server = match server {
                Some(path) => path,
                None => default_server_path()?,
            };
            start(&server).await
        }
        Commands::Restart { supervisor, name } => {
            restart(&supervisor, &name).await;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// `imgpack-server` (with the platform suffix) next to the running executable.
fn default_server_path() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("failed to locate the launcher executable")?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(format!("{SERVER_BIN}{}", std::env::consts::EXE_SUFFIX)))
}

async fn start(server: &Path) -> Result<ExitCode> {
    info!(server = %server.display(), "starting server");
    let mut child = Command::new(server)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to spawn {}", server.display()))?;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("interrupt received; stopping server");
                interrupt(&mut child);
            }
        }
    };

    info!(%status, "server exited");
    Ok(exit_code(status))
}

/// Deliver SIGINT to the child so it runs its own shutdown path.
#[cfg(unix)]
fn interrupt(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    // SAFETY: `pid` belongs to a child we spawned and have not reaped yet.
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGINT) };
    if rc != 0 {
        warn!(pid, error = %std::io::Error::last_os_error(), "failed to forward SIGINT");
    }
}

#[cfg(not(unix))]
fn interrupt(child: &mut Child) {
    // No SIGINT outside unix; the console already delivered Ctrl-C to the
    // child, so only force it if that did not stop it.
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "failed to stop server");
    }
}

fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        // Killed by a signal.
        None => ExitCode::FAILURE,
    }
}

/// Fire-and-forget `<supervisor> restart <name>`.
async fn restart(supervisor: &str, name: &str) {
    let result = Command::new(supervisor)
        .args(["restart", name])
        .stdin(Stdio::null())
        .status()
        .await;

    match result {
        Ok(status) if status.success() => info!(supervisor, name, "restart requested"),
        Ok(status) => warn!(supervisor, name, %status, "supervisor reported a failed restart"),
        Err(e) => warn!(supervisor, name, error = %e, "failed to run supervisor"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn start_accepts_a_server_path() {
        let cli = Cli::try_parse_from(["imgpack", "start", "--server", "/opt/imgpack-server"]).unwrap();
        match cli.command {
            Commands::Start { server } => assert_eq!(server, Some(PathBuf::from("/opt/imgpack-server"))),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn restart_defaults_to_pm2() {
        let cli = Cli::try_parse_from(["imgpack", "restart"]).unwrap();
        match cli.command {
            Commands::Restart { supervisor, name } => {
                assert_eq!(supervisor, "pm2");
                assert_eq!(name, "imgpack-server");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_commands() {
        assert!(Cli::try_parse_from(["imgpack", "serve"]).is_err());
    }

    #[test]
    fn default_server_sits_next_to_launcher() {
        let path = default_server_path().unwrap();
        let exe = std::env::current_exe().unwrap();
        assert_eq!(path.parent(), exe.parent());
        assert!(path.file_name().unwrap().to_string_lossy().starts_with(SERVER_BIN));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn start_propagates_the_child_exit_code() {
        let code = start(Path::new("/bin/false")).await.unwrap();
        assert_eq!(code, ExitCode::FAILURE);
    }

    #[tokio::test]
    async fn restart_tolerates_a_missing_supervisor() {
        restart("imgpack-no-such-supervisor", "imgpack-server").await;
    }
}
