//! Child-process transport for the formatting server.
//!
//! Spawns lemminx with all three standard streams piped. stdout/stdin are
//! handed to the RPC endpoint; stderr is drained on its own task so the
//! child can never block on a full pipe.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

/// Environment variable overriding the server executable.
const SERVER_BIN_ENV: &str = "LEMMINX_BIN";

/// Where the server lives when no override is set.
const DEFAULT_SERVER_BIN: &str = "/usr/local/bin/lemminx";

/// A running formatting server. Owned by the session; `kill_on_drop`
/// guarantees the child dies on every exit path, explicit [`kill`] makes
/// the normal path deterministic.
///
/// [`kill`]: ServerProcess::kill
pub(crate) struct ServerProcess {
    child: Child,
    stderr_drain: tokio::task::JoinHandle<()>,
}

impl ServerProcess {
    /// Spawn the server and return the stdio halves for RPC framing.
    pub async fn spawn() -> Result<(Self, ChildStdout, ChildStdin)> {
        let command_name =
            std::env::var(SERVER_BIN_ENV).unwrap_or_else(|_| DEFAULT_SERVER_BIN.to_owned());
        let executable = which::which(&command_name)
            .with_context(|| format!("formatting server executable not found: {command_name}"))?;

        let mut child = Command::new(&executable)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", executable.display()))?;

        let stdout = child.stdout.take().context("no stdout from server")?;
        let stdin = child.stdin.take().context("no stdin from server")?;
        let stderr = child.stderr.take().context("no stderr from server")?;

        let stderr_drain = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::info!(target: "lemminx", "{line}");
            }
        });

        Ok((
            Self {
                child,
                stderr_drain,
            },
            stdout,
            stdin,
        ))
    }

    /// Forcibly terminate the server. No shutdown/exit handshake: each
    /// run is short-lived and the protocol owner holds the kill switch.
    pub async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("killing formatting server: {e}");
        }
        self.stderr_drain.abort();
    }
}
