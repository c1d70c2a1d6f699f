//! Child process lifecycle: spawn with a move pipe, graceful-then-forced
//! termination, reaping with exit classification.

use anyhow::{Context, Result, bail};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use std::fmt;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::{Duration, Instant};

/// A spawned player: the child handle plus the read end of its move pipe.
/// `pipe` is dropped (closing the fd) when the player is retired; `active`
/// goes false at the same time.
#[derive(Debug)]
pub struct PlayerProcess {
    pub id: usize,
    pub child: Child,
    pub pipe: Option<ChildStdout>,
    pub active: bool,
}

/// A spawned display. No pipe: it talks through the sync segment only.
pub struct ViewProcess {
    pub child: Child,
}

fn ensure_executable(path: &Path) -> Result<()> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("{} does not exist", path.display()))?;
    if !meta.is_file() {
        bail!("{} is not a regular file", path.display());
    }
    if meta.permissions().mode() & 0o111 == 0 {
        bail!("{} is not executable", path.display());
    }
    Ok(())
}

/// Spawn one player with its stdout redirected into our pipe. Children
/// receive the board dimensions as their only arguments; everything else
/// they learn from the shared segments.
pub fn spawn_player(path: &Path, id: usize, width: u16, height: u16) -> Result<PlayerProcess> {
    ensure_executable(path)?;

    let mut child = Command::new(path)
        .arg(width.to_string())
        .arg(height.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to spawn player {}", path.display()))?;

    let pipe = child.stdout.take();
    tracing::info!(player = id, pid = child.id(), path = %path.display(), "player spawned");

    Ok(PlayerProcess {
        id,
        child,
        pipe,
        active: true,
    })
}

pub fn spawn_view(path: &Path, width: u16, height: u16) -> Result<ViewProcess> {
    ensure_executable(path)?;

    let child = Command::new(path)
        .arg(width.to_string())
        .arg(height.to_string())
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn view {}", path.display()))?;

    tracing::info!(pid = child.id(), path = %path.display(), "view spawned");
    Ok(ViewProcess { child })
}

/// Ask a child to terminate. A child that is already gone is not an error.
pub fn request_termination(child: &Child) {
    let pid = Pid::from_raw(child.id() as i32);
    if let Err(e) = kill(pid, Signal::SIGTERM)
        && e != nix::errno::Errno::ESRCH
    {
        tracing::warn!(pid = child.id(), error = %e, "failed to deliver SIGTERM");
    }
}

/// How a reaped child went down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Code(i32),
    Signaled(i32),
}

impl fmt::Display for ExitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitKind::Code(code) => write!(f, "exit code {code}"),
            ExitKind::Signaled(sig) => write!(f, "signal {sig}"),
        }
    }
}

/// Wait out the grace period, then force-kill and collect the child.
pub fn reap(child: &mut Child, grace: Duration) -> Result<ExitKind> {
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child.try_wait().context("waitpid failed")? {
            return Ok(classify(status));
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    tracing::warn!(pid = child.id(), "grace period expired, killing");
    child.kill().context("SIGKILL failed")?;
    let status = child.wait().context("waitpid after SIGKILL failed")?;
    Ok(classify(status))
}

fn classify(status: std::process::ExitStatus) -> ExitKind {
    match status.code() {
        Some(code) => ExitKind::Code(code),
        None => ExitKind::Signaled(status.signal().unwrap_or(0)),
    }
}
