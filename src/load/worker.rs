use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Seconds to wait for a worker to exit after SIGTERM before SIGKILL.
const GRACEFUL_EXIT_ATTEMPTS: u32 = 10;
const GRACEFUL_EXIT_INTERVAL: Duration = Duration::from_secs(1);

/// Registry of live worker pids, keyed by exact pid value. Removing one
/// pid never disturbs another that happens to share digit substrings.
#[derive(Debug, Default, Clone)]
pub struct PidSet {
    inner: HashSet<u32>,
}

impl PidSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: u32) -> bool {
        self.inner.insert(pid)
    }

    pub fn remove(&mut self, pid: u32) -> bool {
        self.inner.remove(&pid)
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.inner.contains(&pid)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of tracked pids.
    pub fn pids(&self) -> Vec<u32> {
        self.inner.iter().copied().collect()
    }
}

/// Supervises background worker processes for multi-task-queue phases:
/// spawn, track by pid, terminate gracefully, sweep leftovers on drop.
#[derive(Debug, Default)]
pub struct WorkerSupervisor {
    registry: PidSet,
    children: HashMap<u32, Child>,
}

impl WorkerSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a worker and register its pid.
    pub fn spawn(&mut self, bin: &str, args: &[String]) -> Result<u32> {
        let child = Command::new(bin)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn worker `{} {}`", bin, args.join(" ")))?;

        let pid = child
            .id()
            .ok_or_else(|| anyhow::anyhow!("Worker exited before its pid could be read"))?;

        self.registry.insert(pid);
        self.children.insert(pid, child);
        info!(pid, "Worker started");
        Ok(pid)
    }

    /// Pids of workers still under supervision.
    pub fn active_pids(&self) -> Vec<u32> {
        self.registry.pids()
    }

    /// Terminate one worker: SIGTERM, poll for exit, SIGKILL fallback.
    pub async fn shutdown(&mut self, pid: u32) -> Result<()> {
        let mut child = self
            .children
            .remove(&pid)
            .ok_or_else(|| anyhow::anyhow!("No worker registered with pid {}", pid))?;

        if child.try_wait()?.is_some() {
            self.registry.remove(pid);
            return Ok(());
        }

        info!(pid, "Stopping worker");
        terminate(pid)?;

        for _ in 0..GRACEFUL_EXIT_ATTEMPTS {
            if child.try_wait()?.is_some() {
                self.registry.remove(pid);
                return Ok(());
            }
            tokio::time::sleep(GRACEFUL_EXIT_INTERVAL).await;
        }

        warn!(pid, "Worker did not stop gracefully, forcing kill");
        child.kill().await.context("Failed to kill worker")?;
        self.registry.remove(pid);
        Ok(())
    }

    /// Terminate every tracked worker.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        for pid in self.registry.pids() {
            self.shutdown(pid).await?;
        }
        Ok(())
    }
}

impl Drop for WorkerSupervisor {
    fn drop(&mut self) {
        // Interrupted runs still reap their workers: SIGTERM here, and
        // kill_on_drop escalates when the child handles drop right after.
        for pid in self.registry.pids() {
            warn!(pid, "Reaping leftover worker");
            let _ = terminate(pid);
        }
    }
}

/// Deliver SIGTERM to a process.
#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM).context("Failed to send SIGTERM")
}

#[cfg(windows)]
fn terminate(pid: u32) -> Result<()> {
    let output = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string()])
        .output()
        .context("Failed to run taskkill")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("taskkill failed for pid {}", pid));
    }
    Ok(())
}
