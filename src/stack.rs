use anyhow::{Context, Result};
use std::process::Command;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{error, info, warn};

use crate::config::{Config, StackConfig};
use crate::error::HarnessError;

/// Fixed service set the compose file defines.
pub const SERVICES: [&str; 3] = ["mongodb", "temporal", "temporal-ui"];

/// Log lines dumped per service when bring-up times out.
const LOG_TAIL_LINES: &str = "50";

/// Interval between reachability probes.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Container stack lifecycle: bring-up, readiness wait, teardown.
pub struct StackManager {
    server_address: String,
    stack: StackConfig,
}

impl StackManager {
    pub fn new(config: &Config) -> Self {
        Self {
            server_address: config.server_address.clone(),
            stack: config.stack.clone(),
        }
    }

    /// Start the stack and block until the server frontend accepts TCP
    /// connections or the readiness deadline passes.
    pub async fn up(&self) -> Result<()> {
        info!(
            compose_file = %self.stack.compose_file.display(),
            image_tag = %self.stack.image_tag,
            "Starting container stack"
        );

        self.run_compose(&["up", "-d"])?;
        self.wait_for_server().await?;

        info!(address = %self.server_address, "Server frontend is reachable");
        Ok(())
    }

    /// Stop the stack. With `volumes` the database state is removed too.
    pub fn down(&self, volumes: bool) -> Result<()> {
        info!(volumes, "Stopping container stack");

        if volumes {
            self.run_compose(&["down", "--volumes"])
        } else {
            self.run_compose(&["down"])
        }
    }

    /// Poll the frontend port once per second until it accepts a TCP
    /// connection. On deadline, dump recent service logs and fail.
    pub async fn wait_for_server(&self) -> Result<()> {
        let deadline = Duration::from_secs(self.stack.ready_timeout_secs);
        let start = Instant::now();

        info!(
            address = %self.server_address,
            timeout_secs = self.stack.ready_timeout_secs,
            "Waiting for server frontend"
        );

        while start.elapsed() < deadline {
            let attempt = tokio::time::timeout(POLL_INTERVAL, TcpStream::connect(&self.server_address));
            match attempt.await {
                Ok(Ok(_stream)) => return Ok(()),
                Ok(Err(_)) => tokio::time::sleep(POLL_INTERVAL).await,
                Err(_elapsed) => {}
            }
        }

        error!(
            address = %self.server_address,
            "Server did not become reachable, dumping service logs"
        );
        self.dump_service_logs();

        Err(HarnessError::ReadinessTimeout {
            address: self.server_address.clone(),
            timeout_secs: self.stack.ready_timeout_secs,
        }
        .into())
    }

    /// Best-effort dump of the last log lines of every service.
    pub fn dump_service_logs(&self) {
        for service in SERVICES {
            let output = self
                .compose_command(&["logs", "--tail", LOG_TAIL_LINES, service])
                .output();

            match output {
                Ok(output) => {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    error!(service, "--- recent logs ---\n{}{}", stdout, stderr);
                }
                Err(e) => warn!(service, error = %e, "Could not collect service logs"),
            }
        }
    }

    fn run_compose(&self, tail: &[&str]) -> Result<()> {
        let rendered = self.render_command(tail);
        let status = self
            .compose_command(tail)
            .status()
            .with_context(|| format!("Failed to run `{rendered}`"))?;

        if !status.success() {
            return Err(HarnessError::ToolFailed {
                command: rendered,
                status,
            }
            .into());
        }

        Ok(())
    }

    fn compose_command(&self, tail: &[&str]) -> Command {
        let mut cmd = Command::new("docker");
        cmd.args(self.compose_args(tail))
            .env("IMAGE_TAG", &self.stack.image_tag)
            .env("DOCKER_REGISTRY", &self.stack.docker_registry);
        cmd
    }

    /// Argument vector for a `docker compose` invocation.
    fn compose_args(&self, tail: &[&str]) -> Vec<String> {
        let mut args = vec![
            "compose".to_string(),
            "-f".to_string(),
            self.stack.compose_file.display().to_string(),
        ];
        args.extend(tail.iter().map(|s| (*s).to_string()));
        args
    }

    fn render_command(&self, tail: &[&str]) -> String {
        format!("docker {}", self.compose_args(tail).join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> StackManager {
        StackManager::new(&Config::default())
    }

    #[test]
    fn test_compose_args_carry_file_and_tail() {
        let args = manager().compose_args(&["up", "-d"]);
        assert_eq!(args, vec!["compose", "-f", "docker-compose.yml", "up", "-d"]);
    }

    #[test]
    fn test_down_with_volumes_args() {
        let args = manager().compose_args(&["down", "--volumes"]);
        assert!(args.ends_with(&["down".to_string(), "--volumes".to_string()]));
    }

    #[tokio::test]
    async fn test_wait_times_out_on_closed_port() {
        let mut config = Config::default();
        // Reserved port that nothing listens on, and a short deadline.
        config.server_address = "127.0.0.1:9".to_string();
        config.stack.ready_timeout_secs = 2;

        let manager = StackManager::new(&config);
        let err = manager.wait_for_server().await.unwrap_err();
        let harness_err = err.downcast_ref::<HarnessError>().unwrap();
        assert!(matches!(
            harness_err,
            HarnessError::ReadinessTimeout { timeout_secs: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_wait_succeeds_on_listening_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let mut config = Config::default();
        config.server_address = addr.to_string();
        config.stack.ready_timeout_secs = 5;

        let manager = StackManager::new(&config);
        manager.wait_for_server().await.unwrap();
    }
}
