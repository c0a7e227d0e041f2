use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::error::HarnessError;

/// Runs the external pytest tree against the running server.
pub struct FunctionalSuite {
    pytest_bin: String,
    suite_dir: PathBuf,
    timeout_secs: u64,
    server_address: String,
    namespace: String,
}

impl FunctionalSuite {
    pub fn new(config: &Config) -> Self {
        Self {
            pytest_bin: config.functional.pytest_bin.clone(),
            suite_dir: config.functional.suite_dir.clone(),
            timeout_secs: config.functional.timeout_secs,
            server_address: config.server_address.clone(),
            namespace: config.namespace.clone(),
        }
    }

    /// Invoke the suite, forwarding any extra pytest arguments (`-k`,
    /// `-m`, single test paths). The child's exit code decides ours.
    pub async fn run(&self, extra_args: &[String]) -> Result<()> {
        let args = self.command_args(extra_args);
        info!(
            suite = %self.suite_dir.display(),
            timeout_secs = self.timeout_secs,
            "Running functional suite"
        );

        let status = tokio::process::Command::new(&self.pytest_bin)
            .args(&args)
            .env("TEMPORAL_ADDRESS", &self.server_address)
            .env("NAMESPACE", &self.namespace)
            .status()
            .await
            .with_context(|| format!("Failed to run `{} {}`", self.pytest_bin, args.join(" ")))?;

        if !status.success() {
            return Err(HarnessError::ToolFailed {
                command: format!("{} {}", self.pytest_bin, args.join(" ")),
                status,
            }
            .into());
        }

        info!("Functional suite passed");
        Ok(())
    }

    fn command_args(&self, extra_args: &[String]) -> Vec<String> {
        let mut args = vec![
            self.suite_dir.display().to_string(),
            "-q".to_string(),
            format!("--timeout={}", self.timeout_secs),
        ];
        args.extend(extra_args.iter().cloned());
        args
    }
}
