use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Server at {address} not reachable within {timeout_secs}s")]
    ReadinessTimeout { address: String, timeout_secs: u64 },

    #[error("{command} exited with {status}")]
    ToolFailed { command: String, status: ExitStatus },
}
