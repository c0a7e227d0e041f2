use anyhow::{Context, Result};
use std::process::{Command, Output};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{validate_namespace_name, Config};

/// Retention period passed at registration, 86400 seconds.
const RETENTION: &str = "24h";

/// Keyword attribute the visibility queries rely on.
const SEARCH_ATTRIBUTE_NAME: &str = "CustomKeywordField";
const SEARCH_ATTRIBUTE_TYPE: &str = "Keyword";

/// Readiness poll after registration: attempts and spacing.
const READY_ATTEMPTS: u32 = 30;
const READY_INTERVAL: Duration = Duration::from_secs(1);

/// What a registration call amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Created,
    AlreadyExists,
    /// Registration failed for a reason other than prior existence.
    /// Logged as a warning, not fatal.
    SoftFailed(String),
}

/// One-shot namespace and search-attribute registration through the
/// external server CLI. Idempotent by convention: existing objects are
/// treated as success.
pub struct NamespaceRegistrar {
    cli_bin: String,
    server_address: String,
    namespace: String,
}

impl NamespaceRegistrar {
    pub fn new(config: &Config) -> Self {
        Self {
            cli_bin: config.temporal_cli_bin.clone(),
            server_address: config.server_address.clone(),
            namespace: config.namespace.clone(),
        }
    }

    /// Register the namespace and the keyword search attribute, then wait
    /// for the namespace to answer describe calls.
    pub async fn ensure(&self) -> Result<()> {
        validate_namespace_name(&self.namespace)?;

        if self.namespace_exists()? {
            info!(namespace = %self.namespace, "Namespace already registered");
        } else {
            match self.register_namespace()? {
                RegistrationOutcome::Created => {
                    info!(namespace = %self.namespace, "Namespace created")
                }
                RegistrationOutcome::AlreadyExists => {
                    info!(namespace = %self.namespace, "Namespace already exists")
                }
                RegistrationOutcome::SoftFailed(reason) => {
                    warn!(namespace = %self.namespace, reason, "Namespace registration failed")
                }
            }
        }

        match self.register_search_attribute()? {
            RegistrationOutcome::Created => {
                info!(attribute = SEARCH_ATTRIBUTE_NAME, "Search attribute created")
            }
            RegistrationOutcome::AlreadyExists => {
                info!(attribute = SEARCH_ATTRIBUTE_NAME, "Search attribute already exists")
            }
            RegistrationOutcome::SoftFailed(reason) => {
                warn!(attribute = SEARCH_ATTRIBUTE_NAME, reason, "Search attribute registration failed")
            }
        }

        self.wait_until_ready().await;
        Ok(())
    }

    fn namespace_exists(&self) -> Result<bool> {
        let output = self.run_cli(&self.describe_args())?;
        Ok(output.status.success())
    }

    fn register_namespace(&self) -> Result<RegistrationOutcome> {
        let output = self.run_cli(&self.create_namespace_args())?;
        Ok(classify_output(&output))
    }

    fn register_search_attribute(&self) -> Result<RegistrationOutcome> {
        let output = self.run_cli(&self.create_search_attribute_args())?;
        Ok(classify_output(&output))
    }

    /// Poll describe until the freshly registered namespace answers. The
    /// server propagates new namespaces asynchronously, so the first
    /// describe calls may still fail right after a successful create.
    async fn wait_until_ready(&self) {
        for attempt in 1..=READY_ATTEMPTS {
            match self.namespace_exists() {
                Ok(true) => {
                    info!(namespace = %self.namespace, attempt, "Namespace is ready");
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(error = %e, "Describe poll could not run");
                    return;
                }
            }
            tokio::time::sleep(READY_INTERVAL).await;
        }
        warn!(
            namespace = %self.namespace,
            attempts = READY_ATTEMPTS,
            "Namespace still not answering describe calls"
        );
    }

    fn run_cli(&self, args: &[String]) -> Result<Output> {
        Command::new(&self.cli_bin)
            .args(args)
            .output()
            .with_context(|| format!("Failed to run `{} {}`", self.cli_bin, args.join(" ")))
    }

    fn describe_args(&self) -> Vec<String> {
        vec![
            "operator".into(),
            "namespace".into(),
            "describe".into(),
            "--address".into(),
            self.server_address.clone(),
            self.namespace.clone(),
        ]
    }

    fn create_namespace_args(&self) -> Vec<String> {
        vec![
            "operator".into(),
            "namespace".into(),
            "create".into(),
            "--address".into(),
            self.server_address.clone(),
            "--retention".into(),
            RETENTION.into(),
            self.namespace.clone(),
        ]
    }

    fn create_search_attribute_args(&self) -> Vec<String> {
        vec![
            "operator".into(),
            "search-attribute".into(),
            "create".into(),
            "--address".into(),
            self.server_address.clone(),
            "--namespace".into(),
            self.namespace.clone(),
            "--name".into(),
            SEARCH_ATTRIBUTE_NAME.into(),
            "--type".into(),
            SEARCH_ATTRIBUTE_TYPE.into(),
        ]
    }
}

/// Map a CLI exit to a registration outcome. Any mention of prior
/// existence counts as success regardless of exit code.
fn classify_output(output: &Output) -> RegistrationOutcome {
    if output.status.success() {
        return RegistrationOutcome::Created;
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if is_already_exists(&stdout) || is_already_exists(&stderr) {
        RegistrationOutcome::AlreadyExists
    } else {
        let reason = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        RegistrationOutcome::SoftFailed(reason)
    }
}

fn is_already_exists(text: &str) -> bool {
    let lowered = text.to_lowercase();
    lowered.contains("already exists") || lowered.contains("alreadyexists")
}
