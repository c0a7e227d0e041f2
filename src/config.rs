use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Longest namespace name the server accepts.
const MAX_NAMESPACE_LEN: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server frontend endpoint as host:port
    pub server_address: String,

    /// Namespace under test
    pub namespace: String,

    /// External server CLI used for namespace registration
    pub temporal_cli_bin: String,

    /// Verbose logging toggle
    pub debug_log: bool,

    /// Container stack configuration
    pub stack: StackConfig,

    /// Functional suite configuration
    pub functional: SuiteConfig,

    /// Load generator configuration
    pub load: GeneratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Image tag for the server image
    pub image_tag: String,

    /// Registry prefix for images (empty for Docker Hub)
    pub docker_registry: String,

    /// Compose file defining the stack
    pub compose_file: PathBuf,

    /// Readiness deadline for the frontend port in seconds
    pub ready_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Test runner executable
    pub pytest_bin: String,

    /// Directory holding the functional test tree
    pub suite_dir: PathBuf,

    /// Per-test timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Load generator executable
    pub bin: String,

    /// Worker SDK language the generator should drive
    pub worker_language: String,

    /// Markdown summary artifact path
    pub summary_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "localhost:7233".to_string(),
            namespace: "temporal-mongodb".to_string(),
            temporal_cli_bin: "temporal".to_string(),
            debug_log: false,
            stack: StackConfig::default(),
            functional: SuiteConfig::default(),
            load: GeneratorConfig::default(),
        }
    }
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            image_tag: "latest".to_string(),
            docker_registry: String::new(),
            compose_file: PathBuf::from("docker-compose.yml"),
            ready_timeout_secs: 120,
        }
    }
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            pytest_bin: "pytest".to_string(),
            suite_dir: PathBuf::from("e2e"),
            timeout_secs: 300,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            bin: "omes".to_string(),
            worker_language: "go".to_string(),
            summary_file: PathBuf::from("load-summary.md"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let mut config = Config::default();

        if let Ok(address) = env::var("TEMPORAL_ADDRESS") {
            config.server_address = address;
        }

        if let Ok(namespace) = env::var("NAMESPACE") {
            config.namespace = namespace;
        }

        if let Ok(bin) = env::var("TEMPORAL_CLI_BIN") {
            config.temporal_cli_bin = bin;
        }

        if let Ok(debug) = env::var("HARNESS_DEBUG") {
            config.debug_log = debug
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid HARNESS_DEBUG: {}", e))?;
        }

        if let Ok(tag) = env::var("IMAGE_TAG") {
            config.stack.image_tag = tag;
        }

        if let Ok(registry) = env::var("DOCKER_REGISTRY") {
            config.stack.docker_registry = registry;
        }

        if let Ok(file) = env::var("COMPOSE_FILE") {
            config.stack.compose_file = PathBuf::from(file);
        }

        if let Ok(timeout) = env::var("READY_TIMEOUT") {
            config.stack.ready_timeout_secs = timeout
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid READY_TIMEOUT: {}", e))?;
        }

        if let Ok(bin) = env::var("PYTEST_BIN") {
            config.functional.pytest_bin = bin;
        }

        if let Ok(dir) = env::var("SUITE_DIR") {
            config.functional.suite_dir = PathBuf::from(dir);
        }

        if let Ok(timeout) = env::var("TEST_TIMEOUT") {
            config.functional.timeout_secs = timeout
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid TEST_TIMEOUT: {}", e))?;
        }

        if let Ok(bin) = env::var("LOAD_GEN_BIN") {
            config.load.bin = bin;
        }

        if let Ok(language) = env::var("WORKER_LANGUAGE") {
            config.load.worker_language = language;
        }

        if let Ok(file) = env::var("SUMMARY_FILE") {
            config.load.summary_file = PathBuf::from(file);
        }

        config.validate()?;

        Ok(config)
    }

    /// Validate field values that downstream tools would otherwise reject late
    pub fn validate(&self) -> Result<()> {
        self.split_address()
            .with_context(|| format!("Invalid TEMPORAL_ADDRESS '{}'", self.server_address))?;
        validate_namespace_name(&self.namespace)?;
        Ok(())
    }

    /// Host portion of the server address
    pub fn server_host(&self) -> Result<String> {
        Ok(self.split_address()?.0)
    }

    /// Port portion of the server address
    pub fn server_port(&self) -> Result<u16> {
        Ok(self.split_address()?.1)
    }

    fn split_address(&self) -> Result<(String, u16)> {
        let (host, port) = self
            .server_address
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("expected host:port"))?;
        if host.is_empty() {
            return Err(anyhow::anyhow!("expected host:port"));
        }
        let port: u16 = port.parse().context("port is not a number")?;
        Ok((host.to_string(), port))
    }
}

/// Validate a namespace or search-attribute name before handing it to the
/// server CLI. Names must start with a letter and stay within the server's
/// identifier charset and length limit.
pub fn validate_namespace_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow::anyhow!("Namespace name cannot be empty"));
    }

    if name.len() > MAX_NAMESPACE_LEN {
        return Err(anyhow::anyhow!(
            "Namespace name too long (max {} characters): {}",
            MAX_NAMESPACE_LEN,
            name.len()
        ));
    }

    let name_regex =
        Regex::new(r"^[a-zA-Z][a-zA-Z0-9._-]*$").expect("Invalid regex for namespace validation");

    if !name_regex.is_match(name) {
        return Err(anyhow::anyhow!(
            "Invalid namespace name '{}': must start with a letter and contain only letters, digits, dots, underscores, and dashes",
            name
        ));
    }

    Ok(())
}

/// Write a sample .env file documenting every variable and its default
pub fn create_sample_env_file() -> Result<()> {
    let env_content = r#"# Temporal MongoDB Harness Configuration

# Server Connection
TEMPORAL_ADDRESS=localhost:7233
NAMESPACE=temporal-mongodb
TEMPORAL_CLI_BIN=temporal

# Container Stack
IMAGE_TAG=latest
DOCKER_REGISTRY=
COMPOSE_FILE=docker-compose.yml
READY_TIMEOUT=120

# Functional Suite
PYTEST_BIN=pytest
SUITE_DIR=e2e
TEST_TIMEOUT=300

# Load Generator
LOAD_GEN_BIN=omes
WORKER_LANGUAGE=go
SUMMARY_FILE=load-summary.md

# Logging
HARNESS_DEBUG=false
"#;

    std::fs::write(".env.example", env_content).context("Failed to create .env.example file")?;

    tracing::info!("Created .env.example file with default configuration");
    tracing::info!("Copy this to .env and modify as needed");

    Ok(())
}
