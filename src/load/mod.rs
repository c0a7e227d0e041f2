pub mod scenario;
pub mod worker;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::HarnessError;
use scenario::Scenario;
use worker::WorkerSupervisor;

/// Fixed interval a freshly spawned worker gets to become ready before
/// the foreground scenario starts. The worker exposes no health surface
/// to poll.
const WORKER_WARMUP: Duration = Duration::from_secs(5);

/// Named sweep profiles. Each maps to a fixed, ordered phase list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Quick,
    Standard,
    Full,
    Nightly,
    Weekly,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Full => "full",
            Self::Nightly => "nightly",
            Self::Weekly => "weekly",
        }
    }

    /// The phase list this mode runs, in order.
    pub fn phases(self) -> Vec<PhaseSpec> {
        match self {
            Self::Quick => vec![PhaseSpec {
                scenario: Scenario::NoopActivity,
                work: Work::Iterations(100),
                concurrency: 20,
                multi_queue: false,
                note: "baseline activity round-trips",
            }],
            Self::Standard => vec![
                PhaseSpec {
                    scenario: Scenario::NoopActivity,
                    work: Work::Iterations(500),
                    concurrency: 50,
                    multi_queue: false,
                    note: "baseline activity round-trips",
                },
                PhaseSpec {
                    scenario: Scenario::ThroughputStress,
                    work: Work::Iterations(200),
                    concurrency: 25,
                    multi_queue: false,
                    note: "children plus continue-as-new",
                },
                PhaseSpec {
                    scenario: Scenario::NoopActivity,
                    work: Work::Iterations(300),
                    concurrency: 30,
                    multi_queue: true,
                    note: "dedicated task queue with external worker",
                },
            ],
            Self::Full => vec![
                PhaseSpec {
                    scenario: Scenario::NoopActivity,
                    work: Work::Iterations(2000),
                    concurrency: 100,
                    multi_queue: false,
                    note: "baseline activity round-trips",
                },
                PhaseSpec {
                    scenario: Scenario::ThroughputStress,
                    work: Work::Iterations(1000),
                    concurrency: 50,
                    multi_queue: false,
                    note: "children plus continue-as-new",
                },
                PhaseSpec {
                    scenario: Scenario::NoopActivity,
                    work: Work::Iterations(1000),
                    concurrency: 50,
                    multi_queue: true,
                    note: "dedicated task queue with external worker",
                },
                PhaseSpec {
                    scenario: Scenario::WorkflowCancellation,
                    work: Work::Iterations(500),
                    concurrency: 25,
                    multi_queue: false,
                    note: "cancellation storm",
                },
            ],
            Self::Nightly => vec![
                PhaseSpec {
                    scenario: Scenario::NoopActivity,
                    work: Work::Duration(600),
                    concurrency: 100,
                    multi_queue: false,
                    note: "10 minute soak",
                },
                PhaseSpec {
                    scenario: Scenario::ThroughputStress,
                    work: Work::Duration(900),
                    concurrency: 50,
                    multi_queue: false,
                    note: "15 minute soak",
                },
            ],
            Self::Weekly => vec![
                PhaseSpec {
                    scenario: Scenario::NoopActivity,
                    work: Work::Duration(3600),
                    concurrency: 100,
                    multi_queue: false,
                    note: "1 hour soak",
                },
                PhaseSpec {
                    scenario: Scenario::ThroughputStress,
                    work: Work::Duration(3600),
                    concurrency: 50,
                    multi_queue: false,
                    note: "1 hour soak",
                },
                PhaseSpec {
                    scenario: Scenario::NoopActivity,
                    work: Work::Duration(1800),
                    concurrency: 50,
                    multi_queue: true,
                    note: "30 minute multi-queue soak",
                },
            ],
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much work a phase asks of the load generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Work {
    /// Fixed iteration count.
    Iterations(u64),
    /// Fixed wall-clock duration in seconds.
    Duration(u64),
}

/// One planned scenario invocation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PhaseSpec {
    pub scenario: Scenario,
    pub work: Work,
    pub concurrency: u32,
    /// Run the scenario against an externally spawned worker on a
    /// dedicated task queue instead of the embedded worker.
    pub multi_queue: bool,
    pub note: &'static str,
}

impl PhaseSpec {
    /// Workflow count this phase is expected to leave behind. Duration
    /// phases have none; the generator's output is not parsed.
    pub fn derived_workflows(&self) -> Option<u64> {
        match self.work {
            Work::Iterations(n) => Some(n * self.scenario.workflows_per_iteration()),
            Work::Duration(_) => None,
        }
    }
}

/// Outcome of one executed phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseResult {
    pub phase: usize,
    pub scenario: String,
    pub work: Work,
    pub concurrency: u32,
    pub elapsed_secs: f64,
    pub workflows: Option<u64>,
    pub note: String,
}

/// Everything one load run produced, for the summary artifact.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub mode: Mode,
    pub run_id: String,
    pub server_address: String,
    pub namespace: String,
    pub started_at: DateTime<Utc>,
    pub phases: Vec<PhaseResult>,
    /// Set when a phase aborted the run; completed phases stay recorded.
    pub failure: Option<String>,
}

impl LoadReport {
    /// Sum of per-phase derived workflow counts.
    pub fn total_workflows(&self) -> u64 {
        self.phases.iter().filter_map(|p| p.workflows).sum()
    }

    pub fn total_elapsed_secs(&self) -> f64 {
        self.phases.iter().map(|p| p.elapsed_secs).sum()
    }
}

/// Sequentially drives the external load generator through a mode's
/// phase list, supervising background workers where a phase needs one.
pub struct LoadRunner {
    bin: String,
    worker_language: String,
    server_address: String,
    namespace: String,
    run_id: String,
}

impl LoadRunner {
    pub fn new(config: &Config, mode: Mode) -> Self {
        // One run id shared by all phases of this invocation.
        let run_id = format!(
            "{}-{}-{:04x}",
            mode,
            Utc::now().format("%Y%m%d-%H%M%S"),
            rand::random::<u16>()
        );

        Self {
            bin: config.load.bin.clone(),
            worker_language: config.load.worker_language.clone(),
            server_address: config.server_address.clone(),
            namespace: config.namespace.clone(),
            run_id,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Run every phase of the mode in order. A failing phase stops the
    /// run; the report keeps the phases that completed plus the failure.
    pub async fn run(&self, mode: Mode) -> Result<LoadReport> {
        let specs = mode.phases();
        info!(%mode, run_id = %self.run_id, phases = specs.len(), "Starting load run");

        let mut report = LoadReport {
            mode,
            run_id: self.run_id.clone(),
            server_address: self.server_address.clone(),
            namespace: self.namespace.clone(),
            started_at: Utc::now(),
            phases: Vec::with_capacity(specs.len()),
            failure: None,
        };

        for (idx, spec) in specs.iter().enumerate() {
            match self.run_phase(idx, spec).await {
                Ok(result) => report.phases.push(result),
                Err(e) => {
                    report.failure = Some(format!("phase {} ({}): {e:#}", idx + 1, spec.scenario));
                    break;
                }
            }
        }

        Ok(report)
    }

    async fn run_phase(&self, idx: usize, spec: &PhaseSpec) -> Result<PhaseResult> {
        info!(
            phase = idx + 1,
            scenario = %spec.scenario,
            concurrency = spec.concurrency,
            "Starting phase"
        );

        let elapsed = if spec.multi_queue {
            let queue = format!("{}-q{}", self.run_id, idx + 1);
            let mut supervisor = WorkerSupervisor::new();
            supervisor.spawn(&self.bin, &self.worker_args(&queue))?;
            tokio::time::sleep(WORKER_WARMUP).await;

            let started = Instant::now();
            let outcome = self.invoke(&self.scenario_args(spec, &queue)).await;
            let elapsed = started.elapsed();

            if let Err(e) = supervisor.shutdown_all().await {
                warn!(error = %e, "Worker shutdown failed");
            }
            outcome?;
            elapsed
        } else {
            let started = Instant::now();
            self.invoke(&self.embedded_args(spec)).await?;
            started.elapsed()
        };

        info!(phase = idx + 1, elapsed_secs = elapsed.as_secs_f64(), "Phase finished");

        Ok(PhaseResult {
            phase: idx + 1,
            scenario: spec.scenario.cli_name().to_string(),
            work: spec.work,
            concurrency: spec.concurrency,
            elapsed_secs: elapsed.as_secs_f64(),
            workflows: spec.derived_workflows(),
            note: spec.note.to_string(),
        })
    }

    async fn invoke(&self, args: &[String]) -> Result<()> {
        info!(command = %format!("{} {}", self.bin, args.join(" ")), "Invoking load generator");

        let status = tokio::process::Command::new(&self.bin)
            .args(args)
            .status()
            .await
            .with_context(|| format!("Failed to run `{}`", self.bin))?;

        if !status.success() {
            return Err(HarnessError::ToolFailed {
                command: format!("{} {}", self.bin, args.join(" ")),
                status,
            }
            .into());
        }

        Ok(())
    }

    /// `run-scenario-with-worker`: scenario plus embedded worker.
    pub fn embedded_args(&self, spec: &PhaseSpec) -> Vec<String> {
        let mut args = vec![
            "run-scenario-with-worker".to_string(),
            "--scenario".to_string(),
            spec.scenario.cli_name().to_string(),
            "--language".to_string(),
            self.worker_language.clone(),
        ];
        args.extend(self.connection_args());
        args.extend(work_args(spec.work));
        args.extend(concurrency_args(spec.concurrency));
        args
    }

    /// `run-worker`: worker only, on a dedicated task queue.
    pub fn worker_args(&self, task_queue: &str) -> Vec<String> {
        let mut args = vec![
            "run-worker".to_string(),
            "--language".to_string(),
            self.worker_language.clone(),
        ];
        args.extend(self.connection_args());
        args.push("--task-queue".to_string());
        args.push(task_queue.to_string());
        args
    }

    /// `run-scenario`: scenario against an external worker.
    pub fn scenario_args(&self, spec: &PhaseSpec, task_queue: &str) -> Vec<String> {
        let mut args = vec![
            "run-scenario".to_string(),
            "--scenario".to_string(),
            spec.scenario.cli_name().to_string(),
        ];
        args.extend(self.connection_args());
        args.push("--task-queue".to_string());
        args.push(task_queue.to_string());
        args.extend(work_args(spec.work));
        args.extend(concurrency_args(spec.concurrency));
        args
    }

    fn connection_args(&self) -> Vec<String> {
        vec![
            "--server-address".to_string(),
            self.server_address.clone(),
            "--namespace".to_string(),
            self.namespace.clone(),
            "--run-id".to_string(),
            self.run_id.clone(),
        ]
    }
}

fn work_args(work: Work) -> Vec<String> {
    match work {
        Work::Iterations(n) => vec!["--iterations".to_string(), n.to_string()],
        Work::Duration(secs) => vec!["--duration".to_string(), format!("{secs}s")],
    }
}

fn concurrency_args(concurrency: u32) -> Vec<String> {
    vec!["--max-concurrent".to_string(), concurrency.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ValueEnum;

    #[test]
    fn test_quick_is_one_phase_100_iterations_20_concurrent() {
        let phases = Mode::Quick.phases();
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].scenario, Scenario::NoopActivity);
        assert_eq!(phases[0].work, Work::Iterations(100));
        assert_eq!(phases[0].concurrency, 20);
        assert!(!phases[0].multi_queue);
    }

    #[test]
    fn test_standard_has_one_multi_queue_phase() {
        let phases = Mode::Standard.phases();
        assert_eq!(phases.len(), 3);
        assert_eq!(phases.iter().filter(|p| p.multi_queue).count(), 1);
    }

    #[test]
    fn test_soak_modes_are_duration_based() {
        for mode in [Mode::Nightly, Mode::Weekly] {
            for phase in mode.phases() {
                assert!(matches!(phase.work, Work::Duration(_)), "{mode} phase is not a soak");
            }
        }
    }

    #[test]
    fn test_mode_parses_known_strings_only() {
        assert_eq!(Mode::from_str("quick", true).unwrap(), Mode::Quick);
        assert_eq!(Mode::from_str("weekly", true).unwrap(), Mode::Weekly);
        assert!(Mode::from_str("turbo", true).is_err());
    }

    #[test]
    fn test_derived_workflows() {
        let spec = PhaseSpec {
            scenario: Scenario::ThroughputStress,
            work: Work::Iterations(200),
            concurrency: 25,
            multi_queue: false,
            note: "",
        };
        assert_eq!(spec.derived_workflows(), Some(1200));

        let soak = PhaseSpec {
            scenario: Scenario::NoopActivity,
            work: Work::Duration(600),
            concurrency: 10,
            multi_queue: false,
            note: "",
        };
        assert_eq!(soak.derived_workflows(), None);
    }

    #[test]
    fn test_embedded_args_shape() {
        let runner = LoadRunner::new(&Config::default(), Mode::Quick);
        let spec = Mode::Quick.phases()[0];
        let args = runner.embedded_args(&spec);

        assert_eq!(args[0], "run-scenario-with-worker");
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();
        assert_eq!(args[pos("--scenario") + 1], "workflow_with_single_noop_activity");
        assert_eq!(args[pos("--iterations") + 1], "100");
        assert_eq!(args[pos("--max-concurrent") + 1], "20");
        assert_eq!(args[pos("--server-address") + 1], "localhost:7233");
        assert_eq!(args[pos("--namespace") + 1], "temporal-mongodb");
    }

    #[test]
    fn test_worker_and_scenario_args_share_queue() {
        let runner = LoadRunner::new(&Config::default(), Mode::Standard);
        let spec = PhaseSpec {
            scenario: Scenario::NoopActivity,
            work: Work::Duration(1800),
            concurrency: 50,
            multi_queue: true,
            note: "",
        };

        let worker = runner.worker_args("load-q3");
        let scenario = runner.scenario_args(&spec, "load-q3");

        assert_eq!(worker[0], "run-worker");
        assert_eq!(scenario[0], "run-scenario");
        for args in [&worker, &scenario] {
            let pos = args.iter().position(|a| a == "--task-queue").unwrap();
            assert_eq!(args[pos + 1], "load-q3");
        }
        let pos = scenario.iter().position(|a| a == "--duration").unwrap();
        assert_eq!(scenario[pos + 1], "1800s");
    }

    #[test]
    fn test_run_ids_are_mode_prefixed_and_distinct() {
        let config = Config::default();
        let a = LoadRunner::new(&config, Mode::Quick);
        let b = LoadRunner::new(&config, Mode::Quick);
        assert!(a.run_id().starts_with("quick-"));
        assert_ne!(a.run_id(), b.run_id());
    }
}
