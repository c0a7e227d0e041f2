use serde::Serialize;
use std::fmt;

/// Workload profiles understood by the external load generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Scenario {
    /// A workflow that runs one no-op activity and completes.
    NoopActivity,
    /// A workflow that spawns children and reissues itself through
    /// continue-as-new.
    ThroughputStress,
    /// Workflows started and then cancelled mid-flight.
    WorkflowCancellation,
}

impl Scenario {
    /// Scenario name as the load generator spells it.
    pub fn cli_name(self) -> &'static str {
        match self {
            Self::NoopActivity => "workflow_with_single_noop_activity",
            Self::ThroughputStress => "throughput_stress",
            Self::WorkflowCancellation => "workflow_cancellation",
        }
    }

    /// Workflows each iteration leaves behind in the persistence layer.
    /// One stress iteration is a root that spawns five children before
    /// continuing as new.
    pub fn workflows_per_iteration(self) -> u64 {
        match self {
            Self::NoopActivity => 1,
            Self::ThroughputStress => 6,
            Self::WorkflowCancellation => 1,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}
