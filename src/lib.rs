pub mod config;
pub mod error;
pub mod functional;
pub mod load;
pub mod namespace;
pub mod stack;
pub mod summary;

pub use config::{Config, GeneratorConfig, StackConfig, SuiteConfig};
pub use error::HarnessError;
pub use functional::FunctionalSuite;
pub use namespace::{NamespaceRegistrar, RegistrationOutcome};
pub use stack::StackManager;
pub use summary::SummaryWriter;

// Re-export load types for convenience
pub use load::{
    scenario::Scenario,
    worker::{PidSet, WorkerSupervisor},
    LoadReport, LoadRunner, Mode, PhaseResult, PhaseSpec, Work,
};
