mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod pool;
mod progress;
mod run;
mod shutdown;
mod stage;
mod types;

pub use stage::{parse_duration, parse_stage};

pub mod prelude {
    pub use crate::cli::{ReporterOpt, SurgeScenarioCli};
    pub use crate::context::UserValuesConstraint;
    pub use crate::context::{AgentContext, RunnerContext};
    pub use crate::definition::{
        ExecutorKind, HookResult, RunOptions, ScenarioDefinitionBuilder, DEFAULT_GRACEFUL_STOP,
        DEFAULT_START_VUS,
    };
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::{run, RunReport, ThresholdBreachedError, RAMP_TICK};
    pub use crate::stage::{RampSchedule, Stage, StageError};
    pub use crate::types::SurgeResult;
    pub use surge_core::prelude::{AgentBailError, ShutdownSignalError};
}
