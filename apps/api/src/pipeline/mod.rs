// Pipeline orchestration: a per-run blackboard, model-backed stages, fan-out groups
// behind a wait-for-all barrier, and the sequential runner that ties them together.
// Nothing in here knows about resumes; the rating module supplies the definition.

pub mod blackboard;
pub mod error;
pub mod fan_out;
pub mod runner;
pub mod stage;

pub use blackboard::Blackboard;
pub use error::{PipelineDefinitionError, RunFailed, StageFailure};
pub use fan_out::FanOutGroup;
pub use runner::{Pipeline, RunResult, Step};
pub use stage::{Invocation, InvokeError, RetryPolicy, Stage, StageConfig, StageInvoker};
