use std::fmt;

use thiserror::Error;

/// Why a single stage did not write its output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageFailure {
    /// A declared input was never produced. Points at a pipeline ordering bug.
    #[error("missing input '{0}'")]
    MissingInput(String),

    /// The output key was already written by someone else. Points at a definition bug.
    #[error("output '{0}' already written")]
    DuplicateOutput(String),

    /// The external call failed or timed out after all configured attempts.
    #[error("upstream failure: {0}")]
    UpstreamFailure(String),
}

impl StageFailure {
    /// Misconfiguration categories are never shown to end users verbatim.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            StageFailure::MissingInput(_) | StageFailure::DuplicateOutput(_)
        )
    }
}

/// A failed stage together with the reason it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFailure {
    pub stage: String,
    pub reason: StageFailure,
}

impl fmt::Display for MemberFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.reason)
    }
}

/// Terminal outcome of a pipeline run that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFailed {
    pub step_index: usize,
    pub step_name: String,
    pub failures: Vec<MemberFailure>,
}

impl RunFailed {
    pub fn has_programming_error(&self) -> bool {
        self.failures.iter().any(|f| f.reason.is_programming_error())
    }
}

impl fmt::Display for RunFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reasons = self
            .failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        write!(
            f,
            "step {} '{}' failed: {}",
            self.step_index, self.step_name, reasons
        )
    }
}

impl std::error::Error for RunFailed {}

/// Rejections raised while assembling a pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineDefinitionError {
    #[error("pipeline has no steps")]
    Empty,

    #[error("fan-out group '{0}' has no members")]
    EmptyGroup(String),

    #[error("output key '{key}' is declared by both '{first}' and '{second}'")]
    DuplicateOutputKey {
        key: String,
        first: String,
        second: String,
    },

    #[error("fan-out group '{group}': '{stage}' reads '{key}' written by sibling '{sibling}'")]
    SiblingDependency {
        group: String,
        stage: String,
        key: String,
        sibling: String,
    },

    #[error("declared output '{0}' is not produced by any stage")]
    UnproducedOutput(String),
}
