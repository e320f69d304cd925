//! Pipeline: ordered steps, each a single stage or a fan-out group.
//!
//! Steps run strictly in declaration order. The first failing step aborts the run; keys
//! written before it stay on the blackboard for inspection but nothing is rolled back.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::pipeline::blackboard::Blackboard;
use crate::pipeline::error::{MemberFailure, PipelineDefinitionError, RunFailed};
use crate::pipeline::fan_out::{FanOutGroup, GroupOutcome};
use crate::pipeline::stage::Stage;

#[derive(Clone)]
pub enum Step {
    Stage(Stage),
    FanOut(FanOutGroup),
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Step::Stage(stage) => stage.name(),
            Step::FanOut(group) => group.name(),
        }
    }

    fn stages(&self) -> &[Stage] {
        match self {
            Step::Stage(stage) => std::slice::from_ref(stage),
            Step::FanOut(group) => group.members(),
        }
    }

    async fn execute(&self, blackboard: &Blackboard) -> Result<(), Vec<MemberFailure>> {
        match self {
            Step::Stage(stage) => stage.execute(blackboard).await.map_err(|reason| {
                vec![MemberFailure {
                    stage: stage.name().to_string(),
                    reason,
                }]
            }),
            Step::FanOut(group) => match group.execute(blackboard).await {
                GroupOutcome::AllCompleted => Ok(()),
                GroupOutcome::PartialFailure(failures) => Err(failures),
            },
        }
    }
}

/// The declared outputs of a completed run, captured once all steps finished.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub outputs: BTreeMap<String, Value>,
    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    /// The output under `key` as text. Non-string values are serialized.
    pub fn text(&self, key: &str) -> Option<String> {
        self.outputs.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[derive(Clone)]
pub struct Pipeline {
    name: String,
    steps: Vec<Step>,
    declared_outputs: Vec<String>,
}

impl Pipeline {
    /// Validates and freezes a pipeline definition.
    ///
    /// `seed_keys` are the keys the caller writes before the run starts. Every declared
    /// output must be a seed key or the output of some stage, and no two stages may
    /// share an output key.
    pub fn new(
        name: &str,
        steps: Vec<Step>,
        seed_keys: &[&str],
        declared_outputs: &[&str],
    ) -> Result<Self, PipelineDefinitionError> {
        if steps.is_empty() {
            return Err(PipelineDefinitionError::Empty);
        }

        let mut producers: HashMap<&str, &str> = HashMap::new();
        for stage in steps.iter().flat_map(Step::stages) {
            if let Some(first) = producers.insert(stage.output_key(), stage.name()) {
                return Err(PipelineDefinitionError::DuplicateOutputKey {
                    key: stage.output_key().to_string(),
                    first: first.to_string(),
                    second: stage.name().to_string(),
                });
            }
        }

        for key in declared_outputs {
            if !producers.contains_key(key) && !seed_keys.contains(key) {
                return Err(PipelineDefinitionError::UnproducedOutput(key.to_string()));
            }
        }

        Ok(Self {
            name: name.to_string(),
            steps,
            declared_outputs: declared_outputs.iter().map(|k| k.to_string()).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Drives every step against `blackboard`, which the caller has already seeded.
    pub async fn run(&self, blackboard: &Blackboard) -> Result<RunResult, RunFailed> {
        info!(
            "Pipeline '{}': starting with {} steps",
            self.name,
            self.steps.len()
        );

        for (index, step) in self.steps.iter().enumerate() {
            if let Err(failures) = step.execute(blackboard).await {
                let failed = RunFailed {
                    step_index: index,
                    step_name: step.name().to_string(),
                    failures,
                };
                error!("Pipeline '{}': {}", self.name, failed);
                return Err(failed);
            }
            info!(
                "Pipeline '{}': step {} '{}' completed",
                self.name,
                index,
                step.name()
            );
        }

        Ok(RunResult {
            outputs: blackboard.capture(&self.declared_outputs),
            completed_at: Utc::now(),
        })
    }
}
