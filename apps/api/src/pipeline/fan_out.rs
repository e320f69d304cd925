//! Fan-out group: independent stages dispatched together behind a wait-for-all barrier.

use futures::future::join_all;
use tracing::warn;

use crate::pipeline::blackboard::Blackboard;
use crate::pipeline::error::{MemberFailure, PipelineDefinitionError};
use crate::pipeline::stage::Stage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupOutcome {
    AllCompleted,
    /// Failing members in declaration order. Keys from succeeded members stay written.
    PartialFailure(Vec<MemberFailure>),
}

#[derive(Clone)]
pub struct FanOutGroup {
    name: String,
    members: Vec<Stage>,
}

impl FanOutGroup {
    /// Rejects an empty group, and a group in which one member reads a key another member
    /// writes.
    pub fn new(name: &str, members: Vec<Stage>) -> Result<Self, PipelineDefinitionError> {
        if members.is_empty() {
            return Err(PipelineDefinitionError::EmptyGroup(name.to_string()));
        }
        for stage in &members {
            for key in stage.inputs() {
                if let Some(sibling) = members
                    .iter()
                    .find(|s| s.name() != stage.name() && s.output_key() == key)
                {
                    return Err(PipelineDefinitionError::SiblingDependency {
                        group: name.to_string(),
                        stage: stage.name().to_string(),
                        key: key.clone(),
                        sibling: sibling.name().to_string(),
                    });
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            members,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[Stage] {
        &self.members
    }

    /// Runs every member concurrently and waits for all of them.
    /// A failing member never cancels its siblings.
    pub async fn execute(&self, blackboard: &Blackboard) -> GroupOutcome {
        let results = join_all(self.members.iter().map(|stage| stage.execute(blackboard))).await;

        let failures: Vec<MemberFailure> = self
            .members
            .iter()
            .zip(results)
            .filter_map(|(stage, result)| {
                result.err().map(|reason| MemberFailure {
                    stage: stage.name().to_string(),
                    reason,
                })
            })
            .collect();

        if failures.is_empty() {
            GroupOutcome::AllCompleted
        } else {
            warn!(
                "Fan-out group '{}': {}/{} members failed",
                self.name,
                failures.len(),
                self.members.len()
            );
            GroupOutcome::PartialFailure(failures)
        }
    }
}
