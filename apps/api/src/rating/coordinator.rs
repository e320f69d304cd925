//! Run coordinator: one fresh blackboard per request, driven through the rating pipeline,
//! with completed runs folded into the caller's session.
//!
//! Flow: seed blackboard → pipeline.run → archive snapshot →
//!       (completed) sessions.get_or_create → sessions.update → response
//!       (failed)    structured failure, session untouched

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::archive::{RunArchive, RunSnapshot, RunStatus};
use crate::errors::AppError;
use crate::pipeline::{Blackboard, Pipeline, RunFailed, RunResult, StageFailure};
use crate::rating::definition::keys;
use crate::sessions::{RunRecord, SessionStats, SessionStore};

#[derive(Debug, Clone)]
pub struct RateRequest {
    pub user_id: String,
    pub resume_text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Insights {
    pub experience_summary: String,
    pub red_flags: String,
    pub seniority: String,
    pub expected_salary: String,
    pub culture_fit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateResponse {
    pub run_id: Uuid,
    pub session_id: Uuid,
    pub rating: String,
    pub reason: String,
    pub insights: Insights,
    pub stats: SessionStats,
}

/// A run that did not complete, in a form safe to show to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunFailure {
    pub run_id: Uuid,
    pub step_index: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RateOutcome {
    Completed(RateResponse),
    Failed(RunFailure),
}

pub struct RunCoordinator {
    pipeline: Pipeline,
    sessions: Arc<dyn SessionStore>,
    archive: Option<Arc<dyn RunArchive>>,
}

impl RunCoordinator {
    pub fn new(
        pipeline: Pipeline,
        sessions: Arc<dyn SessionStore>,
        archive: Option<Arc<dyn RunArchive>>,
    ) -> Self {
        Self {
            pipeline,
            sessions,
            archive,
        }
    }

    pub async fn handle_request(&self, request: RateRequest) -> Result<RateOutcome, AppError> {
        let run_id = Uuid::new_v4();
        info!(
            "Run {run_id}: rating resume for user {} ({} chars)",
            request.user_id,
            request.resume_text.len()
        );

        let blackboard = Blackboard::new();
        blackboard
            .set(keys::RESUME_TEXT, Value::String(request.resume_text))
            .context("Failed to seed run blackboard")?;

        let result = self.pipeline.run(&blackboard).await;
        self.archive_run(run_id, &request.user_id, &blackboard, &result)
            .await;

        let run = match result {
            Ok(run) => run,
            Err(failed) => return Ok(RateOutcome::Failed(to_failure(run_id, &failed))),
        };

        let record = to_run_record(&run);
        let (session_id, _) = self.sessions.get_or_create(&request.user_id).await?;
        let session = self.sessions.update(session_id, &record).await?;

        info!(
            "Run {run_id}: rated '{}' for user {} (session total {})",
            record.outcome, request.user_id, session.stats.total
        );

        Ok(RateOutcome::Completed(RateResponse {
            run_id,
            session_id,
            rating: record.outcome.clone(),
            reason: output(&record, keys::REASON),
            insights: Insights {
                experience_summary: output(&record, keys::EXPERIENCE_SUMMARY),
                red_flags: output(&record, keys::RED_FLAGS),
                seniority: output(&record, keys::SENIORITY),
                expected_salary: output(&record, keys::EXPECTED_SALARY),
                culture_fit: output(&record, keys::CULTURE_FIT),
            },
            stats: session.stats,
        }))
    }

    /// Best effort: an archive outage never fails the request.
    async fn archive_run(
        &self,
        run_id: Uuid,
        user_id: &str,
        blackboard: &Blackboard,
        result: &Result<RunResult, RunFailed>,
    ) {
        let Some(archive) = &self.archive else {
            return;
        };

        let (status, failed_step) = match result {
            Ok(_) => (RunStatus::Completed, None),
            Err(failed) => (RunStatus::Failed, Some(failed.step_index)),
        };
        let snapshot = RunSnapshot {
            run_id,
            user_id: user_id.to_string(),
            pipeline: self.pipeline.name().to_string(),
            status,
            failed_step,
            slots: blackboard.snapshot(),
            archived_at: Utc::now(),
        };

        if let Err(e) = archive.store(&snapshot).await {
            warn!("Run {run_id}: failed to archive snapshot: {e}");
        }
    }
}

fn to_run_record(run: &RunResult) -> RunRecord {
    let outputs: BTreeMap<String, String> = run
        .outputs
        .keys()
        .filter_map(|key| run.text(key).map(|text| (key.clone(), text)))
        .collect();

    RunRecord {
        outcome: run.text(keys::RATING).unwrap_or_default(),
        outputs,
        recorded_at: run.completed_at,
    }
}

fn output(record: &RunRecord, key: &str) -> String {
    record.outputs.get(key).cloned().unwrap_or_default()
}

/// Programming errors are logged in full and reported generically; upstream failures
/// are summarized without the raw provider detail.
fn to_failure(run_id: Uuid, failed: &RunFailed) -> RunFailure {
    let message = if failed.has_programming_error() {
        error!("Run {run_id}: pipeline misconfiguration: {failed}");
        "Resume analysis failed due to an internal pipeline error".to_string()
    } else {
        let timed_out = failed
            .failures
            .iter()
            .any(|f| f.reason == StageFailure::UpstreamFailure("timeout".to_string()));
        warn!("Run {run_id}: {failed}");
        if timed_out {
            "Resume analysis failed: the language model did not respond in time".to_string()
        } else {
            "Resume analysis failed: the language model call returned an error".to_string()
        }
    };

    RunFailure {
        run_id,
        step_index: failed.step_index,
        message,
    }
}
