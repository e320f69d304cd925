//! The resume rating pipeline, declared as data.
//!
//! ```text
//! 0  InitialInsights      (fan-out)  resume_text        → experience_summary, red_flags
//! 1  PostSummaryInsights  (fan-out)  experience_summary → seniority, expected_salary, culture_fit
//! 2  ResumeClassifier                resume_text        → rating
//! 3  ResumeExplanation               resume_text, rating → reason
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::pipeline::{
    FanOutGroup, Pipeline, PipelineDefinitionError, RetryPolicy, Stage, StageConfig,
    StageInvoker, Step,
};
use crate::rating::prompts::{
    CLASSIFY_TEMPLATE, CULTURE_FIT_TEMPLATE, EXPERIENCE_SUMMARY_TEMPLATE, EXPLAIN_TEMPLATE,
    RED_FLAGS_TEMPLATE, SALARY_TEMPLATE, SENIORITY_TEMPLATE,
};

pub const PIPELINE_NAME: &str = "ResumePipeline";

pub mod keys {
    pub const RESUME_TEXT: &str = "resume_text";
    pub const EXPERIENCE_SUMMARY: &str = "experience_summary";
    pub const RED_FLAGS: &str = "red_flags";
    pub const SENIORITY: &str = "seniority";
    pub const EXPECTED_SALARY: &str = "expected_salary";
    pub const CULTURE_FIT: &str = "culture_fit";
    pub const RATING: &str = "rating";
    pub const REASON: &str = "reason";
}

/// Keys captured into the run result and persisted in session history.
pub const DECLARED_OUTPUTS: [&str; 7] = [
    keys::RATING,
    keys::REASON,
    keys::SENIORITY,
    keys::EXPECTED_SALARY,
    keys::EXPERIENCE_SUMMARY,
    keys::RED_FLAGS,
    keys::CULTURE_FIT,
];

/// Per-stage call limits applied uniformly to every stage.
#[derive(Debug, Clone, Copy)]
pub struct StageSettings {
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

/// One step of the definition: a lone stage or a named fan-out group.
#[derive(Debug, Clone)]
pub enum StepConfig {
    Single(StageConfig),
    Group(&'static str, Vec<StageConfig>),
}

pub fn step_configs() -> Vec<StepConfig> {
    vec![
        StepConfig::Group(
            "InitialInsights",
            vec![
                StageConfig::new(
                    "ExperienceSummarizer",
                    &[keys::RESUME_TEXT],
                    keys::EXPERIENCE_SUMMARY,
                    EXPERIENCE_SUMMARY_TEMPLATE,
                ),
                StageConfig::new(
                    "RedFlagDetector",
                    &[keys::RESUME_TEXT],
                    keys::RED_FLAGS,
                    RED_FLAGS_TEMPLATE,
                ),
            ],
        ),
        StepConfig::Group(
            "PostSummaryInsights",
            vec![
                StageConfig::new(
                    "SeniorityEstimator",
                    &[keys::EXPERIENCE_SUMMARY],
                    keys::SENIORITY,
                    SENIORITY_TEMPLATE,
                ),
                StageConfig::new(
                    "SalaryEstimator",
                    &[keys::EXPERIENCE_SUMMARY],
                    keys::EXPECTED_SALARY,
                    SALARY_TEMPLATE,
                ),
                StageConfig::new(
                    "CultureFitInsight",
                    &[keys::EXPERIENCE_SUMMARY],
                    keys::CULTURE_FIT,
                    CULTURE_FIT_TEMPLATE,
                ),
            ],
        ),
        StepConfig::Single(StageConfig::new(
            "ResumeClassifier",
            &[keys::RESUME_TEXT],
            keys::RATING,
            CLASSIFY_TEMPLATE,
        )),
        StepConfig::Single(StageConfig::new(
            "ResumeExplanation",
            &[keys::RESUME_TEXT, keys::RATING],
            keys::REASON,
            EXPLAIN_TEMPLATE,
        )),
    ]
}

/// Builds the rating pipeline with every stage backed by `invoker`.
pub fn build_resume_pipeline(
    invoker: Arc<dyn StageInvoker>,
    settings: StageSettings,
) -> Result<Pipeline, PipelineDefinitionError> {
    build_pipeline(step_configs(), invoker, settings)
}

fn build_pipeline(
    configs: Vec<StepConfig>,
    invoker: Arc<dyn StageInvoker>,
    settings: StageSettings,
) -> Result<Pipeline, PipelineDefinitionError> {
    let make_stage = |config: StageConfig| {
        Stage::new(config, invoker.clone())
            .with_timeout(settings.timeout)
            .with_retry(settings.retry)
    };

    let steps = configs
        .into_iter()
        .map(|config| match config {
            StepConfig::Single(stage) => Ok(Step::Stage(make_stage(stage))),
            StepConfig::Group(name, members) => {
                let stages = members.into_iter().map(make_stage).collect();
                FanOutGroup::new(name, stages).map(Step::FanOut)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    Pipeline::new(
        PIPELINE_NAME,
        steps,
        &[keys::RESUME_TEXT],
        &DECLARED_OUTPUTS,
    )
}
