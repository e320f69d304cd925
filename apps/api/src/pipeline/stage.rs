//! Stage: one external-call-backed unit of pipeline work.
//!
//! A stage is plain data (`StageConfig`) plus a handle to the invocation capability.
//! Every model-backed step of a pipeline is the same `Stage` type configured differently.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::llm_client::LlmError;
use crate::pipeline::blackboard::Blackboard;
use crate::pipeline::error::StageFailure;

pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Declarative description of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageConfig {
    pub name: String,
    pub inputs: Vec<String>,
    pub output_key: String,
    /// Prompt template with `{key}` placeholders for each declared input.
    pub template: String,
}

impl StageConfig {
    pub fn new(name: &str, inputs: &[&str], output_key: &str, template: &str) -> Self {
        Self {
            name: name.to_string(),
            inputs: inputs.iter().map(|k| k.to_string()).collect(),
            output_key: output_key.to_string(),
            template: template.to_string(),
        }
    }
}

/// Everything the external call gets to see.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    pub stage: &'a str,
    pub template: &'a str,
    pub inputs: &'a BTreeMap<String, Value>,
}

impl Invocation<'_> {
    pub fn render(&self) -> String {
        render_template(self.template, self.inputs)
    }
}

#[derive(Debug, Error)]
pub enum InvokeError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The call went through but produced nothing usable.
    #[error("{0}")]
    Upstream(String),
}

/// The opaque external call behind every stage: text in, text out, possibly failing.
#[async_trait]
pub trait StageInvoker: Send + Sync {
    async fn invoke(&self, invocation: Invocation<'_>) -> Result<String, InvokeError>;
}

/// Replaces every `{key}` in `template` with the matching input, in one pass over the
/// template. Substituted text is never scanned again, so values may contain braces.
/// String values are inserted raw; any other JSON value is inserted serialized.
/// Placeholders with no matching input are left as written.
pub fn render_template(template: &str, inputs: &BTreeMap<String, Value>) -> String {
    let mut rendered = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        rendered.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let placeholder = after
            .find('}')
            .and_then(|close| inputs.get(&after[..close]).map(|value| (close, value)));

        match placeholder {
            Some((close, Value::String(s))) => {
                rendered.push_str(s);
                rest = &after[close + 1..];
            }
            Some((close, other)) => {
                rendered.push_str(&other.to_string());
                rest = &after[close + 1..];
            }
            None => {
                rendered.push('{');
                rest = after;
            }
        }
    }

    rendered.push_str(rest);
    rendered
}

/// Retry wrapper around the external call. One attempt means no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_attempts: 1,
        backoff: Duration::ZERO,
    };

    /// Delay before attempt `attempt + 1` (1-based). Exponential: backoff, 2×, 4×, ...
    fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(1u32 << (attempt.saturating_sub(1)).min(16))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::NONE
    }
}

#[derive(Clone)]
pub struct Stage {
    config: StageConfig,
    invoker: Arc<dyn StageInvoker>,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Stage {
    pub fn new(config: StageConfig, invoker: Arc<dyn StageInvoker>) -> Self {
        Self {
            config,
            invoker,
            timeout: DEFAULT_STAGE_TIMEOUT,
            retry: RetryPolicy::NONE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn inputs(&self) -> &[String] {
        &self.config.inputs
    }

    pub fn output_key(&self) -> &str {
        &self.config.output_key
    }

    /// Resolves inputs, calls out, and writes the single output key.
    ///
    /// Missing inputs fail before the external call is made. A failed call writes nothing.
    pub async fn execute(&self, blackboard: &Blackboard) -> Result<(), StageFailure> {
        let inputs = self.resolve_inputs(blackboard)?;
        let text = self.invoke_with_retry(&inputs).await?;

        blackboard
            .set(&self.config.output_key, Value::String(text))
            .map_err(|_| StageFailure::DuplicateOutput(self.config.output_key.clone()))?;

        debug!(
            "Stage '{}' wrote '{}'",
            self.config.name, self.config.output_key
        );
        Ok(())
    }

    fn resolve_inputs(
        &self,
        blackboard: &Blackboard,
    ) -> Result<BTreeMap<String, Value>, StageFailure> {
        self.config
            .inputs
            .iter()
            .map(|key| {
                blackboard
                    .get(key)
                    .map(|value| (key.clone(), value))
                    .map_err(|_| StageFailure::MissingInput(key.clone()))
            })
            .collect()
    }

    async fn invoke_with_retry(
        &self,
        inputs: &BTreeMap<String, Value>,
    ) -> Result<String, StageFailure> {
        let invocation = Invocation {
            stage: &self.config.name,
            template: &self.config.template,
            inputs,
        };
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            match tokio::time::timeout(self.timeout, self.invoker.invoke(invocation)).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(_) => last_error = "timeout".to_string(),
            }

            if attempt < max_attempts {
                let delay = self.retry.delay_after(attempt);
                warn!(
                    "Stage '{}' attempt {}/{} failed ({}), retrying after {}ms",
                    self.config.name,
                    attempt,
                    max_attempts,
                    last_error,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(StageFailure::UpstreamFailure(last_error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Behavior, ScriptedInvoker};
    use serde_json::json;

    fn summary_config() -> StageConfig {
        StageConfig::new(
            "ExperienceSummarizer",
            &["resume_text"],
            "experience_summary",
            "Summarize:\n{resume_text}",
        )
    }

    #[test]
    fn test_render_template_substitutes_every_input() {
        let mut inputs = BTreeMap::new();
        inputs.insert("resume_text".to_string(), json!("Go, Python"));
        inputs.insert("rating".to_string(), json!("excellent"));
        let rendered = render_template("R: {resume_text} / {rating} / {other}", &inputs);
        assert_eq!(rendered, "R: Go, Python / excellent / {other}");
    }

    #[test]
    fn test_render_template_does_not_expand_placeholders_inside_values() {
        let mut inputs = BTreeMap::new();
        inputs.insert("rating".to_string(), json!("excellent {resume_text}"));
        inputs.insert("resume_text".to_string(), json!("RESUME"));

        let rendered = render_template("Resume:\n{resume_text}\nRating:\n{rating}", &inputs);

        assert_eq!(rendered, "Resume:\nRESUME\nRating:\nexcellent {resume_text}");
    }

    #[test]
    fn test_render_template_keeps_stray_braces() {
        let mut inputs = BTreeMap::new();
        inputs.insert("rating".to_string(), json!("bad"));
        assert_eq!(
            render_template("{ {{rating}} {rating", &inputs),
            "{ {bad} {rating"
        );
    }

    #[test]
    fn test_render_template_serializes_structured_values() {
        let mut inputs = BTreeMap::new();
        inputs.insert("scores".to_string(), json!({"a": 1}));
        assert_eq!(render_template("{scores}", &inputs), r#"{"a":1}"#);
    }

    #[test]
    fn test_retry_delay_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_execute_writes_output_key() {
        let invoker = ScriptedInvoker::new()
            .script("ExperienceSummarizer", Behavior::Reply("- 5 years Go".into()));
        let stage = Stage::new(summary_config(), invoker.clone());
        let bb = Blackboard::new();
        bb.set("resume_text", json!("Backend engineer")).unwrap();

        stage.execute(&bb).await.unwrap();

        assert_eq!(bb.get("experience_summary").unwrap(), json!("- 5 years Go"));
        assert_eq!(
            invoker.prompts_for("ExperienceSummarizer"),
            vec!["Summarize:\nBackend engineer".to_string()]
        );
    }

    #[tokio::test]
    async fn test_missing_input_fails_without_calling_out() {
        let invoker = ScriptedInvoker::new();
        let stage = Stage::new(summary_config(), invoker.clone());
        let bb = Blackboard::new();

        let result = stage.execute(&bb).await;

        assert_eq!(
            result,
            Err(StageFailure::MissingInput("resume_text".to_string()))
        );
        assert_eq!(invoker.calls("ExperienceSummarizer"), 0);
        assert!(bb.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_output_keeps_prior_value() {
        let invoker = ScriptedInvoker::new();
        let stage = Stage::new(summary_config(), invoker.clone());
        let bb = Blackboard::new();
        bb.set("resume_text", json!("text")).unwrap();
        bb.set("experience_summary", json!("written earlier")).unwrap();

        let result = stage.execute(&bb).await;

        assert_eq!(
            result,
            Err(StageFailure::DuplicateOutput("experience_summary".to_string()))
        );
        assert_eq!(
            bb.get("experience_summary").unwrap(),
            json!("written earlier")
        );
    }

    #[tokio::test]
    async fn test_upstream_failure_writes_nothing() {
        let invoker = ScriptedInvoker::new()
            .script("ExperienceSummarizer", Behavior::Fail("quota exceeded".into()));
        let stage = Stage::new(summary_config(), invoker);
        let bb = Blackboard::new();
        bb.set("resume_text", json!("text")).unwrap();

        let result = stage.execute(&bb).await;

        assert_eq!(
            result,
            Err(StageFailure::UpstreamFailure("quota exceeded".to_string()))
        );
        assert!(!bb.contains("experience_summary"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_reported_as_upstream_failure() {
        let invoker = ScriptedInvoker::new().script("ExperienceSummarizer", Behavior::Hang);
        let stage =
            Stage::new(summary_config(), invoker).with_timeout(Duration::from_secs(5));
        let bb = Blackboard::new();
        bb.set("resume_text", json!("text")).unwrap();

        let result = stage.execute(&bb).await;

        assert_eq!(
            result,
            Err(StageFailure::UpstreamFailure("timeout".to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_recovers_from_transient_failures() {
        let invoker = ScriptedInvoker::new().script(
            "ExperienceSummarizer",
            Behavior::FailTimes(2, "- recovered".into()),
        );
        let stage = Stage::new(summary_config(), invoker.clone()).with_retry(RetryPolicy {
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        });
        let bb = Blackboard::new();
        bb.set("resume_text", json!("text")).unwrap();

        stage.execute(&bb).await.unwrap();

        assert_eq!(invoker.calls("ExperienceSummarizer"), 3);
        assert_eq!(bb.get("experience_summary").unwrap(), json!("- recovered"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let invoker = ScriptedInvoker::new().script(
            "ExperienceSummarizer",
            Behavior::FailTimes(5, "never reached".into()),
        );
        let stage = Stage::new(summary_config(), invoker.clone()).with_retry(RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(10),
        });
        let bb = Blackboard::new();
        bb.set("resume_text", json!("text")).unwrap();

        let result = stage.execute(&bb).await;

        assert!(matches!(result, Err(StageFailure::UpstreamFailure(_))));
        assert_eq!(invoker.calls("ExperienceSummarizer"), 2);
    }
}
