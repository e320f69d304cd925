//! Test doubles shared by the unit tests of several modules.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::archive::{ArchiveError, RunArchive, RunSnapshot};
use crate::extraction::{non_empty, DocumentExtractor, ExtractionError};
use crate::pipeline::{Invocation, InvokeError, StageInvoker};
use crate::sessions::{
    MemorySessionStore, RunRecord, SessionRecord, SessionStore, SessionStoreError,
};

/// What a scripted stage does when invoked.
#[derive(Debug, Clone)]
pub enum Behavior {
    Reply(String),
    Fail(String),
    /// Never completes; only a timeout gets the caller out.
    Hang,
    /// Fails the first `n` calls, then replies.
    FailTimes(u32, String),
    Delay(Duration, String),
}

/// Stage invoker that answers per stage name and records every call.
/// Unscripted stages reply `"{stage} output"`.
#[derive(Default)]
pub struct ScriptedInvoker {
    behaviors: Mutex<HashMap<String, Behavior>>,
    calls: Mutex<HashMap<String, u32>>,
    prompts: Mutex<HashMap<String, Vec<String>>>,
    events: Mutex<Vec<String>>,
}

impl ScriptedInvoker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(self: Arc<Self>, stage: &str, behavior: Behavior) -> Arc<Self> {
        self.behaviors
            .lock()
            .unwrap()
            .insert(stage.to_string(), behavior);
        self
    }

    pub fn calls(&self, stage: &str) -> u32 {
        self.calls.lock().unwrap().get(stage).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn prompts_for(&self, stage: &str) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap()
            .get(stage)
            .cloned()
            .unwrap_or_default()
    }

    /// Stage names in the order their first call started.
    pub fn started(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for event in self.events() {
            if let Some(stage) = event.strip_prefix("start:") {
                if !seen.iter().any(|s| s == stage) {
                    seen.push(stage.to_string());
                }
            }
        }
        seen
    }

    /// `start:{stage}` and `end:{stage}` markers in the order they happened.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl StageInvoker for ScriptedInvoker {
    async fn invoke(&self, invocation: Invocation<'_>) -> Result<String, InvokeError> {
        let stage = invocation.stage.to_string();
        self.log(format!("start:{stage}"));

        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(stage.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.prompts
            .lock()
            .unwrap()
            .entry(stage.clone())
            .or_default()
            .push(invocation.render());

        let behavior = self.behaviors.lock().unwrap().get(&stage).cloned();
        let result = match behavior {
            None => Ok(format!("{stage} output")),
            Some(Behavior::Reply(text)) => Ok(text),
            Some(Behavior::Fail(message)) => Err(InvokeError::Upstream(message)),
            Some(Behavior::Hang) => std::future::pending().await,
            Some(Behavior::FailTimes(n, text)) => {
                if attempt <= n {
                    Err(InvokeError::Upstream(format!("transient failure {attempt}")))
                } else {
                    Ok(text)
                }
            }
            Some(Behavior::Delay(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
        };

        self.log(format!("end:{stage}"));
        result
    }
}

/// Extractor that ignores the upload and returns a fixed text.
pub struct StaticExtractor(pub String);

#[async_trait]
impl DocumentExtractor for StaticExtractor {
    async fn extract(&self, _document: Bytes) -> Result<String, ExtractionError> {
        non_empty(self.0.clone())
    }
}

/// Archive that keeps snapshots in memory, optionally failing every store.
#[derive(Default)]
pub struct RecordingArchive {
    snapshots: Mutex<Vec<RunSnapshot>>,
    failing: AtomicBool,
}

impl RecordingArchive {
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn snapshots(&self) -> Vec<RunSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }
}

#[async_trait]
impl RunArchive for RecordingArchive {
    async fn store(&self, snapshot: &RunSnapshot) -> Result<String, ArchiveError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ArchiveError::S3("bucket unavailable".to_string()));
        }
        self.snapshots.lock().unwrap().push(snapshot.clone());
        Ok(snapshot.object_key())
    }
}

/// In-memory session store whose `update` can be switched to fail before anything is written,
/// the way a dropped database connection would.
#[derive(Default)]
pub struct FlakySessionStore {
    inner: MemorySessionStore,
    failing: AtomicBool,
}

impl FlakySessionStore {
    pub fn fail_writes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn get_or_create(
        &self,
        user_id: &str,
    ) -> Result<(Uuid, SessionRecord), SessionStoreError> {
        self.inner.get_or_create(user_id).await
    }

    async fn update(
        &self,
        session_id: Uuid,
        run: &RunRecord,
    ) -> Result<SessionRecord, SessionStoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SessionStoreError::Database(sqlx::Error::PoolTimedOut));
        }
        self.inner.update(session_id, run).await
    }

    async fn get_history(&self, user_id: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        self.inner.get_history(user_id).await
    }
}
