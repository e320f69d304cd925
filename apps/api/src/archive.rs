//! Run archive: keeps the final blackboard of every run, completed or not, for diagnostics.

use std::collections::BTreeMap;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSnapshot {
    pub run_id: Uuid,
    pub user_id: String,
    pub pipeline: String,
    pub status: RunStatus,
    pub failed_step: Option<usize>,
    pub slots: BTreeMap<String, Value>,
    pub archived_at: DateTime<Utc>,
}

impl RunSnapshot {
    pub fn object_key(&self) -> String {
        format!("runs/{}/{}.json", self.user_id, self.run_id)
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("S3 upload failed: {0}")]
    S3(String),

    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait RunArchive: Send + Sync {
    /// Stores the snapshot and returns the key it was stored under.
    async fn store(&self, snapshot: &RunSnapshot) -> Result<String, ArchiveError>;
}

pub struct S3RunArchive {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3RunArchive {
    pub fn new(client: aws_sdk_s3::Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl RunArchive for S3RunArchive {
    async fn store(&self, snapshot: &RunSnapshot) -> Result<String, ArchiveError> {
        let key = snapshot.object_key();
        let body = serde_json::to_vec_pretty(snapshot)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| ArchiveError::S3(e.to_string()))?;

        info!("Archived run snapshot to s3://{}/{}", self.bucket, key);
        Ok(key)
    }
}
