//! Session store: persists per-user rating statistics and run history.
//!
//! `update` is a read-modify-write and must be serialized per session; updates to
//! different sessions never wait on each other. A failed update leaves the stored
//! record exactly as it was.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub mod handlers;
pub mod memory;
pub mod pg;
pub mod record;

pub use memory::MemorySessionStore;
pub use pg::PgSessionStore;
pub use record::{RunRecord, SessionRecord, SessionStats};

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt session record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session {0} not found")]
    NotFound(Uuid),
}

/// Explicit handle threaded through the run coordinator and the HTTP handlers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Most recently updated session for `user_id`, creating an empty one if none exists.
    /// Concurrent calls for an unseen user create exactly one session.
    async fn get_or_create(
        &self,
        user_id: &str,
    ) -> Result<(Uuid, SessionRecord), SessionStoreError>;

    /// Folds one completed run into the session and returns the updated record.
    async fn update(
        &self,
        session_id: Uuid,
        run: &RunRecord,
    ) -> Result<SessionRecord, SessionStoreError>;

    /// The most recently updated session record for `user_id`, if any.
    async fn get_history(&self, user_id: &str) -> Result<Option<SessionRecord>, SessionStoreError>;
}
