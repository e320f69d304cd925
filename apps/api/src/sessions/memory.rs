//! In-process session store, used when no database is configured.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::sessions::record::{RunRecord, SessionRecord};
use crate::sessions::{SessionStore, SessionStoreError};

#[derive(Default)]
pub struct MemorySessionStore {
    /// One async mutex per session: updates serialize per session only.
    sessions: DashMap<Uuid, Arc<Mutex<SessionRecord>>>,
    /// user_id → the session that user was last given.
    by_user: DashMap<String, Uuid>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn session(&self, session_id: Uuid) -> Result<Arc<Mutex<SessionRecord>>, SessionStoreError> {
        self.sessions
            .get(&session_id)
            .map(|slot| slot.value().clone())
            .ok_or(SessionStoreError::NotFound(session_id))
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get_or_create(
        &self,
        user_id: &str,
    ) -> Result<(Uuid, SessionRecord), SessionStoreError> {
        // The entry guard makes lookup-or-insert atomic per user.
        let session_id = *self
            .by_user
            .entry(user_id.to_string())
            .or_insert_with(|| {
                let session_id = Uuid::new_v4();
                self.sessions
                    .insert(session_id, Arc::new(Mutex::new(SessionRecord::default())));
                info!("Created session {session_id} for user {user_id}");
                session_id
            });

        let record = self.session(session_id)?.lock().await.clone();
        Ok((session_id, record))
    }

    async fn update(
        &self,
        session_id: Uuid,
        run: &RunRecord,
    ) -> Result<SessionRecord, SessionStoreError> {
        let session = self.session(session_id)?;
        let mut current = session.lock().await;

        *current = current.with_run(run);

        Ok(current.clone())
    }

    async fn get_history(&self, user_id: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        let Some(session_id) = self.by_user.get(user_id).map(|slot| *slot.value()) else {
            return Ok(None);
        };
        let record = self.session(session_id)?.lock().await.clone();
        Ok(Some(record))
    }
}
