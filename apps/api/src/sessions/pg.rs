//! PostgreSQL session store.
//!
//! The record lives in `sessions.data` (JSONB). `update` takes a row lock with
//! `SELECT ... FOR UPDATE` inside a transaction, so concurrent updates to one session
//! queue up while other sessions proceed. Every run also lands in `resume_history`
//! inside the same transaction.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::models::session::SessionRow;
use crate::sessions::record::{RunRecord, SessionRecord};
use crate::sessions::{SessionStore, SessionStoreError};

#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
    app_name: String,
}

impl PgSessionStore {
    pub fn new(pool: PgPool, app_name: impl Into<String>) -> Self {
        Self {
            pool,
            app_name: app_name.into(),
        }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get_or_create(
        &self,
        user_id: &str,
    ) -> Result<(Uuid, SessionRecord), SessionStoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes creation per (app, user) so two first requests don't both insert.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", self.app_name, user_id))
            .execute(&mut *tx)
            .await?;

        let existing: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1 AND app_name = $2
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(&self.app_name)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            tx.commit().await?;
            let record: SessionRecord = serde_json::from_value(row.data)?;
            return Ok((row.session_id, record));
        }

        let session_id = Uuid::new_v4();
        let record = SessionRecord::default();
        sqlx::query(
            "INSERT INTO sessions (session_id, user_id, app_name, data) VALUES ($1, $2, $3, $4)",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(&self.app_name)
        .bind(serde_json::to_value(&record)?)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("Created session {session_id} for user {user_id}");
        Ok((session_id, record))
    }

    async fn update(
        &self,
        session_id: Uuid,
        run: &RunRecord,
    ) -> Result<SessionRecord, SessionStoreError> {
        let mut tx = self.pool.begin().await?;

        let data: Option<Value> =
            sqlx::query_scalar("SELECT data FROM sessions WHERE session_id = $1 FOR UPDATE")
                .bind(session_id)
                .fetch_optional(&mut *tx)
                .await?;
        let data = data.ok_or(SessionStoreError::NotFound(session_id))?;

        let current: SessionRecord = serde_json::from_value(data)?;
        let next = current.with_run(run);

        sqlx::query("UPDATE sessions SET data = $1, updated_at = NOW() WHERE session_id = $2")
            .bind(serde_json::to_value(&next)?)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO resume_history (session_id, outcome, outputs, processed_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(session_id)
        .bind(&run.outcome)
        .bind(serde_json::to_value(&run.outputs)?)
        .bind(run.recorded_at)
        .execute(&mut *tx)
        .await?;

        // Dropping `tx` on any error above rolls back, leaving the prior record intact.
        tx.commit().await?;

        info!(
            "Session {session_id}: recorded outcome '{}' (total {})",
            run.outcome, next.stats.total
        );
        Ok(next)
    }

    async fn get_history(&self, user_id: &str) -> Result<Option<SessionRecord>, SessionStoreError> {
        let data: Option<Value> = sqlx::query_scalar(
            r#"
            SELECT data FROM sessions
            WHERE user_id = $1 AND app_name = $2
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .bind(&self.app_name)
        .fetch_optional(&self.pool)
        .await?;

        data.map(serde_json::from_value)
            .transpose()
            .map_err(SessionStoreError::from)
    }
}
