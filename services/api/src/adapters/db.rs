//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SessionRepository` port from the `core` crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reading_companion_core::domain::{Highlight, Interaction, Session, SessionStatus};
use reading_companion_core::ports::{PortError, PortResult, SessionRepository};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SessionRepository` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn not_found_or_unexpected(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    name: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        let status = SessionStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("unknown session status '{}'", self.status))
        })?;
        Ok(Session {
            id: self.id,
            name: self.name,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct HighlightRecord {
    id: Uuid,
    session_id: Uuid,
    text: String,
    position: i32,
    created_at: DateTime<Utc>,
}

impl HighlightRecord {
    fn to_domain(self) -> Highlight {
        Highlight {
            id: self.id,
            session_id: self.session_id,
            text: self.text,
            position: self.position as usize,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct InteractionRecord {
    id: Uuid,
    highlight_id: Uuid,
    question: String,
    answer: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl InteractionRecord {
    fn to_domain(self) -> Interaction {
        Interaction {
            id: self.id,
            highlight_id: self.highlight_id,
            question: self.question,
            answer: self.answer,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `SessionRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl SessionRepository for DbAdapter {
    async fn create_session(&self, session: Session) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "INSERT INTO sessions (id, name, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, name, status, created_at, updated_at",
        )
        .bind(session.id)
        .bind(&session.name)
        .bind(session.status.as_str())
        .bind(session.created_at)
        .bind(session.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        record.to_domain()
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, name, status, created_at, updated_at FROM sessions WHERE id = $1",
        )
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Session {} not found", session_id)))?;

        record.to_domain()
    }

    async fn list_sessions(&self) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, name, status, created_at, updated_at FROM sessions \
             ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        records.into_iter().map(SessionRecord::to_domain).collect()
    }

    async fn update_session_name(&self, session_id: Uuid, name: &str) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "UPDATE sessions SET name = $1, updated_at = now() WHERE id = $2 \
             RETURNING id, name, status, created_at, updated_at",
        )
        .bind(name)
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| not_found_or_unexpected(e, format!("Session {} not found", session_id)))?;

        record.to_domain()
    }

    async fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> PortResult<()> {
        sqlx::query("UPDATE sessions SET status = $1, updated_at = now() WHERE id = $2")
            .bind(status.as_str())
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn create_highlight(&self, highlight: Highlight) -> PortResult<Highlight> {
        let record = sqlx::query_as::<_, HighlightRecord>(
            "INSERT INTO highlights (id, session_id, text, \"position\", created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, session_id, text, \"position\", created_at",
        )
        .bind(highlight.id)
        .bind(highlight.session_id)
        .bind(&highlight.text)
        .bind(highlight.position as i32)
        .bind(highlight.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.to_domain())
    }

    async fn get_highlights_by_session(&self, session_id: Uuid) -> PortResult<Vec<Highlight>> {
        let records = sqlx::query_as::<_, HighlightRecord>(
            "SELECT id, session_id, text, \"position\", created_at FROM highlights \
             WHERE session_id = $1 ORDER BY \"position\" ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records.into_iter().map(HighlightRecord::to_domain).collect())
    }

    async fn delete_highlights_by_session(&self, session_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM highlights WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn create_interaction(&self, interaction: Interaction) -> PortResult<Interaction> {
        let record = sqlx::query_as::<_, InteractionRecord>(
            "INSERT INTO interactions (id, highlight_id, question, answer, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, highlight_id, question, answer, created_at, updated_at",
        )
        .bind(interaction.id)
        .bind(interaction.highlight_id)
        .bind(&interaction.question)
        .bind(&interaction.answer)
        .bind(interaction.created_at)
        .bind(interaction.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.to_domain())
    }

    async fn get_interactions_by_highlight(
        &self,
        highlight_id: Uuid,
    ) -> PortResult<Vec<Interaction>> {
        let records = sqlx::query_as::<_, InteractionRecord>(
            "SELECT id, highlight_id, question, answer, created_at, updated_at \
             FROM interactions WHERE highlight_id = $1 ORDER BY created_at ASC",
        )
        .bind(highlight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(records
            .into_iter()
            .map(InteractionRecord::to_domain)
            .collect())
    }

    async fn update_interaction_answer(
        &self,
        interaction_id: Uuid,
        answer: &str,
    ) -> PortResult<()> {
        sqlx::query("UPDATE interactions SET answer = $1, updated_at = now() WHERE id = $2")
            .bind(answer)
            .bind(interaction_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn update_interaction_question(
        &self,
        interaction_id: Uuid,
        question: &str,
    ) -> PortResult<()> {
        sqlx::query("UPDATE interactions SET question = $1, updated_at = now() WHERE id = $2")
            .bind(question)
            .bind(interaction_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
