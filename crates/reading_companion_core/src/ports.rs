//! crates/reading_companion_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{Highlight, Interaction, Session, SessionStatus};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The external service could not be reached after the adapter's own
    /// retries were exhausted. Distinguished so callers can surface
    /// "temporarily unavailable" semantics instead of a generic failure.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence port for sessions, highlights and interactions.
///
/// The core assumes no transaction isolation stronger than read-committed;
/// every read re-fetches, and there is no caching layer in front of this.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    // --- Session Management ---
    async fn create_session(&self, session: Session) -> PortResult<Session>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session>;

    async fn list_sessions(&self) -> PortResult<Vec<Session>>;

    async fn update_session_name(&self, session_id: Uuid, name: &str) -> PortResult<Session>;

    async fn update_session_status(
        &self,
        session_id: Uuid,
        status: SessionStatus,
    ) -> PortResult<()>;

    async fn delete_session(&self, session_id: Uuid) -> PortResult<()>;

    // --- Highlight Management ---
    async fn create_highlight(&self, highlight: Highlight) -> PortResult<Highlight>;

    /// Returns the session's highlights ordered by position.
    async fn get_highlights_by_session(&self, session_id: Uuid) -> PortResult<Vec<Highlight>>;

    async fn delete_highlights_by_session(&self, session_id: Uuid) -> PortResult<()>;

    // --- Interaction Management ---
    async fn create_interaction(&self, interaction: Interaction) -> PortResult<Interaction>;

    /// Zero-or-one in practice: at most one interaction exists per highlight.
    async fn get_interactions_by_highlight(
        &self,
        highlight_id: Uuid,
    ) -> PortResult<Vec<Interaction>>;

    async fn update_interaction_answer(
        &self,
        interaction_id: Uuid,
        answer: &str,
    ) -> PortResult<()>;

    async fn update_interaction_question(
        &self,
        interaction_id: Uuid,
        question: &str,
    ) -> PortResult<()>;
}

/// Question-generation port backed by an external language model.
///
/// Implementations own their transport, credentials and retry policy; the
/// workflow only applies an outer time budget per call.
#[async_trait]
pub trait QuestionService: Send + Sync {
    /// Generates one open-ended question for a highlight.
    async fn generate(&self, highlight_text: &str) -> PortResult<String>;

    /// Generates an alternative question, offering a different angle than
    /// `previous_question`.
    async fn regenerate(
        &self,
        highlight_text: &str,
        previous_question: &str,
    ) -> PortResult<String>;
}
