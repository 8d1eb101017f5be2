//! crates/reading_companion_core/src/workflow.rs
//!
//! The session progression engine: creation from an upload, per-highlight
//! question/answer advancement, question regeneration, completion, and the
//! read accessors the HTTP layer exposes.
//!
//! The workflow holds no long-lived session state of its own; every
//! operation re-reads through the repository port. Mutating operations on an
//! existing session are serialized per session id so concurrent requests
//! cannot interleave repository writes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;
use uuid::Uuid;

use crate::domain::{
    AdvanceOutcome, CreatedSession, Highlight, HighlightContent, Interaction, NextStep, Session,
    SessionContent, SessionContentInfo, SessionStatus,
};
use crate::export;
use crate::extract::{self, ValidationError};
use crate::ports::{PortError, QuestionService, SessionRepository};

/// Substituted when question generation fails for a reason other than
/// declared service unavailability. Also the reference "previous question"
/// handed to the regeneration prompt.
pub const FALLBACK_QUESTION: &str = "What are your thoughts on this highlight?";

/// Shown in export views for highlights that never received an interaction
/// row. Normal flow always writes one, so this marks a data inconsistency.
pub const NO_QUESTION_PLACEHOLDER: &str = "No question available";

/// Time budget applied to every question-generation call, independent of the
/// caller's own request deadline.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(30);

//=========================================================================================
// Error Type
//=========================================================================================

/// Failures surfaced by session workflow operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The upload could not be read as UTF-8 text.
    #[error("uploaded file is not readable as UTF-8 text")]
    Format,

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("invalid highlight index: {index}")]
    InvalidIndex { index: usize },

    #[error("session not completed: only completed sessions can be exported")]
    NotCompleted,

    /// The session already ran to completion; answers are not editable and
    /// no further questions are generated.
    #[error("session is already completed")]
    SessionCompleted,

    /// The question service declared itself unavailable after exhausting its
    /// retries (or the generation time budget elapsed).
    #[error("question service unavailable: {0}")]
    GenerationUnavailable(String),

    /// A question-generation failure that is propagated rather than
    /// absorbed with a fallback. Only regeneration surfaces this.
    #[error("failed to regenerate question: {0}")]
    Generation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

/// Maps repository failures into the workflow taxonomy.
fn repo_err(err: PortError) -> WorkflowError {
    match err {
        PortError::NotFound(msg) => WorkflowError::NotFound(msg),
        PortError::Unavailable(msg) | PortError::Unexpected(msg) => {
            WorkflowError::Persistence(msg)
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

//=========================================================================================
// SessionWorkflow
//=========================================================================================

/// Owns the session state machine and its collaborators.
pub struct SessionWorkflow {
    repo: Arc<dyn SessionRepository>,
    questions: Arc<dyn QuestionService>,
    /// Per-session mutexes so concurrent advance/regenerate calls against
    /// one session run one at a time. Entries are created lazily and removed
    /// when the session is deleted.
    session_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SessionWorkflow {
    pub fn new(repo: Arc<dyn SessionRepository>, questions: Arc<dyn QuestionService>) -> Self {
        Self {
            repo,
            questions,
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_session(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.session_locks.lock().await;
            locks
                .entry(session_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        mutex.lock_owned().await
    }

    /// Runs a generation call under the fixed time budget. An elapsed budget
    /// counts as unavailability, the same as exhausted retries.
    async fn generate_bounded(&self, highlight_text: &str) -> Result<String, PortError> {
        match tokio::time::timeout(GENERATION_TIMEOUT, self.questions.generate(highlight_text))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(PortError::Unavailable(
                "question generation timed out".to_string(),
            )),
        }
    }

    async fn regenerate_bounded(
        &self,
        highlight_text: &str,
        previous_question: &str,
    ) -> Result<String, PortError> {
        match tokio::time::timeout(
            GENERATION_TIMEOUT,
            self.questions.regenerate(highlight_text, previous_question),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(PortError::Unavailable(
                "question regeneration timed out".to_string(),
            )),
        }
    }

    //-------------------------------------------------------------------------------------
    // Create
    //-------------------------------------------------------------------------------------

    /// Creates a new session from an uploaded file.
    ///
    /// Extraction and validation run before anything is persisted; a
    /// validation failure writes no state at all. A highlight write failure
    /// after the session row exists compensates by deleting the partial
    /// session, so no orphan stays visible to later reads.
    pub async fn create(
        &self,
        raw_upload: &[u8],
        session_name: Option<String>,
    ) -> WorkflowResult<CreatedSession> {
        let text = std::str::from_utf8(raw_upload).map_err(|_| WorkflowError::Format)?;

        let highlight_texts = extract::extract(text);
        extract::validate_highlights(&highlight_texts)?;

        let name = match session_name.filter(|n| !n.trim().is_empty()) {
            Some(name) => name,
            None => format!("Session {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
        };

        let now = Utc::now();
        let session = self
            .repo
            .create_session(Session {
                id: Uuid::new_v4(),
                name,
                status: SessionStatus::InProgress,
                created_at: now,
                updated_at: now,
            })
            .await
            .map_err(repo_err)?;

        let mut highlights = Vec::with_capacity(highlight_texts.len());
        for (position, text) in highlight_texts.iter().enumerate() {
            let result = self
                .repo
                .create_highlight(Highlight {
                    id: Uuid::new_v4(),
                    session_id: session.id,
                    text: text.clone(),
                    position,
                    created_at: now,
                })
                .await;

            match result {
                Ok(highlight) => highlights.push(highlight),
                Err(err) => {
                    // Roll the partial session back so it never surfaces.
                    if let Err(cleanup_err) = self.remove_session_rows(session.id).await {
                        warn!(
                            session_id = %session.id,
                            error = %cleanup_err,
                            "failed to clean up partially created session"
                        );
                    }
                    return Err(repo_err(err));
                }
            }
        }

        let first = &highlights[0];
        let question = match self.generate_bounded(&first.text).await {
            Ok(question) => question,
            Err(PortError::Unavailable(msg)) => {
                // The session and highlights stay persisted; the caller gets
                // service-unavailable semantics and can retry later.
                return Err(WorkflowError::GenerationUnavailable(msg));
            }
            Err(_) => FALLBACK_QUESTION.to_string(),
        };

        // Best effort: the question is already committed to the response, so
        // a failed interaction write is logged and never surfaced.
        let interaction_write = self
            .repo
            .create_interaction(Interaction {
                id: Uuid::new_v4(),
                highlight_id: first.id,
                question: question.clone(),
                answer: None,
                created_at: now,
                updated_at: now,
            })
            .await;
        if let Err(err) = interaction_write {
            warn!(
                session_id = %session.id,
                error = %err,
                "failed to create interaction for first highlight"
            );
        }

        Ok(CreatedSession {
            session_id: session.id,
            name: session.name,
            total_highlights: highlights.len(),
            next_step: NextStep {
                highlight_index: 0,
                highlight_text: first.text.clone(),
                question,
            },
        })
    }

    async fn remove_session_rows(&self, session_id: Uuid) -> Result<(), PortError> {
        self.repo.delete_highlights_by_session(session_id).await?;
        self.repo.delete_session(session_id).await
    }

    //-------------------------------------------------------------------------------------
    // Advance
    //-------------------------------------------------------------------------------------

    /// Records an answer for the highlight at `highlight_index` and either
    /// returns the next step or marks the session completed.
    pub async fn advance(
        &self,
        session_id: Uuid,
        highlight_index: usize,
        user_answer: &str,
    ) -> WorkflowResult<AdvanceOutcome> {
        let _guard = self.lock_session(session_id).await;

        let session = self.repo.get_session(session_id).await.map_err(repo_err)?;
        if session.status == SessionStatus::Completed {
            return Err(WorkflowError::SessionCompleted);
        }

        let highlights = self
            .repo
            .get_highlights_by_session(session_id)
            .await
            .map_err(repo_err)?;
        if highlight_index >= highlights.len() {
            return Err(WorkflowError::InvalidIndex {
                index: highlight_index,
            });
        }

        let current = &highlights[highlight_index];
        let interactions = self
            .repo
            .get_interactions_by_highlight(current.id)
            .await
            .map_err(repo_err)?;

        if let Some(interaction) = interactions.first() {
            // Normal path: the question was pre-generated by the previous
            // step, so only the answer needs recording.
            self.repo
                .update_interaction_answer(interaction.id, user_answer)
                .await
                .map_err(repo_err)?;
        } else {
            // No interaction exists for this highlight, which normal flow
            // never produces; record the answer against the fallback.
            let now = Utc::now();
            self.repo
                .create_interaction(Interaction {
                    id: Uuid::new_v4(),
                    highlight_id: current.id,
                    question: FALLBACK_QUESTION.to_string(),
                    answer: Some(user_answer.to_string()),
                    created_at: now,
                    updated_at: now,
                })
                .await
                .map_err(repo_err)?;
        }

        let next_index = highlight_index + 1;
        if next_index >= highlights.len() {
            self.repo
                .update_session_status(session_id, SessionStatus::Completed)
                .await
                .map_err(repo_err)?;
            return Ok(AdvanceOutcome::Completed);
        }

        let next = &highlights[next_index];
        let question = match self.generate_bounded(&next.text).await {
            Ok(question) => question,
            Err(PortError::Unavailable(msg)) => {
                // The answer recorded above stays; only the pre-generation
                // of the next question failed.
                return Err(WorkflowError::GenerationUnavailable(msg));
            }
            Err(_) => FALLBACK_QUESTION.to_string(),
        };

        // Best effort, and upsert-shaped: a repeated advance at the same
        // index already left an interaction for the next highlight, and a
        // second row would break the one-interaction-per-highlight
        // invariant.
        let now = Utc::now();
        let interaction_write = match self.repo.get_interactions_by_highlight(next.id).await {
            Ok(existing) => match existing.first() {
                Some(interaction) => {
                    self.repo
                        .update_interaction_question(interaction.id, &question)
                        .await
                }
                None => self
                    .repo
                    .create_interaction(Interaction {
                        id: Uuid::new_v4(),
                        highlight_id: next.id,
                        question: question.clone(),
                        answer: None,
                        created_at: now,
                        updated_at: now,
                    })
                    .await
                    .map(|_| ()),
            },
            Err(err) => Err(err),
        };
        if let Err(err) = interaction_write {
            warn!(
                session_id = %session_id,
                highlight_index = next_index,
                error = %err,
                "failed to create interaction for next highlight"
            );
        }

        Ok(AdvanceOutcome::Next(NextStep {
            highlight_index: next_index,
            highlight_text: next.text.clone(),
            question,
        }))
    }

    //-------------------------------------------------------------------------------------
    // Regenerate
    //-------------------------------------------------------------------------------------

    /// Replaces the question for the highlight at `highlight_index` with a
    /// freshly generated alternative. Unlike create/advance, a generation
    /// failure here is surfaced directly instead of substituting a fallback.
    pub async fn regenerate(
        &self,
        session_id: Uuid,
        highlight_index: usize,
    ) -> WorkflowResult<String> {
        let _guard = self.lock_session(session_id).await;

        let session = self.repo.get_session(session_id).await.map_err(repo_err)?;
        if session.status == SessionStatus::Completed {
            return Err(WorkflowError::SessionCompleted);
        }

        let highlights = self
            .repo
            .get_highlights_by_session(session_id)
            .await
            .map_err(repo_err)?;
        if highlight_index >= highlights.len() {
            return Err(WorkflowError::InvalidIndex {
                index: highlight_index,
            });
        }

        let highlight = &highlights[highlight_index];
        let question = match self
            .regenerate_bounded(&highlight.text, FALLBACK_QUESTION)
            .await
        {
            Ok(question) => question,
            Err(PortError::Unavailable(msg)) => {
                return Err(WorkflowError::GenerationUnavailable(msg))
            }
            Err(err) => return Err(WorkflowError::Generation(err.to_string())),
        };

        let interactions = self
            .repo
            .get_interactions_by_highlight(highlight.id)
            .await
            .map_err(repo_err)?;

        if let Some(interaction) = interactions.first() {
            self.repo
                .update_interaction_question(interaction.id, &question)
                .await
                .map_err(repo_err)?;
        } else {
            let now = Utc::now();
            self.repo
                .create_interaction(Interaction {
                    id: Uuid::new_v4(),
                    highlight_id: highlight.id,
                    question: question.clone(),
                    answer: None,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .map_err(repo_err)?;
        }

        Ok(question)
    }

    //-------------------------------------------------------------------------------------
    // Read Accessors
    //-------------------------------------------------------------------------------------

    pub async fn get_session(&self, session_id: Uuid) -> WorkflowResult<Session> {
        self.repo.get_session(session_id).await.map_err(repo_err)
    }

    pub async fn list_sessions(&self) -> WorkflowResult<Vec<Session>> {
        self.repo.list_sessions().await.map_err(repo_err)
    }

    pub async fn get_highlights(&self, session_id: Uuid) -> WorkflowResult<Vec<Highlight>> {
        self.repo
            .get_highlights_by_session(session_id)
            .await
            .map_err(repo_err)
    }

    pub async fn get_interactions(&self, highlight_id: Uuid) -> WorkflowResult<Vec<Interaction>> {
        self.repo
            .get_interactions_by_highlight(highlight_id)
            .await
            .map_err(repo_err)
    }

    /// Assembles the completed session as structured content, defaulting the
    /// question/answer fields for highlights missing an interaction row.
    pub async fn get_export_view(&self, session_id: Uuid) -> WorkflowResult<SessionContent> {
        let session = self.repo.get_session(session_id).await.map_err(repo_err)?;
        if session.status != SessionStatus::Completed {
            return Err(WorkflowError::NotCompleted);
        }

        let highlights = self
            .repo
            .get_highlights_by_session(session_id)
            .await
            .map_err(repo_err)?;

        let mut contents = Vec::with_capacity(highlights.len());
        for highlight in &highlights {
            let interactions = self
                .repo
                .get_interactions_by_highlight(highlight.id)
                .await
                .map_err(repo_err)?;

            let mut content = HighlightContent {
                text: highlight.text.clone(),
                question: NO_QUESTION_PLACEHOLDER.to_string(),
                answer: String::new(),
                answered: false,
            };
            if let Some(interaction) = interactions.first() {
                content.question = interaction.question.clone();
                if let Some(answer) = &interaction.answer {
                    content.answer = answer.clone();
                    content.answered = true;
                }
            }
            contents.push(content);
        }

        Ok(SessionContent {
            session: SessionContentInfo {
                id: session.id.to_string(),
                name: session.name,
                created_at: session.created_at.to_rfc3339(),
            },
            highlights: contents,
        })
    }

    /// Renders the completed session as a markdown document.
    pub async fn export_markdown(&self, session_id: Uuid) -> WorkflowResult<String> {
        let session = self.repo.get_session(session_id).await.map_err(repo_err)?;
        if session.status != SessionStatus::Completed {
            return Err(WorkflowError::NotCompleted);
        }

        let highlights = self
            .repo
            .get_highlights_by_session(session_id)
            .await
            .map_err(repo_err)?;

        let mut interactions = HashMap::new();
        for highlight in &highlights {
            let rows = self
                .repo
                .get_interactions_by_highlight(highlight.id)
                .await
                .map_err(repo_err)?;
            if let Some(interaction) = rows.into_iter().next() {
                interactions.insert(highlight.id, interaction);
            }
        }

        Ok(export::render_markdown(&session, &highlights, &interactions))
    }

    //-------------------------------------------------------------------------------------
    // Rename / Delete
    //-------------------------------------------------------------------------------------

    pub async fn rename(&self, session_id: Uuid, new_name: &str) -> WorkflowResult<Session> {
        self.repo
            .update_session_name(session_id, new_name)
            .await
            .map_err(repo_err)
    }

    /// Deletes a session with its highlights; interactions cascade with
    /// their highlights.
    pub async fn delete(&self, session_id: Uuid) -> WorkflowResult<()> {
        let guard = self.lock_session(session_id).await;

        self.repo
            .delete_highlights_by_session(session_id)
            .await
            .map_err(repo_err)?;
        self.repo
            .delete_session(session_id)
            .await
            .map_err(repo_err)?;

        drop(guard);
        self.session_locks.lock().await.remove(&session_id);
        Ok(())
    }
}
