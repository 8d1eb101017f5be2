//! crates/reading_companion_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or HTTP framework.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The lifecycle state of a session. A session is `InProgress` from the
/// moment it is created and flips to `Completed` exactly once, when the
/// answer for the final highlight is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    /// The database/wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }

    /// Parses the database representation back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

/// Represents one guided review session over an uploaded set of highlights.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub name: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Represents a single excerpt extracted from the uploaded text.
///
/// Highlights are immutable once created and addressed by their zero-based
/// `position` within the session, which mirrors extraction order.
#[derive(Debug, Clone, Serialize)]
pub struct Highlight {
    pub id: Uuid,
    pub session_id: Uuid,
    pub text: String,
    pub position: usize,
    pub created_at: DateTime<Utc>,
}

/// The question/answer pair attached to exactly one highlight.
///
/// `answer` stays `None` until the user responds to the question.
#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    pub id: Uuid,
    pub highlight_id: Uuid,
    pub question: String,
    pub answer: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What the user should respond to next: a highlight and its question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextStep {
    pub highlight_index: usize,
    pub highlight_text: String,
    pub question: String,
}

/// The outcome of successfully creating a session from an upload.
#[derive(Debug, Clone, Serialize)]
pub struct CreatedSession {
    pub session_id: Uuid,
    pub name: String,
    pub total_highlights: usize,
    pub next_step: NextStep,
}

/// The outcome of recording an answer: either the next step, or completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Next(NextStep),
    Completed,
}

/// A completed session assembled for display or export.
#[derive(Debug, Clone, Serialize)]
pub struct SessionContent {
    pub session: SessionContentInfo,
    pub highlights: Vec<HighlightContent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionContentInfo {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

/// One highlight joined with its interaction, if any.
#[derive(Debug, Clone, Serialize)]
pub struct HighlightContent {
    pub text: String,
    pub question: String,
    pub answer: String,
    pub answered: bool,
}
