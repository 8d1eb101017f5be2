pub mod domain;
pub mod export;
pub mod extract;
pub mod ports;
pub mod workflow;

pub use domain::{
    AdvanceOutcome, CreatedSession, Highlight, HighlightContent, Interaction, NextStep, Session,
    SessionContent, SessionStatus,
};
pub use ports::{PortError, PortResult, QuestionService, SessionRepository};
pub use workflow::{SessionWorkflow, WorkflowError, WorkflowResult, FALLBACK_QUESTION};
