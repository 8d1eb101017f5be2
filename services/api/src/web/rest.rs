//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use reading_companion_core::domain::{
    AdvanceOutcome, NextStep, Session, SessionContent,
};
use reading_companion_core::workflow::{WorkflowError, FALLBACK_QUESTION};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        healthcheck_handler,
        list_sessions_handler,
        create_session_handler,
        get_session_handler,
        rename_session_handler,
        delete_session_handler,
        session_content_handler,
        export_session_handler,
        process_answer_handler,
        regenerate_question_handler,
    ),
    components(
        schemas(
            NextStepPayload,
            CreateSessionResponse,
            SessionResponse,
            SessionDetailResponse,
            SessionContentResponse,
            SessionContentInfoPayload,
            HighlightContentPayload,
            ProcessAnswerRequest,
            ProcessAnswerResponse,
            RegenerateQuestionRequest,
            RegenerateQuestionResponse,
            RenameSessionRequest,
        )
    ),
    tags(
        (name = "Reading Companion API", description = "API endpoints for guided highlight review sessions.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The next highlight/question pair the user should respond to.
#[derive(Serialize, ToSchema)]
pub struct NextStepPayload {
    highlight_index: usize,
    highlight_text: String,
    question: String,
}

impl From<NextStep> for NextStepPayload {
    fn from(step: NextStep) -> Self {
        Self {
            highlight_index: step.highlight_index,
            highlight_text: step.highlight_text,
            question: step.question,
        }
    }
}

/// The response payload sent after successfully creating a session.
#[derive(Serialize, ToSchema)]
pub struct CreateSessionResponse {
    session_id: Uuid,
    name: String,
    total_highlights: usize,
    next_step: NextStepPayload,
}

/// Session metadata, as returned by list and rename endpoints.
#[derive(Serialize, ToSchema)]
pub struct SessionResponse {
    id: Uuid,
    name: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            name: session.name,
            status: session.status.as_str().to_string(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

/// A single session with its highlight count and the opening step.
#[derive(Serialize, ToSchema)]
pub struct SessionDetailResponse {
    id: Uuid,
    name: String,
    status: String,
    total_highlights: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_step: Option<NextStepPayload>,
}

/// A completed session assembled for display.
#[derive(Serialize, ToSchema)]
pub struct SessionContentResponse {
    session: SessionContentInfoPayload,
    highlights: Vec<HighlightContentPayload>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionContentInfoPayload {
    id: String,
    name: String,
    created_at: String,
}

#[derive(Serialize, ToSchema)]
pub struct HighlightContentPayload {
    text: String,
    question: String,
    answer: String,
    answered: bool,
}

impl From<SessionContent> for SessionContentResponse {
    fn from(content: SessionContent) -> Self {
        Self {
            session: SessionContentInfoPayload {
                id: content.session.id,
                name: content.session.name,
                created_at: content.session.created_at,
            },
            highlights: content
                .highlights
                .into_iter()
                .map(|h| HighlightContentPayload {
                    text: h.text,
                    question: h.question,
                    answer: h.answer,
                    answered: h.answered,
                })
                .collect(),
        }
    }
}

/// The request body for recording an answer and advancing the session.
#[derive(Deserialize, ToSchema)]
pub struct ProcessAnswerRequest {
    highlight_index: usize,
    user_answer: String,
}

/// Either the next step, or a completion notice.
#[derive(Serialize, ToSchema)]
pub struct ProcessAnswerResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_step: Option<NextStepPayload>,
}

#[derive(Deserialize, ToSchema)]
pub struct RegenerateQuestionRequest {
    highlight_index: usize,
}

#[derive(Serialize, ToSchema)]
pub struct RegenerateQuestionResponse {
    new_question: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RenameSessionRequest {
    name: String,
}

//=========================================================================================
// Error Translation
//=========================================================================================

/// Translates core workflow errors into HTTP status/message pairs.
fn error_response(err: WorkflowError) -> (StatusCode, String) {
    match &err {
        WorkflowError::Format
        | WorkflowError::Validation(_)
        | WorkflowError::NotCompleted => (StatusCode::BAD_REQUEST, err.to_string()),
        // The public surface addresses highlights by index, so a bad index
        // reads as a missing resource, matching the session lookup path.
        WorkflowError::InvalidIndex { .. } => (
            StatusCode::NOT_FOUND,
            format!("session or highlight not found: {}", err),
        ),
        WorkflowError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        WorkflowError::SessionCompleted => (StatusCode::CONFLICT, err.to_string()),
        WorkflowError::GenerationUnavailable(_) => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        WorkflowError::Generation(_) | WorkflowError::Persistence(_) => {
            error!("request failed: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/api/healthcheck",
    responses((status = 200, description = "Service is up"))
)]
pub async fn healthcheck_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// List all sessions with their metadata.
#[utoipa::path(
    get,
    path = "/api/sessions",
    responses(
        (status = 200, description = "All sessions", body = [SessionResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let sessions = app_state
        .workflow
        .list_sessions()
        .await
        .map_err(error_response)?;

    let payload: Vec<SessionResponse> = sessions.into_iter().map(SessionResponse::from).collect();
    Ok(Json(payload))
}

/// Create a new session by uploading a highlights file.
///
/// Accepts a multipart/form-data request with a `file` part and an optional
/// `session_name` part.
#[utoipa::path(
    post,
    path = "/api/sessions",
    request_body(content_type = "multipart/form-data", description = "The highlights file to upload."),
    responses(
        (status = 201, description = "Session created successfully", body = CreateSessionResponse),
        (status = 400, description = "Bad request (e.g., missing file or too few highlights)"),
        (status = 503, description = "Question generation temporarily unavailable"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_session_handler(
    State(app_state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut session_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            format!("failed to read multipart data: {}", e),
        )
    })? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let data = field.bytes().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("failed to read file bytes: {}", e),
                    )
                })?;
                file_bytes = Some(data.to_vec());
            }
            Some("session_name") => {
                let value = field.text().await.map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        format!("failed to read session_name field: {}", e),
                    )
                })?;
                session_name = Some(value);
            }
            _ => {}
        }
    }

    let file_bytes = file_bytes.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            "multipart form must include a file".to_string(),
        )
    })?;

    let created = app_state
        .workflow
        .create(&file_bytes, session_name)
        .await
        .map_err(error_response)?;

    let response = CreateSessionResponse {
        session_id: created.session_id,
        name: created.name,
        total_highlights: created.total_highlights,
        next_step: created.next_step.into(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Fetch one session with its highlight count and opening step.
#[utoipa::path(
    get,
    path = "/api/sessions/{session_id}",
    responses(
        (status = 200, description = "The session", body = SessionDetailResponse),
        (status = 404, description = "Session not found")
    ),
    params(("session_id" = Uuid, Path, description = "The session to fetch"))
)]
pub async fn get_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = app_state
        .workflow
        .get_session(session_id)
        .await
        .map_err(error_response)?;
    let highlights = app_state
        .workflow
        .get_highlights(session_id)
        .await
        .map_err(error_response)?;

    let next_step = match highlights.first() {
        Some(first) => {
            // Reuse the stored question for the opening step when one was
            // already generated for this session.
            let interactions = app_state
                .workflow
                .get_interactions(first.id)
                .await
                .map_err(error_response)?;
            let question = interactions
                .first()
                .map(|i| i.question.clone())
                .unwrap_or_else(|| FALLBACK_QUESTION.to_string());

            Some(NextStepPayload {
                highlight_index: 0,
                highlight_text: first.text.clone(),
                question,
            })
        }
        None => None,
    };

    let response = SessionDetailResponse {
        id: session.id,
        name: session.name,
        status: session.status.as_str().to_string(),
        total_highlights: highlights.len(),
        next_step,
    };
    Ok(Json(response))
}

/// Rename a session.
#[utoipa::path(
    patch,
    path = "/api/sessions/{session_id}",
    request_body = RenameSessionRequest,
    responses(
        (status = 200, description = "Session renamed", body = SessionResponse),
        (status = 404, description = "Session not found")
    ),
    params(("session_id" = Uuid, Path, description = "The session to rename"))
)]
pub async fn rename_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<RenameSessionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let session = app_state
        .workflow
        .rename(session_id, &request.name)
        .await
        .map_err(error_response)?;

    Ok(Json(SessionResponse::from(session)))
}

/// Delete a session together with its highlights and interactions.
#[utoipa::path(
    delete,
    path = "/api/sessions/{session_id}",
    responses(
        (status = 204, description = "Session deleted"),
        (status = 500, description = "Internal server error")
    ),
    params(("session_id" = Uuid, Path, description = "The session to delete"))
)]
pub async fn delete_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    app_state
        .workflow
        .delete(session_id)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

/// Fetch the content of a completed session as JSON.
#[utoipa::path(
    get,
    path = "/api/sessions/{session_id}/content",
    responses(
        (status = 200, description = "The completed session content", body = SessionContentResponse),
        (status = 400, description = "Session not completed yet"),
        (status = 404, description = "Session not found")
    ),
    params(("session_id" = Uuid, Path, description = "The session to view"))
)]
pub async fn session_content_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let content = app_state
        .workflow
        .get_export_view(session_id)
        .await
        .map_err(error_response)?;

    Ok(Json(SessionContentResponse::from(content)))
}

/// Export a completed session as a downloadable markdown document.
#[utoipa::path(
    get,
    path = "/api/sessions/{session_id}/export",
    responses(
        (status = 200, description = "The exported markdown document"),
        (status = 400, description = "Session not completed yet"),
        (status = 404, description = "Session not found")
    ),
    params(("session_id" = Uuid, Path, description = "The session to export"))
)]
pub async fn export_session_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let markdown = app_state
        .workflow
        .export_markdown(session_id)
        .await
        .map_err(error_response)?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"session_export.md\"",
            ),
        ],
        markdown,
    ))
}

/// Record an answer for a highlight and advance the session.
#[utoipa::path(
    post,
    path = "/api/sessions/{session_id}/process",
    request_body = ProcessAnswerRequest,
    responses(
        (status = 200, description = "The next step or a completion notice", body = ProcessAnswerResponse),
        (status = 404, description = "Session or highlight not found"),
        (status = 409, description = "Session is already completed"),
        (status = 503, description = "Question generation temporarily unavailable")
    ),
    params(("session_id" = Uuid, Path, description = "The session to advance"))
)]
pub async fn process_answer_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<ProcessAnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let outcome = app_state
        .workflow
        .advance(session_id, request.highlight_index, &request.user_answer)
        .await
        .map_err(error_response)?;

    let response = match outcome {
        AdvanceOutcome::Completed => ProcessAnswerResponse {
            status: Some("completed".to_string()),
            message: Some("Session successfully completed.".to_string()),
            next_step: None,
        },
        AdvanceOutcome::Next(step) => ProcessAnswerResponse {
            status: None,
            message: None,
            next_step: Some(step.into()),
        },
    };
    Ok(Json(response))
}

/// Generate an alternative question for a highlight.
#[utoipa::path(
    post,
    path = "/api/sessions/{session_id}/regenerate_question",
    request_body = RegenerateQuestionRequest,
    responses(
        (status = 200, description = "The new question", body = RegenerateQuestionResponse),
        (status = 404, description = "Session or highlight not found"),
        (status = 409, description = "Session is already completed"),
        (status = 503, description = "Question generation temporarily unavailable")
    ),
    params(("session_id" = Uuid, Path, description = "The session to regenerate a question for"))
)]
pub async fn regenerate_question_handler(
    State(app_state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<RegenerateQuestionRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let new_question = app_state
        .workflow
        .regenerate(session_id, request.highlight_index)
        .await
        .map_err(error_response)?;

    Ok(Json(RegenerateQuestionResponse { new_question }))
}
