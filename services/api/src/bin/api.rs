//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, OpenAiQuestionAdapter, StubQuestionAdapter},
    config::Config,
    error::ApiError,
    web::{
        create_session_handler, delete_session_handler, export_session_handler,
        get_session_handler, healthcheck_handler, list_sessions_handler, process_answer_handler,
        regenerate_question_handler, rename_session_handler, rest::ApiDoc,
        session_content_handler, state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    routing::{get, post},
    Router,
};
use reading_companion_core::{ports::QuestionService, workflow::SessionWorkflow};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Question Adapter ---
    // The live adapter is selected only when a credential is configured;
    // nothing downstream branches on the credential again.
    let question_adapter: Arc<dyn QuestionService> = match &config.llm_api_key {
        Some(api_key) => {
            let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
            if let Some(api_base) = &config.llm_api_base {
                openai_config = openai_config.with_api_base(api_base);
            }
            info!(model = %config.llm_model, "LLM credential found, using live question generation");
            Arc::new(OpenAiQuestionAdapter::new(
                Client::with_config(openai_config),
                config.llm_model.clone(),
                config.llm_max_tokens,
            ))
        }
        None => {
            info!("No LLM credential configured, using stub question generation");
            Arc::new(StubQuestionAdapter)
        }
    };

    // --- 4. Build the Shared AppState ---
    let workflow = SessionWorkflow::new(db_adapter, question_adapter);
    let app_state = Arc::new(AppState {
        workflow,
        config: config.clone(),
    });

    let cors_origin = config
        .frontend_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid FRONTEND_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/api/healthcheck", get(healthcheck_handler))
        .route(
            "/api/sessions",
            get(list_sessions_handler).post(create_session_handler),
        )
        .route(
            "/api/sessions/{session_id}",
            get(get_session_handler)
                .patch(rename_session_handler)
                .delete(delete_session_handler),
        )
        .route(
            "/api/sessions/{session_id}/content",
            get(session_content_handler),
        )
        .route(
            "/api/sessions/{session_id}/export",
            get(export_session_handler),
        )
        .route(
            "/api/sessions/{session_id}/process",
            post(process_answer_handler),
        )
        .route(
            "/api/sessions/{session_id}/regenerate_question",
            post(regenerate_question_handler),
        )
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
