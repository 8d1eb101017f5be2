pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible to the binary that
// will build the web server router.
pub use rest::{
    create_session_handler, delete_session_handler, export_session_handler, get_session_handler,
    healthcheck_handler, list_sessions_handler, process_answer_handler,
    regenerate_question_handler, rename_session_handler, session_content_handler,
};
