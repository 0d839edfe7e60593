use crate::models::{ChatRequest, ChatResponse};
use crate::services::ChatError;
use crate::startup::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};

/// `POST /api/chat`: answer one visitor question.
///
/// A missing, non-JSON or malformed body is treated like a missing question.
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ChatError> {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::info!(error = %rejection.body_text(), "Unreadable chat request body");
            ChatRequest::default()
        }
    };

    let answer = state.chat.ask(request.question.as_deref()).await?;

    Ok(Json(ChatResponse { answer }))
}
