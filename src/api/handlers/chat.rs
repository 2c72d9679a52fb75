use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::types::{AppState, CurrentSession};
use crate::assistant::ASSISTANT_UNAVAILABLE;
use crate::report;
use crate::session::{ChatMessage, Sender};

#[derive(Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
}

/// Completion proxy. Failures answer 500 with an id that matches the log
/// record.
pub async fn complete(State(state): State<AppState>, Json(payload): Json<ChatRequest>) -> Response {
    match state.assistant.chat.reply(&payload.message).await {
        Ok(reply) => Json(json!({ "reply": reply })).into_response(),
        Err(e) => {
            let error_id = Uuid::new_v4().to_string();
            tracing::error!(
                error_id = %error_id,
                error_type = ?report::classify(&e),
                "Chat completion failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Failed to generate AI response",
                    "errorId": error_id,
                })),
            )
                .into_response()
        }
    }
}

#[derive(Serialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

pub async fn transcript(current: CurrentSession) -> Json<Transcript> {
    let messages = current.session.lock().await.chat.clone();
    Json(Transcript { messages })
}

/// Appends the visitor's message and the assistant's answer. A blank
/// message changes nothing.
pub async fn send(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<ChatRequest>,
) -> Json<Transcript> {
    let text = payload.message.trim().to_string();
    if text.is_empty() {
        return transcript(current).await;
    }

    current
        .session
        .lock()
        .await
        .chat
        .push(ChatMessage::new(Sender::User, text.clone()));

    let answer = match state.assistant.chat.reply(&text).await {
        Ok(reply) => ChatMessage::new(Sender::Ai, reply),
        Err(e) => {
            report::failure("ChatWidget", "sendMessage", &e);
            ChatMessage::new(Sender::System, ASSISTANT_UNAVAILABLE)
        }
    };

    let mut session = current.session.lock().await;
    session.chat.push(answer);
    Json(Transcript {
        messages: session.chat.clone(),
    })
}
