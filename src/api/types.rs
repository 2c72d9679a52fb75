use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use wordwave_common::models::Book;
use wordwave_storage::Backend;

use crate::assistant::Assistant;
use crate::config::Config;
use crate::notice::Notice;
use crate::report;
use crate::session::{Session, SessionStore, SESSION_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub sessions: Arc<SessionStore>,
    pub assistant: Assistant,
    pub config: Arc<Config>,
}

impl AppState {
    /// Resolves cover references into loadable URLs.
    pub fn present(&self, mut books: Vec<Book>) -> Vec<Book> {
        for book in &mut books {
            book.cover_url = Some(self.backend.cover_url(book.cover_url.as_deref()));
        }
        books
    }

    pub fn present_one(&self, mut book: Book) -> Book {
        book.cover_url = Some(self.backend.cover_url(book.cover_url.as_deref()));
        book
    }
}

// Standardized Error Response
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    InternalServerError(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    Unauthorized { message: String, redirect: String },
}

impl AppError {
    pub fn sign_in(message: &str) -> Self {
        AppError::Unauthorized {
            message: message.to_string(),
            redirect: "/signin".to_string(),
        }
    }

    pub fn sign_in_then(message: &str, page: &str) -> Self {
        AppError::Unauthorized {
            message: message.to_string(),
            redirect: format!("/signin?redirect={page}"),
        }
    }

    /// Logs the failure and hides its details behind `message`.
    pub fn failed(component: &str, action: &str, err: anyhow::Error, message: &str) -> Self {
        report::failure(component, action, &err);
        AppError::InternalServerError(message.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, redirect) = match &self {
            AppError::InternalServerError(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::Unauthorized { redirect, .. } => {
                (StatusCode::UNAUTHORIZED, Some(redirect.clone()))
            }
        };
        let message = self.to_string();

        let mut body = json!({
            "status": "error",
            "message": message,
            "notice": Notice::error(message.clone()),
        });
        if let Some(redirect) = redirect {
            body["redirect"] = json!(redirect);
        }

        (status, Json(body)).into_response()
    }
}

/// A page model or action result with an optional toast and navigation hint.
#[derive(Debug, Serialize)]
pub struct Reply<T: Serialize> {
    #[serde(flatten)]
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl<T: Serialize> Reply<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            notice: None,
            redirect: None,
        }
    }

    pub fn notice(mut self, notice: impl Into<Option<Notice>>) -> Self {
        self.notice = notice.into();
        self
    }

    pub fn redirect(mut self, to: impl Into<String>) -> Self {
        self.redirect = Some(to.into());
        self
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// The visitor's session, found through the session header.
pub struct CurrentSession {
    pub id: String,
    pub session: Arc<Mutex<Session>>,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let id = parts
            .headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::BadRequest("Missing session id".to_string()))?
            .to_string();

        let session = state.sessions.open(&id).await;
        Ok(CurrentSession { id, session })
    }
}
