use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use wordwave_common::models::Book;

use crate::api::types::{AppError, AppState, CurrentSession, Reply};

const HOME_SHELF_SIZE: usize = 4;

pub async fn health_check() -> &'static str {
    "OK"
}

#[derive(Serialize)]
pub struct HomePage {
    featured: Vec<Book>,
    popular: Vec<Book>,
}

/// Top-rated and most-downloaded books. Signed-in visitors are pointed at
/// the library.
pub async fn home(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Reply<HomePage>, AppError> {
    let signed_in = current.session.lock().await.user().is_some();

    let books = state
        .backend
        .list_books()
        .await
        .map_err(|e| AppError::failed("Home", "loadBooks", e, "Failed to load books"))?;

    let mut featured = books.clone();
    featured.sort_by(|a, b| b.rating.total_cmp(&a.rating));
    featured.truncate(HOME_SHELF_SIZE);

    let mut popular = books;
    popular.sort_by(|a, b| b.downloads.cmp(&a.downloads));
    popular.truncate(HOME_SHELF_SIZE);

    let reply = Reply::new(HomePage {
        featured: state.present(featured),
        popular: state.present(popular),
    });
    Ok(if signed_in {
        reply.redirect("/books")
    } else {
        reply
    })
}

pub async fn about(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "WordWave",
        "version": state.config.version,
        "base_url": state.config.base_url,
        "description": "A digital library where readers browse, search, save and review books, with an AI helper for finding the next one.",
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "status": "error",
            "message": "Page not found",
            "redirect": "/",
        })),
    )
}
