use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::api::types::{AppError, AppState, CurrentSession, Reply};
use crate::library::filter::{is_known_format, CATEGORIES, FORMATS};
use crate::library::shelf::ScrollReport;
use crate::library::LibraryPage;
use crate::notice::Notice;
use crate::report;
use crate::session::Session;

/// Fetches the catalog once per session. A failure leaves the list empty
/// and is reported as a notice; the next page load tries again.
pub(crate) async fn ensure_catalog(state: &AppState, session: &mut Session) -> Option<Notice> {
    if session.library.is_loaded() {
        return None;
    }
    match state.backend.list_books().await {
        Ok(books) => {
            tracing::debug!("Loaded {} books into the library view", books.len());
            session.library.load(state.present(books));
            None
        }
        Err(e) => {
            report::failure("BrowseLibrary", "loadBooks", &e);
            Some(Notice::error("Failed to load books"))
        }
    }
}

async fn with_library<F>(
    state: &AppState,
    current: &CurrentSession,
    change: F,
) -> Result<Reply<LibraryPage>, AppError>
where
    F: FnOnce(&mut Session) -> Result<(), AppError>,
{
    let mut session = current.session.lock().await;
    let notice = ensure_catalog(state, &mut session).await;
    change(&mut session)?;
    Ok(Reply::new(session.library.page()).notice(notice))
}

pub async fn show(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Reply<LibraryPage>, AppError> {
    with_library(&state, &current, |_| Ok(())).await
}

pub async fn filters(current: CurrentSession) -> Json<serde_json::Value> {
    let session = current.session.lock().await;
    Json(json!({
        "categories": CATEGORIES,
        "formats": FORMATS,
        "selected": session.library.filters(),
    }))
}

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: String,
}

/// Debounced text search. A request overtaken by a newer one from the same
/// session answers 202 without touching the view.
pub async fn search(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<SearchRequest>,
) -> Result<Response, AppError> {
    let query = payload.query;

    let (debouncer, load_notice) = {
        let mut session = current.session.lock().await;
        let notice = ensure_catalog(&state, &mut session).await;
        session.library.set_query(&query);
        (session.search.clone(), notice)
    };

    if query.trim().is_empty() {
        debouncer.cancel();
        let mut session = current.session.lock().await;
        session.library.clear_search();
        return Ok(Reply::new(session.library.page())
            .notice(load_notice)
            .into_response());
    }

    let Some(ticket) = debouncer.settle().await else {
        return Ok(superseded(&query));
    };

    let (results, notice) = match state.backend.search_books(&query).await {
        Ok(books) => (state.present(books), load_notice),
        Err(e) => {
            report::failure("SearchBar", "search", &e);
            (Vec::new(), Some(Notice::error("Failed to search books")))
        }
    };

    let mut session = current.session.lock().await;
    // A newer search or a clear may have landed while the backend answered.
    if !debouncer.is_current(ticket) {
        return Ok(superseded(&query));
    }
    session.library.show_results(&query, results);
    Ok(Reply::new(session.library.page())
        .notice(notice)
        .into_response())
}

fn superseded(query: &str) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({ "status": "superseded", "query": query })),
    )
        .into_response()
}

pub async fn clear_search(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Reply<LibraryPage>, AppError> {
    current.session.lock().await.search.cancel();
    with_library(&state, &current, |session| {
        session.library.clear_search();
        Ok(())
    })
    .await
}

pub async fn ai_search(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<SearchRequest>,
) -> Result<Reply<LibraryPage>, AppError> {
    let query = payload.query.trim().to_string();
    if query.is_empty() {
        return Err(AppError::BadRequest("Please enter a search query".to_string()));
    }

    {
        let mut session = current.session.lock().await;
        ensure_catalog(&state, &mut session).await;
    }

    tracing::info!("AI search for {:?}", query);
    let outcome = state.assistant.ai_search(&query).await;
    let books = state.present(outcome.books().to_vec());

    let mut session = current.session.lock().await;
    session.library.show_ai_results(&query, books);
    Ok(Reply::new(session.library.page()).notice(outcome.notice()))
}

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub category: String,
}

fn category_of(payload: &CategoryRequest) -> Result<String, AppError> {
    let category = payload.category.trim();
    if category.is_empty() {
        return Err(AppError::BadRequest("Category is required".to_string()));
    }
    Ok(category.to_string())
}

pub async fn select_category(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<CategoryRequest>,
) -> Result<Reply<LibraryPage>, AppError> {
    let category = category_of(&payload)?;
    with_library(&state, &current, |session| {
        session.library.select_category(&category);
        Ok(())
    })
    .await
}

pub async fn view_all(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<CategoryRequest>,
) -> Result<Reply<LibraryPage>, AppError> {
    let category = category_of(&payload)?;
    with_library(&state, &current, |session| {
        session.library.view_all(&category);
        Ok(())
    })
    .await
}

pub async fn back_to_categories(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Reply<LibraryPage>, AppError> {
    with_library(&state, &current, |session| {
        session.library.back_to_categories();
        Ok(())
    })
    .await
}

#[derive(Deserialize)]
pub struct FormatRequest {
    pub format: String,
}

pub async fn toggle_format(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<FormatRequest>,
) -> Result<Reply<LibraryPage>, AppError> {
    if !is_known_format(&payload.format) {
        return Err(AppError::BadRequest(format!(
            "Unknown format '{}'",
            payload.format
        )));
    }
    with_library(&state, &current, |session| {
        session.library.toggle_format(&payload.format);
        Ok(())
    })
    .await
}

pub async fn toggle_view_mode(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Reply<LibraryPage>, AppError> {
    with_library(&state, &current, |session| {
        session.library.toggle_mode();
        Ok(())
    })
    .await
}

pub async fn scroll_shelf(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(category): Path<String>,
    Json(report): Json<ScrollReport>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut session = current.session.lock().await;
    ensure_catalog(&state, &mut session).await;

    let shelf = session
        .library
        .shelf_mut(&category)
        .ok_or_else(|| AppError::NotFound("Shelf not found".to_string()))?;
    let outcome = shelf.on_scroll(report, Instant::now());

    Ok(Json(json!({ "outcome": outcome, "shelf": shelf.view() })))
}

pub async fn load_more(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(category): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut session = current.session.lock().await;
    ensure_catalog(&state, &mut session).await;

    let shelf = session
        .library
        .shelf_mut(&category)
        .ok_or_else(|| AppError::NotFound("Shelf not found".to_string()))?;
    let loaded = shelf.load_more();

    Ok(Json(json!({ "loaded": loaded, "shelf": shelf.view() })))
}
