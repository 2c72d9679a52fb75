use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use wordwave_common::models::{Book, NewReview, Review, User, UserBook};

use crate::api::types::{AppError, AppState, CurrentSession, Reply};
use crate::assistant::webhook::is_ai_book;
use crate::notice::Notice;
use crate::report;

const RELATED_LIMIT: usize = 4;

async fn signed_in_user(current: &CurrentSession, message: &str) -> Result<User, AppError> {
    current
        .session
        .lock()
        .await
        .user()
        .cloned()
        .ok_or_else(|| AppError::sign_in(message))
}

/// AI recommendations only live in the session that asked for them; every
/// other id is looked up in the backend.
pub(crate) async fn find_book(
    state: &AppState,
    current: &CurrentSession,
    id: &str,
) -> Result<Book, AppError> {
    if is_ai_book(id) {
        return current
            .session
            .lock()
            .await
            .library
            .find(id)
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()));
    }
    find_stored_book(state, id).await
}

pub(crate) async fn find_stored_book(state: &AppState, id: &str) -> Result<Book, AppError> {
    state
        .backend
        .get_book(id)
        .await
        .map_err(|e| AppError::failed("BookDetails", "getBook", e, "Failed to load book details"))?
        .map(|book| state.present_one(book))
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
}

#[derive(Serialize)]
pub struct ReaderState {
    liked: bool,
    saved: bool,
    favorite: bool,
    progress: i64,
}

#[derive(Serialize)]
pub struct BookPage {
    book: Book,
    related: Vec<Book>,
    reviews: Vec<Review>,
    can_download: bool,
    can_read_online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reader: Option<ReaderState>,
}

pub async fn details(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
) -> Result<Reply<BookPage>, AppError> {
    let book = find_book(&state, &current, &id).await?;
    if is_ai_book(&book.id) {
        return Ok(Reply::new(BookPage {
            book,
            related: Vec::new(),
            reviews: Vec::new(),
            can_download: false,
            can_read_online: false,
            reader: None,
        }));
    }
    let user = current.session.lock().await.user().cloned();

    let load = async {
        let related = state.backend.related_books(&book, RELATED_LIMIT).await?;
        let reviews = state.backend.reviews(&book.id).await?;
        let links = state.backend.book_links(&book.id).await?;

        let reader = match &user {
            Some(user) => {
                let liked = state.backend.is_liked(&user.id, &book.id).await?;
                let entry = state.backend.user_book(&user.id, &book.id).await?;
                Some(reader_state(liked, entry.as_ref()))
            }
            None => None,
        };
        anyhow::Ok((related, reviews, links, reader))
    };

    let (related, reviews, links, reader) = load
        .await
        .map_err(|e| AppError::failed("BookDetails", "loadDetails", e, "Failed to load book details"))?;

    let (can_download, can_read_online) = links
        .map(|l| (l.download_url.is_some(), l.read_url.is_some()))
        .unwrap_or((false, false));

    Ok(Reply::new(BookPage {
        book,
        related: state.present(related),
        reviews,
        can_download,
        can_read_online,
        reader,
    }))
}

fn reader_state(liked: bool, entry: Option<&UserBook>) -> ReaderState {
    ReaderState {
        liked,
        saved: entry.is_some_and(|e| e.is_saved),
        favorite: entry.is_some_and(|e| e.is_favorite),
        progress: entry.map_or(0, |e| e.progress),
    }
}

pub async fn toggle_like(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
) -> Result<Reply<serde_json::Value>, AppError> {
    let user = signed_in_user(&current, "Please sign in to like books").await?;
    let book = find_stored_book(&state, &id).await?;

    let result = async {
        let liked = state.backend.toggle_like(&user.id, &book.id).await?;
        let likes_count = state
            .backend
            .get_book(&book.id)
            .await?
            .map_or(book.likes_count, |b| b.likes_count);
        anyhow::Ok((liked, likes_count))
    };
    let (liked, likes_count) = result
        .await
        .map_err(|e| AppError::failed("BookDetails", "toggleLike", e, "Failed to update like status"))?;

    let message = if liked {
        "Added to likes"
    } else {
        "Removed from likes"
    };
    Ok(Reply::new(json!({ "liked": liked, "likes_count": likes_count }))
        .notice(Notice::success(message)))
}

pub async fn toggle_save(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
) -> Result<Reply<serde_json::Value>, AppError> {
    let user = signed_in_user(&current, "Please sign in to save books").await?;
    let book = find_stored_book(&state, &id).await?;

    let saved = state
        .backend
        .toggle_save(&user.id, &book.id)
        .await
        .map_err(|e| AppError::failed("BookDetails", "toggleSave", e, "Failed to update save status"))?;

    let message = if saved {
        "Book saved to library"
    } else {
        "Book removed from library"
    };
    Ok(Reply::new(json!({ "saved": saved })).notice(Notice::success(message)))
}

pub async fn toggle_favorite(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
) -> Result<Reply<serde_json::Value>, AppError> {
    let user = signed_in_user(&current, "Please sign in to add favorites").await?;
    let book = find_stored_book(&state, &id).await?;

    let favorite = state
        .backend
        .toggle_favorite(&user.id, &book.id)
        .await
        .map_err(|e| AppError::failed("BookDetails", "toggleFavorite", e, "Failed to update favorites"))?;

    let message = if favorite {
        format!("Added {} to favorites!", book.title)
    } else {
        format!("Removed {} from favorites", book.title)
    };
    Ok(Reply::new(json!({ "favorite": favorite })).notice(Notice::success(message)))
}

pub async fn download(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
) -> Result<Reply<serde_json::Value>, AppError> {
    let user = signed_in_user(&current, "Please sign in to download books").await?;
    let book = find_stored_book(&state, &id).await?;

    let link = state
        .backend
        .book_links(&book.id)
        .await
        .map_err(|e| AppError::failed("BookDetails", "download", e, "Failed to download book"))?;
    let Some(url) = link.and_then(|l| l.download_url) else {
        return Err(AppError::NotFound("Download link not available".to_string()));
    };

    // The link is handed out even when the bookkeeping fails.
    if let Err(e) = state.backend.record_download(&user.id, &book).await {
        report::failure("BookDetails", "recordDownload", &e);
    }

    Ok(Reply::new(json!({ "url": url }))
        .notice(Notice::success(format!("Downloading {}...", book.title))))
}

pub async fn read_online(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Reply<serde_json::Value>, AppError> {
    let book = find_stored_book(&state, &id).await?;

    let link = state
        .backend
        .book_links(&book.id)
        .await
        .map_err(|e| AppError::failed("BookDetails", "read", e, "Failed to open book for reading"))?;
    let Some(url) = link.and_then(|l| l.read_url) else {
        return Err(AppError::NotFound(
            "Online reading is not available for this book".to_string(),
        ));
    };

    Ok(Reply::new(json!({ "url": url }))
        .notice(Notice::success(format!("Opening {} for reading...", book.title))))
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

pub async fn add_review(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
    Json(payload): Json<ReviewRequest>,
) -> Result<Reply<Review>, AppError> {
    let user = signed_in_user(&current, "Please sign in to leave a review").await?;
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest(
            "Rating must be between 1 and 5".to_string(),
        ));
    }
    let book = find_stored_book(&state, &id).await?;

    let review = state
        .backend
        .add_review(NewReview {
            user_id: user.id,
            book_id: book.id,
            rating: payload.rating,
            comment: payload.comment.trim().to_string(),
        })
        .await
        .map_err(|e| AppError::failed("BookDetails", "submitReview", e, "Failed to submit review"))?;

    Ok(Reply::new(review).notice(Notice::success("Review submitted successfully")))
}

#[derive(Deserialize)]
pub struct ProgressRequest {
    pub progress: i64,
}

pub async fn update_progress(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
    Json(payload): Json<ProgressRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = signed_in_user(&current, "Please sign in to track your reading").await?;
    if !(0..=100).contains(&payload.progress) {
        return Err(AppError::BadRequest(
            "Progress must be between 0 and 100".to_string(),
        ));
    }
    let book = find_stored_book(&state, &id).await?;

    state
        .backend
        .update_progress(&user.id, &book.id, payload.progress)
        .await
        .map_err(|e| AppError::failed("BookDetails", "updateProgress", e, "Failed to save progress"))?;

    Ok(Json(json!({ "progress": payload.progress })))
}

pub async fn report_review(Path(id): Path<String>) -> Reply<serde_json::Value> {
    tracing::info!("Review {} reported", id);
    Reply::new(json!({ "reported": id })).notice(Notice::success(
        "Review reported. Thank you for helping us maintain quality content.",
    ))
}
