use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use wordwave_common::models::{Collection, NewCollection};

use super::books::find_stored_book;
use crate::api::types::{AppError, AppState, CurrentSession, Reply};
use crate::notice::Notice;

#[derive(Serialize)]
pub struct CollectionList {
    collections: Vec<Collection>,
}

pub async fn list(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Reply<CollectionList>, AppError> {
    let viewer = current.session.lock().await.user().map(|u| u.id.clone());

    let collections = state
        .backend
        .collections(viewer.as_deref())
        .await
        .map_err(|e| AppError::failed("Collections", "loadCollections", e, "Failed to load collections"))?;

    Ok(Reply::new(CollectionList { collections }))
}

#[derive(Deserialize)]
pub struct CreateCollection {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<CreateCollection>,
) -> Result<Reply<Collection>, AppError> {
    let user = current
        .session
        .lock()
        .await
        .user()
        .cloned()
        .ok_or_else(|| AppError::sign_in("Please sign in to create collections"))?;

    let title = payload.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Collection title is required".to_string()));
    }

    let collection = state
        .backend
        .create_collection(NewCollection {
            user_id: user.id,
            title: title.to_string(),
            description: payload.description.trim().to_string(),
            cover_url: payload.cover_url,
            is_public: payload.is_public,
        })
        .await
        .map_err(|e| AppError::failed("Collections", "createCollection", e, "Failed to create collection"))?;

    Ok(Reply::new(collection).notice(Notice::success("Collection created")))
}

/// Private collections are only shown to their owner.
pub async fn details(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
) -> Result<Reply<Collection>, AppError> {
    let viewer = current.session.lock().await.user().map(|u| u.id.clone());

    let mut collection = state
        .backend
        .collection(&id)
        .await
        .map_err(|e| AppError::failed("Collections", "loadCollection", e, "Failed to load collection"))?
        .filter(|c| c.is_public || viewer.as_deref() == Some(c.user_id.as_str()))
        .ok_or_else(|| AppError::NotFound("Collection not found".to_string()))?;

    collection.books = state.present(std::mem::take(&mut collection.books));
    Ok(Reply::new(collection))
}

#[derive(Deserialize)]
pub struct AddBookRequest {
    pub book_id: String,
}

pub async fn add_book(
    State(state): State<AppState>,
    current: CurrentSession,
    Path(id): Path<String>,
    Json(payload): Json<AddBookRequest>,
) -> Result<Reply<Collection>, AppError> {
    let user = current
        .session
        .lock()
        .await
        .user()
        .cloned()
        .ok_or_else(|| AppError::sign_in("Please sign in to manage collections"))?;

    let collection = state
        .backend
        .collection(&id)
        .await
        .map_err(|e| AppError::failed("Collections", "loadCollection", e, "Failed to load collection"))?
        .filter(|c| c.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Collection not found".to_string()))?;
    let book = find_stored_book(&state, &payload.book_id).await?;

    let update = async {
        state.backend.add_to_collection(&collection.id, &book.id).await?;
        state.backend.collection(&collection.id).await
    };
    let mut updated = update
        .await
        .map_err(|e| AppError::failed("Collections", "addBook", e, "Failed to add book to collection"))?
        .ok_or_else(|| AppError::NotFound("Collection not found".to_string()))?;

    updated.books = state.present(std::mem::take(&mut updated.books));
    Ok(Reply::new(updated)
        .notice(Notice::success(format!("Added {} to {}", book.title, collection.title))))
}
