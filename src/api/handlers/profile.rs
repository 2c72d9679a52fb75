use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use wordwave_common::models::{Order, Profile, User, UserBook};

use crate::api::types::{AppError, AppState, CurrentSession, Reply};
use crate::notice::Notice;

const RECENT_LIMIT: usize = 3;

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReadingStats {
    pub total_books: usize,
    pub total_downloads: usize,
    pub books_reading: usize,
    pub completed_books: usize,
}

impl ReadingStats {
    pub fn from_shelf(shelf: &[UserBook]) -> Self {
        Self {
            total_books: shelf.len(),
            total_downloads: shelf.iter().filter(|b| b.download_count > 0).count(),
            books_reading: shelf
                .iter()
                .filter(|b| b.progress > 0 && b.progress < 100)
                .count(),
            completed_books: shelf.iter().filter(|b| b.progress >= 100).count(),
        }
    }
}

#[derive(Serialize)]
pub struct ProfilePage {
    user: User,
    profile: Option<Profile>,
    stats: ReadingStats,
    recent: Vec<UserBook>,
    orders: Vec<Order>,
}

async fn signed_in(current: &CurrentSession) -> Result<(User, Option<String>), AppError> {
    let session = current.session.lock().await;
    let user = session
        .user()
        .cloned()
        .ok_or_else(|| AppError::sign_in_then("Please sign in to view your profile", "profile"))?;
    Ok((user, session.access_token().map(str::to_string)))
}

pub async fn show(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Reply<ProfilePage>, AppError> {
    let (user, _) = signed_in(&current).await?;

    let load = async {
        let profile = state.backend.profile(&user.id).await?;
        let shelf = state.backend.user_books(&user.id).await?;
        let orders = state.backend.orders(&user.id).await?;
        anyhow::Ok((profile, shelf, orders))
    };
    let (profile, shelf, orders) = load
        .await
        .map_err(|e| AppError::failed("Profile", "loadUserData", e, "Failed to load user data"))?;

    let stats = ReadingStats::from_shelf(&shelf);
    let recent = shelf
        .into_iter()
        .take(RECENT_LIMIT)
        .map(|mut entry| {
            entry.book = entry.book.map(|b| state.present_one(b));
            entry
        })
        .collect();

    Ok(Reply::new(ProfilePage {
        user,
        profile,
        stats,
        recent,
        orders,
    }))
}

#[derive(Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

fn cleaned(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub async fn update(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<ProfileUpdate>,
) -> Result<Reply<Profile>, AppError> {
    let (user, token) = signed_in(&current).await?;
    let username = cleaned(payload.username);

    let save = async {
        let profile = state
            .backend
            .upsert_profile(Profile {
                id: user.id.clone(),
                username: username.clone(),
                display_name: cleaned(payload.display_name),
                avatar_url: cleaned(payload.avatar_url),
                bio: cleaned(payload.bio),
            })
            .await?;
        if let (Some(username), Some(token)) = (&username, &token) {
            state.backend.update_username(token, username).await?;
        }
        anyhow::Ok(profile)
    };
    let profile = save
        .await
        .map_err(|e| AppError::failed("Profile", "updateProfile", e, "Failed to update profile"))?;

    if let Some(username) = username {
        let mut session = current.session.lock().await;
        if let Some(auth) = session.auth.as_mut() {
            auth.user.username = Some(username);
        }
    }

    Ok(Reply::new(profile).notice(Notice::success("Profile updated successfully!")))
}
