use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::json;
use wordwave_common::models::User;
use wordwave_storage::SignUpOutcome;

use crate::api::types::{AppError, AppState, CurrentSession, Reply};
use crate::notice::Notice;
use crate::report;

#[derive(Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
    /// Page to return to after signing in.
    #[serde(default)]
    pub redirect: Option<String>,
}

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

fn credentials(email: &str, password: &str) -> Result<String, AppError> {
    let email = email.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }
    Ok(email.to_string())
}

/// Only same-site paths are honored. Anything a browser could read as
/// another origin (`//`, backslashes, a scheme, control characters) falls
/// back to the library.
fn return_path(redirect: Option<&str>) -> String {
    match redirect.map(str::trim) {
        Some(page) if is_local_path(page) => format!("/{}", page.trim_start_matches('/')),
        _ => "/books".to_string(),
    }
}

fn is_local_path(page: &str) -> bool {
    !page.is_empty()
        && !page.contains("//")
        && !page.contains(':')
        && !page.chars().any(|c| c == '\\' || c.is_control())
}

pub async fn sign_in(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<SignInRequest>,
) -> Result<Reply<User>, AppError> {
    let email = credentials(&payload.email, &payload.password)?;

    let auth = state
        .backend
        .sign_in(&email, &payload.password)
        .await
        .map_err(|e| AppError::failed("SignIn", "signIn", e, "Failed to sign in"))?
        .ok_or_else(|| AppError::BadRequest("Invalid email or password".to_string()))?;

    tracing::info!("User {} signed in", auth.user.id);
    let user = auth.user.clone();
    current.session.lock().await.auth = Some(auth);

    Ok(Reply::new(user)
        .notice(Notice::success("Signed in successfully"))
        .redirect(return_path(payload.redirect.as_deref())))
}

pub async fn sign_up(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<SignUpRequest>,
) -> Result<Reply<User>, AppError> {
    let email = credentials(&payload.email, &payload.password)?;

    let outcome = state
        .backend
        .sign_up(&email, &payload.password, payload.username.as_deref())
        .await
        .map_err(|e| AppError::failed("SignUp", "signUp", e, "Failed to create account"))?;

    match outcome {
        SignUpOutcome::Created(auth) => {
            tracing::info!("User {} signed up", auth.user.id);
            let user = auth.user.clone();
            current.session.lock().await.auth = Some(auth);
            Ok(Reply::new(user)
                .notice(Notice::success("Account created successfully"))
                .redirect("/books"))
        }
        SignUpOutcome::Rejected(message) => Err(AppError::BadRequest(message)),
    }
}

/// Local state is dropped even when the backend cannot be reached.
pub async fn sign_out(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Reply<serde_json::Value> {
    let auth = current.session.lock().await.sign_out();
    if let Some(auth) = auth {
        if let Err(e) = state.backend.sign_out(&auth.access_token).await {
            report::failure("SignOut", "signOut", &e);
        }
        tracing::info!("User {} signed out", auth.user.id);
    }

    Reply::new(json!({ "signed_in": false }))
        .notice(Notice::success("Signed out successfully"))
        .redirect("/")
}

pub async fn toggle_theme(current: CurrentSession) -> Json<serde_json::Value> {
    let mut session = current.session.lock().await;
    session.theme = session.theme.toggled();
    Json(json!({ "theme": session.theme }))
}

pub async fn end_session(State(state): State<AppState>, current: CurrentSession) -> StatusCode {
    state.sessions.close(&current.id).await;
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_paths_stay_on_site() {
        assert_eq!(return_path(Some("checkout")), "/checkout");
        assert_eq!(return_path(Some("/profile")), "/profile");
        assert_eq!(return_path(Some("https://evil.example")), "/books");
        assert_eq!(return_path(Some("  ")), "/books");
        assert_eq!(return_path(Some("/\\evil.example")), "/books");
        assert_eq!(return_path(Some("\\\\evil.example")), "/books");
        assert_eq!(return_path(Some("javascript:alert(1)")), "/books");
        assert_eq!(return_path(Some("/books\n/x")), "/books");
        assert_eq!(return_path(None), "/books");
    }
}
