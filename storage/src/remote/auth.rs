use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;

use wordwave_common::models::{AuthSession, User};

use super::{check, RemoteStore};
use crate::{AuthStore, SignUpOutcome};

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    created_at: DateTime<Utc>,
    #[serde(default)]
    last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    user_metadata: Option<UserMetadata>,
}

impl From<AuthUser> for User {
    fn from(user: AuthUser) -> Self {
        User {
            id: user.id,
            email: user.email.unwrap_or_default(),
            username: user
                .user_metadata
                .and_then(|m| m.username)
                .filter(|u| !u.is_empty()),
            created_at: user.created_at,
            last_login: user.last_sign_in_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// The auth service is not consistent about which field holds the message.
#[derive(Debug, Default, Deserialize)]
struct AuthFailure {
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthFailure {
    fn into_message(self) -> String {
        self.msg
            .or(self.error_description)
            .or(self.message)
            .unwrap_or_else(|| "Sign up failed".to_string())
    }
}

impl RemoteStore {
    fn auth_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/auth/v1/{path}", self.base()))
            .header("apikey", &self.config.anon_key)
    }
}

#[async_trait]
impl AuthStore for RemoteStore {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUpOutcome> {
        let response = self
            .auth_request(Method::POST, "signup")
            .json(&json!({
                "email": email.trim(),
                "password": password,
                "data": { "username": username.map(str::trim) },
            }))
            .send()
            .await?;

        if response.status().is_client_error() {
            let failure: AuthFailure = response.json().await.unwrap_or_default();
            return Ok(SignUpOutcome::Rejected(failure.into_message()));
        }
        let response = check(response, "signup").await?;

        // Projects with email confirmation answer with a bare user and no token.
        let body: serde_json::Value = response.json().await?;
        match serde_json::from_value::<TokenResponse>(body) {
            Ok(token) => Ok(SignUpOutcome::Created(AuthSession {
                access_token: token.access_token,
                user: token.user.into(),
            })),
            Err(_) => Ok(SignUpOutcome::Rejected(
                "Check your email to confirm your account, then sign in".to_string(),
            )),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Option<AuthSession>> {
        let response = self
            .auth_request(Method::POST, "token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email.trim(), "password": password }))
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            return Ok(None);
        }
        let token: TokenResponse = check(response, "token").await?.json().await?;
        Ok(Some(AuthSession {
            access_token: token.access_token,
            user: token.user.into(),
        }))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .auth_request(Method::POST, "logout")
            .bearer_auth(access_token)
            .send()
            .await?;
        // An already expired token is as good as signed out.
        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(());
        }
        check(response, "logout").await?;
        Ok(())
    }

    async fn user_for_token(&self, access_token: &str) -> Result<Option<User>> {
        let response = self
            .auth_request(Method::GET, "user")
            .bearer_auth(access_token)
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }
        let user: AuthUser = check(response, "user").await?.json().await?;
        Ok(Some(user.into()))
    }

    async fn update_username(&self, access_token: &str, username: &str) -> Result<()> {
        let response = self
            .auth_request(Method::PUT, "user")
            .bearer_auth(access_token)
            .json(&json!({ "data": { "username": username } }))
            .send()
            .await?;
        check(response, "user")
            .await
            .map_err(|e| anyhow!("updating username: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_user_maps_metadata_username() {
        let raw = r#"{
            "access_token": "tok",
            "user": {
                "id": "u1",
                "email": "reader@example.com",
                "created_at": "2024-03-01T10:00:00Z",
                "last_sign_in_at": null,
                "user_metadata": {"username": "reader"}
            }
        }"#;
        let token: TokenResponse = serde_json::from_str(raw).unwrap();
        let user = User::from(token.user);
        assert_eq!(user.username.as_deref(), Some("reader"));
        assert_eq!(user.email, "reader@example.com");
        assert!(user.last_login.is_none());
    }

    #[test]
    fn failure_message_falls_back_across_fields() {
        let failure: AuthFailure =
            serde_json::from_str(r#"{"error_description": "Invalid login"}"#).unwrap();
        assert_eq!(failure.into_message(), "Invalid login");
        assert_eq!(AuthFailure::default().into_message(), "Sign up failed");
    }
}
