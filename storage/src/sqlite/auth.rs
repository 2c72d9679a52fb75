use anyhow::Result;
use async_trait::async_trait;
use sqlx::FromRow;

use wordwave_common::models::{AuthSession, Profile, User};
use wordwave_common::utils::hash::hash_password;

use super::{new_id, Storage};
use crate::{AuthStore, ProfileStore, SignUpOutcome};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(FromRow)]
struct Credentials {
    id: String,
    password_hash: String,
    salt: String,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl Storage {
    async fn issue_token(&self, user_id: &str) -> Result<String> {
        let token = format!("{}{}", new_id().replace('-', ""), new_id().replace('-', ""));
        sqlx::query("INSERT INTO auth_tokens (token, user_id, created_at) VALUES (?, ?, ?)")
            .bind(&token)
            .bind(user_id)
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(token)
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, username, created_at, last_login FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl AuthStore for Storage {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<SignUpOutcome> {
        let email = normalize_email(email);
        if !email.contains('@') {
            return Ok(SignUpOutcome::Rejected("Invalid email address".into()));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Ok(SignUpOutcome::Rejected(format!(
                "Password should be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let taken = sqlx::query("SELECT 1 FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?;
        if taken.is_some() {
            return Ok(SignUpOutcome::Rejected("User already registered".into()));
        }

        let id = new_id();
        let salt = new_id();
        let username = username.map(str::trim).filter(|u| !u.is_empty());

        sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, salt, created_at, last_login) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&email)
        .bind(username)
        .bind(hash_password(&salt, password))
        .bind(&salt)
        .bind(chrono::Utc::now())
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        self.upsert_profile(Profile {
            id: id.clone(),
            username: username.map(str::to_string),
            ..Profile::default()
        })
        .await?;

        let access_token = self.issue_token(&id).await?;
        let user = self
            .get_user(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user {id} vanished after sign up"))?;

        tracing::info!("Registered new reader {}", user.id);
        Ok(SignUpOutcome::Created(AuthSession { access_token, user }))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Option<AuthSession>> {
        let credentials = sqlx::query_as::<_, Credentials>(
            "SELECT id, password_hash, salt FROM users WHERE email = ?",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        let Some(credentials) = credentials else {
            return Ok(None);
        };
        if hash_password(&credentials.salt, password) != credentials.password_hash {
            return Ok(None);
        }

        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(chrono::Utc::now())
            .bind(&credentials.id)
            .execute(&self.pool)
            .await?;

        let access_token = self.issue_token(&credentials.id).await?;
        Ok(self
            .get_user(&credentials.id)
            .await?
            .map(|user| AuthSession { access_token, user }))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE token = ?")
            .bind(access_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn user_for_token(&self, access_token: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.email, u.username, u.created_at, u.last_login
             FROM users u JOIN auth_tokens t ON t.user_id = u.id
             WHERE t.token = ?",
        )
        .bind(access_token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_username(&self, access_token: &str, username: &str) -> Result<()> {
        let Some(user) = self.user_for_token(access_token).await? else {
            anyhow::bail!("unknown access token");
        };

        sqlx::query("UPDATE users SET username = ? WHERE id = ?")
            .bind(username)
            .bind(&user.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
