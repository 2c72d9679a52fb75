use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use wordwave_common::models::UserBook;

use super::{Conflict, Query, RemoteStore};
use crate::ReaderStore;

#[derive(Deserialize)]
struct LikeRow {
    id: String,
}

impl RemoteStore {
    async fn toggle_flag(&self, user_id: &str, book_id: &str, column: &str) -> Result<bool> {
        match self.user_book(user_id, book_id).await? {
            Some(existing) => {
                let next = !match column {
                    "is_saved" => existing.is_saved,
                    _ => existing.is_favorite,
                };
                let _: Vec<Value> = self
                    .update(
                        Query::table("user_books").eq("id", &existing.id),
                        &json!({ column: next }),
                    )
                    .await?;
                Ok(next)
            }
            None => {
                let _: Vec<Value> = self
                    .insert(
                        "user_books",
                        &json!({ "user_id": user_id, "book_id": book_id, column: true }),
                        Conflict::Fail,
                    )
                    .await?;
                Ok(true)
            }
        }
    }
}

#[async_trait]
impl ReaderStore for RemoteStore {
    async fn is_liked(&self, user_id: &str, book_id: &str) -> Result<bool> {
        let like: Option<LikeRow> = self
            .select_one(
                Query::table("user_likes")
                    .select("id")
                    .eq("user_id", user_id)
                    .eq("book_id", book_id),
            )
            .await?;
        Ok(like.is_some())
    }

    /// The backend keeps `books.likes_count` in step with `user_likes`.
    async fn toggle_like(&self, user_id: &str, book_id: &str) -> Result<bool> {
        let existing: Option<LikeRow> = self
            .select_one(
                Query::table("user_likes")
                    .select("id")
                    .eq("user_id", user_id)
                    .eq("book_id", book_id),
            )
            .await?;

        match existing {
            Some(like) => {
                self.delete(Query::table("user_likes").eq("id", &like.id))
                    .await?;
                Ok(false)
            }
            None => {
                let _: Vec<Value> = self
                    .insert(
                        "user_likes",
                        &json!({ "user_id": user_id, "book_id": book_id }),
                        Conflict::Fail,
                    )
                    .await?;
                Ok(true)
            }
        }
    }

    async fn user_book(&self, user_id: &str, book_id: &str) -> Result<Option<UserBook>> {
        self.select_one(
            Query::table("user_books")
                .select("*")
                .eq("user_id", user_id)
                .eq("book_id", book_id),
        )
        .await
    }

    async fn toggle_save(&self, user_id: &str, book_id: &str) -> Result<bool> {
        self.toggle_flag(user_id, book_id, "is_saved").await
    }

    async fn toggle_favorite(&self, user_id: &str, book_id: &str) -> Result<bool> {
        self.toggle_flag(user_id, book_id, "is_favorite").await
    }

    async fn update_progress(&self, user_id: &str, book_id: &str, progress: i64) -> Result<()> {
        let body = json!({
            "user_id": user_id,
            "book_id": book_id,
            "progress": progress,
            "last_read": Utc::now(),
        });
        let _: Vec<Value> = self
            .insert("user_books", &body, Conflict::Merge("user_id,book_id"))
            .await?;
        Ok(())
    }

    async fn user_books(&self, user_id: &str) -> Result<Vec<UserBook>> {
        self.select(
            Query::table("user_books")
                .select("*,book:books(*)")
                .eq("user_id", user_id)
                .order("last_read.desc.nullslast"),
        )
        .await
    }
}
