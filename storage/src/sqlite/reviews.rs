use anyhow::{anyhow, Result};
use async_trait::async_trait;

use wordwave_common::models::{NewReview, Profile, Review};

use super::{new_id, Storage};
use crate::{ProfileStore, ReviewStore};

const REVIEW_COLUMNS: &str = "SELECT r.id, r.user_id, r.book_id, r.rating, r.comment, r.created_at,
        COALESCE(p.username, 'Anonymous') AS user_name
     FROM reviews r LEFT JOIN profiles p ON p.id = r.user_id";

#[async_trait]
impl ReviewStore for Storage {
    async fn reviews(&self, book_id: &str) -> Result<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{REVIEW_COLUMNS} WHERE r.book_id = ? ORDER BY r.created_at DESC"
        ))
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn add_review(&self, review: NewReview) -> Result<Review> {
        let id = new_id();

        sqlx::query(
            "INSERT INTO reviews (id, user_id, book_id, rating, comment, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&review.user_id)
        .bind(&review.book_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        sqlx::query_as::<_, Review>(&format!("{REVIEW_COLUMNS} WHERE r.id = ?"))
            .bind(&id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| anyhow!("review {id} vanished after insert"))
    }
}

#[async_trait]
impl ProfileStore for Storage {
    async fn profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    async fn upsert_profile(&self, profile: Profile) -> Result<Profile> {
        sqlx::query(
            "INSERT INTO profiles (id, username, display_name, avatar_url, bio) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                bio = excluded.bio",
        )
        .bind(&profile.id)
        .bind(&profile.username)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .bind(&profile.bio)
        .execute(&self.pool)
        .await?;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::fixtures::seeded;

    #[tokio::test]
    async fn reviews_resolve_author_names() {
        let (storage, books) = seeded().await;
        let book_id = books[0].id.clone();

        storage
            .upsert_profile(Profile {
                id: "u1".into(),
                username: Some("reader_one".into()),
                ..Profile::default()
            })
            .await
            .unwrap();

        storage
            .add_review(NewReview {
                user_id: "u1".into(),
                book_id: book_id.clone(),
                rating: 5,
                comment: "Spice!".into(),
            })
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let anonymous = storage
            .add_review(NewReview {
                user_id: "u2".into(),
                book_id: book_id.clone(),
                rating: 3,
                comment: "Long".into(),
            })
            .await
            .unwrap();
        assert_eq!(anonymous.user_name, "Anonymous");

        let reviews = storage.reviews(&book_id).await.unwrap();
        assert_eq!(reviews.len(), 2);
        assert_eq!(reviews[0].user_name, "Anonymous");
        assert_eq!(reviews[1].user_name, "reader_one");
    }
}
