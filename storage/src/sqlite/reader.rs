use anyhow::Result;
use async_trait::async_trait;

use wordwave_common::models::UserBook;

use super::{new_id, Storage};
use crate::{BookStore, ReaderStore};

#[derive(Clone, Copy)]
enum Flag {
    Saved,
    Favorite,
}

impl Flag {
    fn column(self) -> &'static str {
        match self {
            Flag::Saved => "is_saved",
            Flag::Favorite => "is_favorite",
        }
    }
}

impl Storage {
    async fn toggle_flag(&self, user_id: &str, book_id: &str, flag: Flag) -> Result<bool> {
        match self.user_book(user_id, book_id).await? {
            Some(existing) => {
                let current = match flag {
                    Flag::Saved => existing.is_saved,
                    Flag::Favorite => existing.is_favorite,
                };
                let next = !current;

                sqlx::query(&format!(
                    "UPDATE user_books SET {} = ? WHERE id = ?",
                    flag.column()
                ))
                .bind(next)
                .bind(&existing.id)
                .execute(&self.pool)
                .await?;

                Ok(next)
            }
            None => {
                sqlx::query(&format!(
                    "INSERT INTO user_books (id, user_id, book_id, {}, created_at) VALUES (?, ?, ?, 1, ?)",
                    flag.column()
                ))
                .bind(new_id())
                .bind(user_id)
                .bind(book_id)
                .bind(chrono::Utc::now())
                .execute(&self.pool)
                .await?;

                Ok(true)
            }
        }
    }
}

#[async_trait]
impl ReaderStore for Storage {
    async fn is_liked(&self, user_id: &str, book_id: &str) -> Result<bool> {
        let found = sqlx::query("SELECT 1 FROM user_likes WHERE user_id = ? AND book_id = ?")
            .bind(user_id)
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    async fn toggle_like(&self, user_id: &str, book_id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM user_likes WHERE user_id = ? AND book_id = ?")
                .bind(user_id)
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?;

        let liked = if let Some((like_id,)) = existing {
            sqlx::query("DELETE FROM user_likes WHERE id = ?")
                .bind(&like_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE books SET likes_count = MAX(likes_count - 1, 0) WHERE id = ?")
                .bind(book_id)
                .execute(&mut *tx)
                .await?;
            false
        } else {
            sqlx::query(
                "INSERT INTO user_likes (id, user_id, book_id, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(user_id)
            .bind(book_id)
            .bind(chrono::Utc::now())
            .execute(&mut *tx)
            .await?;
            sqlx::query("UPDATE books SET likes_count = likes_count + 1 WHERE id = ?")
                .bind(book_id)
                .execute(&mut *tx)
                .await?;
            true
        };

        tx.commit().await?;
        Ok(liked)
    }

    async fn user_book(&self, user_id: &str, book_id: &str) -> Result<Option<UserBook>> {
        let row = sqlx::query_as::<_, UserBook>(
            "SELECT * FROM user_books WHERE user_id = ? AND book_id = ?",
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn toggle_save(&self, user_id: &str, book_id: &str) -> Result<bool> {
        self.toggle_flag(user_id, book_id, Flag::Saved).await
    }

    async fn toggle_favorite(&self, user_id: &str, book_id: &str) -> Result<bool> {
        self.toggle_flag(user_id, book_id, Flag::Favorite).await
    }

    async fn update_progress(&self, user_id: &str, book_id: &str, progress: i64) -> Result<()> {
        let now = chrono::Utc::now();
        sqlx::query(
            "INSERT INTO user_books (id, user_id, book_id, progress, last_read, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(user_id, book_id) DO UPDATE SET
                progress = excluded.progress,
                last_read = excluded.last_read",
        )
        .bind(new_id())
        .bind(user_id)
        .bind(book_id)
        .bind(progress)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_books(&self, user_id: &str) -> Result<Vec<UserBook>> {
        let mut rows = sqlx::query_as::<_, UserBook>(
            "SELECT * FROM user_books WHERE user_id = ? ORDER BY last_read DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        for row in &mut rows {
            row.book = self.get_book(&row.book_id).await?;
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::fixtures::seeded;

    #[tokio::test]
    async fn liking_twice_restores_the_count() {
        let (storage, books) = seeded().await;
        let book = &books[0];

        assert!(storage.toggle_like("u1", &book.id).await.unwrap());
        assert!(storage.is_liked("u1", &book.id).await.unwrap());
        assert_eq!(storage.get_book(&book.id).await.unwrap().unwrap().likes_count, 1);

        assert!(!storage.toggle_like("u1", &book.id).await.unwrap());
        assert!(!storage.is_liked("u1", &book.id).await.unwrap());
        assert_eq!(storage.get_book(&book.id).await.unwrap().unwrap().likes_count, 0);
    }

    #[tokio::test]
    async fn save_and_favorite_are_independent_flags() {
        let (storage, books) = seeded().await;
        let book = &books[0];

        assert!(storage.toggle_save("u1", &book.id).await.unwrap());
        assert!(storage.toggle_favorite("u1", &book.id).await.unwrap());
        assert!(!storage.toggle_save("u1", &book.id).await.unwrap());

        let row = storage.user_book("u1", &book.id).await.unwrap().unwrap();
        assert!(!row.is_saved);
        assert!(row.is_favorite);
    }

    #[tokio::test]
    async fn shelf_is_ordered_by_last_read_and_joined() {
        let (storage, books) = seeded().await;

        storage.update_progress("u1", &books[0].id, 10).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.update_progress("u1", &books[1].id, 100).await.unwrap();
        storage.toggle_save("u1", &books[2].id).await.unwrap();

        let shelf = storage.user_books("u1").await.unwrap();
        assert_eq!(shelf.len(), 3);
        assert_eq!(shelf[0].book_id, books[1].id);
        assert_eq!(shelf[0].progress, 100);
        assert_eq!(shelf[1].book_id, books[0].id);
        // Never read: sorts last.
        assert!(shelf[2].last_read.is_none());
        assert!(shelf.iter().all(|row| row.book.is_some()));
    }
}
