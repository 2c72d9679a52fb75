use anyhow::{anyhow, Result};
use async_trait::async_trait;

use wordwave_common::models::{Book, Collection, NewCollection};

use super::{new_id, BookRow, Storage};
use crate::CollectionStore;

const COLLECTION_COLUMNS: &str = "SELECT c.id, c.title, c.description, c.cover_url, c.user_id,
        c.is_public, c.created_at, c.updated_at,
        (SELECT COUNT(*) FROM collection_books cb WHERE cb.collection_id = c.id) AS book_count
     FROM collections c";

#[async_trait]
impl CollectionStore for Storage {
    async fn collections(&self, viewer: Option<&str>) -> Result<Vec<Collection>> {
        let collections = sqlx::query_as::<_, Collection>(&format!(
            "{COLLECTION_COLUMNS} WHERE c.is_public = 1 OR c.user_id = ? ORDER BY c.created_at DESC"
        ))
        .bind(viewer.unwrap_or_default())
        .fetch_all(&self.pool)
        .await?;
        Ok(collections)
    }

    async fn collection(&self, id: &str) -> Result<Option<Collection>> {
        let collection =
            sqlx::query_as::<_, Collection>(&format!("{COLLECTION_COLUMNS} WHERE c.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(mut collection) = collection else {
            return Ok(None);
        };

        let rows = sqlx::query_as::<_, BookRow>(
            "SELECT b.* FROM books b
             JOIN collection_books cb ON cb.book_id = b.id
             WHERE cb.collection_id = ?
             ORDER BY cb.position ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        collection.books = rows.into_iter().map(Book::from).collect();

        Ok(Some(collection))
    }

    async fn create_collection(&self, collection: NewCollection) -> Result<Collection> {
        let id = new_id();
        let now = chrono::Utc::now();

        sqlx::query(
            "INSERT INTO collections (id, title, description, cover_url, user_id, is_public, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&collection.title)
        .bind(&collection.description)
        .bind(&collection.cover_url)
        .bind(&collection.user_id)
        .bind(collection.is_public)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.collection(&id)
            .await?
            .ok_or_else(|| anyhow!("collection {id} vanished after insert"))
    }

    async fn add_to_collection(&self, collection_id: &str, book_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let (position,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM collection_books WHERE collection_id = ?")
                .bind(collection_id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO collection_books (collection_id, book_id, position) VALUES (?, ?, ?)",
        )
        .bind(collection_id)
        .bind(book_id)
        .bind(position)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE collections SET updated_at = ? WHERE id = ?")
            .bind(chrono::Utc::now())
            .bind(collection_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::fixtures::seeded;

    fn new_collection(user: &str, title: &str, is_public: bool) -> NewCollection {
        NewCollection {
            user_id: user.into(),
            title: title.into(),
            description: String::new(),
            cover_url: None,
            is_public,
        }
    }

    #[tokio::test]
    async fn private_collections_are_only_visible_to_their_owner() {
        let (storage, _) = seeded().await;
        storage
            .create_collection(new_collection("u1", "Shared", true))
            .await
            .unwrap();
        storage
            .create_collection(new_collection("u1", "Secret", false))
            .await
            .unwrap();

        assert_eq!(storage.collections(None).await.unwrap().len(), 1);
        assert_eq!(storage.collections(Some("u2")).await.unwrap().len(), 1);
        assert_eq!(storage.collections(Some("u1")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn books_keep_insertion_order_without_duplicates() {
        let (storage, books) = seeded().await;
        let collection = storage
            .create_collection(new_collection("u1", "Favorites", true))
            .await
            .unwrap();

        storage.add_to_collection(&collection.id, &books[2].id).await.unwrap();
        storage.add_to_collection(&collection.id, &books[0].id).await.unwrap();
        storage.add_to_collection(&collection.id, &books[2].id).await.unwrap();

        let loaded = storage.collection(&collection.id).await.unwrap().unwrap();
        assert_eq!(loaded.book_count, 2);
        let ids: Vec<_> = loaded.books.iter().map(|b| b.id.clone()).collect();
        assert_eq!(ids, vec![books[2].id.clone(), books[0].id.clone()]);
    }
}
