use anyhow::{anyhow, Result};
use async_trait::async_trait;

use wordwave_common::models::{Book, BookLink, NewBook};

use super::{new_id, BookRow, Storage};
use crate::{normalize_query, BookStore, SEARCH_LIMIT};

/// Unicode-aware case-insensitive containment. SQLite's `LOWER` only folds
/// ASCII, so matching happens here instead of in SQL.
fn matches_text(book: &Book, needle: &str) -> bool {
    book.title.to_lowercase().contains(needle) || book.author.to_lowercase().contains(needle)
}

#[async_trait]
impl BookStore for Storage {
    async fn list_books(&self) -> Result<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>("SELECT * FROM books ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn get_book(&self, id: &str) -> Result<Option<Book>> {
        let row = sqlx::query_as::<_, BookRow>("SELECT * FROM books WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Book::from))
    }

    async fn search_books(&self, query: &str) -> Result<Vec<Book>> {
        let Some(normalized) = normalize_query(query) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query_as::<_, BookRow>("SELECT * FROM books ORDER BY title ASC")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(Book::from)
            .filter(|book| matches_text(book, &normalized))
            .take(SEARCH_LIMIT)
            .collect())
    }

    async fn related_books(&self, book: &Book, limit: usize) -> Result<Vec<Book>> {
        let rows = sqlx::query_as::<_, BookRow>(
            "SELECT * FROM books WHERE category = ? AND id != ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(&book.category)
        .bind(&book.id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Book::from).collect())
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        let id = new_id();
        let now = chrono::Utc::now();
        let formats = serde_json::to_string(&book.formats)?;

        sqlx::query(
            "INSERT INTO books (id, title, author, cover_url, summary, category, rating, formats, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.cover_url)
        .bind(&book.summary)
        .bind(&book.category)
        .bind(book.rating)
        .bind(&formats)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_book(&id)
            .await?
            .ok_or_else(|| anyhow!("book {id} vanished after insert"))
    }

    async fn book_links(&self, book_id: &str) -> Result<Option<BookLink>> {
        let link = sqlx::query_as::<_, BookLink>("SELECT * FROM book_links WHERE book_id = ?")
            .bind(book_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(link)
    }

    async fn set_book_links(
        &self,
        book_id: &str,
        download_url: Option<String>,
        read_url: Option<String>,
    ) -> Result<BookLink> {
        sqlx::query(
            "INSERT INTO book_links (id, book_id, download_url, read_url, created_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(book_id) DO UPDATE SET
                download_url = excluded.download_url,
                read_url = excluded.read_url",
        )
        .bind(new_id())
        .bind(book_id)
        .bind(&download_url)
        .bind(&read_url)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        self.book_links(book_id)
            .await?
            .ok_or_else(|| anyhow!("links for {book_id} vanished after upsert"))
    }

    async fn record_download(&self, user_id: &str, book: &Book) -> Result<()> {
        let now = chrono::Utc::now();
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE books SET downloads = downloads + 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(&book.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO user_books (id, user_id, book_id, last_downloaded, download_count, created_at)
             VALUES (?, ?, ?, ?, 1, ?)
             ON CONFLICT(user_id, book_id) DO UPDATE SET
                last_downloaded = excluded.last_downloaded,
                download_count = download_count + 1",
        )
        .bind(new_id())
        .bind(user_id)
        .bind(&book.id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    fn cover_url(&self, cover: Option<&str>) -> String {
        self.resolve_cover(cover)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::fixtures::seeded;
    use crate::ReaderStore;

    #[tokio::test]
    async fn search_matches_title_or_author_case_insensitively() {
        let (storage, _) = seeded().await;

        let by_author = storage.search_books("HERBERT").await.unwrap();
        let titles: Vec<_> = by_author.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Dune", "Dune Messiah"]);

        let by_title = storage.search_books("lean").await.unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].author, "Eric Ries");
    }

    #[tokio::test]
    async fn search_without_matches_or_text_is_empty() {
        let (storage, _) = seeded().await;
        assert!(storage.search_books("zzz-nothing").await.unwrap().is_empty());
        assert!(storage.search_books("   ").await.unwrap().is_empty());
        // Wildcards are literal.
        assert!(storage.search_books("%").await.unwrap().is_empty());
        assert!(storage.search_books("_").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_folds_accented_text() {
        let (storage, _) = seeded().await;
        storage
            .insert_book(crate::sqlite::fixtures::new_book(
                "Émile ou De l'éducation",
                "Jean-Jacques Rousseau",
                "Philosophy",
                &["PDF"],
            ))
            .await
            .unwrap();
        storage
            .insert_book(crate::sqlite::fixtures::new_book(
                "Notes",
                "Ölof Ärnberg",
                "Arts",
                &["EPUB"],
            ))
            .await
            .unwrap();

        let by_title = storage.search_books("ÉMILE").await.unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].author, "Jean-Jacques Rousseau");

        let by_author = storage.search_books("ärnberg").await.unwrap();
        assert_eq!(by_author.len(), 1);
        assert_eq!(by_author[0].title, "Notes");
    }

    #[tokio::test]
    async fn related_books_share_category_but_not_identity() {
        let (storage, books) = seeded().await;
        let dune = books.iter().find(|b| b.title == "Dune").unwrap();

        let related = storage.related_books(dune, 4).await.unwrap();
        assert_eq!(related.len(), 1);
        assert_eq!(related[0].title, "Dune Messiah");
    }

    #[tokio::test]
    async fn formats_survive_the_text_column() {
        let (storage, books) = seeded().await;
        let fetched = storage.get_book(&books[0].id).await.unwrap().unwrap();
        assert_eq!(fetched.formats, vec!["PDF", "EPUB"]);
    }

    #[tokio::test]
    async fn downloads_are_counted_per_book_and_reader() {
        let (storage, books) = seeded().await;
        let book = &books[1];

        storage.record_download("reader", book).await.unwrap();
        storage.record_download("reader", book).await.unwrap();

        let refreshed = storage.get_book(&book.id).await.unwrap().unwrap();
        assert_eq!(refreshed.downloads, 2);

        let shelf = storage.user_book("reader", &book.id).await.unwrap().unwrap();
        assert_eq!(shelf.download_count, 2);
        assert!(shelf.last_downloaded.is_some());
    }

    #[tokio::test]
    async fn links_upsert_per_book() {
        let (storage, books) = seeded().await;
        let id = &books[0].id;

        assert!(storage.book_links(id).await.unwrap().is_none());
        storage
            .set_book_links(id, Some("https://dl/1".into()), None)
            .await
            .unwrap();
        let link = storage
            .set_book_links(id, Some("https://dl/2".into()), Some("https://read/2".into()))
            .await
            .unwrap();

        assert_eq!(link.download_url.as_deref(), Some("https://dl/2"));
        assert_eq!(link.read_url.as_deref(), Some("https://read/2"));
    }
}
