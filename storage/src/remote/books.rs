use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use wordwave_common::models::{Book, BookLink, NewBook, UserBook};
use wordwave_common::utils::cover;

use super::{quote, Conflict, Query, RemoteStore};
use crate::{normalize_query, BookStore, ReaderStore, SEARCH_LIMIT};

/// `or` filter matching `query` anywhere in title or author.
pub(crate) fn title_or_author(query: &str) -> Vec<String> {
    let pattern = quote(&format!("*{}*", literal_pattern(query)));
    vec![
        format!("title.ilike.{pattern}"),
        format!("author.ilike.{pattern}"),
    ]
}

/// Escapes LIKE wildcards so the text matches literally. The REST layer
/// turns every `*` into `%` and offers no escape for it, so a literal `*`
/// becomes the single-character wildcard.
fn literal_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        match c {
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '*' => escaped.push('_'),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[async_trait]
impl BookStore for RemoteStore {
    async fn list_books(&self) -> Result<Vec<Book>> {
        self.select(Query::table("books").select("*").order("created_at.desc"))
            .await
    }

    async fn get_book(&self, id: &str) -> Result<Option<Book>> {
        self.select_one(Query::table("books").select("*").eq("id", id))
            .await
    }

    async fn search_books(&self, query: &str) -> Result<Vec<Book>> {
        let Some(normalized) = normalize_query(query) else {
            return Ok(Vec::new());
        };

        self.select(
            Query::table("books")
                .select("*")
                .or(&title_or_author(&normalized))
                .order("title.asc")
                .limit(SEARCH_LIMIT),
        )
        .await
    }

    async fn related_books(&self, book: &Book, limit: usize) -> Result<Vec<Book>> {
        self.select(
            Query::table("books")
                .select("*")
                .eq("category", &book.category)
                .neq("id", &book.id)
                .limit(limit),
        )
        .await
    }

    async fn insert_book(&self, book: NewBook) -> Result<Book> {
        let mut rows: Vec<Book> = self.insert("books", &book, Conflict::Fail).await?;
        rows.pop().ok_or_else(|| anyhow!("backend returned no book row"))
    }

    async fn book_links(&self, book_id: &str) -> Result<Option<BookLink>> {
        self.select_one(Query::table("book_links").select("*").eq("book_id", book_id))
            .await
    }

    async fn set_book_links(
        &self,
        book_id: &str,
        download_url: Option<String>,
        read_url: Option<String>,
    ) -> Result<BookLink> {
        let body = json!({
            "book_id": book_id,
            "download_url": download_url,
            "read_url": read_url,
        });
        let mut rows: Vec<BookLink> = self
            .insert("book_links", &body, Conflict::Merge("book_id"))
            .await?;
        rows.pop().ok_or_else(|| anyhow!("backend returned no link row"))
    }

    async fn record_download(&self, user_id: &str, book: &Book) -> Result<()> {
        let now = Utc::now();

        let _: Vec<Book> = self
            .update(
                Query::table("books").eq("id", &book.id),
                &json!({ "downloads": book.downloads + 1 }),
            )
            .await?;

        match self.user_book(user_id, &book.id).await? {
            Some(existing) => {
                let _: Vec<UserBook> = self
                    .update(
                        Query::table("user_books").eq("id", &existing.id),
                        &json!({
                            "last_downloaded": now,
                            "download_count": existing.download_count + 1,
                        }),
                    )
                    .await?;
            }
            None => {
                let _: Vec<UserBook> = self
                    .insert(
                        "user_books",
                        &json!({
                            "user_id": user_id,
                            "book_id": book.id,
                            "last_downloaded": now,
                            "download_count": 1,
                        }),
                        Conflict::Merge("user_id,book_id"),
                    )
                    .await?;
            }
        }

        Ok(())
    }

    fn cover_url(&self, cover_ref: Option<&str>) -> String {
        cover::resolve(cover_ref, Some(&self.public_bucket_url()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_filter_matches_title_or_author() {
        assert_eq!(
            title_or_author("dune"),
            vec!["title.ilike.*dune*", "author.ilike.*dune*"]
        );
        assert_eq!(
            title_or_author("war, peace"),
            vec!["title.ilike.\"*war, peace*\"", "author.ilike.\"*war, peace*\""]
        );
    }

    #[test]
    fn search_filter_treats_wildcards_literally() {
        assert_eq!(
            title_or_author("100%_true"),
            vec![
                "title.ilike.\"*100\\\\%\\\\_true*\"",
                "author.ilike.\"*100\\\\%\\\\_true*\""
            ]
        );
        assert_eq!(
            title_or_author("a*b"),
            vec!["title.ilike.*a_b*", "author.ilike.*a_b*"]
        );
    }
}
