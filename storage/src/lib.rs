use anyhow::Result;
use async_trait::async_trait;

use wordwave_common::models::{
    AuthSession, Book, BookLink, Collection, NewBook, NewCollection, NewOrderLine, NewReview,
    Order, Profile, Review, User, UserBook,
};

pub mod remote;
pub mod sqlite;

pub use remote::{RemoteConfig, RemoteStore};
pub use sqlite::Storage;

/// Text search results are capped at this many rows.
pub const SEARCH_LIMIT: usize = 50;

/// Lowercased, trimmed search text, or `None` when there is nothing to search for.
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

#[async_trait]
pub trait BookStore: Send + Sync {
    /// Every book, newest first.
    async fn list_books(&self) -> Result<Vec<Book>>;

    async fn get_book(&self, id: &str) -> Result<Option<Book>>;

    /// Case-insensitive substring match on title or author, ordered by title.
    async fn search_books(&self, query: &str) -> Result<Vec<Book>>;

    /// Books sharing `book`'s category, excluding `book` itself.
    async fn related_books(&self, book: &Book, limit: usize) -> Result<Vec<Book>>;

    async fn insert_book(&self, book: NewBook) -> Result<Book>;

    async fn book_links(&self, book_id: &str) -> Result<Option<BookLink>>;

    async fn set_book_links(
        &self,
        book_id: &str,
        download_url: Option<String>,
        read_url: Option<String>,
    ) -> Result<BookLink>;

    /// Bumps the download counter and stamps the reader's `user_books` row.
    async fn record_download(&self, user_id: &str, book: &Book) -> Result<()>;

    /// Public URL for a stored cover reference.
    fn cover_url(&self, cover: Option<&str>) -> String;
}

#[async_trait]
pub trait ReaderStore: Send + Sync {
    async fn is_liked(&self, user_id: &str, book_id: &str) -> Result<bool>;

    /// Returns the new like state.
    async fn toggle_like(&self, user_id: &str, book_id: &str) -> Result<bool>;

    async fn user_book(&self, user_id: &str, book_id: &str) -> Result<Option<UserBook>>;

    /// Returns the new saved state.
    async fn toggle_save(&self, user_id: &str, book_id: &str) -> Result<bool>;

    /// Returns the new favorite state.
    async fn toggle_favorite(&self, user_id: &str, book_id: &str) -> Result<bool>;

    async fn update_progress(&self, user_id: &str, book_id: &str, progress: i64) -> Result<()>;

    /// The reader's shelf joined with its books, most recently read first.
    async fn user_books(&self, user_id: &str) -> Result<Vec<UserBook>>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Reviews for a book, newest first, with author names resolved.
    async fn reviews(&self, book_id: &str) -> Result<Vec<Review>>;

    async fn add_review(&self, review: NewReview) -> Result<Review>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile(&self, user_id: &str) -> Result<Option<Profile>>;

    async fn upsert_profile(&self, profile: Profile) -> Result<Profile>;
}

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Public collections plus the viewer's own.
    async fn collections(&self, viewer: Option<&str>) -> Result<Vec<Collection>>;

    async fn collection(&self, id: &str) -> Result<Option<Collection>>;

    async fn create_collection(&self, collection: NewCollection) -> Result<Collection>;

    async fn add_to_collection(&self, collection_id: &str, book_id: &str) -> Result<()>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn create_order(&self, user_id: &str, lines: Vec<NewOrderLine>) -> Result<Order>;

    async fn orders(&self, user_id: &str) -> Result<Vec<Order>>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    Created(AuthSession),
    Rejected(String),
}

#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str, username: Option<&str>)
        -> Result<SignUpOutcome>;

    /// `None` when the credentials do not match.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Option<AuthSession>>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;

    async fn user_for_token(&self, access_token: &str) -> Result<Option<User>>;

    async fn update_username(&self, access_token: &str, username: &str) -> Result<()>;
}

/// Everything the storefront needs from its hosted backend.
pub trait Backend:
    BookStore + ReaderStore + ReviewStore + ProfileStore + CollectionStore + OrderStore + AuthStore
{
}

impl<T> Backend for T where
    T: BookStore
        + ReaderStore
        + ReviewStore
        + ProfileStore
        + CollectionStore
        + OrderStore
        + AuthStore
{
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_queries_are_skipped() {
        assert_eq!(normalize_query("   "), None);
        assert_eq!(normalize_query(""), None);
        assert_eq!(normalize_query("  DuNe "), Some("dune".to_string()));
    }
}
