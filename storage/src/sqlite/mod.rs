use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::path::PathBuf;
use tokio::fs;

use wordwave_common::models::Book;
use wordwave_common::utils::cover;

mod auth;
mod books;
mod collections;
mod orders;
mod reader;
mod reviews;

/// Local SQLite rendition of the hosted backend, used for development and tests.
#[derive(Clone)]
pub struct Storage {
    pub pool: Pool<Sqlite>,
    pub data_dir: Option<PathBuf>,
}

impl Storage {
    pub async fn new(data_dir: &str) -> Result<Self> {
        let path = PathBuf::from(data_dir);
        if !path.exists() {
            fs::create_dir_all(&path).await?;
        }

        let db_path = path.join("wordwave.db");
        let db_url = format!("sqlite://{}", db_path.to_string_lossy());

        // Create DB file if not exists
        if !db_path.exists() {
            fs::File::create(&db_path).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        init_schema(&pool).await?;

        Ok(Self {
            pool,
            data_dir: Some(path),
        })
    }

    /// A private database that disappears with the pool.
    pub async fn in_memory() -> Result<Self> {
        // Every connection to :memory: is its own database, so keep exactly one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        init_schema(&pool).await?;

        Ok(Self {
            pool,
            data_dir: None,
        })
    }

    fn covers_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|dir| format!("file://{}", dir.join("covers").to_string_lossy()))
    }

    pub(crate) fn resolve_cover(&self, cover_ref: Option<&str>) -> String {
        cover::resolve(cover_ref, self.covers_dir().as_deref())
    }
}

async fn init_schema(pool: &Pool<Sqlite>) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS books (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL DEFAULT '',
            cover_url TEXT,
            summary TEXT NOT NULL DEFAULT '',
            category TEXT NOT NULL DEFAULT '',
            rating REAL NOT NULL DEFAULT 0,
            downloads INTEGER NOT NULL DEFAULT 0,
            likes_count INTEGER NOT NULL DEFAULT 0,
            formats TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        "CREATE TABLE IF NOT EXISTS book_links (
            id TEXT PRIMARY KEY,
            book_id TEXT NOT NULL UNIQUE,
            download_url TEXT,
            read_url TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY(book_id) REFERENCES books(id)
        )",
        "CREATE TABLE IF NOT EXISTS user_books (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            progress INTEGER NOT NULL DEFAULT 0,
            is_favorite INTEGER NOT NULL DEFAULT 0,
            is_saved INTEGER NOT NULL DEFAULT 0,
            last_read TEXT,
            last_downloaded TEXT,
            download_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, book_id),
            FOREIGN KEY(book_id) REFERENCES books(id)
        )",
        "CREATE TABLE IF NOT EXISTS user_likes (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(user_id, book_id),
            FOREIGN KEY(book_id) REFERENCES books(id)
        )",
        "CREATE TABLE IF NOT EXISTS reviews (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            rating INTEGER NOT NULL,
            comment TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            FOREIGN KEY(book_id) REFERENCES books(id)
        )",
        "CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            username TEXT,
            display_name TEXT,
            avatar_url TEXT,
            bio TEXT
        )",
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            username TEXT,
            password_hash TEXT NOT NULL,
            salt TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_login TEXT
        )",
        "CREATE TABLE IF NOT EXISTS auth_tokens (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id)
        )",
        "CREATE TABLE IF NOT EXISTS collections (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            cover_url TEXT,
            user_id TEXT NOT NULL,
            is_public INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT
        )",
        // Position keeps insertion order when listing a collection's books.
        "CREATE TABLE IF NOT EXISTS collection_books (
            collection_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (collection_id, book_id),
            FOREIGN KEY(collection_id) REFERENCES collections(id),
            FOREIGN KEY(book_id) REFERENCES books(id)
        )",
        "CREATE TABLE IF NOT EXISTS orders (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            total REAL NOT NULL,
            created_at TEXT NOT NULL
        )",
        "CREATE TABLE IF NOT EXISTS order_lines (
            order_id TEXT NOT NULL,
            book_id TEXT NOT NULL,
            title TEXT NOT NULL,
            format TEXT NOT NULL,
            quantity INTEGER NOT NULL,
            unit_price REAL NOT NULL,
            FOREIGN KEY(order_id) REFERENCES orders(id)
        )",
    ];

    for statement in statements {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// `books` keeps its format list as a JSON array in a text column.
#[derive(FromRow)]
pub(crate) struct BookRow {
    id: String,
    title: String,
    author: String,
    cover_url: Option<String>,
    summary: String,
    category: String,
    rating: f64,
    downloads: i64,
    likes_count: i64,
    formats: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<BookRow> for Book {
    fn from(row: BookRow) -> Self {
        let formats = serde_json::from_str(&row.formats).unwrap_or_else(|e| {
            tracing::warn!("Unreadable formats for book {}: {}", row.id, e);
            Vec::new()
        });

        Book {
            id: row.id,
            title: row.title,
            author: row.author,
            cover_url: row.cover_url,
            summary: row.summary,
            category: row.category,
            rating: row.rating,
            downloads: row.downloads,
            likes_count: row.likes_count,
            formats,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::BookStore;
    use wordwave_common::models::NewBook;

    pub fn new_book(title: &str, author: &str, category: &str, formats: &[&str]) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: author.to_string(),
            cover_url: None,
            summary: String::new(),
            category: category.to_string(),
            rating: 4.0,
            formats: formats.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub async fn seeded() -> (Storage, Vec<Book>) {
        let storage = Storage::in_memory().await.unwrap();
        let mut books = Vec::new();
        for new in [
            new_book("Dune", "Frank Herbert", "Fiction", &["PDF", "EPUB"]),
            new_book("Sapiens", "Yuval Noah Harari", "History", &["EPUB"]),
            new_book("The Lean Startup", "Eric Ries", "Business", &["PDF"]),
            new_book("Dune Messiah", "Frank Herbert", "Fiction", &["Audiobook"]),
        ] {
            books.push(storage.insert_book(new).await.unwrap());
        }
        (storage, books)
    }
}
