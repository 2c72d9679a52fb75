use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

/// Backend rows may carry explicit `null`s where we want an empty value.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub author: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_default")]
    pub category: String,
    #[serde(default, deserialize_with = "null_default")]
    pub rating: f64,
    #[serde(default, deserialize_with = "null_default")]
    pub downloads: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub likes_count: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub formats: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Book {
    pub fn offers_any(&self, formats: &[String]) -> bool {
        formats.iter().any(|f| self.formats.contains(f))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub cover_url: Option<String>,
    pub summary: String,
    pub category: String,
    pub rating: f64,
    pub formats: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct UserBook {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub progress: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub is_favorite: bool,
    #[serde(default, deserialize_with = "null_default")]
    pub is_saved: bool,
    #[serde(default)]
    pub last_read: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_downloaded: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_default")]
    pub download_count: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[sqlx(skip)]
    pub book: Option<Book>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct BookLink {
    pub id: String,
    pub book_id: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub read_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Review {
    pub id: String,
    pub user_id: String,
    pub book_id: String,
    pub rating: i64,
    #[serde(default, deserialize_with = "null_default")]
    pub comment: String,
    pub created_at: DateTime<Utc>,
    #[serde(default = "anonymous")]
    pub user_name: String,
}

pub fn anonymous() -> String {
    "Anonymous".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewReview {
    pub user_id: String,
    pub book_id: String,
    pub rating: i64,
    pub comment: String,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq, Default)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuthSession {
    pub access_token: String,
    pub user: User,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Collection {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_default")]
    pub description: String,
    #[serde(default)]
    pub cover_url: Option<String>,
    pub user_id: String,
    #[serde(default, deserialize_with = "null_default")]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "null_default")]
    pub book_count: i64,
    #[serde(default)]
    #[sqlx(skip)]
    pub books: Vec<Book>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NewCollection {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub cover_url: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct OrderLine {
    pub order_id: String,
    pub book_id: String,
    pub title: String,
    pub format: String,
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewOrderLine {
    pub book_id: String,
    pub title: String,
    pub format: String,
    pub quantity: i64,
    pub unit_price: f64,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone, PartialEq)]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub total: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    #[sqlx(skip)]
    pub lines: Vec<OrderLine>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn book_tolerates_nulls_and_missing_fields() {
        let raw = r#"{
            "id": "b1",
            "title": "Dune",
            "author": null,
            "summary": null,
            "formats": null,
            "created_at": "2024-03-01T10:00:00.123456+00:00"
        }"#;

        let book: Book = serde_json::from_str(raw).unwrap();
        assert_eq!(book.author, "");
        assert!(book.formats.is_empty());
        assert_eq!(book.likes_count, 0);
        assert!(book.updated_at.is_none());
    }

    #[test]
    fn book_without_title_is_rejected() {
        let raw = r#"{"id": "b1", "created_at": "2024-03-01T10:00:00Z"}"#;
        assert!(serde_json::from_str::<Book>(raw).is_err());
    }

    #[test]
    fn review_defaults_to_anonymous_author() {
        let raw = r#"{
            "id": "r1", "user_id": "u1", "book_id": "b1",
            "rating": 4, "comment": "Great", "created_at": "2024-03-01T10:00:00Z"
        }"#;
        let review: Review = serde_json::from_str(raw).unwrap();
        assert_eq!(review.user_name, "Anonymous");
    }
}
