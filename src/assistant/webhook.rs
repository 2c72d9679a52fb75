use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use wordwave_common::models::Book;

use crate::notice::Notice;

const AI_BOOK_PREFIX: &str = "ai-book-";
const DEFAULT_AUTHOR: &str = "Unknown Author";
const DEFAULT_CATEGORY: &str = "AI Recommendations";
const DEFAULT_RATING: f64 = 4.0;
const DEFAULT_FORMAT: &str = "PDF";

/// Recommendations from the webhook carry synthetic ids and are never stored.
pub fn is_ai_book(id: &str) -> bool {
    id.starts_with(AI_BOOK_PREFIX)
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("request timed out")]
    Timeout,
    #[error("empty response body")]
    EmptyBody,
    #[error("webhook answered {0}")]
    Status(StatusCode),
    #[error("{0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AiSearchOutcome {
    Found(Vec<Book>),
    NoResults,
    InvalidFormat,
    TimedOut,
    EmptyResponse,
    Failed(String),
}

impl AiSearchOutcome {
    pub fn books(&self) -> &[Book] {
        match self {
            AiSearchOutcome::Found(books) => books,
            _ => &[],
        }
    }

    pub fn notice(&self) -> Notice {
        match self {
            AiSearchOutcome::Found(books) => Notice::success(format!(
                "Found {} books matching your AI search!",
                books.len()
            )),
            AiSearchOutcome::NoResults => {
                Notice::info("No books found matching your criteria. Try a different search.")
            }
            AiSearchOutcome::InvalidFormat => {
                Notice::error("Invalid response format from AI search")
            }
            AiSearchOutcome::TimedOut => {
                Notice::error("AI search timed out. Please try again later.")
            }
            AiSearchOutcome::EmptyResponse => {
                Notice::error("AI search returned an empty response. Please try again.")
            }
            AiSearchOutcome::Failed(reason) => Notice::error(format!("AI search failed: {reason}")),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookRequest<'a> {
    chat_input: &'a str,
    session_id: String,
}

/// Client for the external AI search webhook.
#[derive(Clone)]
pub struct AiSearch {
    client: Client,
    url: String,
    policy: RetryPolicy,
}

impl AiSearch {
    pub fn new(url: impl Into<String>, policy: RetryPolicy) -> Result<Self> {
        let client = Client::builder().timeout(policy.timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            policy,
        })
    }

    pub async fn search(&self, query: &str) -> AiSearchOutcome {
        match self.fetch(query).await {
            Ok(body) => interpret(&body),
            Err(WebhookError::Timeout) => AiSearchOutcome::TimedOut,
            Err(WebhookError::EmptyBody) => AiSearchOutcome::EmptyResponse,
            Err(e) => AiSearchOutcome::Failed(e.to_string()),
        }
    }

    async fn fetch(&self, query: &str) -> Result<String, WebhookError> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(query).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        "AI search attempt {}/{} failed: {}, retrying",
                        attempt,
                        attempts,
                        e
                    );
                    tokio::time::sleep(self.policy.delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt(&self, query: &str) -> Result<String, WebhookError> {
        let request = WebhookRequest {
            chat_input: query,
            session_id: format!("session_{}", Utc::now().timestamp_millis()),
        };

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(timeout_or_network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(WebhookError::Status(status));
        }

        let body = response.text().await.map_err(timeout_or_network)?;
        if body.trim().is_empty() {
            return Err(WebhookError::EmptyBody);
        }
        Ok(body)
    }
}

fn timeout_or_network(e: reqwest::Error) -> WebhookError {
    if e.is_timeout() {
        WebhookError::Timeout
    } else {
        WebhookError::Network(e)
    }
}

/// Only a JSON array of records carrying a non-empty string `title` yields
/// books. Anything else is treated as "no results" rather than an error,
/// except a body that is not JSON at all.
pub fn interpret(body: &str) -> AiSearchOutcome {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return AiSearchOutcome::InvalidFormat;
    };

    let Value::Array(entries) = value else {
        if let Some(message) = value.get("message").and_then(Value::as_str) {
            tracing::info!("AI search webhook replied with a message: {}", message);
        }
        return AiSearchOutcome::NoResults;
    };

    let books: Vec<Book> = entries
        .iter()
        .filter_map(Value::as_object)
        .filter(|entry| {
            entry
                .get("title")
                .and_then(Value::as_str)
                .is_some_and(|t| !t.trim().is_empty())
        })
        .enumerate()
        .map(|(index, entry)| to_book(index, entry))
        .collect();

    if books.is_empty() {
        AiSearchOutcome::NoResults
    } else {
        AiSearchOutcome::Found(books)
    }
}

fn text(entry: &Map<String, Value>, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn to_book(index: usize, entry: &Map<String, Value>) -> Book {
    let now = Utc::now();
    let formats: Vec<String> = entry
        .get("formats")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .filter(|list: &Vec<String>| !list.is_empty())
        .unwrap_or_else(|| vec![DEFAULT_FORMAT.to_string()]);

    Book {
        id: format!("{AI_BOOK_PREFIX}{index}"),
        title: text(entry, "title").unwrap_or_default(),
        author: text(entry, "author").unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
        cover_url: text(entry, "cover"),
        summary: text(entry, "summary").unwrap_or_default(),
        category: text(entry, "category").unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        rating: entry
            .get("rating")
            .and_then(Value::as_f64)
            .filter(|r| *r > 0.0)
            .unwrap_or(DEFAULT_RATING),
        downloads: 0,
        likes_count: 0,
        formats,
        created_at: now,
        updated_at: Some(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_array_payloads_mean_no_results() {
        assert_eq!(
            interpret(r#"{"message": "Workflow was started"}"#),
            AiSearchOutcome::NoResults
        );
        assert_eq!(interpret("[]"), AiSearchOutcome::NoResults);
        assert_eq!(interpret("42"), AiSearchOutcome::NoResults);
        assert_eq!(
            AiSearchOutcome::NoResults.notice(),
            Notice::info("No books found matching your criteria. Try a different search.")
        );
    }

    #[test]
    fn garbage_is_an_invalid_format() {
        assert_eq!(interpret("<html>oops</html>"), AiSearchOutcome::InvalidFormat);
    }

    #[test]
    fn entries_without_titles_are_dropped_and_defaults_fill_in() {
        let body = r#"[
            {"author": "Nobody"},
            {"title": "   "},
            "not an object",
            {"title": "Dune", "author": "Frank Herbert", "rating": 5, "formats": ["EPUB"]},
            {"title": "Foundation", "cover": "https://covers.example/f.jpg"}
        ]"#;

        let outcome = interpret(body);
        let books = outcome.books();
        assert_eq!(books.len(), 2);

        assert_eq!(books[0].id, "ai-book-0");
        assert!(is_ai_book(&books[0].id));
        assert_eq!(books[0].author, "Frank Herbert");
        assert_eq!(books[0].rating, 5.0);
        assert_eq!(books[0].formats, vec!["EPUB"]);

        assert_eq!(books[1].id, "ai-book-1");
        assert_eq!(books[1].author, "Unknown Author");
        assert_eq!(books[1].category, "AI Recommendations");
        assert_eq!(books[1].rating, 4.0);
        assert_eq!(books[1].formats, vec!["PDF"]);
        assert_eq!(books[1].cover_url.as_deref(), Some("https://covers.example/f.jpg"));

        assert_eq!(
            outcome.notice(),
            Notice::success("Found 2 books matching your AI search!")
        );
    }
}
