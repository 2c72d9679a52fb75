mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use wordwave::assistant::ASSISTANT_UNAVAILABLE;
use wordwave::config::Config;
use wordwave::library::EMPTY_MATCHES;

use common::{serve_fake, spawn_app};

async fn webhook_answering(answer: Value) -> String {
    let router = Router::new().route(
        "/search",
        post(move |Json(request): Json<Value>| {
            let answer = answer.clone();
            async move {
                assert!(request["chatInput"].is_string());
                assert!(request["sessionId"]
                    .as_str()
                    .is_some_and(|id| id.starts_with("session_")));
                Json(answer)
            }
        }),
    );
    format!("{}/search", serve_fake(router).await)
}

fn with_webhook(url: String) -> Config {
    Config {
        webhook_url: Some(url),
        ..Config::default()
    }
}

#[tokio::test]
async fn non_array_answers_mean_no_results() {
    let url = webhook_answering(json!({ "message": "Workflow was started" })).await;
    let app = spawn_app(with_webhook(url)).await;

    let (status, page) = app
        .post("/books/ai-search", "tab", json!({ "query": "space opera" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["mode"], "grid");
    assert_eq!(page["query"], "space opera");
    assert_eq!(page["placeholder"], EMPTY_MATCHES);
    assert_eq!(page["grid"]["count"], 0);
    assert_eq!(page["notice"]["level"], "info");
    assert_eq!(
        page["notice"]["message"],
        "No books found matching your criteria. Try a different search."
    );
}

#[tokio::test]
async fn recommendations_replace_the_grid() {
    let url = webhook_answering(json!([
        { "title": "Hyperion", "author": "Dan Simmons", "rating": 4.6 },
        { "author": "No title at all" },
        { "title": "Foundation" }
    ]))
    .await;
    let app = spawn_app(with_webhook(url)).await;

    let (status, page) = app
        .post("/books/ai-search", "tab", json!({ "query": "space opera" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["mode"], "grid");
    assert_eq!(page["grid"]["count"], 2);
    assert_eq!(page["grid"]["books"][0]["id"], "ai-book-0");
    assert_eq!(page["grid"]["books"][1]["author"], "Unknown Author");
    assert_eq!(
        page["notice"]["message"],
        "Found 2 books matching your AI search!"
    );

    let (status, details) = app.get("/books/ai-book-1", "tab").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(details["book"]["title"], "Foundation");

    let (_, body) = app
        .post("/cart/items", "tab", json!({ "book_id": "ai-book-0" }))
        .await;
    assert_eq!(body["items"][0]["book"]["title"], "Hyperion");
}

#[tokio::test]
async fn failing_webhooks_are_retried_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/search",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                StatusCode::BAD_GATEWAY
            }
        }),
    );
    let url = format!("{}/search", serve_fake(router).await);
    let app = spawn_app(with_webhook(url)).await;

    let (status, page) = app
        .post("/books/ai-search", "tab", json!({ "query": "anything" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(page["notice"]["level"], "error");
    assert!(page["notice"]["message"]
        .as_str()
        .unwrap()
        .starts_with("AI search failed"));
}

#[tokio::test]
async fn blank_ai_queries_are_rejected() {
    let app = spawn_app(Config::default()).await;
    let (status, body) = app
        .post("/books/ai-search", "tab", json!({ "query": "  " }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Please enter a search query");
}

async fn chat_completions_answering(content: &'static str) -> String {
    let router = Router::new().route(
        "/chat/completions",
        post(move |Json(request): Json<Value>| async move {
            assert_eq!(request["model"], "gpt-3.5-turbo");
            Json(json!({
                "choices": [{ "message": { "role": "assistant", "content": content } }]
            }))
        }),
    );
    serve_fake(router).await
}

fn with_chat(base_url: String) -> Config {
    Config {
        openai_api_key: Some("test-key".into()),
        openai_base_url: base_url,
        ..Config::default()
    }
}

#[tokio::test]
async fn chat_proxy_returns_the_completion() {
    let base = chat_completions_answering("Try The Left Hand of Darkness.").await;
    let app = spawn_app(with_chat(base)).await;

    let (status, body) = app
        .post("/api/chat", "tab", json!({ "message": "Recommend a novel" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Try The Left Hand of Darkness.");
}

#[tokio::test]
async fn empty_completions_use_the_fallback() {
    let base = chat_completions_answering("").await;
    let app = spawn_app(with_chat(base)).await;

    let (_, body) = app
        .post("/api/chat", "tab", json!({ "message": "hello" }))
        .await;
    assert_eq!(body["reply"], "Sorry, I couldn't generate a response.");
}

#[tokio::test]
async fn chat_failures_carry_an_error_id() {
    let app = spawn_app(Config::default()).await;

    let (status, body) = app
        .post("/api/chat", "tab", json!({ "message": "hello" }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate AI response");
    assert!(uuid::Uuid::parse_str(body["errorId"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn widget_transcript_records_both_sides() {
    let base = chat_completions_answering("Happy reading!").await;
    let app = spawn_app(with_chat(base)).await;

    let (_, body) = app
        .post("/chat/messages", "tab", json!({ "message": "   " }))
        .await;
    assert_eq!(body["messages"], json!([]));

    let (_, body) = app
        .post("/chat/messages", "tab", json!({ "message": "Hi there" }))
        .await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["sender"], "user");
    assert_eq!(messages[1]["sender"], "ai");
    assert_eq!(messages[1]["text"], "Happy reading!");

    let (_, body) = app.get("/chat/messages", "tab").await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn widget_failures_become_system_messages() {
    let app = spawn_app(Config::default()).await;

    let (_, body) = app
        .post("/chat/messages", "tab", json!({ "message": "Hi" }))
        .await;
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[1]["sender"], "system");
    assert_eq!(messages[1]["text"], ASSISTANT_UNAVAILABLE);
}
