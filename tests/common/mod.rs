#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::net::TcpListener;
use tower::ServiceExt;
use wordwave::api::routes::create_router;
use wordwave::app::build_state;
use wordwave::config::Config;
use wordwave_common::models::{Book, NewBook};
use wordwave_storage::{BookStore, Storage};

pub struct TestApp {
    pub router: Router,
    pub storage: Arc<Storage>,
    pub books: Vec<Book>,
}

pub fn new_book(title: &str, category: &str, formats: &[&str], rating: f64) -> NewBook {
    NewBook {
        title: title.to_string(),
        author: "Test Author".to_string(),
        cover_url: None,
        summary: String::new(),
        category: category.to_string(),
        rating,
        formats: formats.iter().map(|f| f.to_string()).collect(),
    }
}

pub async fn spawn_app(config: Config) -> TestApp {
    let storage = Arc::new(Storage::in_memory().await.unwrap());
    let mut books = Vec::new();
    for new in [
        new_book("Dune", "Fiction", &["PDF", "EPUB"], 4.5),
        new_book("Sapiens", "History", &["EPUB"], 4.0),
        new_book("The Lean Startup", "Business", &["PDF"], 3.5),
        new_book("Dune Messiah", "Fiction", &["Audiobook"], 4.0),
        new_book("Cosmos", "Science", &["PDF", "Audiobook"], 5.0),
    ] {
        books.push(storage.insert_book(new).await.unwrap());
    }

    let state = build_state(storage.clone(), config, Duration::from_secs(600)).unwrap();
    TestApp {
        router: create_router(state),
        storage,
        books,
    }
}

impl TestApp {
    pub fn book(&self, title: &str) -> &Book {
        self.books.iter().find(|b| b.title == title).unwrap()
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        session: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-session-id", session);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, session: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, session, None).await
    }

    pub async fn post(&self, uri: &str, session: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, session, Some(body)).await
    }

    pub async fn sign_up(&self, session: &str, email: &str) -> Value {
        let (status, body) = self
            .post(
                "/signup",
                session,
                serde_json::json!({ "email": email, "password": "secret-pass", "username": "reader" }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn serve_fake(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
