use axum::{
    extract::Request,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers::{auth, books, cart, chat, collections, library, pages, profile};
use super::types::AppState;
use crate::session::SESSION_HEADER;

pub fn create_router(state: AppState) -> Router {
    let session_header = HeaderName::from_static(SESSION_HEADER);
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, session_header.clone()])
        .expose_headers([session_header]);

    Router::new()
        .route("/", get(pages::home))
        .route("/about", get(pages::about))
        .route("/health", get(pages::health_check))
        // Library browsing
        .route("/books", get(library::show))
        .route("/books/filters", get(library::filters))
        .route("/books/search", post(library::search).delete(library::clear_search))
        .route("/books/ai-search", post(library::ai_search))
        .route("/books/category", put(library::select_category))
        .route("/books/formats", post(library::toggle_format))
        .route("/books/view-mode", post(library::toggle_view_mode))
        .route("/books/view-all", post(library::view_all))
        .route("/books/back", post(library::back_to_categories))
        .route("/books/shelves/:category/scroll", post(library::scroll_shelf))
        .route("/books/shelves/:category/more", post(library::load_more))
        // Book details and reader actions
        .route("/books/:id", get(books::details))
        .route("/books/:id/like", post(books::toggle_like))
        .route("/books/:id/save", post(books::toggle_save))
        .route("/books/:id/favorite", post(books::toggle_favorite))
        .route("/books/:id/download", post(books::download))
        .route("/books/:id/read", post(books::read_online))
        .route("/books/:id/reviews", post(books::add_review))
        .route("/books/:id/progress", post(books::update_progress))
        .route("/reviews/:id/report", post(books::report_review))
        // Collections
        .route("/collections", get(collections::list).post(collections::create))
        .route("/collections/:id", get(collections::details))
        .route("/collections/:id/books", post(collections::add_book))
        // Cart and checkout
        .route("/cart", get(cart::show).delete(cart::clear))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/:book_id",
            put(cart::update_quantity).delete(cart::remove_item),
        )
        .route("/checkout", get(cart::checkout_page).post(cart::checkout))
        // Account
        .route("/signin", post(auth::sign_in))
        .route("/signup", post(auth::sign_up))
        .route("/signout", post(auth::sign_out))
        .route("/theme", post(auth::toggle_theme))
        .route("/session", delete(auth::end_session))
        .route("/profile", get(profile::show).put(profile::update))
        // Assistant
        .route("/api/chat", post(chat::complete))
        .route("/chat/messages", get(chat::transcript).post(chat::send))
        .fallback(pages::not_found)
        .layer(middleware::from_fn(ensure_session))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Gives header-less requests a fresh session id and echoes the id back.
async fn ensure_session(mut req: Request, next: Next) -> Response {
    let id = match req.headers().get(SESSION_HEADER) {
        Some(value) if !value.as_bytes().is_empty() => value.clone(),
        _ => {
            let fresh = uuid::Uuid::new_v4().to_string();
            let Ok(value) = HeaderValue::from_str(&fresh) else {
                return next.run(req).await;
            };
            req.headers_mut().insert(SESSION_HEADER, value.clone());
            value
        }
    };

    let mut response = next.run(req).await;
    response.headers_mut().insert(SESSION_HEADER, id);
    response
}
