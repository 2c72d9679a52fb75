use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use wordwave_common::models::Order;

use super::books::find_book;
use crate::api::types::{AppError, AppState, CurrentSession, Reply};
use crate::cart::{Added, CartSummary, MAX_QUANTITY};
use crate::notice::Notice;

pub async fn show(current: CurrentSession) -> Reply<CartSummary> {
    Reply::new(current.session.lock().await.cart.summary())
}

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub book_id: String,
    #[serde(default)]
    pub format: Option<String>,
}

pub async fn add_item(
    State(state): State<AppState>,
    current: CurrentSession,
    Json(payload): Json<AddItemRequest>,
) -> Result<Reply<CartSummary>, AppError> {
    let book = find_book(&state, &current, &payload.book_id).await?;
    let format = match payload.format {
        Some(format) if book.formats.contains(&format) => format,
        Some(format) => {
            return Err(AppError::BadRequest(format!(
                "{} is not available as {}",
                book.title, format
            )))
        }
        None => book.formats.first().cloned().unwrap_or_else(|| "PDF".to_string()),
    };

    let mut session = current.session.lock().await;
    let message = match session.cart.add(book, &format) {
        Added::New => "Added to cart",
        Added::Incremented => "Updated quantity in cart",
    };
    Ok(Reply::new(session.cart.summary()).notice(Notice::success(message)))
}

#[derive(Deserialize)]
pub struct QuantityRequest {
    pub quantity: i64,
}

pub async fn update_quantity(
    current: CurrentSession,
    Path(book_id): Path<String>,
    Json(payload): Json<QuantityRequest>,
) -> Result<Reply<CartSummary>, AppError> {
    if payload.quantity > MAX_QUANTITY {
        return Err(AppError::BadRequest(format!(
            "Quantity cannot exceed {MAX_QUANTITY}"
        )));
    }

    let mut session = current.session.lock().await;
    if !session.cart.update_quantity(&book_id, payload.quantity) {
        tracing::debug!(
            "Ignored quantity {} for {} in the cart",
            payload.quantity,
            book_id
        );
    }
    Ok(Reply::new(session.cart.summary()))
}

pub async fn remove_item(
    current: CurrentSession,
    Path(book_id): Path<String>,
) -> Result<Reply<CartSummary>, AppError> {
    let mut session = current.session.lock().await;
    if !session.cart.remove(&book_id) {
        return Err(AppError::NotFound("Item not in cart".to_string()));
    }
    Ok(Reply::new(session.cart.summary()).notice(Notice::success("Removed from cart")))
}

pub async fn clear(current: CurrentSession) -> Reply<CartSummary> {
    let mut session = current.session.lock().await;
    session.cart.clear();
    Reply::new(session.cart.summary()).notice(Notice::info("Cart cleared"))
}

pub async fn checkout_page(current: CurrentSession) -> Result<Reply<CartSummary>, AppError> {
    let session = current.session.lock().await;
    if session.user().is_none() {
        return Err(AppError::sign_in_then(
            "Please sign in to check out",
            "checkout",
        ));
    }

    let summary = session.cart.summary();
    Ok(if summary.empty {
        Reply::new(summary).redirect("/cart")
    } else {
        Reply::new(summary)
    })
}

#[derive(Serialize)]
pub struct Receipt {
    order: Order,
}

/// Records the order and empties the cart. No payment is taken.
pub async fn checkout(
    State(state): State<AppState>,
    current: CurrentSession,
) -> Result<Reply<Receipt>, AppError> {
    let (user, lines) = {
        let session = current.session.lock().await;
        let user = session.user().cloned().ok_or_else(|| {
            AppError::sign_in_then("Please sign in to check out", "checkout")
        })?;
        if session.cart.is_empty() {
            return Err(AppError::BadRequest("Your cart is empty".to_string()));
        }
        (user, session.cart.order_lines())
    };

    let order = state
        .backend
        .create_order(&user.id, lines)
        .await
        .map_err(|e| AppError::failed("Checkout", "placeOrder", e, "Failed to place order"))?;
    tracing::info!("Order {} placed by {}", order.id, user.id);

    current.session.lock().await.cart.clear();
    Ok(Reply::new(Receipt { order })
        .notice(Notice::success(
            "Payment successful! Your books are now available.",
        ))
        .redirect("/profile"))
}
