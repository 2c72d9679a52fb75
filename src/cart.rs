use serde::Serialize;
use wordwave_common::models::{Book, NewOrderLine};

pub const TAX_RATE: f64 = 0.1;
/// Largest quantity a single cart line may hold.
pub const MAX_QUANTITY: i64 = 99;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartItem {
    pub book: Book,
    pub quantity: i64,
    pub format: String,
}

impl CartItem {
    /// Books are priced at their rating.
    pub fn unit_price(&self) -> f64 {
        self.book.rating
    }

    pub fn line_total(&self) -> f64 {
        self.unit_price() * self.quantity as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cart {
    items: Vec<CartItem>,
}

/// What a cart page shows.
#[derive(Debug, Clone, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub item_count: i64,
    pub subtotal: f64,
    pub tax: f64,
    pub total: f64,
    pub empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Added {
    New,
    Incremented,
}

impl Cart {
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A book already in the cart has its quantity bumped instead of
    /// getting a second line.
    pub fn add(&mut self, book: Book, format: &str) -> Added {
        if let Some(item) = self.items.iter_mut().find(|i| i.book.id == book.id) {
            item.quantity = (item.quantity + 1).min(MAX_QUANTITY);
            return Added::Incremented;
        }
        self.items.push(CartItem {
            book,
            quantity: 1,
            format: format.to_string(),
        });
        Added::New
    }

    pub fn remove(&mut self, book_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.book.id != book_id);
        self.items.len() != before
    }

    /// Quantities outside `1..=MAX_QUANTITY` are ignored.
    pub fn update_quantity(&mut self, book_id: &str, quantity: i64) -> bool {
        if !(1..=MAX_QUANTITY).contains(&quantity) {
            return false;
        }
        match self.items.iter_mut().find(|i| i.book.id == book_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(CartItem::line_total).sum()
    }

    pub fn summary(&self) -> CartSummary {
        let subtotal = self.subtotal();
        CartSummary {
            items: self.items.clone(),
            item_count: self.items.iter().map(|i| i.quantity).sum(),
            subtotal,
            tax: subtotal * TAX_RATE,
            total: subtotal * (1.0 + TAX_RATE),
            empty: self.items.is_empty(),
        }
    }

    pub fn order_lines(&self) -> Vec<NewOrderLine> {
        self.items
            .iter()
            .map(|item| NewOrderLine {
                book_id: item.book.id.clone(),
                title: item.book.title.clone(),
                format: item.format.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price(),
            })
            .collect()
    }
}
