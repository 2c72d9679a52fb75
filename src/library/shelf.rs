use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use wordwave_common::models::Book;

pub const INITIAL_VISIBLE: usize = 8;
pub const LOAD_STEP: usize = 4;
/// Distance from the end of a shelf, in pixels, that triggers a load.
pub const SCROLL_THRESHOLD: f64 = 300.0;
pub const SCROLL_THROTTLE: Duration = Duration::from_millis(100);

/// Horizontal scroll position reported by the client for one shelf.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollReport {
    pub scroll_left: f64,
    pub client_width: f64,
    pub scroll_width: f64,
}

impl ScrollReport {
    pub fn near_end(&self) -> bool {
        self.scroll_width - (self.scroll_left + self.client_width) <= SCROLL_THRESHOLD
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollOutcome {
    Throttled,
    Loaded,
    Idle,
}

/// One category row in the shelf view, revealed a few books at a time.
#[derive(Debug, Clone)]
pub struct Shelf {
    category: String,
    books: Vec<Book>,
    visible: usize,
    last_scroll: Option<Instant>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShelfView {
    pub category: String,
    pub books: Vec<Book>,
    pub total: usize,
    pub has_more: bool,
}

impl Shelf {
    pub fn new(category: impl Into<String>, books: Vec<Book>) -> Self {
        let visible = INITIAL_VISIBLE.min(books.len());
        Self {
            category: category.into(),
            books,
            visible,
            last_scroll: None,
        }
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn visible_books(&self) -> &[Book] {
        &self.books[..self.visible]
    }

    pub fn has_more(&self) -> bool {
        self.visible < self.books.len()
    }

    /// Reveals the next batch; `false` once everything is shown.
    pub fn load_more(&mut self) -> bool {
        if !self.has_more() {
            return false;
        }
        self.visible = (self.visible + LOAD_STEP).min(self.books.len());
        true
    }

    pub fn on_scroll(&mut self, report: ScrollReport, now: Instant) -> ScrollOutcome {
        if let Some(last) = self.last_scroll {
            if now.duration_since(last) < SCROLL_THROTTLE {
                return ScrollOutcome::Throttled;
            }
        }
        self.last_scroll = Some(now);

        if report.near_end() && self.load_more() {
            ScrollOutcome::Loaded
        } else {
            ScrollOutcome::Idle
        }
    }

    pub fn view(&self) -> ShelfView {
        ShelfView {
            category: self.category.clone(),
            books: self.visible_books().to_vec(),
            total: self.books.len(),
            has_more: self.has_more(),
        }
    }
}

/// Groups books into shelves with categories in sorted order. Books keep
/// their relative order within a shelf.
pub fn group_by_category(books: &[Book]) -> Vec<Shelf> {
    let mut groups: BTreeMap<&str, Vec<Book>> = BTreeMap::new();
    for book in books {
        groups.entry(&book.category).or_default().push(book.clone());
    }
    groups
        .into_iter()
        .map(|(category, books)| Shelf::new(category, books))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn books(category: &str, count: usize) -> Vec<Book> {
        (0..count)
            .map(|i| Book {
                id: format!("{category}-{i}"),
                title: format!("{category} {i}"),
                author: String::new(),
                cover_url: None,
                summary: String::new(),
                category: category.into(),
                rating: 3.0,
                downloads: 0,
                likes_count: 0,
                formats: vec!["PDF".into()],
                created_at: Utc::now(),
                updated_at: None,
            })
            .collect()
    }

    const AT_END: ScrollReport = ScrollReport {
        scroll_left: 900.0,
        client_width: 400.0,
        scroll_width: 1400.0,
    };

    #[test]
    fn grows_by_four_until_exhausted() {
        let mut shelf = Shelf::new("Fiction", books("Fiction", 14));
        assert_eq!(shelf.visible_books().len(), 8);

        assert!(shelf.load_more());
        assert_eq!(shelf.visible_books().len(), 12);
        assert!(shelf.load_more());
        assert_eq!(shelf.visible_books().len(), 14);
        assert!(!shelf.has_more());
        assert!(!shelf.load_more());
    }

    #[test]
    fn small_shelves_show_everything() {
        let shelf = Shelf::new("Arts", books("Arts", 3));
        assert_eq!(shelf.visible_books().len(), 3);
        assert!(!shelf.has_more());
    }

    #[test]
    fn scroll_threshold() {
        assert!(AT_END.near_end());
        let far = ScrollReport {
            scroll_left: 0.0,
            client_width: 400.0,
            scroll_width: 1400.0,
        };
        assert!(!far.near_end());
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_reports_are_throttled() {
        let mut shelf = Shelf::new("Fiction", books("Fiction", 20));

        assert_eq!(shelf.on_scroll(AT_END, Instant::now()), ScrollOutcome::Loaded);
        assert_eq!(shelf.on_scroll(AT_END, Instant::now()), ScrollOutcome::Throttled);
        assert_eq!(shelf.visible_books().len(), 12);

        tokio::time::advance(SCROLL_THROTTLE).await;
        assert_eq!(shelf.on_scroll(AT_END, Instant::now()), ScrollOutcome::Loaded);
        assert_eq!(shelf.visible_books().len(), 16);
    }

    #[test]
    fn grouping_sorts_categories() {
        let mut all = books("Science", 2);
        all.extend(books("Arts", 1));
        all.extend(books("Fiction", 1));

        let shelves = group_by_category(&all);
        let names: Vec<_> = shelves.iter().map(Shelf::category).collect();
        assert_eq!(names, vec!["Arts", "Fiction", "Science"]);
    }
}
