use serde::{Deserialize, Serialize};
use wordwave_common::models::Book;

pub const ALL_CATEGORIES: &str = "All Categories";

pub const CATEGORIES: [&str; 9] = [
    ALL_CATEGORIES,
    "Fiction",
    "Science",
    "Business",
    "History",
    "Technology",
    "Arts",
    "Philosophy",
    "Self-Help",
];

pub const FORMATS: [&str; 3] = ["PDF", "EPUB", "Audiobook"];

pub fn is_known_format(format: &str) -> bool {
    FORMATS.contains(&format)
}

/// Category and format selections shared by the shelf and grid presentations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filters {
    pub category: String,
    pub formats: Vec<String>,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            category: ALL_CATEGORIES.to_string(),
            formats: Vec::new(),
        }
    }
}

impl Filters {
    pub fn all_categories(&self) -> bool {
        self.category == ALL_CATEGORIES
    }

    /// A book passes when its category matches (or every category is
    /// selected) and it offers at least one selected format (or none are
    /// selected).
    pub fn matches(&self, book: &Book) -> bool {
        if !self.all_categories() && book.category != self.category {
            return false;
        }
        self.formats.is_empty() || book.offers_any(&self.formats)
    }

    pub fn apply(&self, books: &[Book]) -> Vec<Book> {
        books.iter().filter(|b| self.matches(b)).cloned().collect()
    }

    /// Adds the format when absent, removes it when present.
    pub fn toggle_format(&mut self, format: &str) {
        if let Some(pos) = self.formats.iter().position(|f| f == format) {
            self.formats.remove(pos);
        } else {
            self.formats.push(format.to_string());
        }
    }

    pub fn heading(&self) -> &str {
        if self.all_categories() {
            "All Books"
        } else {
            &self.category
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn book(id: &str, category: &str, formats: &[&str]) -> Book {
        Book {
            id: id.into(),
            title: id.into(),
            author: "Someone".into(),
            cover_url: None,
            summary: String::new(),
            category: category.into(),
            rating: 4.0,
            downloads: 0,
            likes_count: 0,
            formats: formats.iter().map(|f| f.to_string()).collect(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn defaults_pass_everything() {
        let books = vec![book("a", "Fiction", &["PDF"]), book("b", "Arts", &[])];
        assert_eq!(Filters::default().apply(&books).len(), 2);
        assert_eq!(Filters::default().heading(), "All Books");
    }

    #[test]
    fn category_and_format_both_apply() {
        let books = vec![
            book("a", "Fiction", &["PDF"]),
            book("b", "Fiction", &["EPUB"]),
            book("c", "History", &["PDF"]),
        ];
        let filters = Filters {
            category: "Fiction".into(),
            formats: vec!["PDF".into(), "Audiobook".into()],
        };

        let ids: Vec<_> = filters.apply(&books).into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["a"]);
        assert_eq!(filters.heading(), "Fiction");
    }

    #[test]
    fn toggling_a_format_twice_restores_the_selection() {
        let mut filters = Filters::default();
        filters.toggle_format("EPUB");
        assert_eq!(filters.formats, vec!["EPUB"]);
        filters.toggle_format("EPUB");
        assert!(filters.formats.is_empty());
        assert!(is_known_format("Audiobook"));
        assert!(!is_known_format("MOBI"));
    }
}
